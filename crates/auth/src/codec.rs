//! Signed credential encoding (HS256 JWT).
//!
//! Pure: no IO, no shared mutable state. The signing secret is handed in once
//! at startup and the codec is shared read-only behind an `Arc`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use cyberbank_core::{ErrorKind, Reason};

use crate::claims::{validate_claims, Claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The token's structure or payload could not be parsed.
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// The integrity check failed (wrong key, tampered payload, wrong algorithm).
    #[error("credential signature is invalid")]
    SignatureInvalid,

    #[error("credential has expired")]
    Expired,

    /// Claims could not be serialized for signing.
    #[error("credential encoding failed: {0}")]
    Encoding(String),
}

impl Reason for CredentialError {
    fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::Encoding(_) => ErrorKind::Internal,
            _ => ErrorKind::Unauthenticated,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CredentialError::Malformed(_) => "credential_malformed",
            CredentialError::SignatureInvalid => "credential_signature_invalid",
            CredentialError::Expired => "credential_expired",
            CredentialError::Encoding(_) => "credential_encoding",
        }
    }
}

/// Issues and verifies credentials with a process-wide HMAC secret.
#[derive(Clone)]
pub struct CredentialCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl core::fmt::Debug for CredentialCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialCodec")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by `validate_claims` against an explicit `now`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Validity window applied to credentials issued by this process.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, CredentialError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CredentialError::Encoding(e.to_string()))
    }

    /// Verify signature and structure, then the validity window at `now`.
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, CredentialError> {
        let data = jsonwebtoken::decode::<Claims>(token.trim(), &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidAlgorithm => {
                    CredentialError::SignatureInvalid
                }
                JwtErrorKind::ExpiredSignature => CredentialError::Expired,
                _ => CredentialError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
