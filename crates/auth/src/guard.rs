//! Access guard: the single interceptor placed in front of every privileged
//! operation.
//!
//! Binding happens in two phases:
//! - **registration**: the credential source is resolved and validated once
//!   (a bad declaration is a [`ConfigurationError`] and the operation is never
//!   exposed);
//! - **call**: locate credential → decode → derive role → policy check →
//!   hand back a [`Principal`], or reject before the operation runs.
//!
//! Transports wrap their routes around [`AccessGuard::admit`] with a
//! [`CredentialSource`] of their own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use cyberbank_core::{ErrorKind, Reason};

use crate::authorize::{is_authorized, Principal};
use crate::codec::{CredentialCodec, CredentialError};
use crate::Role;

/// User-facing text for every unauthenticated rejection.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your last session has expired. Please sign in to your account again.";

/// User-facing text for every forbidden rejection.
pub const FORBIDDEN_MESSAGE: &str = "You do not have access to this function.";

/// What to do with a valid credential that carries no role information.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MissingRolePolicy {
    /// Treat it as the lowest tier (`User`).
    #[default]
    GrantLowest,
    /// Reject it as unauthenticated.
    Reject,
}

/// A guarded operation was declared with an unusable credential source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("'{0}' is not a valid credential source name")]
    InvalidSourceName(String),

    #[error("invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },
}

impl Reason for ConfigurationError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Why a credential did not authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthenticatedCause {
    MissingCredential,
    Credential(CredentialError),
    MissingRole,
}

/// Structured rejection returned before the wrapped operation runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Your last session has expired. Please sign in to your account again.")]
    Unauthenticated(UnauthenticatedCause),

    #[error("You do not have access to this function.")]
    Forbidden { presented: Role, required: Role },
}

impl Rejection {
    /// User-facing message (never distinguishes the underlying decode failure).
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::Unauthenticated(_) => SESSION_EXPIRED_MESSAGE,
            Rejection::Forbidden { .. } => FORBIDDEN_MESSAGE,
        }
    }
}

impl Reason for Rejection {
    fn kind(&self) -> ErrorKind {
        match self {
            Rejection::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Rejection::Forbidden { .. } => ErrorKind::Forbidden,
        }
    }
}

/// Strip an optional `Bearer ` scheme; empty values count as absent.
pub fn strip_bearer(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let token = match raw.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => raw[7..].trim(),
        _ => raw,
    };
    (!token.is_empty()).then_some(token)
}

/// Where an operation's credential lives in its request.
///
/// Implementations are constructed (and validated) at registration time.
pub trait CredentialSource<Req: ?Sized>: Send + Sync {
    fn credential<'r>(&self, request: &'r Req) -> Option<&'r str>;
}

/// Role gate for one operation.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    codec: Arc<CredentialCodec>,
    required: Role,
    missing_role: MissingRolePolicy,
}

impl AccessGuard {
    pub fn new(codec: Arc<CredentialCodec>, required: Role) -> Self {
        Self {
            codec,
            required,
            missing_role: MissingRolePolicy::default(),
        }
    }

    pub fn with_missing_role(mut self, policy: MissingRolePolicy) -> Self {
        self.missing_role = policy;
        self
    }

    pub fn required(&self) -> Role {
        self.required
    }

    pub fn missing_role_policy(&self) -> MissingRolePolicy {
        self.missing_role
    }

    /// Authenticate and authorize a presented credential.
    pub fn admit(&self, credential: Option<&str>, now: DateTime<Utc>) -> Result<Principal, Rejection> {
        let token = credential
            .and_then(strip_bearer)
            .ok_or(Rejection::Unauthenticated(UnauthenticatedCause::MissingCredential))?;

        let claims = self.codec.decode(token, now).map_err(|e| {
            tracing::debug!(error = %e, "credential rejected");
            Rejection::Unauthenticated(UnauthenticatedCause::Credential(e))
        })?;

        let role = match (claims.role(), self.missing_role) {
            (Some(role), _) => role,
            (None, MissingRolePolicy::GrantLowest) => Role::User,
            (None, MissingRolePolicy::Reject) => {
                return Err(Rejection::Unauthenticated(UnauthenticatedCause::MissingRole));
            }
        };

        if !is_authorized(role, self.required) {
            tracing::warn!(
                user_id = %claims.subject(),
                presented = %role,
                required = %self.required,
                "access denied"
            );
            return Err(Rejection::Forbidden {
                presented: role,
                required: self.required,
            });
        }

        Ok(Principal::new(claims, role))
    }
}
