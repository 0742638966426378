use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use cyberbank_core::UserId;

use crate::codec::CredentialError;
use crate::Role;

/// Per-role boolean flags carried by credentials issued before roles were a
/// single label.
///
/// Only decoded for compatibility; new credentials never set them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRoleFlags {
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_user_role: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_moder_role: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_tester_role: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_hacker_role: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl LegacyRoleFlags {
    /// Highest role whose flag is set, if any.
    pub fn highest(&self) -> Option<Role> {
        [
            (self.is_hacker_role, Role::Hacker),
            (self.is_tester_role, Role::Tester),
            (self.is_moder_role, Role::Moder),
            (self.is_user_role, Role::User),
        ]
        .into_iter()
        .find_map(|(set, role)| set.then_some(role))
    }
}

/// Decoded credential payload.
///
/// Immutable once built: fields are private and there are no setters. A
/// "refreshed" credential is a new value (see [`Claims::refreshed`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Older issuers put the subject under `id`.
    #[serde(alias = "id")]
    sub: UserId,
    name: String,
    surname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patronymic: Option<String>,
    email: String,
    phone: String,

    /// Canonical single role label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,

    #[serde(flatten)]
    legacy: LegacyRoleFlags,

    /// Issued-at, unix seconds.
    iat: i64,
    /// Expiry, unix seconds.
    exp: i64,
}

impl Claims {
    pub fn builder(sub: UserId) -> ClaimsBuilder {
        ClaimsBuilder::new(sub)
    }

    pub fn subject(&self) -> UserId {
        self.sub
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    pub fn patronymic(&self) -> Option<&str> {
        self.patronymic.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Raw role label as issued, if any.
    pub fn role_label(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn legacy_flags(&self) -> LegacyRoleFlags {
        self.legacy
    }

    /// Effective role carried by the credential.
    ///
    /// A non-empty label wins (unknown labels rank as `User`); otherwise the
    /// highest set legacy flag. `None` means the credential carries no role
    /// information at all.
    pub fn role(&self) -> Option<Role> {
        match self.role.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => Some(Role::from_label(label)),
            _ => self.legacy.highest(),
        }
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// New claims for the same identity with a fresh validity window.
    ///
    /// The role is canonicalized to a single label; a credential without role
    /// information is refreshed as `User`.
    pub fn refreshed(&self, now: DateTime<Utc>, ttl: Duration) -> Claims {
        ClaimsBuilder {
            sub: self.sub,
            name: self.name.clone(),
            surname: self.surname.clone(),
            patronymic: self.patronymic.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: Some(self.role().unwrap_or(Role::User).as_str().to_string()),
            legacy: LegacyRoleFlags::default(),
        }
        .valid_for(now, ttl)
    }
}

/// Tolerated clock difference, in seconds, for an `iat` ahead of `now`.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 60;

/// Deterministically validate the claims' time window against `now`.
///
/// Signature verification happens in the codec; this only checks time.
/// Expiry is exact; only the issue time gets [`ISSUED_AT_LEEWAY_SECS`].
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), CredentialError> {
    if claims.exp <= claims.iat {
        return Err(CredentialError::Malformed(
            "invalid time window (exp <= iat)".to_string(),
        ));
    }
    let now = now.timestamp();
    if now.saturating_add(ISSUED_AT_LEEWAY_SECS) < claims.iat {
        return Err(CredentialError::Malformed(
            "credential issued in the future".to_string(),
        ));
    }
    if now >= claims.exp {
        return Err(CredentialError::Expired);
    }
    Ok(())
}

/// Builds a complete [`Claims`] value in one go.
#[derive(Debug, Clone)]
pub struct ClaimsBuilder {
    sub: UserId,
    name: String,
    surname: String,
    patronymic: Option<String>,
    email: String,
    phone: String,
    role: Option<String>,
    legacy: LegacyRoleFlags,
}

impl ClaimsBuilder {
    fn new(sub: UserId) -> Self {
        Self {
            sub,
            name: String::new(),
            surname: String::new(),
            patronymic: None,
            email: String::new(),
            phone: String::new(),
            role: None,
            legacy: LegacyRoleFlags::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn surname(mut self, surname: impl Into<String>) -> Self {
        self.surname = surname.into();
        self
    }

    pub fn patronymic(mut self, patronymic: Option<String>) -> Self {
        self.patronymic = patronymic;
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role.as_str().to_string());
        self
    }

    /// Arbitrary label, including ones that are not known roles.
    pub fn role_label(mut self, label: impl Into<String>) -> Self {
        self.role = Some(label.into());
        self
    }

    pub fn legacy_flags(mut self, flags: LegacyRoleFlags) -> Self {
        self.legacy = flags;
        self
    }

    /// Finish with a validity window of `ttl` starting at `issued_at`.
    pub fn valid_for(self, issued_at: DateTime<Utc>, ttl: Duration) -> Claims {
        let iat = issued_at.timestamp();
        Claims {
            sub: self.sub,
            name: self.name,
            surname: self.surname,
            patronymic: self.patronymic,
            email: self.email,
            phone: self.phone,
            role: self.role,
            legacy: self.legacy,
            iat,
            exp: iat.saturating_add(ttl.num_seconds()),
        }
    }
}
