//! Domain error model and the reason taxonomy shared by every boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure category.
///
/// Every error surfaced by the core maps onto exactly one kind. The transport
/// boundary decides what a kind means on the wire (status code, etc.); the core
/// never picks a status code itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential missing, undecodable or expired.
    Unauthenticated,
    /// Role below the tier an operation requires.
    Forbidden,
    /// A guarded operation was registered with an invalid credential source.
    #[serde(rename = "configuration_error")]
    Configuration,
    /// Referenced account or user does not exist.
    NotFound,
    /// Non-positive amount, self-transfer, malformed input.
    InvalidRequest,
    PinMismatch,
    InsufficientFunds,
    /// Duplicate registration, an already granted role, or exhausted
    /// concurrent-update retries.
    Conflict,
    /// Storage or encoding failure that the caller cannot fix.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Configuration => "configuration_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::PinMismatch => "pin_mismatch",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can be reported to a caller with a stable reason.
///
/// `code()` is finer grained than `kind()` (e.g. `sender_not_found` vs
/// `receiver_not_found`, both `NotFound`).
pub trait Reason: core::fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn code(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested resource was not found (domain-level).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A conflict occurred (e.g. duplicate registration).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The actor may not touch this resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }
}

impl Reason for DomainError {
    fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) => ErrorKind::InvalidRequest,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::Forbidden(_) => "forbidden",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_reason_kinds() {
        assert_eq!(DomainError::validation("x").kind(), ErrorKind::InvalidRequest);
        assert_eq!(DomainError::not_found("card").kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::forbidden("x").kind(), ErrorKind::Forbidden);
        assert_eq!(DomainError::not_found("card").to_string(), "card not found");
    }

    #[test]
    fn kind_serializes_as_its_code() {
        let json = serde_json::to_string(&ErrorKind::InsufficientFunds).unwrap();
        assert_eq!(json, "\"insufficient_funds\"");
        assert_eq!(ErrorKind::Configuration.as_str(), "configuration_error");
    }
}
