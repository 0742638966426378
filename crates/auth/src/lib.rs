//! `cyberbank-auth` — credentials, role policy and the access guard.
//!
//! This crate is intentionally decoupled from HTTP and card storage.

pub mod authorize;
pub mod claims;
pub mod codec;
pub mod guard;
pub mod password;
pub mod roles;
pub mod user;

pub use authorize::{explain_authorization, is_authorized, AuthorizationExplanation, Principal};
pub use claims::{validate_claims, Claims, ClaimsBuilder, LegacyRoleFlags};
pub use codec::{CredentialCodec, CredentialError};
pub use guard::{
    strip_bearer, AccessGuard, ConfigurationError, CredentialSource, MissingRolePolicy, Rejection,
    UnauthenticatedCause, FORBIDDEN_MESSAGE, SESSION_EXPIRED_MESSAGE,
};
pub use roles::{access_level_of, Role};
pub use user::{DirectoryError, PublicProfile, Registration, User, UserDirectory, UserView};
