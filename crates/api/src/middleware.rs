//! Route-level access guard.
//!
//! Each guarded route gets its own middleware layer carrying a fully resolved
//! [`RouteGuard`]. Credential sources are validated when the router is built,
//! so a misdeclared source stops the app from starting instead of failing per
//! request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::MethodRouter,
};
use chrono::Utc;

use cyberbank_auth::{
    strip_bearer, AccessGuard, ConfigurationError, CredentialCodec, CredentialSource, MissingRolePolicy, Role,
};

use crate::app::errors::rejection_response;

/// Credential read from a named request header.
#[derive(Debug, Clone)]
pub struct HeaderCredential {
    name: HeaderName,
}

impl HeaderCredential {
    pub fn bind(name: &str) -> Result<Self, ConfigurationError> {
        HeaderName::from_bytes(name.as_bytes())
            .map(|name| Self { name })
            .map_err(|_| ConfigurationError::InvalidSourceName(name.to_string()))
    }
}

impl CredentialSource<Request<Body>> for HeaderCredential {
    fn credential<'r>(&self, request: &'r Request<Body>) -> Option<&'r str> {
        request.headers().get(&self.name)?.to_str().ok()
    }
}

/// Credential read from a query-string parameter (`?token=...`).
///
/// Credentials are URL-safe base64 segments, so the raw value is used as is.
#[derive(Debug, Clone)]
pub struct QueryCredential {
    name: String,
}

impl QueryCredential {
    pub fn bind(name: &str) -> Result<Self, ConfigurationError> {
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if !valid {
            return Err(ConfigurationError::InvalidSourceName(name.to_string()));
        }
        Ok(Self { name: name.to_string() })
    }
}

impl CredentialSource<Request<Body>> for QueryCredential {
    fn credential<'r>(&self, request: &'r Request<Body>) -> Option<&'r str> {
        request
            .uri()
            .query()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == self.name)
            .and_then(|(_, value)| strip_bearer(value))
    }
}

/// One guarded route's gate: required tier, missing-role policy and where the
/// credential comes from.
#[derive(Clone)]
pub struct RouteGuard {
    guard: AccessGuard,
    source: Arc<dyn CredentialSource<Request<Body>>>,
}

impl RouteGuard {
    pub fn new(guard: AccessGuard, source: Arc<dyn CredentialSource<Request<Body>>>) -> Self {
        Self { guard, source }
    }
}

/// Builds [`RouteGuard`]s that share one codec and the default header source.
#[derive(Clone)]
pub struct Gatekeeper {
    codec: Arc<CredentialCodec>,
    header: Arc<HeaderCredential>,
}

impl Gatekeeper {
    pub fn new(codec: Arc<CredentialCodec>, credential_header: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            codec,
            header: Arc::new(HeaderCredential::bind(credential_header)?),
        })
    }

    /// Gate at `required`; credentials without role information rank as `User`.
    pub fn at(&self, required: Role) -> RouteGuard {
        RouteGuard::new(AccessGuard::new(self.codec.clone(), required), self.header.clone())
    }

    /// Gate at `required`; credentials without role information are rejected.
    pub fn strict(&self, required: Role) -> RouteGuard {
        let guard = AccessGuard::new(self.codec.clone(), required).with_missing_role(MissingRolePolicy::Reject);
        RouteGuard::new(guard, self.header.clone())
    }

    /// Like [`Gatekeeper::at`] but reading the credential from a query parameter.
    pub fn from_query(&self, required: Role, parameter: &str) -> Result<RouteGuard, ConfigurationError> {
        let guard = AccessGuard::new(self.codec.clone(), required);
        Ok(RouteGuard::new(guard, Arc::new(QueryCredential::bind(parameter)?)))
    }
}

/// Admit the request or answer with a 401/403 before the handler runs.
///
/// On success the [`cyberbank_auth::Principal`] is placed in request extensions.
pub async fn guard_middleware(State(route): State<RouteGuard>, mut req: Request<Body>, next: Next) -> Response {
    let admitted = route.guard.admit(route.source.credential(&req), Utc::now());
    match admitted {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(rejection) => rejection_response(&rejection),
    }
}

/// Put `route` behind `gate`.
pub fn guarded<S>(route: MethodRouter<S>, gate: RouteGuard) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.layer(from_fn_with_state(gate, guard_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cyberbank_core::{ErrorKind, Reason};

    fn request(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn header_source_rejects_invalid_names_at_bind() {
        assert!(HeaderCredential::bind("Authorization").is_ok());
        assert_eq!(
            HeaderCredential::bind("bad header").unwrap_err(),
            ConfigurationError::InvalidSourceName("bad header".to_string())
        );
    }

    #[test]
    fn header_source_reads_the_bound_header() {
        let source = HeaderCredential::bind("Authorization").unwrap();
        let req = request("/x", Some("Bearer abc"));
        assert_eq!(source.credential(&req), Some("Bearer abc"));
        assert_eq!(source.credential(&request("/x", None)), None);
    }

    #[test]
    fn query_source_reads_the_bound_parameter() {
        let source = QueryCredential::bind("token").unwrap();
        assert_eq!(source.credential(&request("/v?a=1&token=abc.def", None)), Some("abc.def"));
        assert_eq!(source.credential(&request("/v?tokens=abc", None)), None);
        assert_eq!(source.credential(&request("/v?token=", None)), None);
        assert!(QueryCredential::bind("").is_err());
        assert!(QueryCredential::bind("to ken").is_err());
    }

    fn gatekeeper() -> Gatekeeper {
        let codec = Arc::new(CredentialCodec::new(b"gate-secret", Duration::minutes(5)));
        Gatekeeper::new(codec, "Authorization").unwrap()
    }

    #[test]
    fn gates_carry_their_tier_and_missing_role_policy() {
        let gates = gatekeeper();

        let lenient = gates.at(Role::Moder);
        assert_eq!(lenient.guard.required(), Role::Moder);
        assert_eq!(lenient.guard.missing_role_policy(), MissingRolePolicy::GrantLowest);

        let strict = gates.strict(Role::User);
        assert_eq!(strict.guard.missing_role_policy(), MissingRolePolicy::Reject);

        let query = gates.from_query(Role::User, "token").unwrap();
        assert_eq!(query.guard.missing_role_policy(), MissingRolePolicy::GrantLowest);
    }

    #[test]
    fn unusable_query_parameter_fails_when_the_gate_is_built() {
        let err = gatekeeper().from_query(Role::User, "bad name").err().unwrap();
        assert_eq!(err, ConfigurationError::InvalidSourceName("bad name".to_string()));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
