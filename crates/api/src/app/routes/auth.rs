//! Authentication service endpoints (`/api/auth`).

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::json;

use cyberbank_auth::{
    explain_authorization, ConfigurationError, DirectoryError, Principal, Registration, Role, User,
};
use cyberbank_core::{DomainError, UserId};

use crate::app::dto::{EmailQuery, IdQuery, LoginRequest, PhoneQuery, TokenResponse, ValidateUserResponse};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::{errors, services::AppServices};
use crate::middleware::{guarded, Gatekeeper};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router(gates: &Gatekeeper) -> Result<Router, ConfigurationError> {
    Ok(Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login-by-token", guarded(post(refresh), gates.strict(Role::User)))
        .route("/get-all-users", guarded(get(list_users), gates.at(Role::Moder)))
        .route("/get-user-by-id", guarded(get(get_user), gates.at(Role::Moder)))
        .route("/get-user-by-email", guarded(get(user_by_email), gates.at(Role::User)))
        .route("/get-user-by-phone", guarded(get(user_by_phone), gates.at(Role::User)))
        .route(
            "/validate-user",
            guarded(get(validate_user), gates.from_query(Role::User, "token")?),
        )
        .route("/get-token-claims", guarded(get(token_claims), gates.at(Role::User)))
        .route("/become-moder", guarded(post(become_moder), gates.at(Role::Tester))))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Answer with a fresh credential for `user`.
fn token_response(services: &AppServices, user: &User, status: StatusCode) -> axum::response::Response {
    match services.issue_for(user) {
        Ok(token) => (
            status,
            Json(TokenResponse {
                token,
                user: user.view(),
            }),
        )
            .into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// Password hashing is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> Result<T, DirectoryError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(errors::reason_response(&e)),
        Err(e) => {
            tracing::error!(error = %e, "blocking task failed");
            Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error",
            ))
        }
    }
}

/// POST /api/auth/register
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(registration): ApiJson<Registration>,
) -> axum::response::Response {
    let svc = services.clone();
    match blocking(move || svc.users.register(registration)).await {
        Ok(user) => token_response(&services, &user, StatusCode::CREATED),
        Err(response) => response,
    }
}

/// POST /api/auth/login - phone + password
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> axum::response::Response {
    let svc = services.clone();
    match blocking(move || svc.users.authenticate(&body.phone, &body.password)).await {
        Ok(user) => token_response(&services, &user, StatusCode::OK),
        Err(response) => response,
    }
}

/// POST /api/auth/login-by-token - reissue the presented credential
///
/// Role-less credentials are rejected here rather than reissued as `USER`.
pub async fn refresh(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    let claims = principal.claims().refreshed(Utc::now(), services.codec.ttl());
    match services.codec.issue(&claims) {
        Ok(token) => Json(json!({
            "token": token,
            "role": claims.role(),
            "expires_at": claims.expires_at(),
        }))
        .into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/auth/get-all-users
pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.users.list() {
        Ok(users) => {
            let users: Vec<_> = users.iter().map(User::view).collect();
            Json(json!({ "users": users })).into_response()
        }
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/auth/get-user-by-id?id=
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> axum::response::Response {
    match services.users.get(UserId::new(query.id)) {
        Ok(Some(user)) => Json(user.view()).into_response(),
        Ok(None) => errors::reason_response(&DomainError::not_found("user")),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/auth/get-user-by-email?email=
pub async fn user_by_email(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> axum::response::Response {
    profile_response(services.users.find_by_email(&query.email))
}

/// GET /api/auth/get-user-by-phone?phone=
pub async fn user_by_phone(
    Extension(services): Extension<Arc<AppServices>>,
    ApiQuery(query): ApiQuery<PhoneQuery>,
) -> axum::response::Response {
    profile_response(services.users.find_by_phone(&query.phone))
}

fn profile_response(found: Result<Option<User>, DirectoryError>) -> axum::response::Response {
    match found {
        Ok(Some(user)) => Json(user.public_profile()).into_response(),
        Ok(None) => errors::reason_response(&DomainError::not_found("user")),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/auth/validate-user?token= - does the credential's subject still exist?
pub async fn validate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.users.exists(principal.user_id()) {
        Ok(valid) => Json(ValidateUserResponse {
            user_id: principal.user_id(),
            valid,
        })
        .into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/auth/get-token-claims - decoded claims plus the per-tier decision
pub async fn token_claims(Extension(principal): Extension<Principal>) -> axum::response::Response {
    let access: Vec<_> = Role::ALL
        .into_iter()
        .map(|required| explain_authorization(&principal, required))
        .collect();

    Json(json!({
        "claims": principal.claims(),
        "role": principal.role(),
        "access_level": principal.role().access_level(),
        "access": access,
    }))
    .into_response()
}

/// POST /api/auth/become-moder?id=
pub async fn become_moder(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> axum::response::Response {
    let target = UserId::new(query.id);
    match services.users.grant_role(target, Role::Moder) {
        Ok(user) => {
            tracing::info!(granted_by = %principal.user_id(), user_id = %target, "moder role granted");
            Json(json!({
                "message": format!("user {target} now has role MODER"),
                "user": user.view(),
            }))
            .into_response()
        }
        Err(e) => errors::reason_response(&e),
    }
}
