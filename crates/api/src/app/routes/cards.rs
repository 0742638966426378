//! Card service endpoints (`/api/card`).

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;

use cyberbank_auth::{Principal, Role};
use cyberbank_cards::{CardKind, NewCard, TransferRequest};
use cyberbank_core::CardId;

use crate::app::dto::{ChangeTitleRequest, FundRequest, IdQuery};
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::{errors, services::AppServices};
use crate::middleware::{guarded, Gatekeeper};

pub fn router(gates: &Gatekeeper) -> Router {
    Router::new()
        .route("/create-debit", guarded(post(create_debit), gates.at(Role::User)))
        .route("/create-credit", guarded(post(create_credit), gates.at(Role::User)))
        .route("/change-card-title", guarded(post(change_title), gates.at(Role::User)))
        .route("/delete", guarded(delete(delete_card), gates.at(Role::User)))
        .route("/get-all-cards", guarded(get(list_own), gates.at(Role::User)))
        .route("/money-transfer", guarded(post(transfer), gates.at(Role::User)))
        .route("/get-all-card-for-moder", guarded(get(list_all), gates.at(Role::Moder)))
        .route("/get-me-money", guarded(post(get_me_money), gates.at(Role::Tester)))
}

fn create(services: &AppServices, principal: &Principal, kind: CardKind, body: NewCard) -> axum::response::Response {
    match services.cards.create(principal, kind, body) {
        Ok(card) => (StatusCode::CREATED, Json(card)).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// POST /api/card/create-debit
pub async fn create_debit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<NewCard>,
) -> axum::response::Response {
    create(&services, &principal, CardKind::Debit, body)
}

/// POST /api/card/create-credit
pub async fn create_credit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<NewCard>,
) -> axum::response::Response {
    create(&services, &principal, CardKind::Credit, body)
}

/// POST /api/card/change-card-title
pub async fn change_title(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<ChangeTitleRequest>,
) -> axum::response::Response {
    match services.cards.change_title(&principal, body.id, &body.new_title) {
        Ok(card) => Json(card).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// DELETE /api/card/delete?id=
pub async fn delete_card(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiQuery(query): ApiQuery<IdQuery>,
) -> axum::response::Response {
    let id = CardId::new(query.id);
    match services.cards.delete(&principal, id) {
        Ok(()) => Json(json!({ "deleted": id })).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/card/get-all-cards - the caller's own cards
pub async fn list_own(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.cards.list_own(&principal) {
        Ok(cards) => Json(json!({ "cards": cards })).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// GET /api/card/get-all-card-for-moder
pub async fn list_all(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.cards.list_all() {
        Ok(cards) => Json(json!({ "cards": cards })).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// POST /api/card/money-transfer
pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<TransferRequest>,
) -> axum::response::Response {
    match services.cards.transfer(&principal, &body) {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}

/// POST /api/card/get-me-money - test funding
pub async fn get_me_money(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    ApiJson(body): ApiJson<FundRequest>,
) -> axum::response::Response {
    match services.cards.fund(&principal, body.card_id, body.value) {
        Ok(card) => Json(card).into_response(),
        Err(e) => errors::reason_response(&e),
    }
}
