use serde::{Deserialize, Serialize};

use cyberbank_auth::UserView;
use cyberbank_core::{CardId, UserId};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneQuery {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeTitleRequest {
    pub id: CardId,
    pub new_title: String,
}

#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub card_id: CardId,
    pub value: i64,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct ValidateUserResponse {
    pub user_id: UserId,
    pub valid: bool,
}
