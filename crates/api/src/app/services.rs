//! Shared application services handed to every handler.

use std::sync::Arc;

use chrono::Utc;

use cyberbank_auth::{CredentialCodec, CredentialError, User, UserDirectory};
use cyberbank_cards::{CardService, InMemoryAccountStore};

use crate::config::AppConfig;

pub type Cards = CardService<Arc<InMemoryAccountStore>>;

#[derive(Debug)]
pub struct AppServices {
    pub codec: Arc<CredentialCodec>,
    pub users: UserDirectory,
    pub cards: Cards,
}

impl AppServices {
    pub fn new(config: &AppConfig) -> Self {
        let codec = Arc::new(CredentialCodec::new(config.jwt_secret.as_bytes(), config.token_ttl));
        Self {
            codec,
            users: UserDirectory::new(),
            cards: CardService::new(Arc::new(InMemoryAccountStore::new()), config.transfer_retry),
        }
    }

    /// Issue a fresh credential for `user`.
    pub fn issue_for(&self, user: &User) -> Result<String, CredentialError> {
        let claims = user.claims(Utc::now(), self.codec.ttl());
        self.codec.issue(&claims)
    }
}
