//! Registered users and the in-memory user directory.
//!
//! The directory is the identity source for credential issuance: registration,
//! phone/password login and role grants all happen here. Profile editing is
//! deliberately absent.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cyberbank_core::{DomainError, ErrorKind, Reason, UserId};

use crate::password::{hash_password, verify_password};
use crate::{Claims, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A registered bank customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    name: String,
    surname: String,
    patronymic: Option<String>,
    email: String,
    phone: String,
    password_hash: String,
    roles: BTreeSet<Role>,
}

impl User {
    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Highest granted tier; every user holds at least `User`.
    pub fn highest_role(&self) -> Role {
        self.roles.iter().next_back().copied().unwrap_or(Role::User)
    }

    /// Claims for a credential issued to this user, built in one step.
    pub fn claims(&self, issued_at: DateTime<Utc>, ttl: Duration) -> Claims {
        Claims::builder(self.id)
            .name(self.name.clone())
            .surname(self.surname.clone())
            .patronymic(self.patronymic.clone())
            .email(self.email.clone())
            .phone(self.phone.clone())
            .role(self.highest_role())
            .valid_for(issued_at, ttl)
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            surname: self.surname.clone(),
            patronymic: self.patronymic.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            roles: self.roles.iter().copied().collect(),
        }
    }

    pub fn public_profile(&self) -> PublicProfile {
        PublicProfile {
            name: self.name.clone(),
            surname: self.surname.clone(),
            patronymic: self.patronymic.clone(),
        }
    }
}

/// Staff-facing user representation (never includes the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub phone: String,
    pub roles: Vec<Role>,
}

/// What any customer may learn about another one (e.g. before a transfer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicProfile {
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
}

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
    pub email: String,
    pub phone: String,
    pub password: String,
}

fn validate_registration(reg: &Registration) -> Result<(), DomainError> {
    if reg.name.trim().is_empty() || reg.surname.trim().is_empty() {
        return Err(DomainError::validation("name and surname cannot be empty"));
    }
    if reg.email.trim().is_empty() || !reg.email.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }
    if normalize_phone(&reg.phone).is_empty() {
        return Err(DomainError::validation("phone cannot be empty"));
    }
    if reg.password.is_empty() {
        return Err(DomainError::validation("password cannot be empty"));
    }
    Ok(())
}

fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("phone or password is incorrect")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("user directory unavailable (lock poisoned)")]
    Poisoned,
}

impl Reason for DirectoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::Domain(e) => e.kind(),
            DirectoryError::InvalidCredentials => ErrorKind::Unauthenticated,
            DirectoryError::Hashing(_) | DirectoryError::Poisoned => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DirectoryError::Domain(e) => e.code(),
            DirectoryError::InvalidCredentials => "invalid_credentials",
            DirectoryError::Hashing(_) => "password_hashing",
            DirectoryError::Poisoned => "directory_unavailable",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory user directory, safe to share across request tasks.
#[derive(Debug)]
pub struct UserDirectory {
    users: RwLock<HashMap<UserId, User>>,
    next_id: AtomicI64,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Register a new customer with the `User` role.
    ///
    /// Phone and email must be unique across the directory.
    pub fn register(&self, reg: Registration) -> Result<User, DirectoryError> {
        validate_registration(&reg)?;
        let password_hash =
            hash_password(&reg.password).map_err(|e| DirectoryError::Hashing(e.to_string()))?;

        let phone = normalize_phone(&reg.phone);
        let email = normalize_email(&reg.email);

        let mut users = self.users.write().map_err(|_| DirectoryError::Poisoned)?;
        if users.values().any(|u| u.phone == phone) {
            return Err(DomainError::conflict("phone already registered").into());
        }
        if users.values().any(|u| u.email == email) {
            return Err(DomainError::conflict("email already registered").into());
        }

        let id = UserId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let user = User {
            id,
            name: reg.name.trim().to_string(),
            surname: reg.surname.trim().to_string(),
            patronymic: reg
                .patronymic
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            email,
            phone,
            password_hash,
            roles: BTreeSet::from([Role::User]),
        };
        users.insert(id, user.clone());

        tracing::info!(user_id = %id, "user registered");
        Ok(user)
    }

    /// Phone + password login.
    pub fn authenticate(&self, phone: &str, password: &str) -> Result<User, DirectoryError> {
        let user = self
            .find_by_phone(phone)?
            .ok_or(DomainError::not_found("user"))?;

        if !verify_password(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(DirectoryError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn get(&self, id: UserId) -> Result<Option<User>, DirectoryError> {
        let users = self.users.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(users.get(&id).cloned())
    }

    pub fn exists(&self, id: UserId) -> Result<bool, DirectoryError> {
        Ok(self.get(id)?.is_some())
    }

    /// All users ordered by id.
    pub fn list(&self) -> Result<Vec<User>, DirectoryError> {
        let users = self.users.read().map_err(|_| DirectoryError::Poisoned)?;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.id);
        Ok(all)
    }

    pub fn find_by_phone(&self, phone: &str) -> Result<Option<User>, DirectoryError> {
        let phone = normalize_phone(phone);
        let users = self.users.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(users.values().find(|u| u.phone == phone).cloned())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError> {
        let email = normalize_email(email);
        let users = self.users.read().map_err(|_| DirectoryError::Poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    /// Grant an additional role. Granting a role the user already holds is a conflict.
    pub fn grant_role(&self, id: UserId, role: Role) -> Result<User, DirectoryError> {
        let mut users = self.users.write().map_err(|_| DirectoryError::Poisoned)?;
        let user = users.get_mut(&id).ok_or(DomainError::not_found("user"))?;

        if !user.roles.insert(role) {
            return Err(DomainError::conflict(format!("user already has role {role}")).into());
        }

        tracing::info!(user_id = %id, role = %role, "role granted");
        Ok(user.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(phone: &str, email: &str) -> Registration {
        Registration {
            name: "Alice".to_string(),
            surname: "Smith".to_string(),
            patronymic: None,
            email: email.to_string(),
            phone: phone.to_string(),
            password: "pa55word".to_string(),
        }
    }

    #[test]
    fn register_assigns_user_role_and_ids() {
        let dir = UserDirectory::new();
        let a = dir.register(registration("100", "a@example.com")).unwrap();
        let b = dir.register(registration("200", "b@example.com")).unwrap();

        assert_eq!(a.id(), UserId::new(1));
        assert_eq!(b.id(), UserId::new(2));
        assert_eq!(a.highest_role(), Role::User);
        assert!(a.has_role(Role::User));
    }

    #[test]
    fn duplicate_phone_or_email_is_a_conflict() {
        let dir = UserDirectory::new();
        dir.register(registration("100", "a@example.com")).unwrap();

        let err = dir.register(registration("100", "other@example.com")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = dir.register(registration("300", "A@Example.com")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn invalid_registration_is_rejected() {
        let dir = UserDirectory::new();
        let err = dir.register(registration("100", "no-at-sign")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(dir.list().unwrap().is_empty());
    }

    #[test]
    fn authenticate_checks_password() {
        let dir = UserDirectory::new();
        dir.register(registration("+7 999 000", "a@example.com")).unwrap();

        assert!(dir.authenticate("+7999000", "pa55word").is_ok());
        assert_eq!(
            dir.authenticate("+7999000", "wrong").unwrap_err(),
            DirectoryError::InvalidCredentials
        );
        assert_eq!(
            dir.authenticate("555", "pa55word").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn granted_role_shows_up_in_issued_claims() {
        let dir = UserDirectory::new();
        let user = dir.register(registration("100", "a@example.com")).unwrap();

        let user = dir.grant_role(user.id(), Role::Moder).unwrap();
        let claims = user.claims(Utc::now(), Duration::minutes(5));
        assert_eq!(claims.role(), Some(Role::Moder));
        assert_eq!(claims.email(), "a@example.com");

        let err = dir.grant_role(user.id(), Role::Moder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = dir.grant_role(UserId::new(99), Role::Moder).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn views_hide_the_password_hash() {
        let dir = UserDirectory::new();
        let user = dir.register(registration("100", "a@example.com")).unwrap();
        let json = serde_json::to_string(&user.view()).unwrap();
        assert!(!json.contains("argon2"));
        assert_eq!(user.public_profile().name, "Alice");
    }
}
