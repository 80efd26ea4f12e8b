//! Account authentication and registration.
//!
//! The [`AuthService`] is consulted by the engine's auth gate before a
//! gated event is dispatched. It never touches machine state; it only
//! answers who the caller is.

mod password;
mod service;
mod throttle;

pub use password::{
    is_strong_password, BcryptHasher, PasswordHasher, MIN_PASSWORD_LEN, PASSWORD_SPECIALS,
};
pub use service::StoreAuthService;
pub use throttle::LoginThrottle;

use crate::core::{Role, SellerProfile, UserIdentity};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Sign-in failure, each with a stable machine-readable code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("all required fields must be provided")]
    MissingFields,

    #[error("invalid email format")]
    InvalidEmail,

    #[error(
        "password must be at least 8 characters and contain an uppercase letter, a lowercase letter, a number and a special character"
    )]
    WeakPassword,

    #[error("invalid role '{0}'")]
    InvalidRole(String),

    #[error("too many failed attempts, try again in {minutes} minute(s)")]
    RateLimited { minutes: i64 },

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailExists,

    #[error("this sign-in is for {} accounts", .expected.as_str())]
    RoleMismatch { expected: Role },

    #[error("authentication unavailable: {0}")]
    ServerError(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields => "MISSING_FIELDS",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::RoleMismatch { .. } => "ROLE_MISMATCH",
            Self::ServerError(_) => "SERVER_ERROR",
        }
    }
}

/// Sign-in payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Account creation payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub seller_profile: Option<SellerProfile>,
}

/// Verifies credentials and creates accounts.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError>;

    async fn register(&self, registration: &Registration) -> Result<UserIdentity, AuthError>;
}
