//! Domain storage boundary.
//!
//! The engine never talks to a database directly. Effect handlers and the
//! auth service go through [`DataStore`], and every call is fallible.

mod memory;

pub use memory::MemoryStore;

use crate::core::{Role, SellerProfile};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a [`DataStore`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Stored account row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Account to insert.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial account update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Game fields supplied by a seller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDraft {
    pub title: String,
    pub genre: String,
    pub release_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

/// Stored game row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: u64,
    pub seller_id: u64,
    pub title: String,
    pub genre: String,
    pub release_date: NaiveDate,
    pub description: Option<String>,
}

/// One `(user, game)` cart row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub user_id: u64,
    pub game_id: u64,
    pub quantity: u32,
}

/// Cart row joined with its game, as listed to the shopper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub game_id: u64,
    pub quantity: u32,
    pub title: String,
    pub genre: String,
    pub release_date: NaiveDate,
}

/// Persistent storage of users, sellers, games, and carts.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_id(&self, id: u64) -> Result<Option<UserRecord>, StoreError>;

    /// Insert an account. Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<u64, StoreError>;

    async fn update_user(&self, id: u64, update: UserUpdate) -> Result<(), StoreError>;

    async fn insert_seller_profile(&self, user_id: u64, profile: SellerProfile) -> Result<(), StoreError>;

    async fn find_seller_profile(&self, user_id: u64) -> Result<Option<SellerProfile>, StoreError>;

    async fn update_seller_profile(&self, user_id: u64, profile: SellerProfile) -> Result<(), StoreError>;

    async fn insert_game(&self, seller_id: u64, game: GameDraft) -> Result<u64, StoreError>;

    async fn find_game(&self, game_id: u64) -> Result<Option<GameRecord>, StoreError>;

    async fn update_game(&self, game_id: u64, game: GameDraft) -> Result<(), StoreError>;

    async fn delete_game(&self, game_id: u64) -> Result<(), StoreError>;

    /// Add `quantity` to the user's line for `game_id`, creating it if absent.
    async fn upsert_cart_line(&self, user_id: u64, game_id: u64, quantity: u32) -> Result<CartLine, StoreError>;

    /// Overwrite the quantity of an existing line.
    async fn set_cart_quantity(&self, user_id: u64, game_id: u64, quantity: u32) -> Result<(), StoreError>;

    async fn remove_cart_line(&self, user_id: u64, game_id: u64) -> Result<(), StoreError>;

    async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StoreError>;
}
