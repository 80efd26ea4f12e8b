//! In-process [`DataStore`] backed by plain maps.

use super::{
    CartItem, CartLine, DataStore, GameDraft, GameRecord, NewUser, StoreError, UserRecord,
    UserUpdate,
};
use crate::core::SellerProfile;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Tables {
    next_user_id: u64,
    next_game_id: u64,
    users: BTreeMap<u64, UserRecord>,
    sellers: HashMap<u64, SellerProfile>,
    games: BTreeMap<u64, GameRecord>,
    carts: BTreeMap<(u64, u64), u32>,
}

impl Tables {
    fn require_user(&self, id: u64) -> Result<&UserRecord, StoreError> {
        self.users
            .get(&id)
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn require_game(&self, id: u64) -> Result<&GameRecord, StoreError> {
        self.games
            .get(&id)
            .ok_or_else(|| StoreError::not_found("game", id))
    }

    fn email_taken(&self, email: &str, except: Option<u64>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }
}

/// Thread-safe in-memory store.
///
/// Enforces the same constraints a relational schema would: unique emails,
/// one cart line per `(user, game)` and cart lines referencing existing rows.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.tables.lock().users.len()
    }

    pub fn game_count(&self) -> usize {
        self.tables.lock().games.len()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user_by_id(&self, id: u64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        if tables.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }
        tables.next_user_id += 1;
        let id = tables.next_user_id;
        tables.users.insert(
            id,
            UserRecord {
                id,
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                role: user.role,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_user(&self, id: u64, update: UserUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.require_user(id)?;
        if let Some(email) = &update.email {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict(format!("email {email} already registered")));
            }
        }
        if let Some(user) = tables.users.get_mut(&id) {
            if let Some(name) = update.name {
                user.name = name;
            }
            if let Some(email) = update.email {
                user.email = email;
            }
        }
        Ok(())
    }

    async fn insert_seller_profile(&self, user_id: u64, profile: SellerProfile) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables.require_user(user_id)?;
        if tables.sellers.contains_key(&user_id) {
            return Err(StoreError::Conflict(format!("seller profile for user {user_id} exists")));
        }
        tables.sellers.insert(user_id, profile);
        Ok(())
    }

    async fn find_seller_profile(&self, user_id: u64) -> Result<Option<SellerProfile>, StoreError> {
        Ok(self.tables.lock().sellers.get(&user_id).cloned())
    }

    async fn update_seller_profile(&self, user_id: u64, profile: SellerProfile) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let games_listed = tables
            .sellers
            .get(&user_id)
            .map(|p| p.games_listed)
            .ok_or_else(|| StoreError::not_found("seller profile", user_id))?;
        tables.sellers.insert(
            user_id,
            SellerProfile {
                games_listed,
                ..profile
            },
        );
        Ok(())
    }

    async fn insert_game(&self, seller_id: u64, game: GameDraft) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        tables.require_user(seller_id)?;
        tables.next_game_id += 1;
        let id = tables.next_game_id;
        tables.games.insert(
            id,
            GameRecord {
                id,
                seller_id,
                title: game.title,
                genre: game.genre,
                release_date: game.release_date,
                description: game.description,
            },
        );
        if let Some(profile) = tables.sellers.get_mut(&seller_id) {
            profile.games_listed += 1;
        }
        Ok(id)
    }

    async fn find_game(&self, game_id: u64) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.tables.lock().games.get(&game_id).cloned())
    }

    async fn update_game(&self, game_id: u64, game: GameDraft) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let record = tables
            .games
            .get_mut(&game_id)
            .ok_or_else(|| StoreError::not_found("game", game_id))?;
        record.title = game.title;
        record.genre = game.genre;
        record.release_date = game.release_date;
        record.description = game.description;
        Ok(())
    }

    async fn delete_game(&self, game_id: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let removed = tables
            .games
            .remove(&game_id)
            .ok_or_else(|| StoreError::not_found("game", game_id))?;
        tables.carts.retain(|(_, game), _| *game != game_id);
        if let Some(profile) = tables.sellers.get_mut(&removed.seller_id) {
            profile.games_listed = profile.games_listed.saturating_sub(1);
        }
        Ok(())
    }

    async fn upsert_cart_line(&self, user_id: u64, game_id: u64, quantity: u32) -> Result<CartLine, StoreError> {
        let mut tables = self.tables.lock();
        tables.require_user(user_id)?;
        tables.require_game(game_id)?;
        let line = tables.carts.entry((user_id, game_id)).or_insert(0);
        *line = line
            .checked_add(quantity)
            .ok_or_else(|| StoreError::Integrity("cart quantity overflow".to_string()))?;
        Ok(CartLine {
            user_id,
            game_id,
            quantity: *line,
        })
    }

    async fn set_cart_quantity(&self, user_id: u64, game_id: u64, quantity: u32) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        let line = tables
            .carts
            .get_mut(&(user_id, game_id))
            .ok_or_else(|| StoreError::not_found("cart line", format!("{user_id}/{game_id}")))?;
        *line = quantity;
        Ok(())
    }

    async fn remove_cart_line(&self, user_id: u64, game_id: u64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();
        tables
            .carts
            .remove(&(user_id, game_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("cart line", format!("{user_id}/{game_id}")))
    }

    async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StoreError> {
        let tables = self.tables.lock();
        tables
            .carts
            .range((user_id, 0)..=(user_id, u64::MAX))
            .map(|(&(_, game_id), &quantity)| -> Result<CartItem, StoreError> {
                let game = tables.require_game(game_id)?;
                Ok(CartItem {
                    game_id,
                    quantity,
                    title: game.title.clone(),
                    genre: game.genre.clone(),
                    release_date: game.release_date,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use chrono::NaiveDate;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Kim".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Seller,
        }
    }

    fn draft(title: &str) -> GameDraft {
        GameDraft {
            title: title.to_string(),
            genre: "Puzzle".to_string(),
            release_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.insert_user(new_user("kim@example.com")).await.unwrap();

        let err = store.insert_user(new_user("KIM@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn upsert_increments_existing_line() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("kim@example.com")).await.unwrap();
        let game = store.insert_game(user, draft("Tetra")).await.unwrap();

        store.upsert_cart_line(user, game, 1).await.unwrap();
        let line = store.upsert_cart_line(user, game, 2).await.unwrap();

        assert_eq!(line.quantity, 3);
        let cart = store.list_cart(user).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].title, "Tetra");
    }

    #[tokio::test]
    async fn cart_line_requires_existing_game() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("kim@example.com")).await.unwrap();

        let err = store.upsert_cart_line(user, 99, 1).await.unwrap_err();
        assert_eq!(err, StoreError::not_found("game", 99));
    }

    #[tokio::test]
    async fn deleting_game_clears_cart_lines_and_listing_count() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("kim@example.com")).await.unwrap();
        store
            .insert_seller_profile(user, SellerProfile::default())
            .await
            .unwrap();
        let game = store.insert_game(user, draft("Tetra")).await.unwrap();
        store.upsert_cart_line(user, game, 1).await.unwrap();

        assert_eq!(store.find_seller_profile(user).await.unwrap().unwrap().games_listed, 1);
        store.delete_game(game).await.unwrap();

        assert!(store.list_cart(user).await.unwrap().is_empty());
        assert_eq!(store.find_seller_profile(user).await.unwrap().unwrap().games_listed, 0);
    }

    #[tokio::test]
    async fn carts_are_scoped_per_user() {
        let store = MemoryStore::new();
        let first = store.insert_user(new_user("a@example.com")).await.unwrap();
        let second = store.insert_user(new_user("b@example.com")).await.unwrap();
        let game = store.insert_game(first, draft("Tetra")).await.unwrap();

        store.upsert_cart_line(first, game, 1).await.unwrap();

        assert_eq!(store.list_cart(first).await.unwrap().len(), 1);
        assert!(store.list_cart(second).await.unwrap().is_empty());
    }
}
