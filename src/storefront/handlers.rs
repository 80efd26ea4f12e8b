//! Effect handlers of the storefront.
//!
//! Handlers act on behalf of the user signed in to the session, never on a
//! user id supplied in the payload.

use crate::core::{SellerProfile, SessionContext, UserIdentity};
use crate::effects::payload::{
    all, decode, optional_decodable, require_decodable, require_email, require_str, require_uint,
    require_uint_range,
};
use crate::effects::{EffectEnv, EffectHandler, EffectOutput, EffectRegistry, HandlerError, Payload, PayloadCheck};
use crate::engine::IDENTITY_FIELD;
use crate::store::{DataStore, GameDraft, GameRecord, UserUpdate};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use stillwater::validation::Validation;

pub const ATTACH_IDENTITY: &str = "attach_identity";
pub const SIGN_OUT: &str = "sign_out";
pub const SAVE_PROFILE: &str = "save_profile";
pub const CREATE_GAME: &str = "create_game";
pub const UPDATE_GAME: &str = "update_game";
pub const DELETE_GAME: &str = "delete_game";
pub const ADD_TO_CART: &str = "add_to_cart";
pub const UPDATE_CART_QUANTITY: &str = "update_cart_quantity";
pub const REMOVE_CART_LINE: &str = "remove_cart_line";
pub const LIST_CART: &str = "list_cart";
pub const APPLY_PROMO: &str = "apply_promo";

/// Context field holding the promo code applied to the cart.
pub const PROMO_FIELD: &str = "promoCode";

/// Every storefront handler, registered under its effect name.
///
/// `sign_out` is additionally registered under `LOGOUT` so that every
/// unannotated `LOGOUT` transition clears the session.
pub fn storefront_effects() -> EffectRegistry {
    EffectRegistry::new()
        .register(ATTACH_IDENTITY, AttachIdentity)
        .register(SIGN_OUT, SignOut)
        .register("LOGOUT", SignOut)
        .register(SAVE_PROFILE, SaveProfile)
        .register(CREATE_GAME, CreateGame)
        .register(UPDATE_GAME, UpdateGame)
        .register(DELETE_GAME, DeleteGame)
        .register(ADD_TO_CART, AddToCart)
        .register(UPDATE_CART_QUANTITY, UpdateCartQuantity)
        .register(REMOVE_CART_LINE, RemoveCartLine)
        .register(LIST_CART, ListCart)
        .register(APPLY_PROMO, ApplyPromo)
}

fn current_user(context: &SessionContext) -> Result<&UserIdentity, HandlerError> {
    context.user.as_ref().ok_or_else(HandlerError::not_authenticated)
}

fn current_seller(context: &SessionContext) -> Result<&UserIdentity, HandlerError> {
    let user = current_user(context)?;
    if user.is_seller() {
        Ok(user)
    } else {
        Err(HandlerError::forbidden("only sellers can manage games"))
    }
}

async fn owned_game(store: &dyn DataStore, seller_id: u64, game_id: u64) -> Result<GameRecord, HandlerError> {
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| HandlerError::new("NOT_FOUND", format!("game {game_id} not found")))?;
    if game.seller_id != seller_id {
        return Err(HandlerError::forbidden(format!("game {game_id} belongs to another seller")));
    }
    Ok(game)
}

/// Copy the listing count the store keeps into the cached identity.
async fn refresh_listing_count(context: &mut SessionContext, store: &dyn DataStore) -> Result<(), HandlerError> {
    let Some(user) = context.user.as_mut() else {
        return Ok(());
    };
    user.seller_profile = store.find_seller_profile(user.id).await?;
    Ok(())
}

fn game_fields(payload: &Payload) -> Vec<PayloadCheck> {
    vec![
        require_str(payload, "title"),
        require_str(payload, "genre"),
        require_decodable::<NaiveDate>(payload, "releaseDate"),
    ]
}

fn payload_game_id(payload: &Payload) -> Result<u64, HandlerError> {
    payload
        .get("gameId")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerError::new("INVALID_PAYLOAD", "gameId is required"))
}

pub struct AttachIdentity;

#[async_trait]
impl EffectHandler for AttachIdentity {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        require_decodable::<UserIdentity>(payload, IDENTITY_FIELD)
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        _env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let identity = payload
            .get(IDENTITY_FIELD)
            .cloned()
            .ok_or_else(|| HandlerError::new("INVALID_PAYLOAD", "identity is required"))?;
        context.user = Some(serde_json::from_value(identity.clone())?);
        Ok(Some(json!({ "user": identity })))
    }
}

pub struct SignOut;

#[async_trait]
impl EffectHandler for SignOut {
    async fn apply(
        &self,
        context: &mut SessionContext,
        _payload: &Payload,
        _env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        *context = SessionContext::new();
        Ok(None)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdate {
    name: String,
    email: String,
    #[serde(default)]
    seller_profile: Option<SellerProfile>,
}

pub struct SaveProfile;

#[async_trait]
impl EffectHandler for SaveProfile {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        all(vec![
            require_str(payload, "name"),
            require_email(payload, "email"),
            optional_decodable::<SellerProfile>(payload, "sellerProfile"),
        ])
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let user = current_user(context)?.clone();
        let update: ProfileUpdate = decode(payload)?;
        let store = env.store.as_ref();

        store
            .update_user(
                user.id,
                UserUpdate {
                    name: Some(update.name.trim().to_string()),
                    email: Some(update.email.trim().to_string()),
                },
            )
            .await?;
        if let (true, Some(profile)) = (user.is_seller(), update.seller_profile) {
            store.update_seller_profile(user.id, profile).await?;
        }

        let record = store
            .find_user_by_id(user.id)
            .await?
            .ok_or_else(|| HandlerError::new("NOT_FOUND", format!("user {} not found", user.id)))?;
        let seller_profile = if user.is_seller() {
            store.find_seller_profile(user.id).await?
        } else {
            None
        };

        let refreshed = UserIdentity {
            id: record.id,
            name: record.name,
            email: record.email,
            role: record.role,
            seller_profile,
        };
        let output = json!({ "user": &refreshed });
        context.user = Some(refreshed);
        Ok(Some(output))
    }
}

pub struct CreateGame;

#[async_trait]
impl EffectHandler for CreateGame {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        all(game_fields(payload))
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let seller_id = current_seller(context)?.id;
        let draft: GameDraft = decode(payload)?;

        let id = env.store.insert_game(seller_id, draft).await?;
        refresh_listing_count(context, env.store.as_ref()).await?;
        tracing::info!(game.id = id, seller.id = seller_id, "game listed");
        Ok(Some(json!({ "gameId": id })))
    }
}

pub struct UpdateGame;

#[async_trait]
impl EffectHandler for UpdateGame {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        let mut checks = game_fields(payload);
        checks.push(require_uint(payload, "gameId", 1));
        all(checks)
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let seller_id = current_seller(context)?.id;
        let game_id = payload_game_id(payload)?;
        let draft: GameDraft = decode(payload)?;

        owned_game(env.store.as_ref(), seller_id, game_id).await?;
        env.store.update_game(game_id, draft).await?;
        Ok(Some(json!({ "gameId": game_id })))
    }
}

pub struct DeleteGame;

#[async_trait]
impl EffectHandler for DeleteGame {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        require_uint(payload, "gameId", 1)
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let seller_id = current_seller(context)?.id;
        let game_id = payload_game_id(payload)?;

        owned_game(env.store.as_ref(), seller_id, game_id).await?;
        env.store.delete_game(game_id).await?;
        refresh_listing_count(context, env.store.as_ref()).await?;
        Ok(Some(json!({ "gameId": game_id })))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartChange {
    game_id: u64,
    #[serde(default = "one")]
    quantity: u32,
}

const MAX_QUANTITY: u64 = u32::MAX as u64;

fn one() -> u32 {
    1
}

pub struct AddToCart;

#[async_trait]
impl EffectHandler for AddToCart {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        let quantity = if payload.contains_key("quantity") {
            require_uint_range(payload, "quantity", 1, MAX_QUANTITY)
        } else {
            Validation::success(())
        };
        all(vec![require_uint(payload, "gameId", 1), quantity])
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let user_id = current_user(context)?.id;
        let change: CartChange = decode(payload)?;

        let line = env
            .store
            .upsert_cart_line(user_id, change.game_id, change.quantity)
            .await?;
        Ok(Some(json!({ "gameId": line.game_id, "quantity": line.quantity })))
    }
}

pub struct UpdateCartQuantity;

#[async_trait]
impl EffectHandler for UpdateCartQuantity {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        all(vec![
            require_uint(payload, "gameId", 1),
            require_uint_range(payload, "quantity", 0, MAX_QUANTITY),
        ])
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let user_id = current_user(context)?.id;
        let change: CartChange = decode(payload)?;

        if change.quantity == 0 {
            env.store.remove_cart_line(user_id, change.game_id).await?;
        } else {
            env.store
                .set_cart_quantity(user_id, change.game_id, change.quantity)
                .await?;
        }
        Ok(Some(json!({ "gameId": change.game_id, "quantity": change.quantity })))
    }
}

pub struct RemoveCartLine;

#[async_trait]
impl EffectHandler for RemoveCartLine {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        require_uint(payload, "gameId", 1)
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let user_id = current_user(context)?.id;
        let game_id = payload_game_id(payload)?;

        env.store.remove_cart_line(user_id, game_id).await?;
        Ok(Some(json!({ "gameId": game_id })))
    }
}

pub struct ListCart;

#[async_trait]
impl EffectHandler for ListCart {
    async fn apply(
        &self,
        context: &mut SessionContext,
        _payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let user_id = current_user(context)?.id;
        let items = env.store.list_cart(user_id).await?;
        Ok(Some(json!({ "cart": items })))
    }
}

pub struct ApplyPromo;

#[async_trait]
impl EffectHandler for ApplyPromo {
    fn validate(&self, payload: &Payload) -> PayloadCheck {
        require_str(payload, "code")
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        _env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError> {
        let code = payload
            .get("code")
            .and_then(|v| v.as_str())
            .map(|c| c.trim().to_ascii_uppercase())
            .unwrap_or_default();
        context.set(PROMO_FIELD, json!(code));
        Ok(Some(json!({ "promoCode": code })))
    }
}
