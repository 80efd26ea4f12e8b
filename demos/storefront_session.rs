//! Walk one shopper through the storefront: browse, register, sign in,
//! and fill a cart.
//!
//! Run with `RUST_LOG=keystate=debug` to see every transition.

use keystate::auth::{BcryptHasher, PasswordHasher};
use keystate::config::EngineConfig;
use keystate::core::Role;
use keystate::effects::Payload;
use keystate::engine::{Engine, TransitionOutcome};
use keystate::store::{DataStore, GameDraft, MemoryStore, NewUser};
use keystate::storefront::storefront_engine;
use keystate::telemetry::{init_tracing, LogFormat};
use serde_json::{json, Value};
use std::sync::Arc;

fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

fn report(step: &str, outcome: &TransitionOutcome) {
    match outcome {
        TransitionOutcome::Accepted {
            state, effect_error, ..
        } => match effect_error {
            Some(err) => println!("{step:<28} -> {state} (effect failed: {err})"),
            None => println!("{step:<28} -> {state}"),
        },
        other => println!(
            "{step:<28} !! {} {}",
            other.code().unwrap_or("?"),
            serde_json::to_string(other).unwrap_or_default()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("keystate=info", LogFormat::Pretty);

    let config = EngineConfig::load(None)?;
    let hasher = Arc::new(BcryptHasher::from_policy(&config.auth)?);
    let store = Arc::new(MemoryStore::new());
    let seller = store
        .insert_user(NewUser {
            name: "Pixel Forge".to_string(),
            email: "sales@pixelforge.example".to_string(),
            password_hash: hasher.hash("Forge#2024")?,
            role: Role::Seller,
        })
        .await?;
    let game = store
        .insert_game(
            seller,
            GameDraft {
                title: "Lumen".to_string(),
                genre: "Puzzle".to_string(),
                release_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
                description: Some("Bend light through crystal mazes.".to_string()),
            },
        )
        .await?;

    let engine = storefront_engine(store.clone(), hasher, config)?;
    let reaper = engine.spawn_reaper();
    let key = Engine::new_session_key();
    let key = Some(key.as_str());

    let steps = [
        ("GO_GAMES", json!({})),
        ("PROCEED_TO_CHECKOUT", json!({})),
        ("GO_SIGNUP", json!({})),
        (
            "REGISTER",
            json!({ "name": "Robin", "email": "robin@example.com", "password": "Passw0rd!", "role": "gamer" }),
        ),
        ("CHOOSE_CUSTOMER", json!({})),
        (
            "AUTHENTICATE",
            json!({ "email": "robin@example.com", "password": "Passw0rd!" }),
        ),
        ("ADD_TO_CART", json!({ "gameId": game })),
        ("ADD_TO_CART", json!({ "gameId": game })),
        ("APPLY_PROMO", json!({ "code": "spring" })),
        ("REFRESH_CART", json!({})),
        ("PROCEED_TO_CHECKOUT", json!({})),
    ];

    for (event, body) in steps {
        let outcome = engine.submit(key, Some(event), payload(body)).await;
        report(event, &outcome);
    }

    let snapshot = engine.inspect(key).await;
    println!("\nfinal state: {}", snapshot.state);
    println!("legal next:  {}", snapshot.next_events.join(", "));
    println!("sessions:    {}", engine.session_count());

    reaper.abort();
    Ok(())
}
