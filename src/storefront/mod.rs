//! Game storefront: the navigation graph, domain handlers, and auth wiring
//! shipped with the engine.

mod graph;
pub mod handlers;

pub use graph::storefront_graph;
pub use handlers::storefront_effects;

use crate::auth::{PasswordHasher, StoreAuthService};
use crate::config::{ConfigError, EngineConfig};
use crate::core::Role;
use crate::engine::{AuthAction, AuthGate, Engine};
use crate::graph::GraphError;
use crate::store::DataStore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Auth gate routing `AUTHENTICATE` and `REGISTER` through `service`.
///
/// Each sign-in entrance only admits its own role.
pub fn storefront_gate(service: Arc<StoreAuthService>) -> AuthGate {
    AuthGate::new(service)
        .gate("AUTHENTICATE", AuthAction::Authenticate)
        .gate("REGISTER", AuthAction::Register)
        .expect_role("authenticatingCustomer", Role::Gamer)
        .expect_role("authenticatingSeller", Role::Seller)
}

/// Fully wired storefront engine over `store`.
pub fn storefront_engine(
    store: Arc<dyn DataStore>,
    hasher: Arc<dyn PasswordHasher>,
    config: EngineConfig,
) -> Result<Engine, SetupError> {
    let auth = Arc::new(StoreAuthService::new(
        Arc::clone(&store),
        hasher,
        config.auth.clone(),
    ));

    let engine = Engine::builder(storefront_graph()?)
        .config(config)
        .effects(storefront_effects())
        .store(store)
        .auth_gate(storefront_gate(auth))
        .build()?;
    Ok(engine)
}
