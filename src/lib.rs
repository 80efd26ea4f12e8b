//! Keystate: a session-keyed finite state machine engine
//!
//! Keystate drives many independent machine instances off one shared,
//! declarative state graph. Each instance belongs to a session key, so one
//! browser tab, device, or workflow never sees another's state.
//!
//! The graph and the context are the pure core. Effect handlers, the data
//! store, and authentication form the imperative shell around it.
//!
//! # Core Concepts
//!
//! - **StateGraph**: Immutable, validated states and transitions, optionally hierarchical
//! - **Guards**: Pure predicates over the session context that gate transitions
//! - **Engine**: Serializes events per key and reports a structured outcome for every event
//! - **Effects**: Async handlers run for accepted transitions against a `DataStore`
//!
//! # Example
//!
//! ```rust
//! use keystate::effects::Payload;
//! use keystate::engine::{Engine, TransitionOutcome};
//! use keystate::graph::StateGraph;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let graph = StateGraph::builder("idle")
//!     .state("idle", |s| s.on("GO_GAMES", "games"))
//!     .state("games", |s| s.on("GO_HOME", "idle"))
//!     .build()
//!     .unwrap();
//! let engine = Engine::builder(graph).build().unwrap();
//!
//! let outcome = engine.submit(Some("tab-1"), Some("GO_GAMES"), Payload::new()).await;
//! assert!(outcome.is_accepted());
//!
//! let outcome = engine.submit(Some("tab-1"), Some("GO_GAMES"), Payload::new()).await;
//! assert!(matches!(outcome, TransitionOutcome::Rejected { code: "FSM-01", .. }));
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod core;
pub mod effects;
pub mod engine;
pub mod graph;
pub mod store;
pub mod storefront;
pub mod telemetry;

// Re-export commonly used types
pub use crate::config::EngineConfig;
pub use core::{Guard, SessionContext, StateHistory, StatePath, StateTransition};
pub use engine::{Engine, SessionSnapshot, TransitionOutcome};
pub use graph::{GraphError, StateGraph};
