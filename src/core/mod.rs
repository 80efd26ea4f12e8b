//! Core value types shared by the graph, the engine, and the handlers.
//!
//! This module contains the pure part of the engine:
//! - State addressing via `StatePath`
//! - Guard predicates for transition control
//! - The per-session context blob
//! - Bounded transition history
//!
//! Nothing in here performs I/O.

mod context;
mod guard;
mod history;
mod state;

pub use context::{Role, SellerProfile, SessionContext, UserIdentity};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::StatePath;
