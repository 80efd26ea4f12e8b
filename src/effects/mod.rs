//! Effect handlers: the imperative shell around the pure graph.
//!
//! A transition may name an effect. When the dispatcher accepts that
//! transition it looks the name up in an [`EffectRegistry`], validates the
//! payload, and then runs the handler against the session context and the
//! [`DataStore`](crate::store::DataStore).

mod handler;
pub mod payload;

pub use handler::{EffectEnv, EffectHandler, EffectOutput, EffectRegistry, HandlerError};
pub use payload::{Payload, PayloadCheck, PayloadViolation};
