//! Effect handler seam and registry.

use super::payload::{Payload, PayloadCheck};
use crate::core::SessionContext;
use crate::store::{DataStore, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stillwater::validation::Validation;
use thiserror::Error;

/// Data returned to the caller alongside an accepted transition.
pub type EffectOutput = Option<Value>;

/// Failure reported by an effect handler.
///
/// Handler failures never undo a transition. They are reported in the
/// outcome and copied into the context's `error_message`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{code}: {message}")]
pub struct HandlerError {
    pub code: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_authenticated() -> Self {
        Self::new("NOT_AUTHENTICATED", "a signed-in user is required")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn timeout(after_ms: u128) -> Self {
        Self::new("EFFECT_TIMEOUT", format!("effect did not finish within {after_ms}ms"))
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        let code = match &err {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Integrity(_) => "INTEGRITY",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
        };
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::new("INVALID_PAYLOAD", err.to_string())
    }
}

/// Collaborators available to every handler.
#[derive(Clone)]
pub struct EffectEnv {
    pub store: Arc<dyn DataStore>,
}

impl EffectEnv {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for EffectEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectEnv").finish_non_exhaustive()
    }
}

/// Domain action attached to a transition.
///
/// `validate` runs before the state changes; a failure rejects the event
/// with nothing mutated. `apply` runs while the session is locked and may
/// mutate the working copy of the context it is handed.
#[async_trait]
pub trait EffectHandler: Send + Sync {
    fn validate(&self, _payload: &Payload) -> PayloadCheck {
        Validation::success(())
    }

    async fn apply(
        &self,
        context: &mut SessionContext,
        payload: &Payload,
        env: &EffectEnv,
    ) -> Result<EffectOutput, HandlerError>;
}

/// Named effect handlers.
///
/// A transition annotated with an effect name runs that handler. An
/// unannotated transition runs the handler registered under its event name,
/// if any.
#[derive(Clone, Default)]
pub struct EffectRegistry {
    handlers: HashMap<String, Arc<dyn EffectHandler>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: EffectHandler + 'static,
    {
        self.insert(name, Arc::new(handler));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: Arc<dyn EffectHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EffectHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("EffectRegistry").field("handlers", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::payload::require_str;
    use crate::store::MemoryStore;
    use serde_json::json;

    struct Remember;

    #[async_trait]
    impl EffectHandler for Remember {
        fn validate(&self, payload: &Payload) -> PayloadCheck {
            require_str(payload, "note")
        }

        async fn apply(
            &self,
            context: &mut SessionContext,
            payload: &Payload,
            _env: &EffectEnv,
        ) -> Result<EffectOutput, HandlerError> {
            let note = payload.get("note").cloned().unwrap_or(Value::Null);
            context.set("note", note.clone());
            Ok(Some(json!({ "saved": note })))
        }
    }

    #[tokio::test]
    async fn registered_handler_runs() {
        let registry = EffectRegistry::new().register("remember", Remember);
        let env = EffectEnv::new(Arc::new(MemoryStore::new()));
        let mut ctx = SessionContext::new();
        let mut payload = Payload::new();
        payload.insert("note".to_string(), json!("hi"));

        let handler = registry.get("remember").unwrap();
        assert!(handler.validate(&payload).is_success());
        let output = handler.apply(&mut ctx, &payload, &env).await.unwrap();

        assert_eq!(output, Some(json!({ "saved": "hi" })));
        assert_eq!(ctx.get("note"), Some(&json!("hi")));
    }

    #[test]
    fn missing_handler_is_none() {
        let registry = EffectRegistry::new().register("remember", Remember);

        assert!(registry.contains("remember"));
        assert!(registry.get("forget").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn store_errors_map_to_codes() {
        let err: HandlerError = StoreError::not_found("game", 4).into();
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "game 4 not found");

        let err: HandlerError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err.code, "STORE_UNAVAILABLE");
    }
}
