//! Session-keyed orchestration engine.
//!
//! An [`Engine`] owns one immutable [`StateGraph`] and any number of
//! machine instances, one per session key. Events submitted for the same
//! key are applied one at a time in arrival order; events for different
//! keys proceed in parallel.
//!
//! Each submission runs on its own task, so a caller that stops waiting
//! does not interrupt a transition halfway through its effect.
//!
//! # Example
//!
//! ```rust
//! use keystate::effects::Payload;
//! use keystate::engine::Engine;
//! use keystate::graph::StateGraph;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let graph = StateGraph::builder("idle")
//!     .state("idle", |s| s.on("GO_HOME", "home"))
//!     .state("home", |s| s.on("LOGOUT", "idle"))
//!     .build()
//!     .unwrap();
//! let engine = Engine::builder(graph).build().unwrap();
//!
//! let outcome = engine.submit(Some("tab-1"), Some("GO_HOME"), Payload::new()).await;
//! assert_eq!(outcome.state().map(|s| s.to_string()), Some("home".to_string()));
//!
//! // other keys are unaffected
//! let other = engine.inspect(Some("tab-2")).await;
//! assert_eq!(other.state.to_string(), "idle");
//! # }
//! ```

mod dispatcher;
mod gate;
mod machine;
mod outcome;
mod registry;

pub use dispatcher::TransitionDispatcher;
pub use gate::{Admission, AuthAction, AuthGate, IDENTITY_FIELD};
pub use machine::MachineInstance;
pub use outcome::{
    SessionSnapshot, TransitionOutcome, TransitionRequest, DISPATCH_FAULT, ILLEGAL_TRANSITION,
    INVALID_PAYLOAD, MISSING_EVENT,
};
pub use registry::{SessionRegistry, SessionSlot};

use crate::config::{ConfigError, EngineConfig};
use crate::effects::{EffectEnv, EffectRegistry, Payload};
use crate::graph::StateGraph;
use crate::store::{DataStore, MemoryStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Entry point for submitting events and inspecting sessions.
#[derive(Clone, Debug)]
pub struct Engine {
    dispatcher: TransitionDispatcher,
    gate: Option<AuthGate>,
    config: EngineConfig,
}

impl Engine {
    pub fn builder(graph: StateGraph) -> EngineBuilder {
        EngineBuilder::new(graph)
    }

    /// Submit `event` for the session `key`, or the shared default session
    /// when no key is given.
    pub async fn submit(&self, key: Option<&str>, event: Option<&str>, payload: Payload) -> TransitionOutcome {
        self.dispatch(TransitionRequest::new(key, event, payload)).await
    }

    pub async fn dispatch(&self, request: TransitionRequest) -> TransitionOutcome {
        let dispatcher = self.dispatcher.clone();
        let gate = self.gate.clone();
        let key = request.key.clone();

        let task = tokio::spawn(async move {
            let request = match &gate {
                Some(gate) => match gate.admit(request, &dispatcher).await {
                    Admission::Proceed(request) => request,
                    Admission::Respond(outcome) => return outcome,
                },
                None => request,
            };
            dispatcher.apply(request).await
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "transition task aborted");
                let snapshot = self.dispatcher.snapshot(key.as_deref()).await;
                TransitionOutcome::Faulted {
                    code: DISPATCH_FAULT,
                    error_message: "transition aborted before completing".to_string(),
                    current_state: snapshot.state,
                    next_events: snapshot.next_events,
                }
            }
        }
    }

    /// Current state, context and legal events for `key`.
    ///
    /// Never creates a session; an unknown key reports the initial state.
    pub async fn inspect(&self, key: Option<&str>) -> SessionSnapshot {
        self.dispatcher.snapshot(key).await
    }

    /// Fresh random key for a new client-side session.
    pub fn new_session_key() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn session_count(&self) -> usize {
        self.dispatcher.registry().len()
    }

    /// Drop the session for `key`, as if it had never been touched.
    pub fn end_session(&self, key: &str) -> bool {
        self.dispatcher.registry().remove(key)
    }

    /// Evict sessions idle for longer than the configured TTL.
    pub fn evict_idle(&self) -> usize {
        self.dispatcher.registry().evict_idle(Utc::now())
    }

    /// Run idle eviction every `reaper_interval_secs` until the returned
    /// handle is aborted.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let registry = Arc::clone(self.dispatcher.registry());
        let period = self.config.reaper_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                registry.evict_idle(Utc::now());
            }
        })
    }

    pub fn graph(&self) -> &StateGraph {
        self.dispatcher.graph()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Assembles an [`Engine`].
pub struct EngineBuilder {
    graph: StateGraph,
    config: EngineConfig,
    effects: EffectRegistry,
    store: Option<Arc<dyn DataStore>>,
    gate: Option<AuthGate>,
}

impl EngineBuilder {
    pub fn new(graph: StateGraph) -> Self {
        Self {
            graph,
            config: EngineConfig::default(),
            effects: EffectRegistry::new(),
            store: None,
            gate: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn effects(mut self, effects: EffectRegistry) -> Self {
        self.effects = effects;
        self
    }

    /// Store handed to effect handlers. Defaults to an empty [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn auth_gate(mut self, gate: AuthGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;

        let graph = Arc::new(self.graph);
        tracing::debug!(initial = %graph.initial_path(), handlers = self.effects.len(), "building engine");
        let registry = Arc::new(SessionRegistry::new(graph.initial_path(), &self.config));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn DataStore>);
        let dispatcher = TransitionDispatcher::new(
            graph,
            registry,
            Arc::new(self.effects),
            EffectEnv::new(store),
            self.config.default_key.clone(),
            self.config.effect_timeout(),
        );

        Ok(Engine {
            dispatcher,
            gate: self.gate,
            config: self.config,
        })
    }
}
