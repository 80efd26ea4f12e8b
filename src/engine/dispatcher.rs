//! Applies events to sessions.

use super::outcome::{SessionSnapshot, TransitionOutcome, TransitionRequest};
use super::outcome::{ILLEGAL_TRANSITION, INVALID_PAYLOAD};
use super::registry::{SessionRegistry, SessionSlot};
use super::machine::MachineInstance;
use crate::core::SessionContext;
use crate::effects::payload::violations;
use crate::effects::{EffectEnv, EffectRegistry, HandlerError, Payload};
use crate::graph::StateGraph;
use crate::telemetry::transition_span;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Runs the transition algorithm for one request at a time per key.
///
/// Cheap to clone; every clone shares the same graph, registry and handlers.
#[derive(Clone, Debug)]
pub struct TransitionDispatcher {
    graph: Arc<StateGraph>,
    registry: Arc<SessionRegistry>,
    effects: Arc<EffectRegistry>,
    env: EffectEnv,
    default_key: String,
    effect_timeout: Option<Duration>,
}

impl TransitionDispatcher {
    pub fn new(
        graph: Arc<StateGraph>,
        registry: Arc<SessionRegistry>,
        effects: Arc<EffectRegistry>,
        env: EffectEnv,
        default_key: impl Into<String>,
        effect_timeout: Option<Duration>,
    ) -> Self {
        Self {
            graph,
            registry,
            effects,
            env,
            default_key: default_key.into(),
            effect_timeout,
        }
    }

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Key a request addresses, falling back to the shared default.
    pub fn resolve_key(&self, key: Option<&str>) -> String {
        key.filter(|k| !k.is_empty())
            .unwrap_or(&self.default_key)
            .to_string()
    }

    /// Apply one event.
    ///
    /// A missing event is answered from a read-only snapshot, so no session
    /// is created for it.
    pub async fn apply(&self, request: TransitionRequest) -> TransitionOutcome {
        let Some(event) = request.event_name().map(str::to_string) else {
            tracing::debug!("request without event rejected");
            let snapshot = self.snapshot(request.key.as_deref()).await;
            return TransitionOutcome::missing_event(snapshot.state, snapshot.next_events);
        };
        let key = self.resolve_key(request.key.as_deref());

        let span = transition_span(&key, &event);
        self.apply_event(key, event, request.payload)
            .instrument(span)
            .await
    }

    async fn apply_event(&self, key: String, event: String, payload: Payload) -> TransitionOutcome {
        let (slot, mut machine) = loop {
            let slot = self.registry.get_or_create(&key);
            let guard = slot.lock().await;
            if !slot.is_retired() {
                break (slot, guard);
            }
            tracing::debug!("session retired while queued, retrying");
        };

        let outcome = self.apply_locked(&mut machine, &event, &payload).await;
        slot.touch(Utc::now());

        if outcome.is_accepted() && self.graph.is_terminal(machine.current_state()) {
            self.registry.remove_slot(&slot);
            tracing::info!(state = %machine.current_state(), "terminal state reached, session evicted");
        }
        outcome
    }

    async fn apply_locked(
        &self,
        machine: &mut MachineInstance,
        event: &str,
        payload: &Payload,
    ) -> TransitionOutcome {
        let from = machine.current_state().clone();

        let Some(def) = self
            .graph
            .lookup(&from, event)
            .filter(|def| def.allows(machine.context()))
        else {
            tracing::debug!(state = %from, "illegal transition");
            return TransitionOutcome::Rejected {
                code: ILLEGAL_TRANSITION,
                error_message: format!("Invalid transition '{event}' from state '{from}'"),
                next_events: self.graph.legal_transitions(&from, machine.context()),
                current_state: from,
                context: machine.context().clone(),
            };
        };
        let target = def.target().clone();
        let handler = self.effects.get(def.effect().unwrap_or(event));

        if let Some(handler) = &handler {
            let found = violations(handler.validate(payload));
            if !found.is_empty() {
                tracing::debug!(violations = found.len(), "payload rejected");
                return TransitionOutcome::InvalidPayload {
                    code: INVALID_PAYLOAD,
                    error_message: found
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                    next_events: self.graph.legal_transitions(&from, machine.context()),
                    current_state: from,
                    violations: found,
                };
            }
        }

        let mut output = None;
        let mut effect_error = None;
        if let Some(handler) = handler {
            let mut working = machine.context().clone();
            let applied = handler.apply(&mut working, payload, &self.env);
            let result = match self.effect_timeout {
                Some(limit) => tokio::time::timeout(limit, applied)
                    .await
                    .unwrap_or_else(|_| Err(HandlerError::timeout(limit.as_millis()))),
                None => applied.await,
            };

            match result {
                Ok(produced) => {
                    working.error_message = None;
                    machine.replace_context(working);
                    output = produced;
                }
                Err(err) => {
                    tracing::warn!(code = %err.code, error = %err.message, "effect failed");
                    machine.context_mut().error_message = Some(err.message.clone());
                    effect_error = Some(err);
                }
            }
        }

        let transition = machine.advance(target, event, effect_error.is_some());
        tracing::info!(from = %transition.from, to = %transition.to, "transition applied");

        let state = machine.current_state().clone();
        TransitionOutcome::Accepted {
            next_events: self.graph.legal_transitions(&state, machine.context()),
            context: machine.context().clone(),
            state,
            output,
            effect_error,
        }
    }

    /// Current view of `key` without creating a session.
    ///
    /// Waits for any in-flight transition on the key to finish.
    pub async fn snapshot(&self, key: Option<&str>) -> SessionSnapshot {
        let key = self.resolve_key(key);
        match self.registry.get(&key) {
            Some(slot) => self.snapshot_slot(key, &slot).await,
            None => self.initial_snapshot(key),
        }
    }

    async fn snapshot_slot(&self, key: String, slot: &SessionSlot) -> SessionSnapshot {
        let machine = slot.lock().await;
        if slot.is_retired() {
            return self.initial_snapshot(key);
        }
        let state = machine.current_state().clone();
        SessionSnapshot {
            next_events: self.graph.legal_transitions(&state, machine.context()),
            context: machine.context().clone(),
            state,
            key,
            exists: true,
        }
    }

    fn initial_snapshot(&self, key: String) -> SessionSnapshot {
        let state = self.graph.initial_path();
        let context = SessionContext::new();
        SessionSnapshot {
            next_events: self.graph.legal_transitions(&state, &context),
            context,
            state,
            key,
            exists: false,
        }
    }
}
