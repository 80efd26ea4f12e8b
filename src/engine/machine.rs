//! Per-session machine instance.

use crate::core::{SessionContext, StateHistory, StatePath, StateTransition};
use chrono::{DateTime, Utc};

/// Live state of one session: where it is, what it remembers, how it got there.
///
/// Only the dispatcher mutates an instance, and only while holding the
/// session lock.
#[derive(Clone, Debug)]
pub struct MachineInstance {
    key: String,
    state: StatePath,
    context: SessionContext,
    history: StateHistory,
    created_at: DateTime<Utc>,
}

impl MachineInstance {
    pub fn new(key: impl Into<String>, initial: StatePath, history_limit: usize) -> Self {
        Self {
            key: key.into(),
            state: initial,
            context: SessionContext::new(),
            history: StateHistory::with_limit(history_limit),
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn current_state(&self) -> &StatePath {
        &self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn replace_context(&mut self, context: SessionContext) {
        self.context = context;
    }

    pub(crate) fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    /// Move to `to`, recording the transition.
    pub(crate) fn advance(&mut self, to: StatePath, event: &str, effect_failed: bool) -> StateTransition {
        let mut transition = StateTransition::new(self.state.clone(), to.clone(), event);
        transition.effect_failed = effect_failed;
        self.history.push(transition.clone());
        self.state = to;
        transition
    }
}
