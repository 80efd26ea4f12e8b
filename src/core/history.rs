//! State transition history tracking.
//!
//! Every machine instance keeps a bounded, ordered record of the transitions
//! applied to it. Records are immutable values.

use super::state::StatePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// Record of a single applied transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    /// Unique identifier of this transition
    pub id: Uuid,
    /// The state being transitioned from
    pub from: StatePath,
    /// The state being transitioned to
    pub to: StatePath,
    /// Event that triggered the transition
    pub event: String,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Whether the effect handler for this transition failed
    pub effect_failed: bool,
}

impl StateTransition {
    pub fn new(from: StatePath, to: StatePath, event: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            event: event.into(),
            timestamp: Utc::now(),
            effect_failed: false,
        }
    }

    pub fn is_self_transition(&self) -> bool {
        self.from == self.to
    }
}

/// Ordered, bounded history of state transitions.
///
/// Once `limit` records are held, recording a new transition drops the
/// oldest one.
///
/// # Example
///
/// ```rust
/// use keystate::core::{StateHistory, StatePath, StateTransition};
///
/// let history = StateHistory::with_limit(2)
///     .record(StateTransition::new("idle".into(), "home".into(), "GO_HOME"))
///     .record(StateTransition::new("home".into(), "games".into(), "GO_GAMES"))
///     .record(StateTransition::new("games".into(), "cart".into(), "GO_CART"));
///
/// assert_eq!(history.len(), 2);
/// let path: Vec<String> = history.get_path().iter().map(|p| p.to_string()).collect();
/// assert_eq!(path, vec!["home", "games", "cart"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    limit: usize,
    transitions: VecDeque<StateTransition>,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::with_limit(64)
    }
}

impl StateHistory {
    /// Create an empty history holding at most `limit` records.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            transitions: VecDeque::new(),
        }
    }

    /// Record a transition, returning the updated history.
    pub fn record(mut self, transition: StateTransition) -> Self {
        self.push(transition);
        self
    }

    /// Record a transition in place.
    pub fn push(&mut self, transition: StateTransition) {
        if self.transitions.len() == self.limit {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    /// Path of states traversed: the oldest retained `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&StatePath> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the oldest and newest retained transition.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.transitions.front()?, self.transitions.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn last(&self) -> Option<&StateTransition> {
        self.transitions.back()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &StateTransition> {
        self.transitions.iter()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
