//! Requests into and outcomes out of the dispatcher.

use crate::core::{SessionContext, StatePath};
use crate::effects::{HandlerError, Payload, PayloadViolation};
use serde::Serialize;
use serde_json::Value;

/// Event not legal from the current state.
pub const ILLEGAL_TRANSITION: &str = "FSM-01";
/// Payload rejected by the transition's effect handler.
pub const INVALID_PAYLOAD: &str = "FSM-02";
/// Request carried no event name.
pub const MISSING_EVENT: &str = "FSM-03";
/// Transition task aborted before producing an outcome.
pub const DISPATCH_FAULT: &str = "FSM-04";

/// One submission to an engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionRequest {
    pub key: Option<String>,
    pub event: Option<String>,
    pub payload: Payload,
}

impl TransitionRequest {
    pub fn new(key: Option<&str>, event: Option<&str>, payload: Payload) -> Self {
        Self {
            key: key.map(str::to_string),
            event: event.map(str::to_string),
            payload,
        }
    }

    /// Event name, treating an empty string as absent.
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref().filter(|e| !e.is_empty())
    }
}

/// Result of submitting an event.
///
/// Serializes to the flat JSON shape clients consume: `state`, `context`
/// and `nextEvents` on success; `code` and `errorMessage` on failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    #[serde(rename_all = "camelCase")]
    Accepted {
        state: StatePath,
        context: SessionContext,
        next_events: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        effect_error: Option<HandlerError>,
    },

    #[serde(rename_all = "camelCase")]
    Rejected {
        code: &'static str,
        error_message: String,
        current_state: StatePath,
        next_events: Vec<String>,
        context: SessionContext,
    },

    #[serde(rename_all = "camelCase")]
    InvalidPayload {
        code: &'static str,
        error_message: String,
        current_state: StatePath,
        next_events: Vec<String>,
        violations: Vec<PayloadViolation>,
    },

    #[serde(rename_all = "camelCase")]
    MissingEvent {
        code: &'static str,
        error_message: String,
        current_state: StatePath,
        next_events: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    AuthFailed {
        code: &'static str,
        error_message: String,
        current_state: StatePath,
        next_events: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    Faulted {
        code: &'static str,
        error_message: String,
        current_state: StatePath,
        next_events: Vec<String>,
    },
}

impl TransitionOutcome {
    /// No event named; `current_state` is where the addressed session stands.
    pub fn missing_event(current_state: StatePath, next_events: Vec<String>) -> Self {
        Self::MissingEvent {
            code: MISSING_EVENT,
            error_message: "Event is required".to_string(),
            current_state,
            next_events,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Error code, absent for accepted transitions.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { code, .. }
            | Self::InvalidPayload { code, .. }
            | Self::MissingEvent { code, .. }
            | Self::AuthFailed { code, .. }
            | Self::Faulted { code, .. } => Some(*code),
        }
    }

    /// State the session is in after this outcome, when known.
    pub fn state(&self) -> Option<&StatePath> {
        match self {
            Self::Accepted { state, .. } => Some(state),
            Self::Rejected { current_state, .. }
            | Self::InvalidPayload { current_state, .. }
            | Self::MissingEvent { current_state, .. }
            | Self::AuthFailed { current_state, .. }
            | Self::Faulted { current_state, .. } => Some(current_state),
        }
    }

    pub fn next_events(&self) -> &[String] {
        match self {
            Self::Accepted { next_events, .. }
            | Self::Rejected { next_events, .. }
            | Self::InvalidPayload { next_events, .. }
            | Self::MissingEvent { next_events, .. }
            | Self::AuthFailed { next_events, .. }
            | Self::Faulted { next_events, .. } => next_events,
        }
    }

    pub fn context(&self) -> Option<&SessionContext> {
        match self {
            Self::Accepted { context, .. } | Self::Rejected { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Accepted { output, .. } => output.as_ref(),
            _ => None,
        }
    }

    pub fn effect_error(&self) -> Option<&HandlerError> {
        match self {
            Self::Accepted { effect_error, .. } => effect_error.as_ref(),
            _ => None,
        }
    }
}

/// Read-only view of a session.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub key: String,
    pub state: StatePath,
    pub context: SessionContext,
    pub next_events: Vec<String>,
    /// `false` when no instance exists and the snapshot shows the initial state
    pub exists: bool,
}
