//! Authentication in front of the dispatcher.
//!
//! Gated events are resolved against the [`AuthService`] before they reach
//! the dispatcher. A successful sign-in or registration injects the
//! resulting identity into the payload under [`IDENTITY_FIELD`]; a failure is
//! answered directly and the session is left untouched.
//!
//! States can demand a role: an identity of any other role is refused with
//! `ROLE_MISMATCH`, so a gamer cannot sign in through the seller entrance.

use super::dispatcher::TransitionDispatcher;
use super::outcome::{TransitionOutcome, TransitionRequest, ILLEGAL_TRANSITION};
use crate::auth::{AuthError, AuthService, Credentials, Registration};
use crate::core::{Role, StatePath};
use crate::effects::payload::decode;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Payload field carrying the identity established by the gate.
pub const IDENTITY_FIELD: &str = "identity";

/// What the auth service is asked to do for a gated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Authenticate,
    Register,
}

/// Gate decision.
#[derive(Debug)]
pub enum Admission {
    /// Dispatch this (possibly enriched) request.
    Proceed(TransitionRequest),
    /// Answer the caller without dispatching.
    Respond(TransitionOutcome),
}

#[derive(Clone)]
pub struct AuthGate {
    service: Arc<dyn AuthService>,
    actions: HashMap<String, AuthAction>,
    roles: HashMap<StatePath, Role>,
}

impl AuthGate {
    pub fn new(service: Arc<dyn AuthService>) -> Self {
        Self {
            service,
            actions: HashMap::new(),
            roles: HashMap::new(),
        }
    }

    /// Route `event` through the auth service.
    pub fn gate(mut self, event: impl Into<String>, action: AuthAction) -> Self {
        self.actions.insert(event.into(), action);
        self
    }

    /// Only admit identities with `role` while the session is in `state`.
    pub fn expect_role(mut self, state: &str, role: Role) -> Self {
        self.roles.insert(StatePath::parse(state), role);
        self
    }

    pub fn expected_role(&self, state: &StatePath) -> Option<Role> {
        self.roles.get(state).copied()
    }

    pub fn action_for(&self, event: &str) -> Option<AuthAction> {
        self.actions.get(event).copied()
    }

    /// Decide whether `request` may be dispatched.
    ///
    /// The auth service is only consulted when the event is currently legal
    /// for the session, so an out-of-place `REGISTER` never creates an
    /// account. The check is read-only; the dispatcher checks again under
    /// the session lock.
    pub async fn admit(&self, mut request: TransitionRequest, dispatcher: &TransitionDispatcher) -> Admission {
        let Some(event) = request.event_name().map(str::to_string) else {
            return Admission::Proceed(request);
        };
        let Some(action) = self.action_for(&event) else {
            return Admission::Proceed(request);
        };

        // callers never get to assert an identity themselves
        request.payload.remove(IDENTITY_FIELD);

        let snapshot = dispatcher.snapshot(request.key.as_deref()).await;
        let legal = dispatcher
            .graph()
            .target_state(&snapshot.state, &event, &snapshot.context)
            .is_some();
        if !legal {
            tracing::debug!(session.key = %snapshot.key, event = %event, "gated event not legal here");
            return Admission::Respond(TransitionOutcome::Rejected {
                code: ILLEGAL_TRANSITION,
                error_message: format!("Invalid transition '{event}' from state '{}'", snapshot.state),
                current_state: snapshot.state,
                next_events: snapshot.next_events,
                context: snapshot.context,
            });
        }

        let result = match action {
            AuthAction::Authenticate => match decode::<Credentials>(&request.payload) {
                Ok(credentials) => self.service.authenticate(&credentials).await,
                Err(_) => Err(AuthError::MissingFields),
            },
            AuthAction::Register => match decode::<Registration>(&request.payload) {
                Ok(registration) => self.service.register(&registration).await,
                Err(_) => Err(AuthError::MissingFields),
            },
        };

        let expected = self.expected_role(&snapshot.state);
        let result = result.and_then(|identity| match expected {
            Some(expected) if identity.role != expected => Err(AuthError::RoleMismatch { expected }),
            _ => Ok(identity),
        });

        let identity = result.and_then(|identity| {
            serde_json::to_value(&identity).map_err(|e| AuthError::ServerError(e.to_string()))
        });

        match identity {
            Ok(identity) => {
                request.payload.remove("password");
                request.payload.insert(IDENTITY_FIELD.to_string(), identity);
                Admission::Proceed(request)
            }
            Err(err) => {
                tracing::warn!(session.key = %snapshot.key, event = %event, code = err.code(), "auth rejected");
                Admission::Respond(TransitionOutcome::AuthFailed {
                    code: err.code(),
                    error_message: err.to_string(),
                    current_state: snapshot.state,
                    next_events: snapshot.next_events,
                })
            }
        }
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("actions", &self.actions)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
