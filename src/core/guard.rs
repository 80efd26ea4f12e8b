//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions over the session context. A guarded
//! transition is only legal while its guard accepts the current context.

use super::context::SessionContext;
use std::fmt;
use std::sync::Arc;

/// Pure predicate that determines if a transition can execute.
///
/// Guards are evaluated during the legality check, before any effect handler
/// runs. They must be deterministic and free of side effects.
///
/// # Example
///
/// ```rust
/// use keystate::core::{Guard, SessionContext};
///
/// let signed_in = Guard::new("signed_in", |ctx: &SessionContext| ctx.is_signed_in());
///
/// assert!(!signed_in.check(&SessionContext::new()));
/// assert_eq!(signed_in.label(), "signed_in");
/// ```
#[derive(Clone)]
pub struct Guard {
    label: String,
    predicate: Arc<dyn Fn(&SessionContext) -> bool + Send + Sync>,
}

impl Guard {
    /// Create a guard from a pure predicate function.
    ///
    /// The label shows up in logs and `Debug` output.
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&SessionContext) -> bool + Send + Sync + 'static,
    {
        Guard {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that accepts only sessions with an authenticated user.
    pub fn signed_in() -> Self {
        Self::new("signed_in", SessionContext::is_signed_in)
    }

    /// Check if the guard allows the transition for this context.
    pub fn check(&self, context: &SessionContext) -> bool {
        (self.predicate)(context)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Role, UserIdentity};
    use serde_json::json;

    fn signed_in_context() -> SessionContext {
        SessionContext {
            user: Some(UserIdentity {
                id: 1,
                name: "Lin".to_string(),
                email: "lin@example.com".to_string(),
                role: Role::Gamer,
                seller_profile: None,
            }),
            ..SessionContext::default()
        }
    }

    #[test]
    fn signed_in_guard_checks_user() {
        let guard = Guard::signed_in();

        assert!(!guard.check(&SessionContext::new()));
        assert!(guard.check(&signed_in_context()));
    }

    #[test]
    fn guard_can_inspect_arbitrary_fields() {
        let guard = Guard::new("has_promo", |ctx: &SessionContext| ctx.get("promo").is_some());
        let mut ctx = SessionContext::new();

        assert!(!guard.check(&ctx));
        ctx.set("promo", json!("SPRING"));
        assert!(guard.check(&ctx));
    }

    #[test]
    fn guard_is_deterministic() {
        let ctx = signed_in_context();
        let guard = Guard::signed_in();

        assert_eq!(guard.check(&ctx), guard.check(&ctx));
    }

    #[test]
    fn cloned_guard_shares_predicate() {
        let guard = Guard::signed_in();
        let cloned = guard.clone();

        assert_eq!(cloned.label(), "signed_in");
        assert_eq!(
            guard.check(&signed_in_context()),
            cloned.check(&signed_in_context())
        );
        assert_eq!(format!("{guard:?}"), "Guard { label: \"signed_in\" }");
    }
}
