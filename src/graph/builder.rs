//! Builder API for ergonomic state graph construction.
//!
//! Validation happens once, in [`StateGraphBuilder::build`], and accumulates
//! every problem in the definition instead of stopping at the first one.

use super::error::{GraphError, GraphViolation};
use super::{StateGraph, StateNode, SubGraph, TransitionDef};
use crate::core::{Guard, StatePath};
use std::collections::BTreeMap;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<GraphViolation>>;

/// Definition of a single transition before validation.
///
/// # Example
///
/// ```
/// use keystate::core::Guard;
/// use keystate::graph::TransitionSpec;
///
/// let spec = TransitionSpec::to("checkout")
///     .guard(Guard::signed_in())
///     .effect("reserve_stock");
/// ```
#[derive(Clone, Debug)]
pub struct TransitionSpec {
    target: String,
    guard: Option<Guard>,
    effect: Option<String>,
}

impl TransitionSpec {
    /// Target a sibling state by name, or an absolute path with a `#` prefix.
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            guard: None,
            effect: None,
        }
    }

    /// Add a guard predicate (optional).
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Name the effect handler to run for this transition (optional).
    ///
    /// Without an annotation the dispatcher looks the handler up by event name.
    pub fn effect(mut self, handler: impl Into<String>) -> Self {
        self.effect = Some(handler.into());
        self
    }
}

/// Builder for one state and, for composites, its children.
pub struct StateBuilder {
    name: String,
    transitions: Vec<(String, TransitionSpec)>,
    initial_child: Option<String>,
    children: Vec<StateBuilder>,
}

impl StateBuilder {
    fn new(name: impl Into<String>, initial_child: Option<String>) -> Self {
        Self {
            name: name.into(),
            transitions: Vec::new(),
            initial_child,
            children: Vec::new(),
        }
    }

    /// Plain transition.
    pub fn on(self, event: impl Into<String>, target: impl Into<String>) -> Self {
        self.transition(event, TransitionSpec::to(target))
    }

    /// Transition annotated with an effect handler.
    pub fn on_effect(
        self,
        event: impl Into<String>,
        target: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        self.transition(event, TransitionSpec::to(target).effect(handler))
    }

    /// Transition that is only legal while `guard` accepts the context.
    pub fn on_guarded(self, event: impl Into<String>, target: impl Into<String>, guard: Guard) -> Self {
        self.transition(event, TransitionSpec::to(target).guard(guard))
    }

    pub fn transition(mut self, event: impl Into<String>, spec: TransitionSpec) -> Self {
        self.transitions.push((event.into(), spec));
        self
    }

    /// Add a leaf child. Turns this state into a composite.
    pub fn child<F>(self, name: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(StateBuilder) -> StateBuilder,
    {
        self.push_child(define(StateBuilder::new(name, None)))
    }

    /// Add a composite child with its own nested sub-graph.
    pub fn composite_child<F>(self, name: impl Into<String>, initial: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(StateBuilder) -> StateBuilder,
    {
        self.push_child(define(StateBuilder::new(name, Some(initial.into()))))
    }

    fn push_child(mut self, child: StateBuilder) -> Self {
        self.children.push(child);
        self
    }
}

/// Builder for constructing state graphs with a fluent API.
pub struct StateGraphBuilder {
    initial: String,
    states: Vec<StateBuilder>,
}

impl StateGraphBuilder {
    /// Create a new builder with the root initial state.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            states: Vec::new(),
        }
    }

    /// Add a top-level leaf state.
    pub fn state<F>(mut self, name: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(StateBuilder) -> StateBuilder,
    {
        self.states.push(define(StateBuilder::new(name, None)));
        self
    }

    /// Add a top-level composite state entered through `initial_child`.
    pub fn composite<F>(mut self, name: impl Into<String>, initial_child: impl Into<String>, define: F) -> Self
    where
        F: FnOnce(StateBuilder) -> StateBuilder,
    {
        self.states
            .push(define(StateBuilder::new(name, Some(initial_child.into()))));
        self
    }

    /// Validate the definition and build the graph.
    ///
    /// Returns `GraphError::MalformedGraph` carrying every violation found.
    pub fn build(self) -> Result<StateGraph, GraphError> {
        let mut checks: Vec<Check> = Vec::new();
        let mut pending = Vec::new();

        if self.states.is_empty() {
            checks.push(Validation::fail(GraphViolation::EmptyGraph));
        }

        let root = assemble_scope(
            &StatePath::default(),
            "root",
            self.initial,
            self.states,
            &mut checks,
            &mut pending,
        );

        let mut graph = StateGraph {
            initial: StatePath::default(),
            root,
        };
        graph.initial = graph.enter(StatePath::default().child(graph.root.initial.clone()));

        for (owner, event, spec) in pending {
            match resolve_target(&graph, &owner, &spec.target) {
                Some(target) => {
                    if let Some(node) = node_mut(&mut graph.root, &owner) {
                        node.transitions.insert(
                            event,
                            TransitionDef {
                                raw_target: spec.target,
                                target,
                                guard: spec.guard,
                                effect: spec.effect,
                            },
                        );
                    }
                    checks.push(Validation::success(()));
                }
                None => checks.push(Validation::fail(GraphViolation::UnknownTarget {
                    state: owner.to_string(),
                    event,
                    target: spec.target,
                })),
            }
        }

        match Validation::all_vec(checks) {
            Validation::Success(_) => Ok(graph),
            Validation::Failure(violations) => Err(GraphError::MalformedGraph {
                violations: violations.iter().cloned().collect(),
            }),
        }
    }
}

/// Build one level of the tree, queueing transitions for resolution once
/// every state is known.
fn assemble_scope(
    prefix: &StatePath,
    scope_name: &str,
    initial: String,
    states: Vec<StateBuilder>,
    checks: &mut Vec<Check>,
    pending: &mut Vec<(StatePath, String, TransitionSpec)>,
) -> SubGraph {
    let mut nodes = BTreeMap::new();

    for state in states {
        checks.push(check_name(&state.name));
        let path = prefix.child(state.name.clone());

        let mut events = Vec::new();
        for (event, spec) in state.transitions {
            checks.push(check_name(&event));
            if events.contains(&event) {
                checks.push(Validation::fail(GraphViolation::DuplicateTransition {
                    state: path.to_string(),
                    event,
                }));
                continue;
            }
            events.push(event.clone());
            pending.push((path.clone(), event, spec));
        }

        let children = match state.initial_child {
            Some(child_initial) => Some(assemble_scope(
                &path,
                &path.to_string(),
                child_initial,
                state.children,
                checks,
                pending,
            )),
            None if !state.children.is_empty() => {
                // leaf promoted to composite by `child`: first child is initial
                let first = state.children[0].name.clone();
                Some(assemble_scope(
                    &path,
                    &path.to_string(),
                    first,
                    state.children,
                    checks,
                    pending,
                ))
            }
            None => None,
        };

        if nodes.contains_key(&state.name) {
            checks.push(Validation::fail(GraphViolation::DuplicateState {
                scope: scope_name.to_string(),
                name: state.name,
            }));
            continue;
        }

        nodes.insert(
            state.name.clone(),
            StateNode {
                name: state.name,
                transitions: BTreeMap::new(),
                children,
            },
        );
    }

    // an empty root is already reported as EmptyGraph
    if (!nodes.is_empty() || !prefix.is_root()) && !nodes.contains_key(&initial) {
        checks.push(Validation::fail(GraphViolation::UnknownInitial {
            scope: scope_name.to_string(),
            initial: initial.clone(),
        }));
    }

    SubGraph {
        initial,
        states: nodes,
    }
}

fn check_name(name: &str) -> Check {
    if name.is_empty() || name.contains('.') || name.starts_with('#') {
        Validation::fail(GraphViolation::InvalidName {
            name: name.to_string(),
        })
    } else {
        Validation::success(())
    }
}

/// Resolve a raw target declared on `owner` to the leaf state it enters.
fn resolve_target(graph: &StateGraph, owner: &StatePath, raw: &str) -> Option<StatePath> {
    let path = match raw.strip_prefix('#') {
        Some(absolute) => StatePath::parse(absolute),
        None => {
            let base = owner.parent().unwrap_or_default();
            StatePath::parse(raw)
                .segments()
                .iter()
                .fold(base, |path, segment| path.child(segment.clone()))
        }
    };
    if !graph.contains(&path) {
        return None;
    }
    let leaf = graph.enter(path);
    graph.contains(&leaf).then_some(leaf)
}

fn node_mut<'a>(scope: &'a mut SubGraph, path: &StatePath) -> Option<&'a mut StateNode> {
    let (first, rest) = path.segments().split_first()?;
    let mut node = scope.states.get_mut(first)?;
    for segment in rest {
        node = node.children.as_mut()?.states.get_mut(segment)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionContext;

    #[test]
    fn builder_requires_states() {
        let result = StateGraphBuilder::new("idle").build();

        let err = result.unwrap_err();
        assert!(err.violations().contains(&GraphViolation::EmptyGraph));
    }

    #[test]
    fn builder_rejects_unknown_initial() {
        let result = StateGraphBuilder::new("start")
            .state("idle", |s| s.on("GO", "idle"))
            .build();

        assert!(matches!(
            result.unwrap_err().violations(),
            [GraphViolation::UnknownInitial { initial, .. }] if initial == "start"
        ));
    }

    #[test]
    fn builder_rejects_dangling_targets() {
        let result = StateGraphBuilder::new("idle")
            .state("idle", |s| s.on("GO_HOME", "home"))
            .build();

        let err = result.unwrap_err();
        assert_eq!(
            err.violations(),
            &[GraphViolation::UnknownTarget {
                state: "idle".to_string(),
                event: "GO_HOME".to_string(),
                target: "home".to_string(),
            }]
        );
    }

    #[test]
    fn builder_accumulates_all_violations() {
        let result = StateGraphBuilder::new("missing")
            .state("idle", |s| s.on("A", "nowhere").on("A", "idle"))
            .state("idle", |s| s)
            .state("bad.name", |s| s)
            .build();

        let violations = result.unwrap_err().violations().to_vec();
        assert_eq!(violations.len(), 5);
        assert!(violations
            .iter()
            .any(|v| matches!(v, GraphViolation::UnknownInitial { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, GraphViolation::UnknownTarget { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, GraphViolation::DuplicateState { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, GraphViolation::DuplicateTransition { .. })));
        assert!(violations
            .iter()
            .any(|v| matches!(v, GraphViolation::InvalidName { .. })));
    }

    #[test]
    fn composite_initial_must_exist() {
        let result = StateGraphBuilder::new("manage")
            .composite("manage", "idle", |s| s.child("add", |c| c.on("CANCEL", "add")))
            .build();

        assert!(matches!(
            result.unwrap_err().violations(),
            [GraphViolation::UnknownInitial { scope, initial }]
                if scope == "manage" && initial == "idle"
        ));
    }

    #[test]
    fn composite_without_children_is_rejected() {
        let result = StateGraphBuilder::new("manage")
            .composite("manage", "idle", |s| s)
            .build();

        assert!(matches!(
            result.unwrap_err().violations(),
            [GraphViolation::UnknownInitial { scope, initial }]
                if scope == "manage" && initial == "idle"
        ));
    }

    #[test]
    fn child_targets_do_not_leak_to_root_scope() {
        // `home` exists at the root but not among the children
        let result = StateGraphBuilder::new("home")
            .state("home", |s| s.on("MANAGE", "manage"))
            .composite("manage", "idle", |s| s.child("idle", |c| c.on("EXIT", "home")))
            .build();

        assert!(matches!(
            result.unwrap_err().violations(),
            [GraphViolation::UnknownTarget { target, .. }] if target == "home"
        ));
    }

    #[test]
    fn nested_composites_resolve() {
        let graph = StateGraphBuilder::new("outer")
            .composite("outer", "inner", |s| {
                s.composite_child("inner", "leaf", |c| {
                    c.child("leaf", |l| l.on("UP", "#outer").on("EXIT", "#done"))
                })
            })
            .state("done", |s| s)
            .build()
            .unwrap();

        let ctx = SessionContext::new();
        assert_eq!(graph.initial_path(), StatePath::parse("outer.inner.leaf"));
        assert_eq!(
            graph.target_state(&graph.initial_path(), "UP", &ctx),
            Some(StatePath::parse("outer.inner.leaf"))
        );
        assert_eq!(
            graph.target_state(&graph.initial_path(), "EXIT", &ctx),
            Some(StatePath::parse("done"))
        );
    }

    #[test]
    fn self_transitions_are_permitted() {
        let graph = StateGraphBuilder::new("cart")
            .state("cart", |s| s.on_effect("UPDATE_QUANTITY", "cart", "update_cart_quantity"))
            .build()
            .unwrap();

        let cart = StatePath::parse("cart");
        assert_eq!(
            graph.target_state(&cart, "UPDATE_QUANTITY", &SessionContext::new()),
            Some(cart)
        );
    }
}
