//! Declarative state graphs.
//!
//! A [`StateGraph`] is pure data: the states of a machine, the events each
//! state accepts, and where those events lead. Graphs may be hierarchical. A
//! composite state owns a nested sub-graph with its own initial child, and
//! events its active child does not handle are delegated to the composite
//! itself.
//!
//! Graphs are only obtainable through [`StateGraphBuilder`], which rejects
//! definitions that reference undefined states.
//!
//! # Example
//!
//! ```rust
//! use keystate::core::{SessionContext, StatePath};
//! use keystate::graph::StateGraph;
//!
//! let graph = StateGraph::builder("idle")
//!     .state("idle", |s| s.on("GO_HOME", "home"))
//!     .state("home", |s| s.on("GO_HOME", "home").on("LOGOUT", "idle"))
//!     .build()
//!     .unwrap();
//!
//! let ctx = SessionContext::new();
//! let idle = graph.initial_path();
//! assert_eq!(graph.target_state(&idle, "GO_HOME", &ctx), Some(StatePath::parse("home")));
//! assert_eq!(graph.target_state(&idle, "LOGOUT", &ctx), None);
//! ```

mod builder;
mod error;

pub use builder::{StateBuilder, StateGraphBuilder, TransitionSpec};
pub use error::{GraphError, GraphViolation};

use crate::core::{Guard, SessionContext, StatePath};
use std::collections::{BTreeMap, BTreeSet};

/// A validated transition out of a state.
#[derive(Clone, Debug)]
pub struct TransitionDef {
    raw_target: String,
    target: StatePath,
    guard: Option<Guard>,
    effect: Option<String>,
}

impl TransitionDef {
    /// Fully resolved leaf state this transition enters.
    pub fn target(&self) -> &StatePath {
        &self.target
    }

    /// Target exactly as written in the definition.
    pub fn raw_target(&self) -> &str {
        &self.raw_target
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    /// Name of the effect handler annotated on this transition.
    pub fn effect(&self) -> Option<&str> {
        self.effect.as_deref()
    }

    pub fn allows(&self, context: &SessionContext) -> bool {
        self.guard.as_ref().is_none_or(|g| g.check(context))
    }
}

/// One state of a graph. Composite states carry a nested sub-graph.
#[derive(Clone, Debug)]
pub struct StateNode {
    name: String,
    transitions: BTreeMap<String, TransitionDef>,
    children: Option<SubGraph>,
}

impl StateNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_composite(&self) -> bool {
        self.children.is_some()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (&str, &TransitionDef)> {
        self.transitions.iter().map(|(e, d)| (e.as_str(), d))
    }
}

#[derive(Clone, Debug)]
struct SubGraph {
    initial: String,
    states: BTreeMap<String, StateNode>,
}

/// Static definition of states and their legal transitions.
#[derive(Clone, Debug)]
pub struct StateGraph {
    root: SubGraph,
    initial: StatePath,
}

impl StateGraph {
    /// Start building a graph whose root initial state is `initial`.
    pub fn builder(initial: impl Into<String>) -> StateGraphBuilder {
        StateGraphBuilder::new(initial)
    }

    /// Leaf state a fresh machine starts in.
    pub fn initial_path(&self) -> StatePath {
        self.initial.clone()
    }

    /// Look up a state node by path.
    pub fn node(&self, path: &StatePath) -> Option<&StateNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.states.get(first)?;
        for segment in rest {
            node = node.children.as_ref()?.states.get(segment)?;
        }
        Some(node)
    }

    pub fn contains(&self, path: &StatePath) -> bool {
        !path.is_root() && self.node(path).is_some()
    }

    /// Every state path in the graph, composites included, in sorted order.
    pub fn paths(&self) -> Vec<StatePath> {
        let mut out = Vec::new();
        collect_paths(&self.root, &StatePath::default(), &mut out);
        out
    }

    /// Transition definition that handles `event` in `current`.
    ///
    /// The innermost state is consulted first, then each enclosing composite.
    /// Guards are not evaluated here.
    pub fn lookup(&self, current: &StatePath, event: &str) -> Option<&TransitionDef> {
        current
            .ancestors_inclusive()
            .filter_map(|path| self.node(&path))
            .find_map(|node| node.transitions.get(event))
    }

    /// Target of `event` from `current`, or `None` when the event is illegal.
    pub fn target_state(
        &self,
        current: &StatePath,
        event: &str,
        context: &SessionContext,
    ) -> Option<StatePath> {
        self.lookup(current, event)
            .filter(|def| def.allows(context))
            .map(|def| def.target.clone())
    }

    /// Sorted set of events currently legal from `current`.
    pub fn legal_transitions(&self, current: &StatePath, context: &SessionContext) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut legal = BTreeSet::new();
        for path in current.ancestors_inclusive() {
            let Some(node) = self.node(&path) else {
                continue;
            };
            for (event, def) in &node.transitions {
                // an inner definition shadows the outer one, guard included
                if seen.insert(event.as_str()) && def.allows(context) {
                    legal.insert(event.clone());
                }
            }
        }
        legal.into_iter().collect()
    }

    /// A terminal state has no outgoing transitions at any level.
    pub fn is_terminal(&self, current: &StatePath) -> bool {
        current
            .ancestors_inclusive()
            .filter_map(|path| self.node(&path))
            .all(|node| node.transitions.is_empty())
    }

    /// Descend from `path` into initial children until a leaf is reached.
    fn enter(&self, path: StatePath) -> StatePath {
        let mut path = path;
        while let Some(children) = self.node(&path).and_then(|n| n.children.as_ref()) {
            path = path.child(children.initial.clone());
        }
        path
    }
}

fn collect_paths(scope: &SubGraph, prefix: &StatePath, out: &mut Vec<StatePath>) {
    for (name, node) in &scope.states {
        let path = prefix.child(name.clone());
        out.push(path.clone());
        if let Some(children) = &node.children {
            collect_paths(children, &path, out);
        }
    }
}
