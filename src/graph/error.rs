//! Construction errors for state graphs.

use thiserror::Error;

/// A single problem found while validating a graph definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphViolation {
    #[error("graph defines no states")]
    EmptyGraph,

    #[error("initial state '{initial}' is not defined in '{scope}'")]
    UnknownInitial { scope: String, initial: String },

    #[error("transition '{event}' from '{state}' targets undefined state '{target}'")]
    UnknownTarget {
        state: String,
        event: String,
        target: String,
    },

    #[error("state '{name}' is defined twice in '{scope}'")]
    DuplicateState { scope: String, name: String },

    #[error("state '{state}' defines event '{event}' more than once")]
    DuplicateTransition { state: String, event: String },

    #[error("'{name}' is not a valid state or event name")]
    InvalidName { name: String },
}

/// Errors that can occur when building a state graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("malformed state graph: {}", join_violations(.violations))]
    MalformedGraph { violations: Vec<GraphViolation> },
}

impl GraphError {
    pub fn violations(&self) -> &[GraphViolation] {
        match self {
            Self::MalformedGraph { violations } => violations,
        }
    }
}

fn join_violations(violations: &[GraphViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
