//! Addressing of states inside a (possibly hierarchical) state graph.
//!
//! A state is identified by its path from the graph root. Flat states have a
//! single segment; children of composite states append their own name.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Path of a state from the root of its graph.
///
/// Displayed and serialized with `.` separators, so the child `addGame` of
/// the composite `sellerGameManagement` reads `sellerGameManagement.addGame`.
///
/// # Example
///
/// ```rust
/// use keystate::core::StatePath;
///
/// let path = StatePath::parse("sellerGameManagement.idle");
/// assert_eq!(path.depth(), 2);
/// assert_eq!(path.leaf(), "idle");
/// assert_eq!(path.to_string(), "sellerGameManagement.idle");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    /// Build a path from its segments, outermost first.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a dotted path. Empty segments are dropped.
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.').filter(|s| !s.is_empty()))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Innermost segment, or the empty string for the root.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Path of the enclosing composite state.
    pub fn parent(&self) -> Option<StatePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Path of a direct child of this state.
    pub fn child(&self, name: impl Into<String>) -> StatePath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// Every prefix of this path, innermost first, excluding the root.
    ///
    /// `a.b.c` yields `a.b.c`, `a.b`, `a`.
    pub fn ancestors_inclusive(&self) -> impl Iterator<Item = StatePath> + '_ {
        (1..=self.segments.len()).rev().map(move |len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &StatePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for StatePath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl Serialize for StatePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for StatePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dotted = String::deserialize(deserializer)?;
        Ok(Self::parse(&dotted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let path = StatePath::parse("sellerGameManagement.addGame");
        assert_eq!(path.segments(), &["sellerGameManagement", "addGame"]);
        assert_eq!(path.to_string(), "sellerGameManagement.addGame");
    }

    #[test]
    fn parse_drops_empty_segments() {
        assert_eq!(StatePath::parse(".idle.").segments(), &["idle"]);
        assert!(StatePath::parse("").is_root());
    }

    #[test]
    fn parent_and_child_are_inverse() {
        let path = StatePath::parse("a.b");
        assert_eq!(path.parent(), Some(StatePath::parse("a")));
        assert_eq!(StatePath::parse("a").child("b"), path);
        assert_eq!(StatePath::default().parent(), None);
    }

    #[test]
    fn ancestors_are_innermost_first() {
        let path = StatePath::parse("a.b.c");
        let ancestors: Vec<String> = path.ancestors_inclusive().map(|p| p.to_string()).collect();
        assert_eq!(ancestors, vec!["a.b.c", "a.b", "a"]);
    }

    #[test]
    fn path_serializes_as_dotted_string() {
        let path = StatePath::parse("cart");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"cart\"");
        let back: StatePath = serde_json::from_str("\"x.y\"").unwrap();
        assert_eq!(back, StatePath::parse("x.y"));
    }
}
