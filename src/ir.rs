use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a sequence: a number or a text label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Element {
    Number(f64),
    Label(String),
}

impl Element {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{}", format_number(*value)),
            Self::Label(text) => f.write_str(text),
        }
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

/// Integral values print without a fractional part (`3`, not `3.0`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub value: Element,
    pub left: Option<Box<TreeNode>>,
    pub right: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn leaf(value: impl Into<Element>) -> Self {
        Self {
            value: value.into(),
            left: None,
            right: None,
        }
    }

    pub fn with_children(
        value: impl Into<Element>,
        left: Option<TreeNode>,
        right: Option<TreeNode>,
    ) -> Self {
        Self {
            value: value.into(),
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }
}

/// Graph node identity. An integer and a string with the same text are
/// different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Label(String),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Label(text) => f.write_str(text),
        }
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for NodeId {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

/// Node identifier to ordered neighbour identifiers, in insertion order.
/// Neighbours need not be keys themselves.
pub type Adjacency = IndexMap<NodeId, Vec<NodeId>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Element::Number(3.0).to_string(), "3");
        assert_eq!(Element::Number(-2.5).to_string(), "-2.5");
        assert_eq!(Element::from("top").to_string(), "top");
    }

    #[test]
    fn node_ids_of_different_types_stay_distinct() {
        let mut adj = Adjacency::new();
        adj.insert(NodeId::from(1), vec![NodeId::from("1")]);
        adj.insert(NodeId::from("1"), vec![]);
        assert_eq!(adj.len(), 2);
        assert_ne!(NodeId::from(1), NodeId::from("1"));
        assert_eq!(NodeId::from(1).to_string(), NodeId::from("1").to_string());
    }
}
