use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::LeafKind;

/// Compact node identifier (index into a backend's arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// The arena index of the session root.
    pub const ROOT: NodeId = NodeId(0);

    /// Wrap a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node the cursor currently references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Context {
    /// A named-field map that is not a direct child of an array.
    Complex,
    /// An ordered sequence of element complexes.
    Array,
    /// A complex that is a direct child of an array.
    ArrayElement,
}

impl Context {
    /// Whether leaves and named children may be read or written here.
    pub fn holds_fields(self) -> bool {
        !matches!(self, Self::Array)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complex => write!(f, "complex"),
            Self::Array => write!(f, "array"),
            Self::ArrayElement => write!(f, "array-element"),
        }
    }
}

/// What a named entry of a complex node holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A typed leaf.
    Leaf(LeafKind),
    /// Untyped text whose kind is decided by the reader (markup attributes).
    Text,
    /// A nested complex node.
    Complex,
    /// A nested array node.
    Array,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(kind) => write!(f, "{kind}"),
            Self::Text => write!(f, "text"),
            Self::Complex => write!(f, "complex"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// One named entry of a complex node, in document order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub kind: EntryKind,
}

impl EntryInfo {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
