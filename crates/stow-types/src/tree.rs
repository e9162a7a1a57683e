//! Arena-backed explicit tree of complex and array nodes.
//!
//! [`Tree`] is the node model realized as plain data: complex nodes are
//! insertion-ordered maps from name to entry, array nodes are ordered lists
//! of element complexes. Nodes are never freed; replacing an entry detaches
//! the old subtree by clearing its parent link, which is how stale handles
//! are recognized.
//!
//! # Invariants
//!
//! - Node 0 is the root complex and has no parent.
//! - Every direct child of an array is a complex.
//! - A name in a complex resolves to exactly one leaf, complex, or array.

use indexmap::IndexMap;

use crate::error::{StoreError, StoreResult};
use crate::node::{Context, EntryInfo, EntryKind, NodeId};
use crate::value::{LeafKind, LeafValue};

/// What a name in a complex node resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    Leaf(LeafValue),
    Node(NodeId),
}

#[derive(Clone, Debug)]
enum Body {
    Complex(IndexMap<String, Entry>),
    Array(Vec<NodeId>),
}

#[derive(Clone, Debug)]
struct TreeNode {
    parent: Option<NodeId>,
    body: Body,
}

/// The explicit node-model tree.
#[derive(Clone, Debug)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Create a tree holding only an empty root complex.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode {
                parent: None,
                body: Body::Complex(IndexMap::new()),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of arena slots, including detached nodes.
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.index()]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn is_array(&self, id: NodeId) -> bool {
        matches!(self.node(id).body, Body::Array(_))
    }

    /// The traversal context a cursor on `id` would be in.
    pub fn context(&self, id: NodeId) -> Context {
        if self.is_array(id) {
            Context::Array
        } else if self.parent(id).is_some_and(|p| self.is_array(p)) {
            Context::ArrayElement
        } else {
            Context::Complex
        }
    }

    /// Whether `id` is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == self.root()
    }

    fn fields(&self, id: NodeId, operation: &'static str) -> StoreResult<&IndexMap<String, Entry>> {
        match &self.node(id).body {
            Body::Complex(fields) => Ok(fields),
            Body::Array(_) => Err(StoreError::WrongContext {
                operation,
                context: Context::Array,
            }),
        }
    }

    fn elements_of(&self, id: NodeId, operation: &'static str) -> StoreResult<&Vec<NodeId>> {
        match &self.node(id).body {
            Body::Array(elements) => Ok(elements),
            Body::Complex(_) => Err(StoreError::WrongContext {
                operation,
                context: self.context(id),
            }),
        }
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Raw entry lookup in a complex node.
    pub fn get(&self, id: NodeId, name: &str) -> Option<&Entry> {
        match &self.node(id).body {
            Body::Complex(fields) => fields.get(name),
            Body::Array(_) => None,
        }
    }

    /// Resolve a named child complex (`want_array == false`) or array.
    pub fn child(&self, id: NodeId, name: &str, want_array: bool) -> StoreResult<NodeId> {
        let operation = if want_array { "enter_array" } else { "enter_complex" };
        let expected = if want_array { "an array" } else { "a complex" };
        match self.fields(id, operation)?.get(name) {
            None => Err(StoreError::not_found(name)),
            Some(Entry::Leaf(_)) => Err(StoreError::incompatible(name, expected)),
            Some(Entry::Node(child)) if self.is_array(*child) == want_array => Ok(*child),
            Some(Entry::Node(_)) => Err(StoreError::incompatible(name, expected)),
        }
    }

    /// Read a leaf of exactly `kind`.
    pub fn leaf(&self, id: NodeId, name: &str, kind: LeafKind) -> StoreResult<&LeafValue> {
        match self.fields(id, "read")?.get(name) {
            None => Err(StoreError::not_found(name)),
            Some(Entry::Leaf(value)) if value.kind() == kind => Ok(value),
            Some(_) => Err(StoreError::incompatible(name, kind.description())),
        }
    }

    /// Element `index` of an array node.
    pub fn element(&self, id: NodeId, index: usize) -> StoreResult<NodeId> {
        let elements = self.elements_of(id, "enter_array_element")?;
        elements
            .get(index)
            .copied()
            .ok_or(StoreError::IndexOutOfBounds {
                index,
                len: elements.len(),
            })
    }

    /// Number of elements in an array node.
    pub fn array_len(&self, id: NodeId) -> StoreResult<usize> {
        Ok(self.elements_of(id, "array_length")?.len())
    }

    /// Element ids of an array node, in order.
    pub fn elements(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).body {
            Body::Array(elements) => elements,
            Body::Complex(_) => &[],
        }
    }

    /// Named entries of a complex node, in insertion order.
    pub fn fields_iter(&self, id: NodeId) -> impl Iterator<Item = (&str, &Entry)> {
        let fields = match &self.node(id).body {
            Body::Complex(fields) => Some(fields),
            Body::Array(_) => None,
        };
        fields
            .into_iter()
            .flat_map(|f| f.iter().map(|(name, entry)| (name.as_str(), entry)))
    }

    /// Entry listing of a complex node.
    pub fn entries(&self, id: NodeId) -> StoreResult<Vec<EntryInfo>> {
        let fields = self.fields(id, "entries")?;
        Ok(fields
            .iter()
            .map(|(name, entry)| {
                let kind = match entry {
                    Entry::Leaf(value) => EntryKind::Leaf(value.kind()),
                    Entry::Node(child) if self.is_array(*child) => EntryKind::Array,
                    Entry::Node(_) => EntryKind::Complex,
                };
                EntryInfo::new(name.clone(), kind)
            })
            .collect())
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    fn alloc(&mut self, parent: NodeId, body: Body) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(TreeNode {
            parent: Some(parent),
            body,
        });
        id
    }

    fn insert(&mut self, id: NodeId, name: &str, entry: Entry, operation: &'static str) -> StoreResult<()> {
        let context = self.context(id);
        let previous = match &mut self.node_mut(id).body {
            Body::Complex(fields) => fields.insert(name.to_string(), entry),
            Body::Array(_) => {
                return Err(StoreError::WrongContext { operation, context });
            }
        };
        if let Some(Entry::Node(old)) = previous {
            self.node_mut(old).parent = None;
        }
        Ok(())
    }

    /// Store a leaf, replacing any prior entry of the same name.
    pub fn set_leaf(&mut self, id: NodeId, name: &str, value: LeafValue) -> StoreResult<()> {
        self.insert(id, name, Entry::Leaf(value), "write")
    }

    /// Create an empty complex under `name`, replacing any prior entry.
    pub fn add_complex(&mut self, id: NodeId, name: &str) -> StoreResult<NodeId> {
        self.fields(id, "create_complex")?;
        let child = self.alloc(id, Body::Complex(IndexMap::new()));
        self.insert(id, name, Entry::Node(child), "create_complex")?;
        Ok(child)
    }

    /// Create an empty array under `name`, replacing any prior entry.
    pub fn add_array(&mut self, id: NodeId, name: &str) -> StoreResult<NodeId> {
        self.fields(id, "create_array")?;
        let child = self.alloc(id, Body::Array(Vec::new()));
        self.insert(id, name, Entry::Node(child), "create_array")?;
        Ok(child)
    }

    /// Append a new element complex to an array.
    pub fn push_element(&mut self, id: NodeId) -> StoreResult<NodeId> {
        self.elements_of(id, "create_array_element")?;
        let child = self.alloc(id, Body::Complex(IndexMap::new()));
        if let Body::Array(elements) = &mut self.node_mut(id).body {
            elements.push(child);
        }
        Ok(child)
    }
}
