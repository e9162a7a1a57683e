use std::io::Write;
use std::path::Path;

use stow_cursor::{Bookmarks, Cursor, LockRegistry};
use stow_types::{
    Context, EntryInfo, EntryKind, LeafKind, LeafValue, NodeId, SessionId, StoreError,
    StoreResult,
};
use tracing::debug;

use crate::config::MarkupConfig;
use crate::document::Document;
use crate::names::validate_name;

/// How an element is read back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shape {
    Array,
    Strings,
    /// Text runs only, blank or empty ones included.
    Text,
    Complex,
}

/// What a name resolves to in the current element.
enum Found {
    Missing,
    Attribute(String),
    Element(NodeId),
    Ambiguous,
}

/// A markup-backend session over a live [`Document`].
///
/// Mutations apply to the document immediately; there is no build phase.
#[derive(Debug)]
pub struct MarkupStore {
    doc: Document,
    cursor: NodeId,
    session: SessionId,
    locks: LockRegistry<NodeId>,
    config: MarkupConfig,
}

impl Default for MarkupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupStore {
    /// Start an empty store with the default vocabulary.
    pub fn new() -> Self {
        Self::with_config(MarkupConfig::default())
    }

    pub fn with_config(config: MarkupConfig) -> Self {
        Self::from_document(Document::new(&config.root), config)
    }

    fn from_document(doc: Document, config: MarkupConfig) -> Self {
        let cursor = doc.root();
        Self {
            doc,
            cursor,
            session: SessionId::generate(),
            locks: LockRegistry::new(),
            config,
        }
    }

    /// Parse a document with the default vocabulary.
    pub fn parse(text: &str) -> StoreResult<Self> {
        Self::parse_with_config(text, MarkupConfig::default())
    }

    pub fn parse_with_config(text: &str, config: MarkupConfig) -> StoreResult<Self> {
        Ok(Self::from_document(Document::parse(text)?, config))
    }

    /// Open a document file.
    pub fn open(path: impl AsRef<Path>, config: MarkupConfig) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = text.len(), "opening markup store");
        Self::parse_with_config(&text, config)
    }

    /// Write the document to `out`.
    pub fn save<W: Write>(&self, out: W) -> StoreResult<()> {
        self.doc.write_to(out, self.config.indent)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let text = self.to_xml_string()?;
        std::fs::write(path.as_ref(), &text)?;
        debug!(path = %path.as_ref().display(), bytes = text.len(), "saved markup store");
        Ok(())
    }

    pub fn to_xml_string(&self) -> StoreResult<String> {
        self.doc.to_xml_string(self.config.indent)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Classification
    // ---------------------------------------------------------------

    fn shape(&self, el: NodeId) -> Shape {
        match self.doc.get_attribute(el, &self.config.type_attribute) {
            Some(marker) if marker == self.config.array_marker => Shape::Array,
            Some(marker) if marker == self.config.strings_marker => Shape::Strings,
            _ if self.holds_text(el) && self.doc.has_text(el) => Shape::Text,
            _ => Shape::Complex,
        }
    }

    /// An element with neither child elements nor attributes can be read
    /// as a string.
    fn holds_text(&self, el: NodeId) -> bool {
        !self.doc.has_child_elements(el) && self.doc.attribute_count(el) == 0
    }

    /// An empty string element can also be entered as an empty complex.
    fn enterable_as(&self, el: NodeId, want: Shape) -> bool {
        let shape = self.shape(el);
        shape == want
            || (want == Shape::Complex
                && shape == Shape::Text
                && self.doc.text_content(el).is_empty())
    }

    fn context_of(&self, el: NodeId) -> Context {
        if self.shape(el) == Shape::Array {
            Context::Array
        } else if self
            .doc
            .parent(el)
            .is_some_and(|parent| self.shape(parent) == Shape::Array)
        {
            Context::ArrayElement
        } else {
            Context::Complex
        }
    }

    fn lookup(&self, name: &str) -> Found {
        let attribute = self.doc.get_attribute(self.cursor, name);
        let element = self.doc.find_child(self.cursor, name);
        match (attribute, element) {
            (None, None) => Found::Missing,
            (Some(text), None) => Found::Attribute(text.to_string()),
            (None, Some(el)) => Found::Element(el),
            (Some(_), Some(_)) => Found::Ambiguous,
        }
    }

    fn items(&self) -> Vec<NodeId> {
        self.doc
            .child_elements(self.cursor)
            .filter(|el| self.doc.node_name(*el) == self.config.item_tag)
            .collect()
    }

    // ---------------------------------------------------------------
    // Checks
    // ---------------------------------------------------------------

    fn require(&self, operation: &'static str, allowed: Context) -> StoreResult<()> {
        let context = self.context();
        if context != allowed {
            return Err(StoreError::WrongContext { operation, context });
        }
        Ok(())
    }

    fn require_fields(&self, operation: &'static str) -> StoreResult<()> {
        let context = self.context();
        if !context.holds_fields() {
            return Err(StoreError::WrongContext { operation, context });
        }
        Ok(())
    }

    /// Scalars become attributes, where the marker attribute name is taken.
    /// Child elements may use it freely.
    fn check_attribute_name(&self, name: &str) -> StoreResult<()> {
        if name == self.config.type_attribute {
            return Err(StoreError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    fn ambiguous(name: &str) -> StoreError {
        StoreError::incompatible(name, "a single entry (found attribute and element)")
    }

    // ---------------------------------------------------------------
    // Mutation helpers
    // ---------------------------------------------------------------

    /// Drop every attribute and child element called `name`.
    fn remove_entry(&mut self, name: &str) {
        self.doc.remove_attribute(self.cursor, name);
        let stale: Vec<NodeId> = self
            .doc
            .child_elements(self.cursor)
            .filter(|el| self.doc.node_name(*el) == name)
            .collect();
        for el in stale {
            self.doc.detach(el);
        }
    }

    fn enter_named(&mut self, name: &str, want: Shape, operation: &'static str) -> StoreResult<()> {
        self.require_fields(operation)?;
        let expected = if want == Shape::Array { "an array" } else { "a complex" };
        match self.lookup(name) {
            Found::Missing => Err(StoreError::not_found(name)),
            Found::Ambiguous => Err(Self::ambiguous(name)),
            Found::Attribute(_) => Err(StoreError::incompatible(name, expected)),
            Found::Element(el) if self.enterable_as(el, want) => {
                self.cursor = el;
                Ok(())
            }
            Found::Element(_) => Err(StoreError::incompatible(name, expected)),
        }
    }

    fn ascend(&mut self) -> StoreResult<()> {
        self.locks.guard_exit(self.cursor)?;
        if let Some(parent) = self.doc.parent(self.cursor) {
            self.cursor = parent;
        }
        Ok(())
    }
}

impl Cursor for MarkupStore {
    fn context(&self) -> Context {
        self.context_of(self.cursor)
    }

    fn enter_complex(&mut self, name: &str) -> StoreResult<()> {
        self.enter_named(name, Shape::Complex, "enter_complex")
    }

    fn enter_array(&mut self, name: &str) -> StoreResult<()> {
        self.enter_named(name, Shape::Array, "enter_array")
    }

    fn enter_array_element(&mut self, index: usize) -> StoreResult<()> {
        self.require("enter_array_element", Context::Array)?;
        let items = self.items();
        self.cursor = *items.get(index).ok_or(StoreError::IndexOutOfBounds {
            index,
            len: items.len(),
        })?;
        Ok(())
    }

    fn exit_complex(&mut self) -> StoreResult<()> {
        self.require("exit_complex", Context::Complex)?;
        if self.cursor == self.doc.root() {
            return Err(StoreError::WrongContext {
                operation: "exit_complex at root",
                context: Context::Complex,
            });
        }
        self.ascend()
    }

    fn exit_array(&mut self) -> StoreResult<()> {
        self.require("exit_array", Context::Array)?;
        self.ascend()
    }

    fn exit_array_element(&mut self) -> StoreResult<()> {
        self.require("exit_array_element", Context::ArrayElement)?;
        self.ascend()
    }

    fn array_length(&self) -> StoreResult<usize> {
        self.require("array_length", Context::Array)?;
        Ok(self.items().len())
    }

    fn create_complex(&mut self, name: &str) -> StoreResult<()> {
        self.require_fields("create_complex")?;
        validate_name(name)?;
        self.remove_entry(name);
        self.cursor = self.doc.append_element(self.cursor, name);
        Ok(())
    }

    fn create_array(&mut self, name: &str) -> StoreResult<()> {
        self.require_fields("create_array")?;
        validate_name(name)?;
        self.remove_entry(name);
        let el = self.doc.append_element(self.cursor, name);
        self.doc
            .set_attribute(el, &self.config.type_attribute, &self.config.array_marker);
        self.cursor = el;
        Ok(())
    }

    fn create_array_element(&mut self) -> StoreResult<()> {
        self.require("create_array_element", Context::Array)?;
        self.cursor = self.doc.append_element(self.cursor, &self.config.item_tag);
        Ok(())
    }

    fn read_leaf(&self, name: &str, kind: LeafKind) -> StoreResult<LeafValue> {
        self.require_fields("read")?;
        if !matches!(kind, LeafKind::String | LeafKind::StringArray) {
            self.check_attribute_name(name)?;
        }
        let incompatible = || StoreError::incompatible(name, kind.description());
        match self.lookup(name) {
            Found::Missing => Err(StoreError::not_found(name)),
            Found::Ambiguous => Err(Self::ambiguous(name)),
            Found::Attribute(text) => LeafValue::parse_text(kind, &text).ok_or_else(incompatible),
            Found::Element(el) => match kind {
                LeafKind::String if self.holds_text(el) => {
                    Ok(LeafValue::String(self.doc.text_content(el)))
                }
                LeafKind::StringArray if self.shape(el) == Shape::Strings => {
                    let items = self
                        .doc
                        .child_elements(el)
                        .filter(|entry| self.doc.node_name(*entry) == self.config.entry_tag)
                        .map(|entry| self.doc.text_content(entry))
                        .collect();
                    Ok(LeafValue::StringArray(items))
                }
                _ => Err(incompatible()),
            },
        }
    }

    fn write_leaf(&mut self, name: &str, value: LeafValue) -> StoreResult<()> {
        self.require_fields("write")?;
        if !matches!(value, LeafValue::String(_) | LeafValue::StringArray(_)) {
            self.check_attribute_name(name)?;
        }
        validate_name(name)?;
        self.remove_entry(name);
        match value {
            LeafValue::String(text) => {
                let el = self.doc.append_element(self.cursor, name);
                self.doc.append_text(el, &text);
            }
            LeafValue::StringArray(items) => {
                let el = self.doc.append_element(self.cursor, name);
                self.doc
                    .set_attribute(el, &self.config.type_attribute, &self.config.strings_marker);
                for item in &items {
                    let entry = self.doc.append_element(el, &self.config.entry_tag);
                    self.doc.append_text(entry, item);
                }
            }
            scalar => {
                let text = scalar.to_text().unwrap_or_default();
                self.doc.set_attribute(self.cursor, name, &text);
            }
        }
        Ok(())
    }

    fn entries(&self) -> StoreResult<Vec<EntryInfo>> {
        self.require_fields("entries")?;
        let mut entries: Vec<EntryInfo> = self
            .doc
            .attributes(self.cursor)
            .filter(|(key, _)| *key != self.config.type_attribute)
            .map(|(key, _)| EntryInfo::new(key, EntryKind::Text))
            .collect();
        entries.extend(self.doc.child_elements(self.cursor).map(|el| {
            let kind = match self.shape(el) {
                Shape::Array => EntryKind::Array,
                Shape::Strings => EntryKind::Leaf(LeafKind::StringArray),
                Shape::Text => EntryKind::Leaf(LeafKind::String),
                Shape::Complex => EntryKind::Complex,
            };
            EntryInfo::new(self.doc.node_name(el), kind)
        }));
        Ok(entries)
    }
}

impl Bookmarks for MarkupStore {
    type Node = NodeId;

    fn session_id(&self) -> SessionId {
        self.session
    }

    fn root_node(&self) -> NodeId {
        self.doc.root()
    }

    fn current_node(&self) -> NodeId {
        self.cursor
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        if self.doc.contains(node) {
            self.doc.parent(node)
        } else {
            None
        }
    }

    fn move_to(&mut self, node: NodeId) {
        self.cursor = node;
    }

    fn locks(&self) -> &LockRegistry<NodeId> {
        &self.locks
    }

    fn locks_mut(&mut self) -> &mut LockRegistry<NodeId> {
        &mut self.locks
    }
}
