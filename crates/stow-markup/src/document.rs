//! Arena-backed mutable XML document.
//!
//! Elements and text runs live in one vector and refer to each other by
//! [`NodeId`]. Removing an element from its parent only unlinks it; the
//! slot stays allocated with no parent, which is how callers holding an
//! old id can tell it has been detached.

use std::io::Write;

use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use stow_types::{NodeId, StoreError, StoreResult};
use tracing::debug;

#[derive(Clone, Debug)]
enum NodeData {
    Element {
        name: String,
        attributes: IndexMap<String, String>,
        children: Vec<NodeId>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct XmlNode {
    parent: Option<NodeId>,
    data: NodeData,
}

/// A mutable XML document with a single document element at [`NodeId::ROOT`].
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<XmlNode>,
}

fn markup_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Markup(err.to_string())
}

fn utf8(raw: &[u8]) -> StoreResult<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(markup_err)
}

impl Document {
    /// Create a document holding only an empty document element.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![XmlNode {
                parent: None,
                data: NodeData::Element {
                    name: root_name.to_string(),
                    attributes: IndexMap::new(),
                    children: Vec::new(),
                },
            }],
        }
    }

    /// Parse a document. Text is kept exactly as written; comments,
    /// processing instructions and the declaration are dropped. An element
    /// written as `<a></a>` holds an empty text run, unlike `<a/>`.
    pub fn parse(text: &str) -> StoreResult<Self> {
        let mut reader = Reader::from_str(text);
        let mut doc: Option<Document> = None;
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event().map_err(markup_err)? {
                Event::Start(e) => {
                    let id = doc_open(&mut doc, &stack, &e)?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    doc_open(&mut doc, &stack, &e)?;
                }
                Event::End(_) => {
                    if let (Some(doc), Some(id)) = (doc.as_mut(), stack.pop()) {
                        if doc.children(id).is_empty() {
                            doc.append_text(id, "");
                        }
                    }
                }
                Event::Text(t) => {
                    if let (Some(doc), Some(&parent)) = (doc.as_mut(), stack.last()) {
                        let text = t.unescape().map_err(markup_err)?;
                        doc.append_text(parent, &text);
                    }
                }
                Event::CData(c) => {
                    if let (Some(doc), Some(&parent)) = (doc.as_mut(), stack.last()) {
                        let text = utf8(&c.into_inner())?;
                        doc.append_text(parent, &text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let doc = doc.ok_or_else(|| StoreError::Markup("document has no root element".into()))?;
        debug!(nodes = doc.nodes.len(), "parsed markup document");
        Ok(doc)
    }

    /// Serialize with an XML declaration and `indent` spaces per level.
    ///
    /// Whitespace-only text inside elements that also hold child elements
    /// is formatting and is replaced by the writer's own indentation.
    pub fn write_to<W: Write>(&self, out: W, indent: usize) -> StoreResult<()> {
        let mut writer = if indent == 0 {
            Writer::new(out)
        } else {
            Writer::new_with_indent(out, b' ', indent)
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(markup_err)?;
        self.write_element(&mut writer, self.root())?;
        writer.into_inner().flush()?;
        Ok(())
    }

    /// Serialize to a string.
    pub fn to_xml_string(&self, indent: usize) -> StoreResult<String> {
        let mut out = Vec::new();
        self.write_to(&mut out, indent)?;
        utf8(&out)
    }

    fn write_element<W: Write>(&self, writer: &mut Writer<W>, id: NodeId) -> StoreResult<()> {
        let NodeData::Element {
            name,
            attributes,
            children,
        } = &self.node(id).data
        else {
            return Ok(());
        };
        let mut start = BytesStart::new(name.as_str());
        for (key, value) in attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        let structural = self.has_child_elements(id);
        let children: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|child| match &self.node(*child).data {
                NodeData::Text(text) => !(structural && text.trim().is_empty()),
                NodeData::Element { .. } => true,
            })
            .collect();

        if children.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(markup_err)?;
            return Ok(());
        }
        writer.write_event(Event::Start(start)).map_err(markup_err)?;
        for child in children {
            match &self.node(child).data {
                NodeData::Text(text) => {
                    writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .map_err(markup_err)?;
                }
                NodeData::Element { .. } => self.write_element(writer, child)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(markup_err)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn node(&self, id: NodeId) -> &XmlNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut XmlNode {
        &mut self.nodes[id.index()]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).data, NodeData::Element { .. })
    }

    /// Tag name of an element; empty for text nodes.
    pub fn node_name(&self, id: NodeId) -> &str {
        match &self.node(id).data {
            NodeData::Element { name, .. } => name,
            NodeData::Text(_) => "",
        }
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).data {
            NodeData::Element { children, .. } => children,
            NodeData::Text(_) => &[],
        }
    }

    /// Child elements of `id` in document order.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    /// First child element named `name`.
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.child_elements(id)
            .find(|child| self.node_name(*child) == name)
    }

    pub fn has_child_elements(&self, id: NodeId) -> bool {
        self.child_elements(id).next().is_some()
    }

    /// Whether `id` holds at least one text run, empty ones included.
    pub fn has_text(&self, id: NodeId) -> bool {
        self.children(id)
            .iter()
            .any(|child| matches!(self.node(*child).data, NodeData::Text(_)))
    }

    /// Concatenated text of the direct text children of `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.children(id)
            .iter()
            .filter_map(|child| match &self.node(*child).data {
                NodeData::Text(text) => Some(text.as_str()),
                NodeData::Element { .. } => None,
            })
            .collect()
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.node(id).data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    /// Attributes of `id` in document order.
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        let attributes = match &self.node(id).data {
            NodeData::Element { attributes, .. } => Some(attributes),
            NodeData::Text(_) => None,
        };
        attributes
            .into_iter()
            .flat_map(|a| a.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn attribute_count(&self, id: NodeId) -> usize {
        self.attributes(id).count()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    fn alloc(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(XmlNode {
            parent: Some(parent),
            data,
        });
        if let NodeData::Element { children, .. } = &mut self.node_mut(parent).data {
            children.push(id);
        }
        id
    }

    /// Append an empty child element.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        self.alloc(
            parent,
            NodeData::Element {
                name: name.to_string(),
                attributes: IndexMap::new(),
                children: Vec::new(),
            },
        )
    }

    /// Append a text run. An empty run still marks the element as text, so
    /// it serializes as `<a></a>` rather than `<a/>`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        self.alloc(parent, NodeData::Text(text.to_string()));
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &mut self.node_mut(id).data {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        match &mut self.node_mut(id).data {
            NodeData::Element { attributes, .. } => attributes.shift_remove(name),
            NodeData::Text(_) => None,
        }
    }

    /// Unlink `id` from its parent. Its subtree stays intact but unreachable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };
        if let NodeData::Element { children, .. } = &mut self.node_mut(parent).data {
            children.retain(|child| *child != id);
        }
        self.node_mut(id).parent = None;
    }
}

/// Open an element from a start tag, creating the document on the first one.
fn doc_open(doc: &mut Option<Document>, stack: &[NodeId], e: &BytesStart<'_>) -> StoreResult<NodeId> {
    let name = utf8(e.name().as_ref())?;
    let id = if let Some(doc) = doc.as_mut() {
        let Some(&parent) = stack.last() else {
            return Err(StoreError::Markup(format!("second root element <{name}>")));
        };
        doc.append_element(parent, &name)
    } else {
        *doc = Some(Document::new(&name));
        NodeId::ROOT
    };
    let Some(doc) = doc.as_mut() else {
        return Ok(id);
    };
    for attr in e.attributes() {
        let attr = attr.map_err(markup_err)?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr.unescape_value().map_err(markup_err)?;
        doc.set_attribute(id, &key, &value);
    }
    Ok(id)
}
