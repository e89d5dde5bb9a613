//! In-memory document tree.
//!
//! An arena of nodes behind a shared lock, so test code and a pending
//! `find_by*` future can hold the same [`Document`]. Every mutation made
//! through a [`Node`] handle is published as a [`MutationRecord`] to
//! [`MutationObserver`]s.
//!
//! # Example
//!
//! ```
//! use probar_dom::Document;
//!
//! let doc = Document::parse("<button data-testid=\"go\">Go</button>");
//! let button = doc.body().query_selector("button").unwrap().unwrap();
//! assert_eq!(button.text_content(), "Go");
//! ```

mod observer;
mod parser;
mod selector;

pub use observer::{MutationKind, MutationObserver, MutationObserverInit, MutationRecord};
pub use selector::Selector;

pub(crate) use parser::escape_attr;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::result::{QueryError, QueryResult};

/// Capacity of the per-document mutation channel
const MUTATION_CHANNEL_CAPACITY: usize = 256;

/// Void elements never take children
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Index of a node inside its document arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The document root
    pub const ROOT: Self = Self(0);

    /// Arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The document root
    Document,
    /// An element
    Element,
    /// A text node
    Text,
    /// A comment
    Comment,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub(crate) tag_name: String,
    pub(crate) attrs: Vec<(String, String)>,
    /// Live value of a form control, once set through [`Node::set_value`]
    pub(crate) value: Option<String>,
}

impl ElementData {
    pub(crate) fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: None,
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn set_attr(&mut self, name: &str, value: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| *key == name) {
            return Some(std::mem::replace(&mut slot.1, value.to_string()));
        }
        self.attrs.push((name, value.to_string()));
        None
    }

    pub(crate) fn remove_attr(&mut self, name: &str) -> Option<String> {
        let position = self
            .attrs
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(position).1)
    }

    pub(crate) fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub(crate) fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag_name.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeEntry {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) data: NodeData,
}

/// Arena storage for one document
#[derive(Debug)]
pub(crate) struct Tree {
    nodes: Vec<NodeEntry>,
}

impl Tree {
    fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
        }
    }

    pub(crate) fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeEntry {
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub(crate) fn entry(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.0]
    }

    pub(crate) fn kind(&self, id: NodeId) -> NodeKind {
        match self.nodes[id.0].data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
        }
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    pub(crate) fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub(crate) fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub(crate) fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id.0].data {
            NodeData::Text(text) | NodeData::Comment(text) => text.clone(),
            NodeData::Document | NodeData::Element(_) => {
                let mut out = String::new();
                self.collect_text(id, &mut out);
                out
            }
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for child in &self.nodes[id.0].children {
            match &self.nodes[child.0].data {
                NodeData::Text(text) => out.push_str(text),
                NodeData::Element(_) => self.collect_text(*child, out),
                NodeData::Document | NodeData::Comment(_) => {}
            }
        }
    }

    /// Text of the direct text children only; submit-like inputs report their value
    pub(crate) fn node_text(&self, id: NodeId) -> String {
        if let Some(element) = self.element(id) {
            if element.tag_name == "input" {
                let kind = element.attr("type").unwrap_or("").to_ascii_lowercase();
                if matches!(kind.as_str(), "submit" | "button" | "reset") {
                    return self.form_value(id).unwrap_or_default();
                }
            }
        }
        self.nodes[id.0]
            .children
            .iter()
            .filter_map(|child| match &self.nodes[child.0].data {
                NodeData::Text(text) if !text.is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Element descendants of `id` in tree order, excluding `id`
    pub(crate) fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if self.element(current).is_some() {
                out.push(current);
            }
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors
    pub(crate) fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn is_connected(&self, id: NodeId) -> bool {
        self.contains(NodeId::ROOT, id)
    }

    pub(crate) fn first_element_by_tag(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        self.descendant_elements(from)
            .into_iter()
            .find(|id| self.tag_name(*id) == Some(tag))
    }

    pub(crate) fn element_by_id(&self, value: &str) -> Option<NodeId> {
        if value.is_empty() {
            return None;
        }
        self.descendant_elements(NodeId::ROOT)
            .into_iter()
            .find(|id| self.attr(*id, "id") == Some(value))
    }

    /// Current value of a form control (input, textarea, select, button, option)
    pub(crate) fn form_value(&self, id: NodeId) -> Option<String> {
        let element = self.element(id)?;
        match element.tag_name.as_str() {
            "input" | "button" | "option" | "textarea" | "select" => {}
            _ => return None,
        }
        if let Some(value) = &element.value {
            return Some(value.clone());
        }
        match element.tag_name.as_str() {
            "textarea" => Some(self.text_content(id)),
            "select" => Some(
                self.selected_options(id)
                    .first()
                    .and_then(|option| self.form_value(*option))
                    .unwrap_or_default(),
            ),
            "option" => Some(
                element
                    .attr("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| self.text_content(id)),
            ),
            _ => Some(element.attr("value").unwrap_or("").to_string()),
        }
    }

    /// Selected `<option>` elements of a `<select>`
    pub(crate) fn selected_options(&self, select: NodeId) -> Vec<NodeId> {
        let options: Vec<NodeId> = self
            .descendant_elements(select)
            .into_iter()
            .filter(|id| self.tag_name(*id) == Some("option"))
            .collect();
        let selected: Vec<NodeId> = options
            .iter()
            .copied()
            .filter(|id| self.attr(*id, "selected").is_some())
            .collect();
        let multiple = self.attr(select, "multiple").is_some();
        if selected.is_empty() && !multiple {
            return options.into_iter().take(1).collect();
        }
        if multiple {
            selected
        } else {
            selected.into_iter().take(1).collect()
        }
    }

    fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[id.0].parent.take()?;
        self.nodes[parent.0].children.retain(|child| *child != id);
        Some(parent)
    }

    /// Insert `child` under `parent` before `before` (or at the end)
    pub(crate) fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> QueryResult<Vec<MutationRecord>> {
        if matches!(self.kind(parent), NodeKind::Text | NodeKind::Comment) {
            return Err(QueryError::hierarchy(format!(
                "{parent} cannot have children"
            )));
        }
        if self.contains(child, parent) {
            return Err(QueryError::hierarchy(format!(
                "{child} is an ancestor of {parent}"
            )));
        }
        if let Some(reference) = before {
            if self.parent(reference) != Some(parent) {
                return Err(QueryError::hierarchy(format!(
                    "{reference} is not a child of {parent}"
                )));
            }
        }

        let mut records = Vec::new();
        if let Some(old_parent) = self.detach(child) {
            records.push(MutationRecord::child_list(old_parent, Vec::new(), vec![child]));
        }
        let children = &mut self.nodes[parent.0].children;
        let position = before
            .and_then(|reference| children.iter().position(|c| *c == reference))
            .unwrap_or(children.len());
        children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
        records.push(MutationRecord::child_list(parent, vec![child], Vec::new()));
        Ok(records)
    }

    /// Detach every child of `id`
    pub(crate) fn clear_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let removed = std::mem::take(&mut self.nodes[id.0].children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        removed
    }

    pub(crate) fn append_detached(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

struct DocumentInner {
    tree: RwLock<Tree>,
    mutations: broadcast::Sender<MutationRecord>,
}

/// A shared in-memory document
///
/// Cloning is cheap; clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Arc<DocumentInner>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Create a document with an empty `<html><head></head><body></body></html>` skeleton
    #[must_use]
    pub fn new() -> Self {
        let doc = Self::empty();
        doc.write_silent(|tree| {
            let html = tree.create(NodeData::Element(ElementData::new("html")));
            let head = tree.create(NodeData::Element(ElementData::new("head")));
            let body = tree.create(NodeData::Element(ElementData::new("body")));
            tree.append_detached(NodeId::ROOT, html);
            tree.append_detached(html, head);
            tree.append_detached(html, body);
        });
        doc
    }

    fn empty() -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DocumentInner {
                tree: RwLock::new(Tree::new()),
                mutations,
            }),
        }
    }

    /// Parse HTML into a new document
    ///
    /// Full documents (starting with a doctype or `<html>`) go through the
    /// document parser, which supplies any missing `<head>`/`<body>`.
    /// Anything else is parsed as a fragment in `<body>` context. Parsing
    /// never fails: malformed markup is recovered the way browsers do.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let head = html.trim_start().get(..9).unwrap_or("").to_ascii_lowercase();
        if head.starts_with("<!doctype") || head.starts_with("<html") {
            let doc = Self::empty();
            doc.write_silent(|tree| {
                parser::parse_document(tree, html);
                // A <frameset> document has no body
                if tree.first_element_by_tag(NodeId::ROOT, "body").is_none() {
                    let parent = tree
                        .first_element_by_tag(NodeId::ROOT, "html")
                        .unwrap_or(NodeId::ROOT);
                    let body = tree.create(NodeData::Element(ElementData::new("body")));
                    tree.append_detached(parent, body);
                }
            });
            return doc;
        }
        let doc = Self::new();
        let body = doc.body().id;
        doc.write_silent(|tree| {
            parser::parse_fragment(tree, body, html);
        });
        doc
    }

    /// The document root node
    #[must_use]
    pub fn root(&self) -> Node {
        self.node(NodeId::ROOT)
    }

    /// The `<html>` element, if any
    #[must_use]
    pub fn document_element(&self) -> Option<Node> {
        let id = self.read(|tree| {
            tree.children(NodeId::ROOT)
                .iter()
                .copied()
                .find(|id| tree.element(*id).is_some())
        })?;
        Some(self.node(id))
    }

    /// The `<body>` element (the root when a parsed document has none)
    #[must_use]
    pub fn body(&self) -> Node {
        let id = self
            .read(|tree| tree.first_element_by_tag(NodeId::ROOT, "body"))
            .unwrap_or(NodeId::ROOT);
        self.node(id)
    }

    /// The `<head>` element, if any
    #[must_use]
    pub fn head(&self) -> Option<Node> {
        let id = self.read(|tree| tree.first_element_by_tag(NodeId::ROOT, "head"))?;
        Some(self.node(id))
    }

    /// Create a detached element
    #[must_use]
    pub fn create_element(&self, tag_name: &str) -> Node {
        let id = self.write_silent(|tree| tree.create(NodeData::Element(ElementData::new(tag_name))));
        self.node(id)
    }

    /// Create a detached text node
    #[must_use]
    pub fn create_text_node(&self, text: &str) -> Node {
        let id = self.write_silent(|tree| tree.create(NodeData::Text(text.to_string())));
        self.node(id)
    }

    /// Create a detached comment
    #[must_use]
    pub fn create_comment(&self, text: &str) -> Node {
        let id = self.write_silent(|tree| tree.create(NodeData::Comment(text.to_string())));
        self.node(id)
    }

    /// First connected element with the given `id` attribute
    #[must_use]
    pub fn get_element_by_id(&self, value: &str) -> Option<Node> {
        let id = self.read(|tree| tree.element_by_id(value))?;
        Some(self.node(id))
    }

    /// Number of nodes ever allocated in this document
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read(Tree::len)
    }

    /// Whether both handles refer to the same document
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn node(&self, id: NodeId) -> Node {
        Node {
            doc: self.clone(),
            id,
        }
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        let tree = self.inner.tree.read().expect("document lock poisoned");
        f(&tree)
    }

    fn write_silent<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        let mut tree = self.inner.tree.write().expect("document lock poisoned");
        f(&mut tree)
    }

    /// Apply a mutation, then publish its records once the lock is released
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Tree) -> QueryResult<(R, Vec<MutationRecord>)>,
    ) -> QueryResult<R> {
        let (result, records) = {
            let mut tree = self.inner.tree.write().expect("document lock poisoned");
            f(&mut tree)?
        };
        for record in records {
            tracing::trace!(kind = ?record.kind, target = %record.target, "mutation");
            // No receivers simply means nobody is observing
            let _ = self.inner.mutations.send(record);
        }
        Ok(result)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<MutationRecord> {
        self.inner.mutations.subscribe()
    }
}

/// Handle to one node of a [`Document`]
///
/// Two handles are equal when they refer to the same node of the same document.
#[derive(Clone)]
pub struct Node {
    doc: Document,
    id: NodeId,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.doc.ptr_eq(&other.doc)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.doc.inner).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.doc.read(|tree| match &tree.entry(self.id).data {
            NodeData::Document => "#document".to_string(),
            NodeData::Element(element) => format!("<{}>", element.tag_name),
            NodeData::Text(_) => "#text".to_string(),
            NodeData::Comment(_) => "#comment".to_string(),
        });
        f.debug_struct("Node")
            .field("id", &self.id.0)
            .field("node", &label)
            .finish()
    }
}

impl Node {
    /// Arena id
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Owning document
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.doc
    }

    /// Kind of node
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.doc.read(|tree| tree.kind(self.id))
    }

    /// Whether this node is an element
    #[must_use]
    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    /// Lower-case tag name for elements
    #[must_use]
    pub fn tag_name(&self) -> Option<String> {
        self.doc.read(|tree| tree.tag_name(self.id).map(str::to_string))
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.doc
            .read(|tree| tree.attr(self.id, name).map(str::to_string))
    }

    /// Whether the attribute is present
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.doc.read(|tree| tree.attr(self.id, name).is_some())
    }

    /// All attributes in insertion order
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.doc.read(|tree| {
            tree.element(self.id)
                .map(|e| e.attrs.clone())
                .unwrap_or_default()
        })
    }

    /// Concatenated text of all descendant text nodes
    #[must_use]
    pub fn text_content(&self) -> String {
        self.doc.read(|tree| tree.text_content(self.id))
    }

    /// Text of this node's own text children
    ///
    /// `<input type="submit">` and friends report their value instead.
    #[must_use]
    pub fn node_text(&self) -> String {
        self.doc.read(|tree| tree.node_text(self.id))
    }

    /// Current value of a form control
    #[must_use]
    pub fn value(&self) -> Option<String> {
        self.doc.read(|tree| tree.form_value(self.id))
    }

    /// Selected `<option>` elements of a `<select>`
    #[must_use]
    pub fn selected_options(&self) -> Vec<Self> {
        let ids = self.doc.read(|tree| tree.selected_options(self.id));
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    /// All child nodes
    #[must_use]
    pub fn children(&self) -> Vec<Self> {
        let ids = self.doc.read(|tree| tree.children(self.id).to_vec());
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    /// Child elements only
    #[must_use]
    pub fn element_children(&self) -> Vec<Self> {
        let ids = self.doc.read(|tree| {
            tree.children(self.id)
                .iter()
                .copied()
                .filter(|id| tree.element(*id).is_some())
                .collect::<Vec<_>>()
        });
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    /// Parent node
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let id = self.doc.read(|tree| tree.parent(self.id))?;
        Some(self.doc.node(id))
    }

    /// Descendant elements in tree order
    #[must_use]
    pub fn descendants(&self) -> Vec<Self> {
        let ids = self.doc.read(|tree| tree.descendant_elements(self.id));
        ids.into_iter().map(|id| self.doc.node(id)).collect()
    }

    /// Whether the node is attached to its document root
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.doc.read(|tree| tree.is_connected(self.id))
    }

    /// Whether `other` is this node or one of its descendants
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.doc.ptr_eq(&other.doc) && self.doc.read(|tree| tree.contains(self.id, other.id))
    }

    /// Whether this element matches a selector
    pub fn matches(&self, selector: &str) -> QueryResult<bool> {
        let selector = Selector::parse(selector)?;
        Ok(self.doc.read(|tree| selector.matches(tree, self.id)))
    }

    /// All descendant elements matching a selector, in tree order
    pub fn query_selector_all(&self, selector: &str) -> QueryResult<Vec<Self>> {
        let selector = Selector::parse(selector)?;
        let ids = self.doc.read(|tree| {
            tree.descendant_elements(self.id)
                .into_iter()
                .filter(|id| selector.matches(tree, *id))
                .collect::<Vec<_>>()
        });
        Ok(ids.into_iter().map(|id| self.doc.node(id)).collect())
    }

    /// First descendant element matching a selector
    pub fn query_selector(&self, selector: &str) -> QueryResult<Option<Self>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Closest inclusive ancestor matching a selector
    pub fn closest(&self, selector: &str) -> QueryResult<Option<Self>> {
        let selector = Selector::parse(selector)?;
        let id = self.doc.read(|tree| {
            let mut cursor = Some(self.id);
            while let Some(current) = cursor {
                if selector.matches(tree, current) {
                    return Some(current);
                }
                cursor = tree.parent(current);
            }
            None
        });
        Ok(id.map(|id| self.doc.node(id)))
    }

    /// Serialized markup of this node and its subtree
    #[must_use]
    pub fn outer_html(&self) -> String {
        self.doc.read(|tree| parser::serialize(tree, self.id))
    }

    /// Serialized markup of the children
    #[must_use]
    pub fn inner_html(&self) -> String {
        self.doc.read(|tree| {
            tree.children(self.id)
                .iter()
                .map(|child| parser::serialize(tree, *child))
                .collect()
        })
    }

    fn same_document(&self, other: &Self) -> QueryResult<()> {
        if self.doc.ptr_eq(&other.doc) {
            Ok(())
        } else {
            Err(QueryError::hierarchy("nodes belong to different documents"))
        }
    }

    /// Append `child`, moving it from its current parent if needed
    pub fn append_child(&self, child: &Self) -> QueryResult<()> {
        self.same_document(child)?;
        self.doc
            .mutate(|tree| Ok(((), tree.insert(self.id, child.id, None)?)))
    }

    /// Insert `child` before `reference`, or append when `reference` is `None`
    pub fn insert_before(&self, child: &Self, reference: Option<&Self>) -> QueryResult<()> {
        self.same_document(child)?;
        if let Some(reference) = reference {
            self.same_document(reference)?;
        }
        let before = reference.map(|r| r.id);
        self.doc
            .mutate(|tree| Ok(((), tree.insert(self.id, child.id, before)?)))
    }

    /// Remove a direct child
    pub fn remove_child(&self, child: &Self) -> QueryResult<()> {
        self.same_document(child)?;
        self.doc.mutate(|tree| {
            if tree.parent(child.id) != Some(self.id) {
                return Err(QueryError::hierarchy(format!(
                    "{} is not a child of {}",
                    child.id, self.id
                )));
            }
            tree.detach(child.id);
            Ok((
                (),
                vec![MutationRecord::child_list(self.id, Vec::new(), vec![child.id])],
            ))
        })
    }

    /// Detach this node from its parent; no-op when already detached
    pub fn remove(&self) {
        // Detaching can only fail on a missing parent, which is a no-op here
        let _ = self.doc.mutate(|tree| {
            let records = tree
                .detach(self.id)
                .map(|parent| vec![MutationRecord::child_list(parent, Vec::new(), vec![self.id])])
                .unwrap_or_default();
            Ok(((), records))
        });
    }

    /// Set an attribute (names are case-insensitive)
    pub fn set_attribute(&self, name: &str, value: &str) -> QueryResult<()> {
        self.doc.mutate(|tree| {
            let element = tree
                .element_mut(self.id)
                .ok_or_else(|| QueryError::hierarchy(format!("{} is not an element", self.id)))?;
            let old = element.set_attr(name, value);
            Ok((
                (),
                vec![MutationRecord::attributes(self.id, &name.to_ascii_lowercase(), old)],
            ))
        })
    }

    /// Remove an attribute; no record is emitted when it was absent
    pub fn remove_attribute(&self, name: &str) -> QueryResult<()> {
        self.doc.mutate(|tree| {
            let element = tree
                .element_mut(self.id)
                .ok_or_else(|| QueryError::hierarchy(format!("{} is not an element", self.id)))?;
            let records = element
                .remove_attr(name)
                .map(|old| {
                    vec![MutationRecord::attributes(
                        self.id,
                        &name.to_ascii_lowercase(),
                        Some(old),
                    )]
                })
                .unwrap_or_default();
            Ok(((), records))
        })
    }

    /// Replace the text of this node
    ///
    /// Text and comment nodes change their data; elements replace all children
    /// with a single text node.
    pub fn set_text_content(&self, text: &str) -> QueryResult<()> {
        self.doc.mutate(|tree| {
            let id = self.id;
            match tree.kind(id) {
                NodeKind::Document => Err(QueryError::hierarchy(
                    "cannot set text content of the document",
                )),
                NodeKind::Element => {
                    let removed = tree.clear_children(id);
                    let mut added = Vec::new();
                    if !text.is_empty() {
                        let child = tree.create(NodeData::Text(text.to_string()));
                        tree.append_detached(id, child);
                        added.push(child);
                    }
                    Ok(((), vec![MutationRecord::child_list(id, added, removed)]))
                }
                NodeKind::Text | NodeKind::Comment => {
                    let old = match &mut tree.nodes[id.0].data {
                        NodeData::Text(data) | NodeData::Comment(data) => {
                            std::mem::replace(data, text.to_string())
                        }
                        NodeData::Document | NodeData::Element(_) => String::new(),
                    };
                    Ok(((), vec![MutationRecord::character_data(id, Some(old))]))
                }
            }
        })
    }

    /// Replace the children with parsed HTML
    pub fn set_inner_html(&self, html: &str) -> QueryResult<()> {
        self.doc.mutate(|tree| {
            if tree.element(self.id).is_none() && tree.kind(self.id) != NodeKind::Document {
                return Err(QueryError::hierarchy(format!(
                    "{} cannot have children",
                    self.id
                )));
            }
            let removed = tree.clear_children(self.id);
            let added = parser::parse_fragment(tree, self.id, html);
            Ok(((), vec![MutationRecord::child_list(self.id, added, removed)]))
        })
    }

    /// Set the live value of a form control
    ///
    /// Like a DOM property write this emits no mutation record; async queries
    /// pick it up on their polling interval. For `<select>`, marks the
    /// matching option as selected.
    pub fn set_value(&self, value: &str) -> QueryResult<()> {
        let mut tree = self.doc.inner.tree.write().expect("document lock poisoned");
        let tag = tree
            .tag_name(self.id)
            .ok_or_else(|| QueryError::hierarchy(format!("{} is not an element", self.id)))?
            .to_string();
        if tag == "select" {
            let options: Vec<NodeId> = tree
                .descendant_elements(self.id)
                .into_iter()
                .filter(|id| tree.tag_name(*id) == Some("option"))
                .collect();
            for option in options {
                let matches = tree.form_value(option).as_deref() == Some(value);
                if let Some(element) = tree.element_mut(option) {
                    if matches {
                        element.set_attr("selected", "");
                    } else {
                        element.remove_attr("selected");
                    }
                }
            }
            return Ok(());
        }
        if let Some(element) = tree.element_mut(self.id) {
            element.value = Some(value.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod document_tests {
        use super::*;

        #[test]
        fn test_new_document_has_skeleton() {
            let doc = Document::new();
            assert_eq!(doc.document_element().unwrap().tag_name().unwrap(), "html");
            assert_eq!(doc.body().tag_name().unwrap(), "body");
            assert!(doc.head().is_some());
        }

        #[test]
        fn test_parse_fragment_lands_in_body() {
            let doc = Document::parse("<p>Hello</p>");
            let p = doc.body().query_selector("p").unwrap().unwrap();
            assert_eq!(p.parent().unwrap(), doc.body());
        }

        #[test]
        fn test_parse_full_document() {
            let doc = Document::parse(
                "<!DOCTYPE html><html><head><title>T</title></head><body><h1>Hi</h1></body></html>",
            );
            assert_eq!(doc.body().text_content(), "Hi");
            assert_eq!(doc.head().unwrap().text_content(), "T");
        }

        #[test]
        fn test_parse_decodes_named_entities() {
            let doc = Document::parse("<p>caf&eacute;</p>");
            let q = crate::screen::within_with_config(&doc.body(), crate::config::Config::default());
            let p = q.query_by_text("café").unwrap().unwrap();
            assert_eq!(p.tag_name().unwrap(), "p");
        }

        #[test]
        fn test_parse_recovers_from_malformed_markup() {
            let doc = Document::parse("<h1>Title</h1><a href=\"x>broken</a>");
            assert_eq!(doc.body().query_selector("h1").unwrap().unwrap().text_content(), "Title");

            let doc = Document::parse("<b><i>x</b>y</i>");
            let italics = doc.body().query_selector_all("i").unwrap();
            assert_eq!(italics.len(), 2);
            assert_eq!(italics[1].text_content(), "y");
            assert_eq!(italics[1].parent().unwrap(), doc.body());
        }

        #[test]
        fn test_parse_document_without_body_tag() {
            let doc = Document::parse("<!DOCTYPE html><title>T</title><p>x</p>");
            assert_eq!(doc.body().inner_html(), "<p>x</p>");
            assert_eq!(doc.head().unwrap().text_content(), "T");
        }

        #[test]
        fn test_get_element_by_id() {
            let doc = Document::parse("<div id=\"a\"><span id=\"b\"></span></div>");
            assert_eq!(doc.get_element_by_id("b").unwrap().tag_name().unwrap(), "span");
            assert!(doc.get_element_by_id("zzz").is_none());
        }
    }

    mod node_tests {
        use super::*;

        #[test]
        fn test_node_text_only_direct_text_children() {
            let doc = Document::parse("<div>Hello <b>big</b> world</div>");
            let div = doc.body().query_selector("div").unwrap().unwrap();
            assert_eq!(div.node_text(), "Hello  world");
            assert_eq!(div.text_content(), "Hello big world");
        }

        #[test]
        fn test_submit_input_text_is_value() {
            let doc = Document::parse("<input type=\"submit\" value=\"Send\">");
            let input = doc.body().query_selector("input").unwrap().unwrap();
            assert_eq!(input.node_text(), "Send");
        }

        #[test]
        fn test_descendants_in_tree_order() {
            let doc = Document::parse("<a><b></b><c><d></d></c></a><e></e>");
            let tags: Vec<String> = doc
                .body()
                .descendants()
                .iter()
                .map(|n| n.tag_name().unwrap())
                .collect();
            assert_eq!(tags, vec!["a", "b", "c", "d", "e"]);
        }

        #[test]
        fn test_handles_compare_by_identity() {
            let doc = Document::parse("<p></p><p></p>");
            let ps = doc.body().query_selector_all("p").unwrap();
            assert_ne!(ps[0], ps[1]);
            assert_eq!(ps[0], doc.body().query_selector("p").unwrap().unwrap());
        }

        #[test]
        fn test_closest() {
            let doc = Document::parse("<form><label><input></label></form>");
            let input = doc.body().query_selector("input").unwrap().unwrap();
            let form = input.closest("form").unwrap().unwrap();
            assert_eq!(form.tag_name().unwrap(), "form");
        }
    }

    mod mutation_tests {
        use super::*;

        #[test]
        fn test_append_and_remove_child() {
            let doc = Document::new();
            let div = doc.create_element("div");
            assert!(!div.is_connected());
            doc.body().append_child(&div).unwrap();
            assert!(div.is_connected());
            doc.body().remove_child(&div).unwrap();
            assert!(!div.is_connected());
        }

        #[test]
        fn test_append_moves_node() {
            let doc = Document::parse("<div id=\"a\"><span></span></div><div id=\"b\"></div>");
            let span = doc.body().query_selector("span").unwrap().unwrap();
            let b = doc.get_element_by_id("b").unwrap();
            b.append_child(&span).unwrap();
            assert_eq!(span.parent().unwrap(), b);
            assert!(doc.get_element_by_id("a").unwrap().children().is_empty());
        }

        #[test]
        fn test_append_ancestor_into_descendant_fails() {
            let doc = Document::parse("<div><span></span></div>");
            let div = doc.body().query_selector("div").unwrap().unwrap();
            let span = doc.body().query_selector("span").unwrap().unwrap();
            let err = span.append_child(&div).unwrap_err();
            assert!(matches!(err, QueryError::Hierarchy { .. }));
        }

        #[test]
        fn test_insert_before() {
            let doc = Document::parse("<ul><li>b</li></ul>");
            let ul = doc.body().query_selector("ul").unwrap().unwrap();
            let b = ul.element_children()[0].clone();
            let a = doc.create_element("li");
            a.set_text_content("a").unwrap();
            ul.insert_before(&a, Some(&b)).unwrap();
            assert_eq!(ul.text_content(), "ab");
        }

        #[test]
        fn test_set_and_remove_attribute() {
            let doc = Document::new();
            let body = doc.body();
            body.set_attribute("Data-X", "1").unwrap();
            assert_eq!(body.attribute("data-x").unwrap(), "1");
            body.remove_attribute("data-x").unwrap();
            assert!(!body.has_attribute("data-x"));
        }

        #[test]
        fn test_set_inner_html_replaces_children() {
            let doc = Document::parse("<div><p>old</p></div>");
            let div = doc.body().query_selector("div").unwrap().unwrap();
            div.set_inner_html("<span>new</span>").unwrap();
            assert_eq!(div.inner_html(), "<span>new</span>");
        }

        #[test]
        fn test_set_inner_html_parses_in_element_context() {
            let doc = Document::parse("<table><tbody></tbody></table>");
            let tbody = doc.body().query_selector("tbody").unwrap().unwrap();
            tbody.set_inner_html("<tr><td>1</td></tr>").unwrap();
            assert_eq!(tbody.inner_html(), "<tr><td>1</td></tr>");
        }

        #[test]
        fn test_set_value_on_select_updates_selection() {
            let doc = Document::parse(
                "<select><option value=\"a\">A</option><option value=\"b\">B</option></select>",
            );
            let select = doc.body().query_selector("select").unwrap().unwrap();
            assert_eq!(select.value().unwrap(), "a");
            select.set_value("b").unwrap();
            assert_eq!(select.value().unwrap(), "b");
        }

        #[test]
        fn test_cross_document_append_fails() {
            let a = Document::new();
            let b = Document::new();
            let div = b.create_element("div");
            assert!(a.body().append_child(&div).is_err());
        }
    }
}
