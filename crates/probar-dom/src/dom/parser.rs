//! HTML parsing through html5ever, grafted into the document arena.
//!
//! html5ever runs the full tree-construction algorithm (character
//! references, implied end tags, adoption agency, foster parenting), and
//! the resulting `scraper::Html` tree is copied node by node into the
//! arena. Doctypes and processing instructions are dropped. Template
//! contents are kept as children of the `<template>` element.

use ego_tree::NodeRef;
use html5ever::driver::{self, ParseOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{ns, LocalName, QualName};
use scraper::{Html, HtmlTreeSink};

use super::{ElementData, NodeData, NodeId, Tree};

/// Parse a complete document and append its nodes under the arena root
pub(crate) fn parse_document(tree: &mut Tree, html: &str) {
    let parsed = Html::parse_document(html);
    for child in parsed.tree.root().children() {
        graft(tree, NodeId::ROOT, child);
    }
}

/// Parse `html` as the children of `context` and append them to it
///
/// The context element decides the tokenizer state and insertion mode, so
/// `<tr>` survives under a `<tbody>` and `<textarea>` content stays text.
/// Returns the ids of the top-level nodes added.
pub(crate) fn parse_fragment(tree: &mut Tree, context: NodeId, html: &str) -> Vec<NodeId> {
    let context_tag = tree.tag_name(context).unwrap_or("body");
    let parser = driver::parse_fragment(
        HtmlTreeSink::new(Html::new_fragment()),
        ParseOpts::default(),
        QualName::new(None, ns!(html), LocalName::from(context_tag)),
        Vec::new(),
        false,
    );
    let parsed = parser.one(html);

    // Fragment content hangs off a synthetic <html> element
    let root = parsed.tree.root();
    let holder = root
        .children()
        .find(|child| child.value().is_element())
        .unwrap_or(root);
    holder
        .children()
        .filter_map(|child| graft(tree, context, child))
        .collect()
}

/// Copy `source` and its subtree under `parent`, returning the new node
fn graft(tree: &mut Tree, parent: NodeId, source: NodeRef<'_, scraper::Node>) -> Option<NodeId> {
    let data = match source.value() {
        scraper::Node::Element(element) => {
            let mut data = ElementData::new(element.name());
            data.attrs = element
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            NodeData::Element(data)
        }
        scraper::Node::Text(text) => NodeData::Text((**text).to_owned()),
        scraper::Node::Comment(comment) => NodeData::Comment((**comment).to_owned()),
        scraper::Node::Fragment => {
            for child in source.children() {
                graft(tree, parent, child);
            }
            return None;
        }
        scraper::Node::Document
        | scraper::Node::Doctype(_)
        | scraper::Node::ProcessingInstruction(_) => return None,
    };
    let id = tree.create(data);
    tree.append_detached(parent, id);
    for child in source.children() {
        graft(tree, id, child);
    }
    Some(id)
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}

/// Serialize a node and its subtree as HTML
pub(crate) fn serialize(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    serialize_into(tree, id, &mut out);
    out
}

fn serialize_into(tree: &Tree, id: NodeId, out: &mut String) {
    match &tree.entry(id).data {
        NodeData::Document => {
            for child in tree.children(id) {
                serialize_into(tree, *child, out);
            }
        }
        NodeData::Text(text) => {
            let raw = tree
                .parent(id)
                .and_then(|p| tree.tag_name(p))
                .is_some_and(|tag| matches!(tag, "script" | "style" | "xmp" | "noscript"));
            if raw {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(element) => {
            out.push('<');
            out.push_str(&element.tag_name);
            for (name, value) in &element.attrs {
                out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
            }
            out.push('>');
            if element.is_void() {
                return;
            }
            for child in tree.children(id) {
                serialize_into(tree, *child, out);
            }
            out.push_str(&format!("</{}>", element.tag_name));
        }
    }
}
