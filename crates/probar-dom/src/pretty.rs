//! Pretty-printed markup snapshots for error messages and debugging.
//!
//! ```text
//! <div
//!   class="card"
//! >
//!   <span>
//!     Hello
//!   </span>
//! </div>
//! ```

use crate::config::{get_config, Config, DEFAULT_DEBUG_PRINT_LIMIT, DEFAULT_IGNORE};
use crate::dom::{escape_attr, Node, NodeData, NodeId, Selector, Tree};
use crate::matches::normalize;

/// Options for [`pretty_dom`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrettyDomOptions {
    /// Maximum characters; longer output is cut and suffixed with `...`
    pub max_length: usize,
    /// Maximum element depth; deeper elements print as `<tag … />`
    pub max_depth: Option<usize>,
    /// Skip comment nodes
    pub filter_comments: bool,
    /// Elements to leave out entirely (selector), empty for none
    pub ignore: String,
    /// Spaces per indentation level
    pub indent: usize,
}

impl Default for PrettyDomOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_DEBUG_PRINT_LIMIT,
            max_depth: None,
            filter_comments: true,
            ignore: DEFAULT_IGNORE.to_string(),
            indent: 2,
        }
    }
}

impl PrettyDomOptions {
    /// Options derived from a query config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_length: config.debug_print_limit,
            ignore: config.default_ignore.clone(),
            ..Self::default()
        }
    }

    /// Set the length limit
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set the depth limit
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Keep or drop comments
    #[must_use]
    pub const fn with_filter_comments(mut self, filter: bool) -> Self {
        self.filter_comments = filter;
        self
    }
}

/// Render `node` as indented markup
///
/// A document renders its `<html>` element.
#[must_use]
pub fn pretty_dom(node: &Node, options: &PrettyDomOptions) -> String {
    let start = node
        .document()
        .read(|tree| match tree.entry(node.id()).data {
            NodeData::Document => tree
                .children(node.id())
                .iter()
                .copied()
                .find(|id| tree.element(*id).is_some())
                .unwrap_or(node.id()),
            _ => node.id(),
        });
    let ignore = if options.ignore.trim().is_empty() {
        None
    } else {
        Selector::parse(&options.ignore).ok()
    };

    let mut out = String::new();
    node.document().read(|tree| {
        let printer = Printer {
            tree,
            options,
            ignore: ignore.as_ref(),
        };
        printer.print(start, 0, &mut out);
    });
    let out = out.trim_end().to_string();

    if out.chars().count() > options.max_length {
        let cut: String = out.chars().take(options.max_length).collect();
        return format!("{cut}...");
    }
    out
}

/// Render with limits from the process-wide config
#[must_use]
pub fn pretty_dom_default(node: &Node) -> String {
    pretty_dom(node, &PrettyDomOptions::from_config(&get_config()))
}

/// Emit the snapshot of `node` through `tracing`
pub fn log_dom(node: &Node, options: &PrettyDomOptions) {
    tracing::info!("\n{}", pretty_dom(node, options));
}

/// Render one element with its attributes but none of its children
#[must_use]
pub fn pretty_element(node: &Node) -> String {
    node.document().read(|tree| {
        let Some(element) = tree.element(node.id()) else {
            return String::new();
        };
        let mut attrs = element.attrs.clone();
        attrs.sort_by(|a, b| a.0.cmp(&b.0));
        if attrs.is_empty() {
            return format!("<{} />", element.tag_name);
        }
        let mut out = format!("<{}\n", element.tag_name);
        for (name, value) in &attrs {
            out.push_str(&format!("  {name}=\"{}\"\n", escape_attr(value)));
        }
        out.push_str("/>");
        out
    })
}

struct Printer<'a> {
    tree: &'a Tree,
    options: &'a PrettyDomOptions,
    ignore: Option<&'a Selector>,
}

impl Printer<'_> {
    fn pad(&self, depth: usize) -> String {
        " ".repeat(depth * self.options.indent)
    }

    fn print(&self, id: NodeId, depth: usize, out: &mut String) {
        match &self.tree.entry(id).data {
            NodeData::Document => {
                for child in self.tree.children(id) {
                    self.print(*child, depth, out);
                }
            }
            NodeData::Text(text) => {
                let text = normalize(text, true, true);
                if !text.is_empty() {
                    out.push_str(&self.pad(depth));
                    out.push_str(&text);
                    out.push('\n');
                }
            }
            NodeData::Comment(text) => {
                if !self.options.filter_comments {
                    out.push_str(&format!("{}<!--{}-->\n", self.pad(depth), text));
                }
            }
            NodeData::Element(element) => {
                if depth > 0 && self.ignore.is_some_and(|s| s.matches(self.tree, id)) {
                    return;
                }
                let pad = self.pad(depth);
                let tag = &element.tag_name;
                if self.options.max_depth.is_some_and(|max| depth > max) {
                    out.push_str(&format!("{pad}<{tag} … />\n"));
                    return;
                }

                let mut attrs = element.attrs.clone();
                attrs.sort_by(|a, b| a.0.cmp(&b.0));
                let children: Vec<NodeId> = self
                    .tree
                    .children(id)
                    .iter()
                    .copied()
                    .filter(|child| self.is_visible_child(*child))
                    .collect();

                out.push_str(&format!("{pad}<{tag}"));
                if !attrs.is_empty() {
                    out.push('\n');
                    let attr_pad = self.pad(depth + 1);
                    for (name, value) in &attrs {
                        out.push_str(&format!(
                            "{attr_pad}{name}=\"{}\"\n",
                            escape_attr(value)
                        ));
                    }
                    out.push_str(&pad);
                }

                if children.is_empty() {
                    out.push_str(if attrs.is_empty() { " />\n" } else { "/>\n" });
                    return;
                }
                out.push_str(">\n");
                for child in children {
                    self.print(child, depth + 1, out);
                }
                out.push_str(&format!("{pad}</{tag}>\n"));
            }
        }
    }

    fn is_visible_child(&self, id: NodeId) -> bool {
        match &self.tree.entry(id).data {
            NodeData::Text(text) => !text.trim().is_empty(),
            NodeData::Comment(_) => !self.options.filter_comments,
            NodeData::Element(_) => !self.ignore.is_some_and(|s| s.matches(self.tree, id)),
            NodeData::Document => false,
        }
    }
}
