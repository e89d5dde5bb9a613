//! CSS selectors over the document arena.
//!
//! Parsing and matching come from the `selectors` crate with scraper's
//! `Simple` selector implementation, so the full Selectors Level 4
//! structural grammar works: every combinator, attribute operators,
//! `:not()`/`:is()`/`:has()` and the `:nth-*` family. Pseudo-classes that
//! depend on user interaction (`:hover`, `:focus`) are rejected at parse
//! time.

use std::fmt;

use cssparser::{Parser as CssParser, ParserInput};
use html5ever::{ns, Namespace};
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{
    self, ElementSelectorFlags, MatchingContext, MatchingForInvalidation, MatchingMode,
    NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorList};
use selectors::{Element, OpaqueElement};

use super::{ElementData, Node, NodeData, NodeId, NodeKind, Tree};
use crate::result::{QueryError, QueryResult};

/// A parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    /// Parse a selector list
    pub fn parse(source: &str) -> QueryResult<Self> {
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);
        let list = SelectorList::parse(&Parser, &mut parser, ParseRelative::No).map_err(|err| {
            QueryError::InvalidSelector {
                selector: source.to_string(),
                message: SelectorErrorKind::from(err).to_string(),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// Selector text as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `node` is an element matching this selector
    #[must_use]
    pub fn is_match(&self, node: &Node) -> bool {
        node.document().read(|tree| self.matches(tree, node.id()))
    }

    pub(crate) fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        let Some(element) = ArenaElement::new(tree, id) else {
            return false;
        };
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.list
            .slice()
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, &element, &mut context))
    }
}

/// Borrowed view of one arena element, as the selector engine sees it
#[derive(Clone, Copy)]
struct ArenaElement<'a> {
    tree: &'a Tree,
    id: NodeId,
    data: &'a ElementData,
}

impl<'a> ArenaElement<'a> {
    fn new(tree: &'a Tree, id: NodeId) -> Option<Self> {
        tree.element(id).map(|data| Self { tree, id, data })
    }

    fn siblings(&self) -> &'a [NodeId] {
        match self.tree.parent(self.id) {
            Some(parent) => self.tree.children(parent),
            None => &[],
        }
    }

    fn position(&self) -> usize {
        self.siblings()
            .iter()
            .position(|id| *id == self.id)
            .unwrap_or(0)
    }
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {}", self.data.tag_name, self.id)
    }
}

impl Element for ArenaElement<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.tree.entry(self.id))
    }

    fn parent_element(&self) -> Option<Self> {
        self.tree
            .parent(self.id)
            .and_then(|parent| Self::new(self.tree, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.siblings()[..self.position()]
            .iter()
            .rev()
            .find_map(|id| Self::new(self.tree, *id))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.siblings()
            .iter()
            .skip(self.position() + 1)
            .find_map(|id| Self::new(self.tree, *id))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.tree
            .children(self.id)
            .iter()
            .find_map(|id| Self::new(self.tree, *id))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssLocalName) -> bool {
        self.data.tag_name.as_str() == &*local_name.0
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        *namespace == ns!(html)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag_name == other.data.tag_name
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        // Attributes live in the null namespace
        if matches!(*ns, NamespaceConstraint::Specific(url) if *url != ns!()) {
            return false;
        }
        self.data
            .attrs
            .iter()
            .any(|(name, value)| name.as_str() == &*local_name.0 && operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.data.tag_name.as_str(), "a" | "area" | "link") && self.data.attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.data.tag_name == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.data
            .classes()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.tree
            .children(self.id)
            .iter()
            .all(|child| match &self.tree.entry(*child).data {
                NodeData::Element(_) => false,
                NodeData::Text(text) => text.is_empty(),
                NodeData::Document | NodeData::Comment(_) => true,
            })
    }

    fn is_root(&self) -> bool {
        self.tree
            .parent(self.id)
            .is_some_and(|parent| self.tree.kind(parent) == NodeKind::Document)
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn count(html: &str, selector: &str) -> usize {
        let doc = Document::parse(html);
        doc.body().query_selector_all(selector).unwrap().len()
    }

    #[test]
    fn test_simple_selectors() {
        let html = "<div id=\"a\" class=\"x y\"></div><span class=\"y\"></span><p></p>";
        assert_eq!(count(html, "div"), 1);
        assert_eq!(count(html, "DIV"), 1);
        assert_eq!(count(html, "*"), 3);
        assert_eq!(count(html, "#a"), 1);
        assert_eq!(count(html, ".y"), 2);
        assert_eq!(count(html, "div.x.y"), 1);
        assert_eq!(count(html, "span.x"), 0);
    }

    #[test]
    fn test_attribute_selectors() {
        let html = "<input type=\"text\"><input type=\"checkbox\"><input>\
                    <a href=\"https://x.test/docs\" class=\"btn primary\" lang=\"en-US\"></a>";
        assert_eq!(count(html, "[type]"), 2);
        assert_eq!(count(html, "input[type=text]"), 1);
        assert_eq!(count(html, "[type=\"checkbox\"]"), 1);
        assert_eq!(count(html, "[data-testid=\"a,b\"]"), 0);
        assert_eq!(count(html, "[href^=\"https:\"]"), 1);
        assert_eq!(count(html, "[href$=docs]"), 1);
        assert_eq!(count(html, "[href*=\"x.test\"]"), 1);
        assert_eq!(count(html, "[class~=primary]"), 1);
        assert_eq!(count(html, "[lang|=en]"), 1);
        assert_eq!(count(html, "[type=TEXT i]"), 1);
    }

    #[test]
    fn test_selector_lists() {
        let html = "<script></script><style></style><div></div>";
        assert_eq!(count(html, "script, style"), 2);
    }

    #[test]
    fn test_combinators() {
        let html = "<form><div><input id=\"deep\"></div><input id=\"shallow\"><button></button></form>";
        assert_eq!(count(html, "form input"), 2);
        assert_eq!(count(html, "form > input"), 1);
        assert_eq!(count(html, "div > input#deep"), 1);
        assert_eq!(count(html, "div + input"), 1);
        assert_eq!(count(html, "div ~ button"), 1);
        assert_eq!(count(html, "input + div"), 0);
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let html = "<ul><li>a</li><li>b</li><li>c</li></ul><p></p><p> </p>";
        assert_eq!(count(html, "li:first-child"), 1);
        assert_eq!(count(html, "li:nth-child(odd)"), 2);
        assert_eq!(count(html, "li:not(:last-child)"), 2);
        assert_eq!(count(html, "ul:has(> li)"), 1);
        assert_eq!(count(html, "p:empty"), 1);
    }

    #[test]
    fn test_is_match_on_text_node_is_false() {
        let doc = Document::parse("<p>x</p>");
        let text = doc.body().query_selector("p").unwrap().unwrap().children()[0].clone();
        assert!(!Selector::parse("*").unwrap().is_match(&text));
    }

    #[test]
    fn test_invalid_selectors() {
        for source in ["", "div,", "#", "div:hover", "a >", "[x=", "p::before"] {
            let err = Selector::parse(source).unwrap_err();
            assert!(
                matches!(&err, QueryError::InvalidSelector { selector, .. } if selector == source),
                "{source:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Selector::parse("a, b").unwrap().as_str(), "a, b");
    }
}
