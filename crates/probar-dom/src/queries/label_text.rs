//! Queries by associated label text.
//!
//! A form control is labelled by:
//! - a `<label for="id">` anywhere in the document
//! - an enclosing `<label>` without `for`, when it is the label's first control
//! - the elements listed in its `aria-labelledby`
//! - its own `aria-label`

use regex::Regex;

use super::MatchQuery;
use crate::config::Config;
use crate::dom::{Node, Selector};
use crate::matches::{Matcher, MatcherOptions};
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

const LABELABLE_TAGS: &[&str] = &[
    "button", "input", "meter", "output", "progress", "select", "textarea",
];

/// Arguments of the label queries
#[derive(Debug, Clone)]
pub struct LabelTextQuery {
    /// What to look for
    pub matcher: Matcher,
    /// How to compare
    pub options: MatcherOptions,
    /// Labelled elements to consider (default `*`)
    pub selector: String,
}

impl LabelTextQuery {
    /// Match label text against `matcher`
    pub fn new(matcher: impl Into<Matcher>) -> Self {
        Self {
            matcher: matcher.into(),
            options: MatcherOptions::default(),
            selector: "*".to_string(),
        }
    }

    /// Replace the matcher options
    #[must_use]
    pub fn with_options(mut self, options: MatcherOptions) -> Self {
        self.options = options;
        self
    }

    /// Toggle exact matching
    #[must_use]
    pub fn exact(mut self, exact: bool) -> Self {
        self.options = self.options.exact(exact);
        self
    }

    /// Only return labelled elements matching `selector`
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    fn as_match(&self) -> MatchQuery {
        MatchQuery {
            matcher: self.matcher.clone(),
            options: self.options.clone(),
        }
    }
}

impl From<&str> for LabelTextQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for LabelTextQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Regex> for LabelTextQuery {
    fn from(regex: Regex) -> Self {
        Self::new(regex)
    }
}

impl From<Matcher> for LabelTextQuery {
    fn from(matcher: Matcher) -> Self {
        Self::new(matcher)
    }
}

/// Whether `node` can be the target of a `<label>`
pub(crate) fn is_labelable(node: &Node) -> bool {
    let Some(tag) = node.tag_name() else {
        return false;
    };
    if tag == "input" {
        return !node
            .attribute("type")
            .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"));
    }
    LABELABLE_TAGS.contains(&tag.as_str())
}

/// Elements whose text labels `node`, in document order
pub(crate) fn labels_of(node: &Node) -> Vec<Node> {
    if let Some(ids) = node.attribute("aria-labelledby") {
        let doc = node.document();
        return ids
            .split_ascii_whitespace()
            .filter_map(|id| doc.get_element_by_id(id))
            .collect();
    }
    if !is_labelable(node) {
        return Vec::new();
    }
    let own_id = node.attribute("id").filter(|id| !id.is_empty());
    let Ok(labels) = node.document().root().query_selector_all("label") else {
        return Vec::new();
    };
    labels
        .into_iter()
        .filter(|label| match label.attribute("for") {
            Some(target) => own_id.as_deref() == Some(target.as_str()),
            None => {
                label.contains(node)
                    && label.descendants().into_iter().find(is_labelable).as_ref() == Some(node)
            }
        })
        .collect()
}

/// Text of all labels of `node`, joined with spaces
pub(crate) fn label_text(node: &Node) -> Option<String> {
    let labels = labels_of(node);
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|label| label.text_content().trim().to_string())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Labelled elements under `container` with a matching label
pub fn query_all_by_label_text(
    container: &Node,
    query: &LabelTextQuery,
) -> QueryResult<Vec<Node>> {
    let selector = Selector::parse(&query.selector)?;
    let matcher = query.as_match();
    let test = matcher.tester()?;

    Ok(container
        .descendants()
        .into_iter()
        .filter(|node| selector.is_match(node))
        .filter(|node| {
            if node
                .attribute("aria-label")
                .is_some_and(|label| test(label.as_str(), node))
            {
                return true;
            }
            let labels = labels_of(node);
            let any_label = labels
                .iter()
                .any(|label| test(label.text_content().as_str(), label));
            any_label
                || (labels.len() > 1
                    && label_text(node).is_some_and(|joined| test(joined.as_str(), node)))
        })
        .collect())
}

/// Matching `<label>` elements under `container`, whether or not they label anything
fn matching_labels(container: &Node, query: &LabelTextQuery) -> Vec<Node> {
    let matcher = query.as_match();
    let Ok(test) = matcher.tester() else {
        return Vec::new();
    };
    container
        .query_selector_all("label")
        .unwrap_or_default()
        .into_iter()
        .filter(|label| test(label.text_content().as_str(), label))
        .collect()
}

fn missing_message(container: &Node, query: &LabelTextQuery) -> String {
    let labels = matching_labels(container, query);
    let Some(label) = labels.first() else {
        return format!("Unable to find a label with the text of: {}", query.matcher);
    };
    let target = label
        .attribute("for")
        .and_then(|id| label.document().get_element_by_id(&id));
    if let Some(target) = target.filter(|target| !is_labelable(target)) {
        let tag = target.tag_name().unwrap_or_default();
        return format!(
            "Found a label with the text of: {}, however the element associated with this \
             label (<{tag} />) is non-labellable. If you really need to label a <{tag} />, you \
             can use aria-label or aria-labelledby instead.",
            query.matcher
        );
    }
    format!(
        "Found a label with the text of: {}, however no form control was found associated to \
         that label. Make sure you're using the \"for\" attribute or \"aria-labelledby\" \
         attribute correctly.",
        query.matcher
    )
}

/// The label query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<LabelTextQuery> {
    build_queries(
        query_all_by_label_text,
        |_, query: &LabelTextQuery| {
            format!("Found multiple elements with the text of: {}", query.matcher)
        },
        missing_message,
    )
    .with_config(config.clone())
}
