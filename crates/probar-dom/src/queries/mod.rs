//! Built-in query families.
//!
//! Each submodule defines the arguments of one kind of lookup and a
//! `family(&Config)` constructor returning its [`QueryFamily`].
//!
//! [`QueryFamily`]: crate::query::QueryFamily

pub mod alt_text;
pub mod display_value;
pub mod label_text;
pub mod placeholder;
pub mod role;
pub mod test_id;
pub mod text;
pub mod title;

pub use alt_text::AltTextQuery;
pub use display_value::DisplayValueQuery;
pub use label_text::LabelTextQuery;
pub use placeholder::PlaceholderQuery;
pub use role::RoleQuery;
pub use test_id::TestIdQuery;
pub use text::TextQuery;
pub use title::TitleQuery;

use regex::Regex;

use crate::dom::Node;
use crate::matches::{text_match_fn, Matcher, MatcherOptions};
use crate::result::QueryResult;

/// A matcher plus the options it is evaluated with
#[derive(Debug, Clone)]
pub struct MatchQuery {
    /// What to look for
    pub matcher: Matcher,
    /// How to compare
    pub options: MatcherOptions,
}

impl MatchQuery {
    /// Query with default (exact) options
    pub fn new(matcher: impl Into<Matcher>) -> Self {
        Self {
            matcher: matcher.into(),
            options: MatcherOptions::default(),
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

    /// Test `text` (read from `node`) against this query
    pub(crate) fn tester(&self) -> QueryResult<impl Fn(&str, &Node) -> bool + '_> {
        let normalizer = self.options.make_normalizer()?;
        let eval = text_match_fn(self.options.is_exact());
        Ok(move |text: &str, node: &Node| eval(text, Some(node), &self.matcher, &normalizer))
    }
}

impl From<Matcher> for MatchQuery {
    fn from(matcher: Matcher) -> Self {
        Self::new(matcher)
    }
}

impl From<&str> for MatchQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for MatchQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Regex> for MatchQuery {
    fn from(regex: Regex) -> Self {
        Self::new(regex)
    }
}

/// Elements under `container` whose `attribute` value satisfies `query`
///
/// The container itself is not a candidate.
pub fn query_all_by_attribute(
    attribute: &str,
    container: &Node,
    query: &MatchQuery,
) -> QueryResult<Vec<Node>> {
    let test = query.tester()?;
    let candidates: Vec<(Node, String)> = container
        .descendants()
        .into_iter()
        .filter_map(|node| {
            let value = node.attribute(attribute)?;
            Some((node, value))
        })
        .collect();
    Ok(candidates
        .into_iter()
        .filter(|(node, value)| test(value.as_str(), node))
        .map(|(node, _)| node)
        .collect())
}
