//! Queries by `placeholder` attribute.

use super::{query_all_by_attribute, MatchQuery};
use crate::config::Config;
use crate::dom::Node;
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Arguments of the placeholder queries
pub type PlaceholderQuery = MatchQuery;

/// Elements under `container` whose placeholder matches
pub fn query_all_by_placeholder_text(
    container: &Node,
    query: &PlaceholderQuery,
) -> QueryResult<Vec<Node>> {
    query_all_by_attribute("placeholder", container, query)
}

/// The placeholder query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<PlaceholderQuery> {
    build_queries(
        query_all_by_placeholder_text,
        |_, query: &PlaceholderQuery| {
            format!("Found multiple elements with the placeholder text of: {}", query.matcher)
        },
        |_, query: &PlaceholderQuery| {
            format!("Unable to find an element with the placeholder text of: {}", query.matcher)
        },
    )
    .with_config(config.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_finds_input_and_textarea() {
        let doc = Document::parse(
            "<input placeholder=\"Email\"><textarea placeholder=\"Email body\"></textarea>",
        );
        let family = family(&Config::default());
        assert_eq!(family.get_all_by(&doc.body(), &"Email".into()).unwrap().len(), 1);
        let fuzzy = MatchQuery::new("email").exact(false);
        assert_eq!(family.get_all_by(&doc.body(), &fuzzy).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_message() {
        let doc = Document::new();
        let err = family(&Config::default())
            .get_by(&doc.body(), &"Search".into())
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Unable to find an element with the placeholder text of: Search"));
    }
}
