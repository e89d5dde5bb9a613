//! Queries by `alt` text on images, image inputs and areas.

use super::{query_all_by_attribute, MatchQuery};
use crate::config::Config;
use crate::dom::Node;
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Elements that carry meaningful alt text
const ALT_TAGS: &[&str] = &["img", "input", "area"];

/// Arguments of the alt text queries
pub type AltTextQuery = MatchQuery;

/// `img`, `input` and `area` elements whose alt text matches
pub fn query_all_by_alt_text(container: &Node, query: &AltTextQuery) -> QueryResult<Vec<Node>> {
    Ok(query_all_by_attribute("alt", container, query)?
        .into_iter()
        .filter(|node| {
            node.tag_name()
                .is_some_and(|tag| ALT_TAGS.contains(&tag.as_str()))
        })
        .collect())
}

/// The alt text query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<AltTextQuery> {
    build_queries(
        query_all_by_alt_text,
        |_, query: &AltTextQuery| format!("Found multiple elements with the alt text: {}", query.matcher),
        |_, query: &AltTextQuery| format!("Unable to find an element with the alt text: {}", query.matcher),
    )
    .with_config(config.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_only_supported_tags() {
        let doc = Document::parse(
            "<img alt=\"Logo\"><div alt=\"Logo\"></div><input type=\"image\" alt=\"Logo\">",
        );
        let found = family(&Config::default())
            .get_all_by(&doc.body(), &"Logo".into())
            .unwrap();
        let tags: Vec<String> = found.iter().filter_map(Node::tag_name).collect();
        assert_eq!(tags, vec!["img", "input"]);
    }

    #[test]
    fn test_regex_matcher() {
        let doc = Document::parse("<img alt=\"Company logo\">");
        let query = AltTextQuery::new(regex::Regex::new("(?i)logo$").unwrap());
        assert!(family(&Config::default()).get_by(&doc.body(), &query).is_ok());
    }

    #[test]
    fn test_missing_message() {
        let doc = Document::new();
        let err = family(&Config::default())
            .get_by(&doc.body(), &"Logo".into())
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Unable to find an element with the alt text: Logo"));
    }
}
