//! Queries by `title` attribute, or by `<title>` text inside `<svg>`.

use super::MatchQuery;
use crate::config::Config;
use crate::dom::{Node, Selector};
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Arguments of the title queries
pub type TitleQuery = MatchQuery;

fn is_svg_title(node: &Node) -> bool {
    node.tag_name().as_deref() == Some("title")
        && node
            .parent()
            .and_then(|parent| parent.tag_name())
            .as_deref()
            == Some("svg")
}

/// Elements with a matching `title` attribute, and svg titles with matching text
pub fn query_all_by_title(container: &Node, query: &TitleQuery) -> QueryResult<Vec<Node>> {
    let candidates = Selector::parse("[title], svg > title")?;
    let test = query.tester()?;
    Ok(container
        .descendants()
        .into_iter()
        .filter(|node| candidates.is_match(node))
        .filter(|node| {
            let text = if is_svg_title(node) {
                Some(node.node_text())
            } else {
                node.attribute("title")
            };
            text.is_some_and(|text| test(text.as_str(), node))
        })
        .collect())
}

/// The title query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<TitleQuery> {
    build_queries(
        query_all_by_title,
        |_, query: &TitleQuery| format!("Found multiple elements with the title: {}.", query.matcher),
        |_, query: &TitleQuery| format!("Unable to find an element with the title: {}.", query.matcher),
    )
    .with_config(config.clone())
}
