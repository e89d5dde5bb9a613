//! Queries by the current value of form controls.
//!
//! Inputs and textareas match on their value; a `<select>` matches when the
//! text of any selected option does.

use super::MatchQuery;
use crate::config::Config;
use crate::dom::Node;
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Arguments of the display value queries
pub type DisplayValueQuery = MatchQuery;

/// `input`, `select` and `textarea` elements whose displayed value matches
pub fn query_all_by_display_value(
    container: &Node,
    query: &DisplayValueQuery,
) -> QueryResult<Vec<Node>> {
    let test = query.tester()?;
    Ok(container
        .query_selector_all("input, select, textarea")?
        .into_iter()
        .filter(|node| {
            if node.tag_name().as_deref() == Some("select") {
                node.selected_options()
                    .iter()
                    .any(|option| test(option.text_content().as_str(), option))
            } else {
                node.value()
                    .is_some_and(|value| test(value.as_str(), node))
            }
        })
        .collect())
}

/// The display value query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<DisplayValueQuery> {
    build_queries(
        query_all_by_display_value,
        |_, query: &DisplayValueQuery| {
            format!("Found multiple elements with the display value: {}.", query.matcher)
        },
        |_, query: &DisplayValueQuery| {
            format!("Unable to find an element with the display value: {}.", query.matcher)
        },
    )
    .with_config(config.clone())
}
