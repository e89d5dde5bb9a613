//! Queries by test id attribute.
//!
//! The attribute name comes from [`Config::test_id_attribute`]
//! (`data-testid` unless configured otherwise).

use super::{query_all_by_attribute, MatchQuery};
use crate::config::Config;
use crate::dom::Node;
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Arguments of the test id queries
pub type TestIdQuery = MatchQuery;

/// Elements under `container` whose test id attribute matches
pub fn query_all_by_test_id(
    config: &Config,
    container: &Node,
    query: &TestIdQuery,
) -> QueryResult<Vec<Node>> {
    query_all_by_attribute(&config.test_id_attribute, container, query)
}

/// The test id query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<TestIdQuery> {
    let lookup = config.clone();
    let multiple_attr = config.test_id_attribute.clone();
    let missing_attr = config.test_id_attribute.clone();
    build_queries(
        move |container: &Node, query: &TestIdQuery| query_all_by_test_id(&lookup, container, query),
        move |_, query: &TestIdQuery| {
            format!("Found multiple elements by: [{multiple_attr}=\"{}\"]", query.matcher)
        },
        move |_, query: &TestIdQuery| {
            format!("Unable to find an element by: [{missing_attr}=\"{}\"]", query.matcher)
        },
    )
    .with_config(config.clone())
}
