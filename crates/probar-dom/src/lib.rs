//! Probar DOM: testing-library style queries over an in-memory document
//!
//! Find elements the way a user would, by role, label, text, placeholder,
//! alt text, title, display value or test id. Each kind of lookup is one
//! `query_all` primitive expanded into six variants with uniform
//! cardinality rules and error messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     PROBAR DOM Architecture                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ queries::* │    │ query      │    │ wait       │            │
//! │   │ query_all  │───►│ build_     │───►│ observer + │            │
//! │   │ + messages │    │ queries    │    │ interval   │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │         │                 │                 │                   │
//! │         ▼                 ▼                 ▼                   │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ matches    │    │ pretty     │    │ dom        │            │
//! │   │ Matcher    │    │ snapshots  │    │ Document + │            │
//! │   │ normalize  │    │ in errors  │    │ mutations  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use probar_dom::prelude::*;
//!
//! let doc = Document::parse(
//!     "<label for=\"email\">Email</label><input id=\"email\"><button>Send</button>",
//! );
//! let page = within(&doc.body());
//!
//! let input = page.get_by_label_text("Email").unwrap();
//! assert_eq!(page.get_by_role("textbox").unwrap(), input);
//! assert!(page.query_by_text("Cancel").unwrap().is_none());
//! assert!(page.get_by_text("Cancel").unwrap_err().is_missing());
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod dom;
pub mod matches;
pub mod pretty;
pub mod queries;
pub mod query;
mod result;
pub mod screen;
pub mod wait;

pub use config::{
    configure, configure_test_id_attribute, get_config, test_id_attribute, Config, ConfigGuard,
};
pub use dom::{
    Document, MutationKind, MutationObserver, MutationObserverInit, MutationRecord, Node, NodeId,
    NodeKind, Selector,
};
pub use matches::{
    default_normalizer, fuzzy_matches, matches, normalize, Matcher, MatcherFn, MatcherOptions,
    Normalizer,
};
pub use pretty::{log_dom, pretty_dom, pretty_element, PrettyDomOptions};
pub use queries::role::{accessible_name, get_roles, is_inaccessible, log_roles, pretty_roles};
pub use queries::{
    query_all_by_attribute, AltTextQuery, DisplayValueQuery, LabelTextQuery, MatchQuery,
    PlaceholderQuery, RoleQuery, TestIdQuery, TextQuery, TitleQuery,
};
pub use query::{build_queries, get_element_error, QueryFamily};
pub use result::{QueryError, QueryResult};
pub use screen::{
    clear_default_document, default_document, screen, set_default_document, within,
    within_with_config, Queries,
};
pub use wait::{wait_for, wait_for_element_to_be_removed, WaitOptions};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::config::{configure_test_id_attribute, Config, ConfigGuard};
    pub use super::dom::{Document, Node};
    pub use super::matches::{Matcher, MatcherOptions};
    pub use super::queries::{LabelTextQuery, MatchQuery, RoleQuery, TextQuery};
    pub use super::result::{QueryError, QueryResult};
    pub use super::screen::{screen, set_default_document, within, Queries};
    pub use super::wait::{wait_for, WaitOptions};
}
