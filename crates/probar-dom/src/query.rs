//! Query families built from a single `query_all` primitive.
//!
//! | variant        | 0 matches        | 1 match   | many matches     |
//! |----------------|------------------|-----------|------------------|
//! | `query_by`     | `None`           | the match | multiple error   |
//! | `query_all_by` | `[]`             | `[match]` | all              |
//! | `get_by`       | missing error    | the match | multiple error   |
//! | `get_all_by`   | missing error    | `[match]` | all              |
//! | `find_by`      | retry `get_by` until found or timeout        |||
//! | `find_all_by`  | retry `get_all_by` until found or timeout    |||
//!
//! Every variant is computed from the output of `query_all_by`; none of them
//! traverses the document on its own.

use std::fmt;
use std::sync::Arc;

use crate::config::{get_config, Config};
use crate::dom::Node;
use crate::pretty::{pretty_dom, PrettyDomOptions};
use crate::result::{QueryError, QueryResult};
use crate::wait::{wait_for, WaitOptions};

/// Seed primitive of a family
pub type QueryAllFn<A> = Arc<dyn Fn(&Node, &A) -> QueryResult<Vec<Node>> + Send + Sync>;

/// Builds the message of a cardinality error
pub type ErrorMessageFn<A> = Arc<dyn Fn(&Node, &A) -> String + Send + Sync>;

/// Join a message with the pretty-printed container
#[must_use]
pub fn get_element_error(message: &str, container: &Node, config: &Config) -> String {
    let snapshot = pretty_dom(container, &PrettyDomOptions::from_config(config));
    [message, snapshot.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Error for zero matches, with the container snapshot appended
#[must_use]
pub fn missing_element_error(message: &str, container: &Node, config: &Config) -> QueryError {
    QueryError::MissingElement {
        message: get_element_error(message, container, config),
    }
}

/// Error for more than one match, with the `*AllBy*` hint and snapshot appended
#[must_use]
pub fn multiple_elements_error(message: &str, container: &Node, config: &Config) -> QueryError {
    let message = format!(
        "{message}\n\n(If this is intentional, then use the `*AllBy*` variant of the query \
         (like `query_all_by_text`, `get_all_by_text`, or `find_all_by_text`))."
    );
    QueryError::MultipleElements {
        message: get_element_error(&message, container, config),
    }
}

/// The six derived queries of one kind of lookup
pub struct QueryFamily<A> {
    query_all: QueryAllFn<A>,
    multiple_message: ErrorMessageFn<A>,
    missing_message: ErrorMessageFn<A>,
    config: Config,
}

impl<A> Clone for QueryFamily<A> {
    fn clone(&self) -> Self {
        Self {
            query_all: Arc::clone(&self.query_all),
            multiple_message: Arc::clone(&self.multiple_message),
            missing_message: Arc::clone(&self.missing_message),
            config: self.config.clone(),
        }
    }
}

impl<A> fmt::Debug for QueryFamily<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryFamily")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Derive a [`QueryFamily`] from a `query_all` primitive and two message builders
///
/// The family snapshots the process-wide config; use
/// [`QueryFamily::with_config`] to supply one explicitly.
///
/// ```
/// use probar_dom::{build_queries, Document, Node, QueryResult};
///
/// fn query_all_by_tag(container: &Node, tag: &String) -> QueryResult<Vec<Node>> {
///     container.query_selector_all(tag)
/// }
///
/// let by_tag = build_queries(
///     query_all_by_tag,
///     |_, tag: &String| format!("Found multiple <{tag}> elements"),
///     |_, tag: &String| format!("Unable to find a <{tag}> element"),
/// );
/// let doc = Document::parse("<p>one</p><p>two</p><h1>title</h1>");
/// assert!(by_tag.get_by(&doc.body(), &"h1".to_string()).is_ok());
/// assert!(by_tag.get_by(&doc.body(), &"p".to_string()).unwrap_err().is_multiple());
/// ```
pub fn build_queries<A, Q, M, N>(
    query_all: Q,
    get_multiple_error: M,
    get_missing_error: N,
) -> QueryFamily<A>
where
    Q: Fn(&Node, &A) -> QueryResult<Vec<Node>> + Send + Sync + 'static,
    M: Fn(&Node, &A) -> String + Send + Sync + 'static,
    N: Fn(&Node, &A) -> String + Send + Sync + 'static,
{
    QueryFamily {
        query_all: Arc::new(query_all),
        multiple_message: Arc::new(get_multiple_error),
        missing_message: Arc::new(get_missing_error),
        config: get_config(),
    }
}

impl<A> QueryFamily<A> {
    /// Use `config` for snapshots and async defaults
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Config in effect for this family
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Every match, in tree order
    pub fn query_all_by(&self, container: &Node, args: &A) -> QueryResult<Vec<Node>> {
        (self.query_all)(container, args)
    }

    /// The single match, `None` when nothing matches
    pub fn query_by(&self, container: &Node, args: &A) -> QueryResult<Option<Node>> {
        let mut matches = self.query_all_by(container, args)?;
        if matches.len() > 1 {
            return Err(self.multiple(container, args, matches.len()));
        }
        Ok(matches.pop())
    }

    /// Every match; fails when nothing matches
    pub fn get_all_by(&self, container: &Node, args: &A) -> QueryResult<Vec<Node>> {
        let matches = self.query_all_by(container, args)?;
        if matches.is_empty() {
            return Err(self.missing(container, args));
        }
        Ok(matches)
    }

    /// The single match; fails on zero or several
    pub fn get_by(&self, container: &Node, args: &A) -> QueryResult<Node> {
        let mut matches = self.query_all_by(container, args)?;
        match matches.len() {
            0 => Err(self.missing(container, args)),
            1 => Ok(matches.remove(0)),
            count => Err(self.multiple(container, args, count)),
        }
    }

    /// Retry [`Self::get_all_by`] until it succeeds or the config timeout passes
    pub async fn find_all_by(&self, container: &Node, args: &A) -> QueryResult<Vec<Node>> {
        self.find_all_by_with_options(container, args, &WaitOptions::from_config(&self.config))
            .await
    }

    /// Retry [`Self::get_by`] until it succeeds or the config timeout passes
    pub async fn find_by(&self, container: &Node, args: &A) -> QueryResult<Node> {
        self.find_by_with_options(container, args, &WaitOptions::from_config(&self.config))
            .await
    }

    /// [`Self::find_all_by`] with explicit wait options
    pub async fn find_all_by_with_options(
        &self,
        container: &Node,
        args: &A,
        options: &WaitOptions,
    ) -> QueryResult<Vec<Node>> {
        wait_for(container, || self.get_all_by(container, args), options).await
    }

    /// [`Self::find_by`] with explicit wait options
    pub async fn find_by_with_options(
        &self,
        container: &Node,
        args: &A,
        options: &WaitOptions,
    ) -> QueryResult<Node> {
        wait_for(container, || self.get_by(container, args), options).await
    }

    fn missing(&self, container: &Node, args: &A) -> QueryError {
        let message = (self.missing_message)(container, args);
        tracing::debug!(%message, "query found no elements");
        missing_element_error(&message, container, &self.config)
    }

    fn multiple(&self, container: &Node, args: &A, count: usize) -> QueryError {
        let message = (self.multiple_message)(container, args);
        tracing::debug!(%message, count, "query found multiple elements");
        multiple_elements_error(&message, container, &self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use std::time::Duration;

    fn by_class() -> QueryFamily<String> {
        build_queries(
            |container: &Node, class: &String| container.query_selector_all(&format!(".{class}")),
            |_, class: &String| format!("Found multiple elements with class {class}"),
            |_, class: &String| format!("Unable to find an element with class {class}"),
        )
        .with_config(Config::default())
    }

    fn doc() -> Document {
        Document::parse("<p class=\"one\">a</p><p class=\"two\">b</p><p class=\"two\">c</p>")
    }

    mod cardinality_tests {
        use super::*;

        #[test]
        fn test_zero_matches() {
            let doc = doc();
            let family = by_class();
            let body = doc.body();
            let args = "none".to_string();
            assert!(family.query_all_by(&body, &args).unwrap().is_empty());
            assert!(family.query_by(&body, &args).unwrap().is_none());
            assert!(family.get_by(&body, &args).unwrap_err().is_missing());
            assert!(family.get_all_by(&body, &args).unwrap_err().is_missing());
        }

        #[test]
        fn test_one_match() {
            let doc = doc();
            let family = by_class();
            let body = doc.body();
            let args = "one".to_string();
            let all = family.query_all_by(&body, &args).unwrap();
            let queried = family.query_by(&body, &args).unwrap().unwrap();
            let got = family.get_by(&body, &args).unwrap();
            assert_eq!(queried, got);
            assert_eq!(got, all[0]);
            assert_eq!(family.get_all_by(&body, &args).unwrap(), vec![got]);
        }

        #[test]
        fn test_many_matches() {
            let doc = doc();
            let family = by_class();
            let body = doc.body();
            let args = "two".to_string();
            assert_eq!(family.get_all_by(&body, &args).unwrap().len(), 2);
            assert!(family.query_by(&body, &args).unwrap_err().is_multiple());
            assert!(family.get_by(&body, &args).unwrap_err().is_multiple());
        }
    }

    mod message_tests {
        use super::*;

        #[test]
        fn test_missing_message_has_snapshot() {
            let doc = doc();
            let err = by_class().get_by(&doc.body(), &"none".to_string()).unwrap_err();
            let message = err.to_string();
            assert!(message.starts_with("Unable to find an element with class none\n\n<body>"));
            assert!(message.contains("class=\"two\""));
        }

        #[test]
        fn test_multiple_message_has_hint_then_snapshot() {
            let doc = doc();
            let err = by_class().get_by(&doc.body(), &"two".to_string()).unwrap_err();
            let message = err.to_string();
            let hint = message.find("use the `*AllBy*` variant").unwrap();
            let snapshot = message.find("<body>").unwrap();
            assert!(message.starts_with("Found multiple elements with class two"));
            assert!(hint < snapshot);
        }

        #[test]
        fn test_snapshot_respects_print_limit() {
            let doc = doc();
            let family = by_class().with_config(Config::default().with_debug_print_limit(5));
            let message = family
                .get_by(&doc.body(), &"none".to_string())
                .unwrap_err()
                .to_string();
            assert!(message.ends_with("\n\n<body..."));
        }

        #[test]
        fn test_empty_message_is_only_snapshot() {
            let doc = Document::new();
            assert_eq!(
                get_element_error("", &doc.body(), &Config::default()),
                "<body />"
            );
        }
    }

    mod async_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_find_by_resolves_when_inserted() {
            let doc = Document::new();
            let writer = doc.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                writer.body().set_inner_html("<b class=\"late\">x</b>").unwrap();
            });
            let found = by_class()
                .find_by(&doc.body(), &"late".to_string())
                .await
                .unwrap();
            assert_eq!(found.tag_name().unwrap(), "b");
        }

        #[tokio::test(start_paused = true)]
        async fn test_find_all_by_times_out_with_missing_message() {
            let doc = Document::new();
            let options = WaitOptions::default().with_timeout(200);
            let err = by_class()
                .find_all_by_with_options(&doc.body(), &"never".to_string(), &options)
                .await
                .unwrap_err();
            assert!(err.is_timeout());
            assert!(err
                .to_string()
                .starts_with("Unable to find an element with class never"));
        }
    }
}
