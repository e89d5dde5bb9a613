//! Queries by the text an element renders itself.
//!
//! Only an element's own text nodes count, so `<p>Hello <b>world</b></p>`
//! has the text `Hello` for `<p>` and `world` for `<b>`.

use regex::Regex;

use super::MatchQuery;
use crate::config::Config;
use crate::dom::{Node, Selector};
use crate::matches::{Matcher, MatcherOptions};
use crate::query::{build_queries, QueryFamily};
use crate::result::QueryResult;

/// Arguments of the text queries
#[derive(Debug, Clone)]
pub struct TextQuery {
    /// What to look for
    pub matcher: Matcher,
    /// How to compare
    pub options: MatcherOptions,
    /// Candidate elements (default `*`)
    pub selector: String,
    /// Elements never matched; `None` uses [`Config::default_ignore`], an
    /// empty string ignores nothing
    pub ignore: Option<String>,
}

impl TextQuery {
    /// Match `matcher` against any element
    pub fn new(matcher: impl Into<Matcher>) -> Self {
        Self {
            matcher: matcher.into(),
            options: MatcherOptions::default(),
            selector: "*".to_string(),
            ignore: None,
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

    /// Restrict candidates to elements matching `selector`
    #[must_use]
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Skip elements matching `selector` instead of the configured default
    #[must_use]
    pub fn ignore(mut self, selector: impl Into<String>) -> Self {
        self.ignore = Some(selector.into());
        self
    }

    /// Consider every element, including `script` and `style`
    #[must_use]
    pub fn no_ignore(mut self) -> Self {
        self.ignore = Some(String::new());
        self
    }

    fn as_match(&self) -> MatchQuery {
        MatchQuery {
            matcher: self.matcher.clone(),
            options: self.options.clone(),
        }
    }
}

impl From<&str> for TextQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for TextQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<Regex> for TextQuery {
    fn from(regex: Regex) -> Self {
        Self::new(regex)
    }
}

impl From<Matcher> for TextQuery {
    fn from(matcher: Matcher) -> Self {
        Self::new(matcher)
    }
}

impl From<MatchQuery> for TextQuery {
    fn from(query: MatchQuery) -> Self {
        Self::new(query.matcher).with_options(query.options)
    }
}

/// Elements whose own text matches, the container included
pub fn query_all_by_text(
    config: &Config,
    container: &Node,
    query: &TextQuery,
) -> QueryResult<Vec<Node>> {
    let selector = Selector::parse(&query.selector)?;
    let ignore_source = query.ignore.as_deref().unwrap_or(&config.default_ignore);
    let ignore = if ignore_source.trim().is_empty() {
        None
    } else {
        Some(Selector::parse(ignore_source)?)
    };

    let mut candidates = Vec::new();
    if selector.is_match(container) {
        candidates.push(container.clone());
    }
    candidates.extend(
        container
            .descendants()
            .into_iter()
            .filter(|node| selector.is_match(node)),
    );

    let matcher = query.as_match();
    let test = matcher.tester()?;
    Ok(candidates
        .into_iter()
        .filter(|node| !ignore.as_ref().is_some_and(|ignore| ignore.is_match(node)))
        .filter(|node| test(node.node_text().as_str(), node))
        .collect())
}

fn missing_message(query: &TextQuery) -> String {
    let raw = query.matcher.to_string();
    let shown = match (&query.matcher, query.options.make_normalizer()) {
        (Matcher::Text(text), Ok(normalizer)) => {
            let normalized = normalizer.normalize(text);
            if normalized == *text {
                raw
            } else {
                format!("{normalized} (normalized from '{raw}')")
            }
        }
        _ => raw,
    };
    let selector_hint = if query.selector == "*" {
        String::new()
    } else {
        format!(", which matches selector '{}'", query.selector)
    };
    format!(
        "Unable to find an element with the text: {shown}{selector_hint}. This could be because \
         the text is broken up by multiple elements. In this case, you can provide a function \
         for your text matcher to make your matcher more flexible."
    )
}

/// The text query family for `config`
#[must_use]
pub fn family(config: &Config) -> QueryFamily<TextQuery> {
    let lookup = config.clone();
    build_queries(
        move |container: &Node, query: &TextQuery| query_all_by_text(&lookup, container, query),
        |_, query: &TextQuery| format!("Found multiple elements with the text: {}", query.matcher),
        |_, query: &TextQuery| missing_message(query),
    )
    .with_config(config.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn get_all(html: &str, query: TextQuery) -> Vec<Node> {
        let doc = Document::parse(html);
        family(&Config::default())
            .query_all_by(&doc.body(), &query)
            .unwrap()
    }

    mod matching_tests {
        use super::*;

        #[test]
        fn test_own_text_only() {
            let found = get_all("<p>Hello <b>world</b></p>", "world".into());
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].tag_name().unwrap(), "b");
            assert!(get_all("<p>Hello <b>world</b></p>", "Hello world".into()).is_empty());
        }

        #[test]
        fn test_whitespace_is_normalized() {
            let found = get_all("<p>\n   Hello\n   there  </p>", "Hello there".into());
            assert_eq!(found.len(), 1);
        }

        #[test]
        fn test_fuzzy() {
            let found = get_all("<p>Hello World</p>", TextQuery::new("hello").exact(false));
            assert_eq!(found.len(), 1);
        }

        #[test]
        fn test_script_and_style_ignored_by_default() {
            let html = "<script>secret</script><p>secret</p>";
            assert_eq!(get_all(html, "secret".into()).len(), 1);
            assert_eq!(get_all(html, TextQuery::new("secret").no_ignore()).len(), 2);
        }

        #[test]
        fn test_selector_narrows_candidates() {
            let html = "<label>Name</label><span>Name</span>";
            let found = get_all(html, TextQuery::new("Name").selector("span"));
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].tag_name().unwrap(), "span");
        }

        #[test]
        fn test_container_itself_is_candidate() {
            let doc = Document::parse("<button>Go</button>");
            let button = doc.body().query_selector("button").unwrap().unwrap();
            let found = family(&Config::default())
                .get_by(&button, &"Go".into())
                .unwrap();
            assert_eq!(found, button);
        }

        #[test]
        fn test_submit_input_value_is_text() {
            let found = get_all("<input type=\"submit\" value=\"Send\">", "Send".into());
            assert_eq!(found.len(), 1);
        }

        #[test]
        fn test_function_matcher_receives_raw_text() {
            let found = get_all(
                "<p>  padded  </p>",
                Matcher::function(|text, _| text == "  padded  ").into(),
            );
            assert_eq!(found.len(), 1);
        }
    }

    mod message_tests {
        use super::*;

        #[test]
        fn test_missing_message() {
            let doc = Document::new();
            let err = family(&Config::default())
                .get_by(&doc.body(), &"Nope".into())
                .unwrap_err();
            assert!(err.to_string().starts_with(
                "Unable to find an element with the text: Nope. This could be because the text \
                 is broken up by multiple elements."
            ));
        }

        #[test]
        fn test_missing_message_mentions_normalization_and_selector() {
            let message = missing_message(&TextQuery::new("  Nope ").selector("p"));
            assert!(message.starts_with(
                "Unable to find an element with the text: Nope (normalized from '  Nope '), \
                 which matches selector 'p'."
            ));
        }

        #[test]
        fn test_multiple_message() {
            let doc = Document::parse("<p>x</p><p>x</p>");
            let err = family(&Config::default())
                .get_by(&doc.body(), &"x".into())
                .unwrap_err();
            assert!(err
                .to_string()
                .starts_with("Found multiple elements with the text: x"));
        }
    }
}
