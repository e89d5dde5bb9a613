//! Text matching engine.
//!
//! A [`Matcher`] is a closed set of strategies evaluated against the text of a
//! node. Strings and regexes see normalized text; predicate functions see the
//! raw text and are responsible for their own normalization.
//!
//! ```
//! use probar_dom::{matches, MatcherOptions};
//!
//! assert!(matches("  Hello   World ", None, &"Hello World".into(), &MatcherOptions::default()));
//! assert!(matches("Hello World", None, &"hello".into(), &MatcherOptions::default().exact(false)));
//! ```

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::dom::Node;
use crate::result::{QueryError, QueryResult};

/// Predicate signature for [`Matcher::Function`]
pub type MatcherFn = Arc<dyn Fn(&str, Option<&Node>) -> bool + Send + Sync>;

/// What to look for in a node's text
#[derive(Clone)]
pub enum Matcher {
    /// Whole-string equality, or case-insensitive containment when not exact
    Text(String),
    /// Regular expression tested against the normalized text
    Regex(Regex),
    /// Custom predicate over `(raw text, node)`
    Function(MatcherFn),
}

impl Matcher {
    /// Wrap a predicate
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str, Option<&Node>) -> bool + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Rendering used inside error messages
impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Self::Function(_) => f.write_str("[function]"),
        }
    }
}

impl From<&str> for Matcher {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Matcher {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for Matcher {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl From<&Regex> for Matcher {
    fn from(regex: &Regex) -> Self {
        Self::Regex(regex.clone())
    }
}

/// Text normalization function
#[derive(Clone)]
pub struct Normalizer(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl Normalizer {
    /// Wrap a normalization function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// The identity normalizer
    #[must_use]
    pub fn identity() -> Self {
        Self::new(str::to_string)
    }

    /// Apply to `text`
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        (self.0)(text)
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Normalizer(..)")
    }
}

/// Trim and/or collapse whitespace
#[must_use]
pub fn normalize(text: &str, trim: bool, collapse_whitespace: bool) -> String {
    let trimmed = if trim { text.trim() } else { text };
    if !collapse_whitespace {
        return trimmed.to_string();
    }
    let mut out = String::with_capacity(trimmed.len());
    let mut in_space = false;
    for ch in trimmed.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// The built-in normalizer with the given flags
#[must_use]
pub fn default_normalizer(trim: bool, collapse_whitespace: bool) -> Normalizer {
    Normalizer::new(move |text| normalize(text, trim, collapse_whitespace))
}

/// Options controlling how text is compared
#[derive(Debug, Clone)]
pub struct MatcherOptions {
    exact: bool,
    trim: Option<bool>,
    collapse_whitespace: Option<bool>,
    normalizer: Option<Normalizer>,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            exact: true,
            trim: None,
            collapse_whitespace: None,
            normalizer: None,
        }
    }
}

impl MatcherOptions {
    /// Create default options (exact, trimmed, collapsed)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require whole-string, case-sensitive matches for string matchers
    #[must_use]
    pub const fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Strip leading and trailing whitespace before matching
    #[must_use]
    pub const fn trim(mut self, trim: bool) -> Self {
        self.trim = Some(trim);
        self
    }

    /// Collapse whitespace runs to a single space before matching
    #[must_use]
    pub const fn collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = Some(collapse);
        self
    }

    /// Replace the built-in normalization
    #[must_use]
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Whether string matchers must match exactly
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        self.exact
    }

    /// Effective trim flag
    #[must_use]
    pub fn trims(&self) -> bool {
        self.trim.unwrap_or(true)
    }

    /// Effective collapse flag
    #[must_use]
    pub fn collapses_whitespace(&self) -> bool {
        self.collapse_whitespace.unwrap_or(true)
    }

    /// Resolve the normalizer for one query call
    ///
    /// A custom normalizer cannot be combined with explicit `trim` or
    /// `collapse_whitespace` settings; wrap [`default_normalizer`] instead.
    pub fn make_normalizer(&self) -> QueryResult<Normalizer> {
        match &self.normalizer {
            Some(normalizer) => {
                if self.trim.is_some() || self.collapse_whitespace.is_some() {
                    return Err(QueryError::configuration(
                        "trim and collapse_whitespace are not supported with a normalizer. \
                         If you want to use the default trim and collapse_whitespace logic in \
                         your normalizer, use default_normalizer(trim, collapse_whitespace) \
                         and compose that into your normalizer",
                    ));
                }
                Ok(normalizer.clone())
            }
            None => Ok(default_normalizer(self.trims(), self.collapses_whitespace())),
        }
    }

    fn effective_normalizer(&self) -> Normalizer {
        self.normalizer
            .clone()
            .unwrap_or_else(|| default_normalizer(self.trims(), self.collapses_whitespace()))
    }
}

/// Evaluate `matcher` against `text`
///
/// String matchers compare exactly unless `options.exact(false)`, in which
/// case they test case-insensitive containment. Function matchers receive the
/// raw text and ignore every option.
#[must_use]
pub fn matches(
    text: &str,
    node: Option<&Node>,
    matcher: &Matcher,
    options: &MatcherOptions,
) -> bool {
    let normalizer = options.effective_normalizer();
    if options.exact {
        matches_with(text, node, matcher, &normalizer)
    } else {
        fuzzy_matches_with(text, node, matcher, &normalizer)
    }
}

/// Like [`matches`], but strings always use case-insensitive containment
#[must_use]
pub fn fuzzy_matches(
    text: &str,
    node: Option<&Node>,
    matcher: &Matcher,
    options: &MatcherOptions,
) -> bool {
    fuzzy_matches_with(text, node, matcher, &options.effective_normalizer())
}

/// Exact-mode evaluation with a resolved normalizer
pub(crate) fn matches_with(
    text: &str,
    node: Option<&Node>,
    matcher: &Matcher,
    normalizer: &Normalizer,
) -> bool {
    match matcher {
        Matcher::Text(expected) => normalizer.normalize(text) == *expected,
        Matcher::Regex(regex) => regex.is_match(&normalizer.normalize(text)),
        Matcher::Function(f) => f(text, node),
    }
}

/// Fuzzy-mode evaluation with a resolved normalizer
pub(crate) fn fuzzy_matches_with(
    text: &str,
    node: Option<&Node>,
    matcher: &Matcher,
    normalizer: &Normalizer,
) -> bool {
    match matcher {
        Matcher::Text(expected) => normalizer
            .normalize(text)
            .to_lowercase()
            .contains(&expected.to_lowercase()),
        Matcher::Regex(regex) => regex.is_match(&normalizer.normalize(text)),
        Matcher::Function(f) => f(text, node),
    }
}

/// Pick exact or fuzzy evaluation once per query call
pub(crate) fn text_match_fn(
    exact: bool,
) -> fn(&str, Option<&Node>, &Matcher, &Normalizer) -> bool {
    if exact {
        matches_with
    } else {
        fuzzy_matches_with
    }
}
