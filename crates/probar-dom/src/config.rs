//! Query configuration.
//!
//! A [`Config`] value is threaded into every query family when it is built.
//! The process-wide default lives behind a lock: [`configure_test_id_attribute`]
//! and [`configure`] write it (last write wins), [`get_config`] snapshots it,
//! and [`ConfigGuard`] overrides it for a scope and restores it on drop.

use std::marker::PhantomData;
use std::sync::{Condvar, Mutex, OnceLock, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::MutationObserverInit;
use crate::result::QueryResult;

/// Default test id attribute
pub const DEFAULT_TEST_ID_ATTRIBUTE: &str = "data-testid";

/// Default timeout for async queries (1 second)
pub const DEFAULT_ASYNC_TIMEOUT_MS: u64 = 1000;

/// Default polling interval for async queries (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default length limit for markup snapshots in error messages
pub const DEFAULT_DEBUG_PRINT_LIMIT: usize = 7000;

/// Elements skipped by text queries and snapshots
pub const DEFAULT_IGNORE: &str = "script, style";

/// Environment variable overriding [`Config::debug_print_limit`]
pub const DEBUG_PRINT_LIMIT_ENV: &str = "DEBUG_PRINT_LIMIT";

/// Configuration shared by every query family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute read by the test id queries
    pub test_id_attribute: String,
    /// Deadline for `find_by*` queries and `wait_for`, in milliseconds
    pub async_util_timeout_ms: u64,
    /// Fallback polling interval for async queries, in milliseconds
    pub poll_interval_ms: u64,
    /// Which mutations wake async queries
    pub mutation_observer: MutationObserverInit,
    /// Maximum characters of markup appended to error messages
    pub debug_print_limit: usize,
    /// Selector for elements text queries never match
    pub default_ignore: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
            async_util_timeout_ms: DEFAULT_ASYNC_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            mutation_observer: MutationObserverInit::default(),
            debug_print_limit: DEFAULT_DEBUG_PRINT_LIMIT,
            default_ignore: DEFAULT_IGNORE.to_string(),
        }
    }
}

impl Config {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `DEBUG_PRINT_LIMIT` applied when set to a number
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(DEBUG_PRINT_LIMIT_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => config.debug_print_limit = limit,
                Err(_) => tracing::warn!(value = %raw, "ignoring non-numeric {DEBUG_PRINT_LIMIT_ENV}"),
            }
        }
        config
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> QueryResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> QueryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the test id attribute
    #[must_use]
    pub fn with_test_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.test_id_attribute = attribute.into();
        self
    }

    /// Set the async timeout in milliseconds
    #[must_use]
    pub const fn with_async_util_timeout(mut self, timeout_ms: u64) -> Self {
        self.async_util_timeout_ms = timeout_ms;
        self
    }

    /// Set the polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    /// Set the observer options used by async queries
    #[must_use]
    pub const fn with_mutation_observer(mut self, init: MutationObserverInit) -> Self {
        self.mutation_observer = init;
        self
    }

    /// Set the snapshot length limit
    #[must_use]
    pub const fn with_debug_print_limit(mut self, limit: usize) -> Self {
        self.debug_print_limit = limit;
        self
    }

    /// Set the selector ignored by text queries
    #[must_use]
    pub fn with_default_ignore(mut self, selector: impl Into<String>) -> Self {
        self.default_ignore = selector.into();
        self
    }

    /// Async timeout as a duration
    #[must_use]
    pub const fn async_util_timeout(&self) -> Duration {
        Duration::from_millis(self.async_util_timeout_ms)
    }

    /// Polling interval as a duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn global() -> &'static RwLock<Config> {
    static GLOBAL: OnceLock<RwLock<Config>> = OnceLock::new();
    GLOBAL.get_or_init(|| RwLock::new(Config::from_env()))
}

/// Thread currently holding scoped overrides, and how many
#[derive(Debug)]
struct OverrideOwner {
    thread: Option<ThreadId>,
    depth: usize,
}

/// Guards from one thread nest; guards from other threads wait their turn
static OVERRIDE_OWNER: Mutex<OverrideOwner> = Mutex::new(OverrideOwner {
    thread: None,
    depth: 0,
});
static OVERRIDE_RELEASED: Condvar = Condvar::new();

/// Block until this thread owns the overrides, returning the new depth
fn enter_override() -> usize {
    let me = thread::current().id();
    // A panicking test must not wedge every later override
    let mut owner = OVERRIDE_OWNER.lock().unwrap_or_else(PoisonError::into_inner);
    while owner.thread.is_some_and(|thread| thread != me) {
        owner = OVERRIDE_RELEASED
            .wait(owner)
            .unwrap_or_else(PoisonError::into_inner);
    }
    owner.thread = Some(me);
    owner.depth += 1;
    owner.depth
}

fn leave_override(depth: usize) {
    let mut owner = OVERRIDE_OWNER.lock().unwrap_or_else(PoisonError::into_inner);
    if owner.depth != depth {
        tracing::warn!(
            expected = owner.depth,
            actual = depth,
            "config guards dropped out of order"
        );
    }
    owner.depth = owner.depth.saturating_sub(1);
    if owner.depth == 0 {
        owner.thread = None;
        OVERRIDE_RELEASED.notify_all();
    }
}

/// Snapshot of the process-wide config
#[must_use]
pub fn get_config() -> Config {
    global().read().expect("config lock poisoned").clone()
}

/// Update the process-wide config
pub fn configure(update: impl FnOnce(&mut Config)) {
    let mut config = global().write().expect("config lock poisoned");
    update(&mut config);
    tracing::debug!(test_id_attribute = %config.test_id_attribute, "configuration updated");
}

/// Set the attribute used by test id queries process-wide
pub fn configure_test_id_attribute(attribute: impl Into<String>) {
    let attribute = attribute.into();
    configure(|config| config.test_id_attribute = attribute);
}

/// The attribute currently used by test id queries
#[must_use]
pub fn test_id_attribute() -> String {
    global()
        .read()
        .expect("config lock poisoned")
        .test_id_attribute
        .clone()
}

/// Scoped override of the process-wide config
///
/// While a guard is alive, guards acquired on other threads block. Guards
/// acquired on the same thread nest, and each one restores the config it
/// replaced when dropped, so inner scopes unwind in reverse order.
///
/// ```
/// use probar_dom::config::{test_id_attribute, ConfigGuard};
///
/// {
///     let _outer = ConfigGuard::acquire(|c| c.test_id_attribute = "qa-id".into());
///     {
///         let _inner = ConfigGuard::acquire(|c| c.test_id_attribute = "data-cy".into());
///         assert_eq!(test_id_attribute(), "data-cy");
///     }
///     assert_eq!(test_id_attribute(), "qa-id");
/// }
/// assert_eq!(test_id_attribute(), "data-testid");
/// ```
#[derive(Debug)]
pub struct ConfigGuard {
    previous: Option<Config>,
    depth: usize,
    // Ownership is per thread, so the guard stays on the thread that took it
    _not_send: PhantomData<*const ()>,
}

impl ConfigGuard {
    /// Apply `update` until the guard is dropped
    pub fn acquire(update: impl FnOnce(&mut Config)) -> Self {
        let depth = enter_override();
        let previous = get_config();
        configure(update);
        Self {
            previous: Some(previous),
            depth,
            _not_send: PhantomData,
        }
    }

    /// The config that will be restored
    #[must_use]
    pub fn previous(&self) -> Option<&Config> {
        self.previous.as_ref()
    }

    /// Nesting level on this thread, starting at 1 for the outermost guard
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            let mut config = global().write().unwrap_or_else(PoisonError::into_inner);
            *config = previous;
        }
        leave_override(self.depth);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.test_id_attribute, "data-testid");
        assert_eq!(config.async_util_timeout(), Duration::from_millis(1000));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.debug_print_limit, 7000);
        assert_eq!(config.default_ignore, "script, style");
    }

    #[test]
    fn test_builders() {
        let config = Config::new()
            .with_test_id_attribute("qa-id")
            .with_async_util_timeout(250)
            .with_poll_interval(10)
            .with_debug_print_limit(100)
            .with_default_ignore("script");
        assert_eq!(config.test_id_attribute, "qa-id");
        assert_eq!(config.async_util_timeout_ms, 250);
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.debug_print_limit, 100);
        assert_eq!(config.default_ignore, "script");
    }

    #[test]
    fn test_json_partial_fields_use_defaults() {
        let config = Config::from_json(r#"{"test_id_attribute": "data-qa"}"#).unwrap();
        assert_eq!(config.test_id_attribute, "data-qa");
        assert_eq!(config.async_util_timeout_ms, DEFAULT_ASYNC_TIMEOUT_MS);
    }

    #[test]
    fn test_json_round_trip() {
        let config = Config::default().with_poll_interval(5);
        let parsed = Config::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_json() {
        assert!(Config::from_json("{not json").is_err());
    }
}
