//! Async retry for queries.
//!
//! [`wait_for`] runs a callback until it succeeds, waking on mutations of the
//! container subtree and on a polling interval, and gives up at a deadline.
//!
//! ```text
//!  Idle ──attempt ok──────────────────────────────▶ Settled(Success)
//!   │
//!   └─attempt failed─▶ Observing ──mutation/tick─▶ attempt again
//!                          │
//!                          ├─deadline──────────────▶ Settled(Timeout)
//!                          └─container detached────▶ Settled(Failed)
//! ```
//!
//! The observer and both timers live inside the `Observing` state, so every
//! transition out of it (or dropping the future) tears them down together.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::config::{get_config, Config};
use crate::dom::{MutationObserver, MutationObserverInit, Node};
use crate::result::{QueryError, QueryResult};

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Maps the final error of a timed-out wait
pub type TimeoutHook = Arc<dyn Fn(QueryError) -> QueryError + Send + Sync>;

/// Options for [`wait_for`] and the `find_by*` queries
#[derive(Clone)]
pub struct WaitOptions {
    /// Deadline in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub interval_ms: u64,
    /// Mutations that trigger a retry
    pub mutation_observer: MutationObserverInit,
    /// Applied to the error when the deadline passes
    pub on_timeout: Option<TimeoutHook>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("timeout_ms", &self.timeout_ms)
            .field("interval_ms", &self.interval_ms)
            .field("mutation_observer", &self.mutation_observer)
            .field("on_timeout", &self.on_timeout.is_some())
            .finish()
    }
}

impl WaitOptions {
    /// Options from the process-wide config
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&get_config())
    }

    /// Options from a config value
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout_ms: config.async_util_timeout_ms,
            interval_ms: config.poll_interval_ms,
            mutation_observer: config.mutation_observer,
            on_timeout: None,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set which mutations trigger a retry
    #[must_use]
    pub const fn with_mutation_observer(mut self, init: MutationObserverInit) -> Self {
        self.mutation_observer = init;
        self
    }

    /// Map the timeout error before it is returned
    #[must_use]
    pub fn with_on_timeout<F>(mut self, hook: F) -> Self
    where
        F: Fn(QueryError) -> QueryError + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(hook));
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration (never zero)
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

enum Outcome<T> {
    Success(T),
    Timeout(QueryError),
    Failed(QueryError),
}

/// Resources held while a wait is in flight
struct Watch {
    observer: MutationObserver,
    interval: Interval,
    deadline: Pin<Box<Sleep>>,
    started: Instant,
    attempts: u32,
    last_error: QueryError,
}

impl Watch {
    fn start(container: &Node, options: &WaitOptions, started: Instant, last_error: QueryError) -> Self {
        let period = options.interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            observer: MutationObserver::observe(container, options.mutation_observer),
            interval,
            deadline: Box::pin(tokio::time::sleep_until(started + options.timeout())),
            started,
            attempts: 1,
            last_error,
        }
    }
}

enum WaitState<T> {
    Idle,
    Observing(Watch),
    Settled(Outcome<T>),
}

#[derive(Debug, Clone, Copy)]
enum Wake {
    Deadline,
    Tick,
    Mutation,
}

/// Errors that retrying cannot fix
const fn is_fatal(error: &QueryError) -> bool {
    matches!(
        error,
        QueryError::Configuration { .. }
            | QueryError::InvalidSelector { .. }
            | QueryError::DetachedContainer { .. }
    )
}

/// Run `callback` until it returns `Ok`, a fatal error, or the deadline passes
///
/// On timeout the error is [`QueryError::Timeout`] carrying the message of the
/// last failed attempt, passed through `options.on_timeout` when set. A
/// container that was attached when the wait began and later leaves the
/// document ends the wait with [`QueryError::DetachedContainer`].
pub async fn wait_for<T, F>(container: &Node, mut callback: F, options: &WaitOptions) -> QueryResult<T>
where
    F: FnMut() -> QueryResult<T>,
{
    let started = Instant::now();
    let was_connected = container.is_connected();
    let mut state = WaitState::Idle;

    loop {
        state = match state {
            WaitState::Idle => match callback() {
                Ok(value) => WaitState::Settled(Outcome::Success(value)),
                Err(error) if is_fatal(&error) => WaitState::Settled(Outcome::Failed(error)),
                Err(error) => {
                    tracing::debug!(timeout_ms = options.timeout_ms, "wait_for observing");
                    WaitState::Observing(Watch::start(container, options, started, error))
                }
            },
            WaitState::Observing(mut watch) => {
                let wake = tokio::select! {
                    biased;
                    () = &mut watch.deadline => Wake::Deadline,
                    _ = watch.interval.tick() => Wake::Tick,
                    _ = watch.observer.recv() => Wake::Mutation,
                };
                if let Wake::Deadline = wake {
                    WaitState::Settled(Outcome::Timeout(watch.last_error))
                } else if was_connected && !container.is_connected() {
                    WaitState::Settled(Outcome::Failed(QueryError::DetachedContainer {
                        message: "the container was removed from the document while waiting"
                            .to_string(),
                    }))
                } else {
                    watch.attempts += 1;
                    tracing::trace!(?wake, attempt = watch.attempts, "wait_for retry");
                    match callback() {
                        Ok(value) => {
                            tracing::debug!(
                                attempts = watch.attempts,
                                elapsed_ms = watch.started.elapsed().as_millis() as u64,
                                "wait_for settled"
                            );
                            WaitState::Settled(Outcome::Success(value))
                        }
                        Err(error) if is_fatal(&error) => WaitState::Settled(Outcome::Failed(error)),
                        Err(error) => {
                            watch.last_error = error;
                            WaitState::Observing(watch)
                        }
                    }
                }
            }
            WaitState::Settled(Outcome::Success(value)) => return Ok(value),
            WaitState::Settled(Outcome::Failed(error)) => {
                tracing::debug!(%error, "wait_for failed");
                return Err(error);
            }
            WaitState::Settled(Outcome::Timeout(last_error)) => {
                tracing::debug!(timeout_ms = options.timeout_ms, "wait_for timed out");
                let error = QueryError::Timeout {
                    ms: options.timeout_ms,
                    message: last_error.to_string(),
                };
                return Err(match &options.on_timeout {
                    Some(hook) => hook(error),
                    None => error,
                });
            }
        };
    }
}

/// Wait until every node returned by `callback` has left the document
///
/// The nodes must be present when the wait begins. Later calls to `callback`
/// are not needed: the initial nodes are tracked directly.
pub async fn wait_for_element_to_be_removed<F>(
    container: &Node,
    mut callback: F,
    options: &WaitOptions,
) -> QueryResult<()>
where
    F: FnMut() -> QueryResult<Vec<Node>>,
{
    let initial = callback().unwrap_or_default();
    if initial.is_empty() {
        return Err(QueryError::MissingElement {
            message: "The element(s) given to wait_for_element_to_be_removed are already removed. \
                      wait_for_element_to_be_removed requires that the element(s) exist(s) \
                      before waiting for removal."
                .to_string(),
        });
    }
    let timeout_ms = options.timeout_ms;
    wait_for(
        container,
        || {
            if initial.iter().any(Node::is_connected) {
                Err(QueryError::Timeout {
                    ms: timeout_ms,
                    message: "Timed out in wait_for_element_to_be_removed.".to_string(),
                })
            } else {
                Ok(())
            }
        },
        options,
    )
    .await
}
