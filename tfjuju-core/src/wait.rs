//! Convergence waiting
//!
//! Controllers apply some changes asynchronously: a storage pool or machine
//! may not be readable with its final attributes right after the call that
//! created it returns. [`wait_for`] polls a read function on a fixed interval
//! until every assertion holds, and [`wait_for_error`] polls until the read
//! fails with an expected error (typically "not found" after a deletion).
//!
//! ```ignore
//! let pool = wait_for(
//!     WaitFor::new("storage pool fast", input, |input| client.get_storage_pool(input))
//!         .assert(ProviderIs("lxd".to_string()))
//!         .with_config(WaitConfig::default()),
//! )
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default time budget for a wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between two polls
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one assertion against freshly read data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Satisfied,
    /// Data has not converged yet; poll again
    Retry(String),
    /// Data can never converge; stop waiting
    Fatal(String),
}

/// A predicate over read data
pub trait Assertion<D>: Send + Sync {
    fn check(&self, data: &D) -> Check;
}

impl<D, F> Assertion<D> for F
where
    F: Fn(&D) -> Check + Send + Sync,
{
    fn check(&self, data: &D) -> Check {
        self(data)
    }
}

/// Classifies read errors: retryable errors keep a wait polling,
/// anything else ends it.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Timing of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl WaitConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Errors that end a wait
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E> {
    /// The data did not converge within the configured timeout
    #[error("timed out waiting for {what} after {elapsed:?} ({attempts} attempts): {last}")]
    Timeout {
        what: String,
        elapsed: Duration,
        attempts: u32,
        last: String,
    },

    #[error("wait for {what} cancelled after {attempts} attempts")]
    Cancelled { what: String, attempts: u32 },

    /// Reading the data failed with a non-retryable error
    #[error("{0}")]
    Fetch(E),

    /// An assertion reported that the data can never converge
    #[error("{what}: {reason}")]
    Assertion { what: String, reason: String },

    #[error("wait for {what} has no assertions")]
    NoAssertions { what: String },
}

/// Parameters of a [`wait_for`] call
pub struct WaitFor<I, D, G> {
    what: String,
    input: I,
    get_data: G,
    asserts: Vec<Box<dyn Assertion<D>>>,
    config: WaitConfig,
    cancel: CancellationToken,
}

impl<I, D, G> WaitFor<I, D, G> {
    pub fn new(what: impl Into<String>, input: I, get_data: G) -> Self {
        Self {
            what: what.into(),
            input,
            get_data,
            asserts: Vec::new(),
            config: WaitConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Append an assertion. Assertions run in the order they were added.
    pub fn assert(mut self, assertion: impl Assertion<D> + 'static) -> Self {
        self.asserts.push(Box::new(assertion));
        self
    }

    pub fn with_config(mut self, config: WaitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Parameters of a [`wait_for_error`] call
pub struct WaitForError<I, G, E> {
    what: String,
    input: I,
    get_data: G,
    expected: fn(&E) -> bool,
    config: WaitConfig,
    cancel: CancellationToken,
}

impl<I, G, E> WaitForError<I, G, E> {
    /// `expected` recognises the error that ends the wait successfully
    pub fn new(what: impl Into<String>, input: I, get_data: G, expected: fn(&E) -> bool) -> Self {
        Self {
            what: what.into(),
            input,
            get_data,
            expected,
            config: WaitConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: WaitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

fn run_assertions<D>(asserts: &[Box<dyn Assertion<D>>], data: &D) -> Check {
    for assertion in asserts {
        match assertion.check(data) {
            Check::Satisfied => continue,
            other => return other,
        }
    }
    Check::Satisfied
}

/// Sleep one interval unless the wait times out or is cancelled first.
/// Returns the error that ends the wait, if any.
async fn next_tick<E>(
    what: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
    start: Instant,
    attempts: u32,
    last: String,
) -> Result<(), WaitError<E>> {
    let elapsed = start.elapsed();
    if elapsed >= config.timeout {
        warn!(
            "Timed out waiting for {} after {:?} ({} attempts): {}",
            what, elapsed, attempts, last
        );
        return Err(WaitError::Timeout {
            what: what.to_string(),
            elapsed,
            attempts,
            last,
        });
    }

    debug!(
        "Waiting for {} (attempt {}), retrying in {:?}: {}",
        what, attempts, config.interval, last
    );

    tokio::select! {
        _ = cancel.cancelled() => Err(WaitError::Cancelled {
            what: what.to_string(),
            attempts,
        }),
        _ = tokio::time::sleep(config.interval) => Ok(()),
    }
}

/// Poll `get_data` until every assertion is satisfied in the same tick.
///
/// Returns the data read in the satisfying tick. Retryable read errors and
/// [`Check::Retry`] keep polling until the timeout; any other read error and
/// [`Check::Fatal`] end the wait immediately.
pub async fn wait_for<I, D, E, G, Fut>(wait: WaitFor<I, D, G>) -> Result<D, WaitError<E>>
where
    I: Clone,
    G: Fn(I) -> Fut,
    Fut: Future<Output = Result<D, E>>,
    E: Retryable + fmt::Display,
{
    let WaitFor {
        what,
        input,
        get_data,
        asserts,
        config,
        cancel,
    } = wait;

    if asserts.is_empty() {
        return Err(WaitError::NoAssertions { what });
    }

    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled { what, attempts });
        }
        attempts += 1;

        let last = match get_data(input.clone()).await {
            Ok(data) => match run_assertions(&asserts, &data) {
                Check::Satisfied => {
                    debug!("{} converged after {} attempts", what, attempts);
                    return Ok(data);
                }
                Check::Retry(reason) => reason,
                Check::Fatal(reason) => return Err(WaitError::Assertion { what, reason }),
            },
            Err(e) if e.is_retryable() => e.to_string(),
            Err(e) => return Err(WaitError::Fetch(e)),
        };

        next_tick::<E>(&what, &config, &cancel, start, attempts, last).await?;
    }
}

/// Poll `get_data` until it fails with the expected error.
///
/// A successful read means the object is still there and keeps the wait
/// polling, as do retryable errors. Any other error ends the wait.
pub async fn wait_for_error<I, D, E, G, Fut>(wait: WaitForError<I, G, E>) -> Result<(), WaitError<E>>
where
    I: Clone,
    G: Fn(I) -> Fut,
    Fut: Future<Output = Result<D, E>>,
    E: Retryable + fmt::Display,
{
    let WaitForError {
        what,
        input,
        get_data,
        expected,
        config,
        cancel,
    } = wait;

    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled { what, attempts });
        }
        attempts += 1;

        let last = match get_data(input.clone()).await {
            Err(e) if expected(&e) => {
                debug!("{} reached expected error after {} attempts", what, attempts);
                return Ok(());
            }
            Err(e) if e.is_retryable() => e.to_string(),
            Err(e) => return Err(WaitError::Fetch(e)),
            Ok(_) => "still present".to_string(),
        };

        next_tick::<E>(&what, &config, &cancel, start, attempts, last).await?;
    }
}
