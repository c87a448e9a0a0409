//! Waiting for a replica set to accept transactions.
//!
//! A freshly started replica set elects a primary some time after the
//! process comes up; until then, starting a transaction fails with
//! [`UnitOfWorkError::NotSupported`]. [`ReadinessProber`] repeats a cheap
//! probe with exponential backoff until it succeeds, the caller cancels, or
//! the store reports any other error.
//!
//! Backends provide the probe itself through [`ReplicaSetProbe`], in an async
//! and a blocking flavour. Both prober variants share the same [`Backoff`]
//! sequence and classify errors the same way.

use async_trait::async_trait;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{UnitOfWorkError, UnitOfWorkResult};

/// Database holding the scratch collection used by probes.
pub const SCRATCH_DATABASE: &str = "__empty-db";

/// Collection dropped by every probe attempt.
pub const SCRATCH_COLLECTION: &str = "__empty";

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Default ceiling for retry delays.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5000);

/// Granularity at which the blocking prober checks for cancellation while sleeping.
const BLOCKING_SLICE: Duration = Duration::from_millis(25);

/// A transaction-capability probe against a store.
///
/// One attempt drops the scratch collection, starts a session, then starts
/// and aborts a transaction. An attempt fails with
/// [`UnitOfWorkError::NotSupported`] while transactions are unavailable.
#[async_trait]
pub trait ReplicaSetProbe: Send + Sync {
    /// Runs one probe attempt.
    async fn probe_transactions(&self) -> UnitOfWorkResult<()>;

    /// Drops the scratch database.
    async fn drop_scratch(&self) -> UnitOfWorkResult<()>;

    /// Runs one probe attempt, blocking the calling thread.
    fn probe_transactions_blocking(&self) -> UnitOfWorkResult<()>;

    /// Drops the scratch database, blocking the calling thread.
    fn drop_scratch_blocking(&self) -> UnitOfWorkResult<()>;
}

/// An exponential backoff schedule: every delay doubles the previous one,
/// capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Returns the infinite sequence of delays.
    pub fn delays(&self) -> Delays {
        Delays {
            next: self.initial.min(self.max),
            max: self.max,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY)
    }
}

/// Iterator over the delays of a [`Backoff`]. Never ends.
#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    max: Duration,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current
            .checked_mul(2)
            .unwrap_or(Duration::MAX)
            .min(self.max);
        Some(current)
    }
}

/// Retries a [`ReplicaSetProbe`] until the store accepts transactions.
///
/// Retries are unbounded; only cancellation or a non-retryable error ends
/// the wait early. The scratch database is dropped once the wait is over,
/// whatever the outcome. A failed cleanup is reported only if the probe
/// itself succeeded.
///
/// # Example
///
/// ```ignore
/// use uowlayer::readiness::{Backoff, ReadinessProber};
/// use tokio_util::sync::CancellationToken;
///
/// ReadinessProber::new(Backoff::default())
///     .wait_until_ready(&probe, &CancellationToken::new())
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReadinessProber {
    backoff: Backoff,
}

impl ReadinessProber {
    pub fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Waits asynchronously until `probe` succeeds.
    ///
    /// # Errors
    ///
    /// - [`UnitOfWorkError::Cancelled`] if `cancellation` fires first
    /// - any error of the probe other than [`UnitOfWorkError::NotSupported`]
    /// - the cleanup error, if the probe succeeded but the cleanup failed
    pub async fn wait_until_ready<P>(
        &self,
        probe: &P,
        cancellation: &CancellationToken,
    ) -> UnitOfWorkResult<()>
    where
        P: ReplicaSetProbe + ?Sized,
    {
        let outcome = self.retry(probe, cancellation).await;
        let cleanup = probe.drop_scratch().await;

        settle(outcome, cleanup)
    }

    /// Waits on the calling thread until `probe` succeeds.
    ///
    /// Sleeps in short slices so that cancellation is observed promptly.
    /// Fails the same way as [`ReadinessProber::wait_until_ready`].
    pub fn wait_until_ready_blocking<P>(
        &self,
        probe: &P,
        cancellation: &CancellationToken,
    ) -> UnitOfWorkResult<()>
    where
        P: ReplicaSetProbe + ?Sized,
    {
        let outcome = self.retry_blocking(probe, cancellation);
        let cleanup = probe.drop_scratch_blocking();

        settle(outcome, cleanup)
    }

    async fn retry<P>(&self, probe: &P, cancellation: &CancellationToken) -> UnitOfWorkResult<()>
    where
        P: ReplicaSetProbe + ?Sized,
    {
        let mut delays = self.backoff.delays();
        let mut attempt = 0u32;

        loop {
            if cancellation.is_cancelled() {
                return Err(UnitOfWorkError::Cancelled);
            }

            attempt = attempt.saturating_add(1);
            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(UnitOfWorkError::Cancelled),
                result = probe.probe_transactions() => result,
            };

            let delay = match next_delay(result, &mut delays)? {
                Some(delay) => delay,
                None => return Ok(()),
            };
            debug!(attempt, ?delay, "transactions not supported yet, retrying");

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(UnitOfWorkError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn retry_blocking<P>(&self, probe: &P, cancellation: &CancellationToken) -> UnitOfWorkResult<()>
    where
        P: ReplicaSetProbe + ?Sized,
    {
        let mut delays = self.backoff.delays();
        let mut attempt = 0u32;

        loop {
            if cancellation.is_cancelled() {
                return Err(UnitOfWorkError::Cancelled);
            }

            attempt = attempt.saturating_add(1);
            let delay = match next_delay(probe.probe_transactions_blocking(), &mut delays)? {
                Some(delay) => delay,
                None => return Ok(()),
            };
            debug!(attempt, ?delay, "transactions not supported yet, retrying");

            sleep_unless_cancelled(delay, cancellation)?;
        }
    }
}

/// Classifies one attempt: `None` when done, the next delay when retryable.
fn next_delay(result: UnitOfWorkResult<()>, delays: &mut Delays) -> UnitOfWorkResult<Option<Duration>> {
    match result {
        Ok(()) => Ok(None),
        Err(UnitOfWorkError::NotSupported(_)) => Ok(Some(delays.next().unwrap_or(Duration::MAX))),
        Err(error) => Err(error),
    }
}

fn sleep_unless_cancelled(delay: Duration, cancellation: &CancellationToken) -> UnitOfWorkResult<()> {
    let deadline = Instant::now().checked_add(delay);

    loop {
        if cancellation.is_cancelled() {
            return Err(UnitOfWorkError::Cancelled);
        }

        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => BLOCKING_SLICE,
        };
        if remaining.is_zero() {
            return Ok(());
        }

        thread::sleep(remaining.min(BLOCKING_SLICE));
    }
}

fn settle(outcome: UnitOfWorkResult<()>, cleanup: UnitOfWorkResult<()>) -> UnitOfWorkResult<()> {
    match (outcome, cleanup) {
        (Ok(()), cleanup) => cleanup,
        (Err(error), Err(cleanup_error)) => {
            warn!(error = %cleanup_error, "failed to drop the scratch database");
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
    }
}
