//! Readiness combinators.
//!
//! Isolated contexts report readiness unreliably: depending on the host,
//! the container's load event, the window's load event, or one of the
//! document lifecycle events may fire first, late, or never. The coordinator
//! therefore races every available signal and keeps a poll-based fallback in
//! the set so a context whose events were swallowed is still picked up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use thiserror::Error;
use tokio::time::{Instant, sleep};

use inkpad_host::{ReadyFut, ReadyProbe, Signal, SignalError};

/// Failure of a whole readiness race.
#[derive(Debug, Error)]
pub enum ReadyError {
    /// The poll fallback exhausted its deadline before any source fired.
    #[error("readiness timed out after {waited:?}")]
    Timeout { waited: Duration },
    /// Every source failed. All causes are retained.
    #[error("all {} readiness sources failed", failures.len())]
    Sources { failures: Vec<SignalError> },
}

/// Poll-based readiness signal, the last-resort member of a readiness race.
///
/// Yields one scheduler tick, then checks the probe every `interval` until it
/// passes or `timeout` elapses. The probe runs before the first sleep, so an
/// already-ready context resolves immediately; a timeout is reported no
/// earlier than `timeout` and no later than `timeout + interval`.
pub struct PollSignal {
    label: String,
    probe: ReadyProbe,
    interval: Duration,
    timeout: Duration,
    cancelled: Arc<AtomicBool>,
}

impl PollSignal {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        probe: ReadyProbe,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            probe,
            interval,
            timeout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Signal for PollSignal {
    fn describe(&self) -> &str {
        &self.label
    }

    fn wait(&mut self) -> ReadyFut<'_> {
        Box::pin(async move {
            if self.cancelled.load(Ordering::Acquire) {
                std::future::pending::<()>().await;
            }
            tokio::task::yield_now().await;
            let start = Instant::now();
            loop {
                if (self.probe)() {
                    return Ok(());
                }
                let waited = start.elapsed();
                if waited > self.timeout {
                    return Err(SignalError::Timeout { waited });
                }
                sleep(self.interval).await;
            }
        })
    }

    fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Races `signals` to the first success.
///
/// Member failures are survivable while at least one source is still
/// pending, with one exception: a poll timeout ends the wait immediately,
/// because once the deadline has passed the remaining event sources have
/// nothing left to offer. If every member fails, the causes are aggregated.
///
/// After settling, every member's `cancel` runs exactly once, winner
/// included (cancel is idempotent by the signal contract). Dropping the
/// returned future before settlement cancels nothing; the signals stay
/// usable for explicit cleanup.
pub async fn race_ready(what: &str, signals: &mut [Box<dyn Signal>]) -> Result<(), ReadyError> {
    let outcome = drive(what, signals).await;
    for signal in signals.iter_mut() {
        signal.cancel();
    }
    outcome
}

async fn drive(what: &str, signals: &mut [Box<dyn Signal>]) -> Result<(), ReadyError> {
    let mut pending: FuturesUnordered<_> = signals
        .iter_mut()
        .map(|signal| {
            let label = signal.describe().to_string();
            let outcome = signal.wait();
            async move { (label, outcome.await) }
        })
        .collect();

    let mut failures = Vec::new();
    loop {
        match pending.next().await {
            Some((label, Ok(()))) => {
                tracing::debug!(race = what, winner = %label, "readiness race settled");
                return Ok(());
            }
            Some((label, Err(SignalError::Timeout { waited }))) => {
                tracing::debug!(race = what, %label, ?waited, "readiness poll expired");
                return Err(ReadyError::Timeout { waited });
            }
            Some((label, Err(err))) => {
                tracing::warn!(race = what, %label, error = %err, "readiness source failed, racing on");
                failures.push(err);
            }
            None => return Err(ReadyError::Sources { failures }),
        }
    }
}
