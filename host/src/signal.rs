//! Readiness signals.
//!
//! A [`Signal`] is a one-shot readiness source: it fires once (success),
//! reports an error event from its source, or is cancelled, after which no
//! outcome is ever delivered. Signals are the currency of the bootstrap
//! readiness races; hosts hand them out for container/window/document events
//! and the editor core adds its own poll-based fallback.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

/// Boxed outcome future returned by [`Signal::wait`].
pub type ReadyFut<'a> = Pin<Box<dyn Future<Output = Result<(), SignalError>> + Send + 'a>>;

/// Probe evaluated out-of-band to decide readiness (poll fallback, event gates).
pub type ReadyProbe = Box<dyn Fn() -> bool + Send>;

/// Failure modes of a single readiness signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The source delivered an error event instead of firing.
    #[error("'{label}' reported an error event: {message}")]
    Source { label: String, message: String },
    /// The source went away without delivering an outcome.
    #[error("'{label}' closed without delivering an outcome")]
    Closed { label: String },
    /// A poll-based signal exhausted its deadline.
    #[error("readiness poll gave up after {waited:?}")]
    Timeout { waited: Duration },
}

impl SignalError {
    /// Timeouts get special treatment in races: they end the whole wait.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A one-shot readiness source.
///
/// Contract: at most one outcome is ever delivered; after [`Signal::cancel`]
/// none is (a pending [`Signal::wait`] future simply never resolves).
/// `cancel` is idempotent and safe to call on an already-settled signal.
pub trait Signal: Send {
    /// Short identifier used in logs and aggregated race errors.
    fn describe(&self) -> &str;

    /// Resolves with the source outcome.
    fn wait(&mut self) -> ReadyFut<'_>;

    /// Detaches from the source.
    fn cancel(&mut self);
}

/// Event sent by the source side of an [`EventSignal`].
#[derive(Debug)]
enum SourceEvent {
    Fired,
    Failed(String),
}

/// The canonical host-event-backed [`Signal`].
///
/// Created as a pair: the [`SignalHandle`] stays with the event source (the
/// host's listener registration) and the `EventSignal` goes to the waiter.
/// An optional gate turns a multi-fire source (like `readystatechange`) into
/// a filtered wait: deliveries that fail the gate are ignored and the signal
/// keeps listening.
pub struct EventSignal {
    label: String,
    rx: mpsc::UnboundedReceiver<SourceEvent>,
    gate: Option<ReadyProbe>,
    cancelled: Arc<AtomicBool>,
    cancel_count: Arc<AtomicUsize>,
}

impl EventSignal {
    /// Creates a connected source/waiter pair.
    #[must_use]
    pub fn pair(label: impl Into<String>) -> (SignalHandle, Self) {
        let label = label.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_count = Arc::new(AtomicUsize::new(0));
        let handle = SignalHandle {
            label: label.clone(),
            tx,
            cancelled: Arc::clone(&cancelled),
            cancel_count: Arc::clone(&cancel_count),
        };
        let signal = Self {
            label,
            rx,
            gate: None,
            cancelled,
            cancel_count,
        };
        (handle, signal)
    }

    /// Attaches a readiness gate: deliveries are ignored until it passes.
    #[must_use]
    pub fn with_gate(mut self, gate: ReadyProbe) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl Signal for EventSignal {
    fn describe(&self) -> &str {
        &self.label
    }

    fn wait(&mut self) -> ReadyFut<'_> {
        Box::pin(async move {
            if self.cancelled.load(Ordering::Acquire) {
                std::future::pending::<()>().await;
            }
            loop {
                match self.rx.recv().await {
                    Some(SourceEvent::Fired) => {
                        if let Some(gate) = &self.gate {
                            if !gate() {
                                tracing::trace!(signal = %self.label, "delivery gated, still listening");
                                continue;
                            }
                        }
                        return Ok(());
                    }
                    Some(SourceEvent::Failed(message)) => {
                        return Err(SignalError::Source {
                            label: self.label.clone(),
                            message,
                        });
                    }
                    None => {
                        return Err(SignalError::Closed {
                            label: self.label.clone(),
                        });
                    }
                }
            }
        })
    }

    fn cancel(&mut self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.cancel_count.fetch_add(1, Ordering::AcqRel);
            self.rx.close();
        }
    }
}

/// Source side of an [`EventSignal`].
///
/// Cloneable so a host can keep it registered in its listener table. Once the
/// waiter cancels, deliveries become no-ops, mirroring listener removal.
#[derive(Clone)]
pub struct SignalHandle {
    label: String,
    tx: mpsc::UnboundedSender<SourceEvent>,
    cancelled: Arc<AtomicBool>,
    cancel_count: Arc<AtomicUsize>,
}

impl SignalHandle {
    /// Delivers the success event.
    pub fn fire(&self) {
        if !self.is_cancelled() {
            let _ = self.tx.send(SourceEvent::Fired);
        }
    }

    /// Delivers an error event from the source.
    pub fn fail(&self, message: impl Into<String>) {
        if !self.is_cancelled() {
            let _ = self.tx.send(SourceEvent::Failed(message.into()));
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// How many times the waiter invoked cancel. Stays at most 1 by the
    /// signal contract; races assert on this.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancel_count.load(Ordering::Acquire)
    }
}
