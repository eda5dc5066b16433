//! 🚰 The Funnel: many producers up top, one consumer at the bottom, a bounded queue in between.
//!
//! 🎬 *[narrator voice]* "Fifty thousand tasks wanted to log. The disk behind stdout was full.
//! Every single one of them blocked. The server stopped serving. Logging was important,
//! but it turned out it was not more important than the actual work."
//!
//! So: producers never touch the device. They `submit` into a bounded queue with a
//! non-blocking send. Room in the queue? Accepted. No room? Dropped, instantly, no questions.
//! One [`ConsumerWorker`](consumer::ConsumerWorker) drains the queue into the [`Writer`].
//! When the device stalls, the queue fills, the drops start, and the producers keep working.
//! When the device recovers, the consumer drains, room opens up, and logging comes back on
//! its own. Nobody has to restart anything.
//!
//! 🧠 Knowledge graph:
//! - `submit` → `async_channel::Sender::try_send` plus a counter bump. Never awaits. Never blocks.
//!   Never logs either: a [`DropReporter`](drop_report::DropReporter) task reports drops instead.
//! - consumer → `Receiver::recv().await` in a loop, the only place that waits
//! - `shutdown` → `Sender::close()` (closes for EVERY handle, buffered lines still drain)
//!   then await the consumer's `JoinHandle`
//! - `shutdown_with_grace` → same, but past the deadline the consumer is told to stop
//!   (watch channel), still closes its writer, and only gets aborted if even that hangs
//! - state: Running → ShuttingDown → Terminated, one way only
//!
//! ⚠️ DO NOT hand the writer to anyone else. Single writer to the device is the invariant
//! that makes "no locks around the writer" true.

mod config;
mod consumer;
mod drop_report;
mod stats;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;

use anyhow::Result;
use async_channel::{Sender, TrySendError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};

pub use config::FunnelConfig;
pub use stats::{FunnelState, FunnelStatsSnapshot};

use crate::error::FunnelError;
use crate::throttled_log::ThrottledLog;
use crate::writers::Writer;
use consumer::ConsumerWorker;
use drop_report::{DropReporter, report_drops};
use stats::{FunnelStats, StateCell};

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Spawn it. Returns a JoinHandle because we trust but verify. Mostly verify.
    fn start(self) -> JoinHandle<Result<()>>;
}

/// 🔒 Everything producers and the consumer both need to see.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) stats: FunnelStats,
    pub(crate) state: StateCell,
    // -- how much of `stats.dropped` has already made it into a log line
    pub(crate) reported_drops: AtomicU64,
    pub(crate) failure_log: ThrottledLog,
}

impl Shared {
    fn new(config: &FunnelConfig) -> Self {
        Self {
            stats: FunnelStats::default(),
            state: StateCell::new(),
            reported_drops: AtomicU64::new(0),
            failure_log: ThrottledLog::new(config.failure_log_interval()),
        }
    }
}

/// 🎫 What happened to a submitted message. For the curious; ignoring it is fine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Dropped,
}

/// 🏁 How a graceful-with-a-deadline shutdown went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The consumer drained everything and exited on its own.
    Drained(FunnelStatsSnapshot),
    /// The consumer was still busy when the grace period ran out, so it was told to stop.
    /// The line it was stuck on counts as a write failure, the writer was still closed
    /// (flushed) if it allowed that, and `abandoned` lines were left in the queue unwritten.
    GraceExceeded {
        stats: FunnelStatsSnapshot,
        abandoned: usize,
    },
}

impl ShutdownOutcome {
    pub fn stats(&self) -> FunnelStatsSnapshot {
        match self {
            ShutdownOutcome::Drained(stats) => *stats,
            ShutdownOutcome::GraceExceeded { stats, .. } => *stats,
        }
    }
}

/// ✉️ A producer's ticket into the funnel. Clone it into as many tasks as you like.
///
/// Handles can only `submit`. Closing the funnel is the [`Funnel`] owner's job.
#[derive(Debug, Clone)]
pub struct FunnelHandle {
    tx: Sender<String>,
    shared: Arc<Shared>,
}

impl FunnelHandle {
    /// 📨 Try to enqueue one message. Returns immediately, always.
    ///
    /// Full queue → the message is dropped. A closed funnel (shutdown already started)
    /// → the message is dropped too. Neither is an error; the caller is not responsible
    /// for the health of the device.
    ///
    /// ⚠️ No logging in here, not even throttled. The log sink can be stuck on the same
    /// full disk as the device, and then the producer would be stuck with it.
    pub fn submit(&self, message: impl Into<String>) -> Admission {
        match self.tx.try_send(message.into()) {
            Ok(()) => {
                self.shared.stats.record_accepted();
                Admission::Accepted
            }
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => {
                self.shared.stats.record_dropped();
                Admission::Dropped
            }
        }
    }

    /// Queue is at capacity: the next `submit` will drop unless the consumer gets there first.
    pub fn is_saturated(&self) -> bool {
        self.tx.is_full()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 🚰 The funnel itself. Owns the queue, the consumer task, and the lifecycle.
///
/// Build it with [`Funnel::new`], hand out [`FunnelHandle`]s, and finish with exactly one
/// [`Funnel::shutdown`] (it takes `self`, so "exactly one" is the compiler's problem).
/// Dropping a funnel without shutting down closes the queue and lets the consumer drain
/// in the background, unsupervised.
#[derive(Debug)]
pub struct Funnel {
    handle: FunnelHandle,
    capacity: usize,
    consumer: Option<JoinHandle<Result<()>>>,
    reporter: Option<JoinHandle<Result<()>>>,
    // -- `true` tells the consumer to stop mid-drain. Dropping it means "drain at your own pace".
    cancel: watch::Sender<bool>,
}

impl Funnel {
    /// 🚀 A funnel of `capacity` lines in front of `writer`, defaults for everything else.
    ///
    /// Must be called inside a tokio runtime; the consumer task is spawned before this returns.
    pub fn new<W: Writer + 'static>(writer: W, capacity: usize) -> Result<Self, FunnelError> {
        Self::with_config(writer, FunnelConfig::with_capacity(capacity))
    }

    /// 🚀 Same as [`Funnel::new`], every knob exposed.
    pub fn with_config<W: Writer + 'static>(writer: W, config: FunnelConfig) -> Result<Self, FunnelError> {
        config.validate()?;
        // -- tokio::spawn panics outside a runtime. we'd rather return an error.
        tokio::runtime::Handle::try_current().map_err(|_| FunnelError::NoRuntime)?;

        let (tx, rx) = async_channel::bounded(config.capacity);
        let shared = Arc::new(Shared::new(&config));
        let (cancel, cancelled) = watch::channel(false);
        let consumer =
            ConsumerWorker::new(rx, writer, shared.clone(), config.write_timeout(), cancelled).start();
        let reporter = DropReporter::new(shared.clone(), config.failure_log_interval()).start();
        debug!(
            "🚰 funnel up: capacity {}, write timeout {:?}",
            config.capacity,
            config.write_timeout()
        );

        Ok(Self {
            handle: FunnelHandle { tx, shared },
            capacity: config.capacity,
            consumer: Some(consumer),
            reporter: Some(reporter),
            cancel,
        })
    }

    /// ✉️ A fresh producer handle.
    pub fn handle(&self) -> FunnelHandle {
        self.handle.clone()
    }

    /// 📨 Submit straight through the funnel's own handle. See [`FunnelHandle::submit`].
    pub fn submit(&self, message: impl Into<String>) -> Admission {
        self.handle.submit(message)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.handle.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.tx.is_empty()
    }

    pub fn is_saturated(&self) -> bool {
        self.handle.is_saturated()
    }

    pub fn state(&self) -> FunnelState {
        self.handle.shared.state.get()
    }

    pub fn stats(&self) -> FunnelStatsSnapshot {
        self.handle.shared.stats.snapshot(self.len())
    }

    /// 🛑 Close the queue, wait for the consumer to drain it and exit.
    ///
    /// Blocks for as long as the writer takes. A writer that never returns means a shutdown
    /// that never returns; reach for [`Funnel::shutdown_with_grace`] if that scares you.
    /// After this returns the writer has been closed and will never be written to again.
    pub async fn shutdown(mut self) -> FunnelStatsSnapshot {
        self.begin_shutdown();
        if let Some(consumer) = self.consumer.take() {
            reap(consumer.await);
        }
        self.finish()
    }

    /// 🛑 Like [`Funnel::shutdown`], but gives up on draining after `grace`.
    ///
    /// Past the deadline the consumer is told to stop: it abandons the line in flight and
    /// whatever is still queued, then closes its writer so everything already delivered
    /// gets flushed. The close gets one more `grace` of its own. A writer that cannot even
    /// close in that time gets its consumer aborted. Either way, when this returns the
    /// consumer task is gone: no leaks, no late writes.
    pub async fn shutdown_with_grace(mut self, grace: Duration) -> ShutdownOutcome {
        self.begin_shutdown();
        let Some(mut consumer) = self.consumer.take() else {
            return ShutdownOutcome::Drained(self.finish());
        };

        if let Ok(joined) = tokio::time::timeout(grace, &mut consumer).await {
            reap(joined);
            return ShutdownOutcome::Drained(self.finish());
        }

        warn!("⏰ consumer still busy after {grace:?}, telling it to stop and close the writer");
        self.cancel.send_replace(true);
        match tokio::time::timeout(grace, &mut consumer).await {
            Ok(joined) => reap(joined),
            Err(_) => {
                error!("💀 writer would not even close within {grace:?}, aborting the consumer");
                consumer.abort();
                reap(consumer.await);
            }
        }

        let abandoned = self.len();
        if abandoned > 0 {
            warn!("🗑️ {abandoned} queued lines never reached the writer");
        }
        ShutdownOutcome::GraceExceeded {
            stats: self.finish(),
            abandoned,
        }
    }

    fn begin_shutdown(&self) {
        self.handle.shared.state.advance(FunnelState::ShuttingDown);
        if self.handle.tx.close() {
            debug!("🚪 funnel closed for input, {} lines left to drain", self.len());
        }
    }

    fn finish(&mut self) -> FunnelStatsSnapshot {
        self.handle.shared.state.advance(FunnelState::Terminated);
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
        // -- last word on drops, from the shutdown caller's task
        report_drops(&self.handle.shared);
        let stats = self.stats();
        debug!(?stats, "🏁 funnel terminated");
        stats
    }
}

impl Drop for Funnel {
    fn drop(&mut self) {
        if self.consumer.is_some() {
            // -- no async drop, so no waiting. close the door and let the consumer tidy up alone.
            self.begin_shutdown();
        }
    }
}

/// 🧹 Log whatever the consumer task left behind. Shutdown itself never fails.
fn reap(joined: Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("💀 consumer finished with an error: {err:#}"),
        Err(join_err) if join_err.is_cancelled() => debug!("🪦 consumer task was aborted"),
        Err(join_err) => error!("💀 consumer task panicked: {join_err}"),
    }
}
