//! 🎬 *[a queue fills with log lines. somewhere, a device waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 🗑️ The ConsumerWorker: the one and only task allowed to touch the writer.
//! It receives lines. It writes lines. When the writer sulks, it sulks with it,
//! alone, so that nobody upstream has to.
//!
//! ⚠️ When the singularity occurs, the ConsumerWorker will still be draining the queue.
//! It will not notice. It does not notice things. It only writes. The one exception is
//! the cancel signal from a grace shutdown: then it stops, closes the writer, and leaves.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::stats::FunnelState;
use super::{Shared, Worker};
use crate::writers::Writer;

/// 🗑️ Takes lines from the queue, throws them at the writer. The plumber of the funnel.
#[derive(Debug)]
pub(crate) struct ConsumerWorker<W> {
    rx: Receiver<String>,
    writer: W,
    shared: Arc<Shared>,
    write_timeout: Option<Duration>,
    cancel: watch::Receiver<bool>,
}

impl<W: Writer + 'static> ConsumerWorker<W> {
    pub(crate) fn new(
        rx: Receiver<String>,
        writer: W,
        shared: Arc<Shared>,
        write_timeout: Option<Duration>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rx,
            writer,
            shared,
            write_timeout,
            cancel,
        }
    }

    /// 📡 Frame one message as a line and push it at the writer.
    ///
    /// Errors and timeouts are counted, logged (throttled), and then forgotten.
    /// One bad write does not get to kill the funnel. A timed-out write is dropped
    /// partway through, so writers have to cope with being cancelled mid-line
    /// (see [`write_line`](crate::writers::write_line)).
    async fn deliver(&mut self, message: String) {
        let mut payload = message.into_bytes();
        payload.push(b'\n');

        let outcome = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.writer.write(&payload)).await {
                Ok(written) => written,
                Err(_) => Err(anyhow!("write did not finish within {limit:?}")),
            },
            None => self.writer.write(&payload).await,
        };

        match outcome {
            Ok(()) => {
                let total = self.shared.stats.record_delivered();
                trace!("🪣 delivered line #{total} ({} bytes)", payload.len());
            }
            Err(err) => {
                let total = self.shared.stats.record_write_failure();
                let detail = format!("{err:#}");
                self.shared
                    .failure_log
                    .record("write failed, line skipped", &detail, total);
            }
        }
    }
}

impl<W: Writer + 'static> Worker for ConsumerWorker<W> {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 ConsumerWorker started draining the funnel...");
            let mut cancel = self.cancel.clone();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => None,
                    received = self.rx.recv() => received.ok(),
                };
                // -- None: cancelled, or closed AND empty. Not a moment before.
                let Some(message) = next else { break };

                let delivered = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => false,
                    _ = self.deliver(message) => true,
                };
                if !delivered {
                    let total = self.shared.stats.record_write_failure();
                    warn!(total, "🪓 ConsumerWorker cancelled mid-write, that line is written off");
                    break;
                }
            }

            debug!("🏁 ConsumerWorker: done draining. Closing the writer.");
            let closed = self
                .writer
                .close()
                .await
                .context("💀 ConsumerWorker failed to close the writer");
            self.shared.state.advance(FunnelState::Terminated);
            closed
        })
    }
}

/// 🛑 Resolves once shutdown asks the consumer to stop. If the funnel went away without
/// asking (dropped, not shut down), nobody ever will, so this never resolves.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let nobody_left_to_ask = cancel.wait_for(|stop| *stop).await.is_err();
    if nobody_left_to_ask {
        futures::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn the_one_where_a_dropped_sender_is_not_a_stop_sign() {
        let (cancel, mut rx) = watch::channel(false);
        drop(cancel);
        let the_verdict = tokio::time::timeout(Duration::from_millis(20), cancelled(&mut rx)).await;
        assert!(the_verdict.is_err(), "no sender means drain forever, not stop");
    }

    #[tokio::test]
    async fn the_one_where_true_means_stop() {
        let (cancel, mut rx) = watch::channel(false);
        cancel.send_replace(true);
        tokio::time::timeout(Duration::from_millis(100), cancelled(&mut rx))
            .await
            .expect("💀 cancel was sent, cancelled() should have noticed");
    }
}
