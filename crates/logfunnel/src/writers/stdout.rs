use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{self, AsyncWriteExt};
use tracing::trace;

use crate::writers::{Writer, write_line};

/// 📺 The writer the source program pointed at by default: good old stdout.
///
/// If whatever is reading our stdout stops reading (a full disk behind a pipe, a
/// paused terminal), `write` simply stops returning. That is the exact incident this
/// crate exists for, and the funnel is what keeps it from spreading to the producers.
#[derive(Debug)]
pub struct StdoutWriter {
    stdout: io::Stdout,
    torn_line: bool,
}

impl StdoutWriter {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            torn_line: false,
        }
    }
}

impl Default for StdoutWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Writer for StdoutWriter {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        trace!("📺 {} bytes headed for stdout", payload.len());
        write_line(&mut self.stdout, &mut self.torn_line, payload)
            .await
            .context("💀 stdout refused our bytes. somebody closed the pipe on the other end.")?;
        // -- flush per line so lines show up live, not whenever tokio feels like it
        self.stdout
            .flush()
            .await
            .context("💀 stdout flush failed")
    }

    async fn close(&mut self) -> Result<()> {
        self.stdout.flush().await.context("💀 final stdout flush failed")
    }
}
