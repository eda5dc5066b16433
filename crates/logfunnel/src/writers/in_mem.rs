use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::writers::Writer;

/// 📦 A writer that never forgets. Unlike my dad, who forgot my soccer game in 1998.
///
/// `InMemoryWriter` hoards every payload it is handed in a shared Vec
/// wrapped in a Mutex wrapped in an Arc. It's types all the way down.
///
/// Clone-able because tests need to peek inside after handing one copy off to the
/// funnel. The `Arc` means everyone shares the same Vec. The borrow checker approved.
/// Barely. It had notes.
#[derive(Debug, Default, Clone)]
pub struct InMemoryWriter {
    received: Arc<Mutex<Vec<String>>>,
}

impl InMemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🔍 Every payload, exactly as written (trailing newline included).
    pub async fn payloads(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// 🔍 Every payload with its line framing peeled off. What the producers actually said.
    pub async fn lines(&self) -> Vec<String> {
        self.received
            .lock()
            .await
            .iter()
            .map(|payload| payload.strip_suffix('\n').unwrap_or(payload).to_string())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.received.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.received.lock().await.is_empty()
    }
}

#[async_trait]
impl Writer for InMemoryWriter {
    /// 📡 Lock, push, done. Like a fax machine but for bytes. 🦆
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        // -- 🔒 The Mutex is load-bearing. Tests read while the consumer writes.
        self.received
            .lock()
            .await
            .push(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }
}
