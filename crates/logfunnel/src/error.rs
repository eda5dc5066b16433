//! 💀 The one error a caller of [`Funnel::new`](crate::Funnel::new) gets to hold in their hands.
//!
//! Everything else in this crate is `anyhow` because nobody upstream ever matches on it.
//! This one is typed because "you asked for a zero-sized funnel" deserves a real name,
//! not a string you grep for at 3am. 🦆

use thiserror::Error;

/// 🏗️ Construction-time failures. Fail fast, fail loud, never panic the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FunnelError {
    /// A funnel with no room is a wall. We don't build walls.
    #[error("💀 funnel capacity must be at least 1, got {capacity}")]
    InvalidCapacity { capacity: usize },

    /// `tokio::spawn` outside a runtime panics. We'd rather tell you.
    #[error("💀 no tokio runtime is running; the consumer task has nowhere to live")]
    NoRuntime,
}
