//! 🚰 logfunnel: a bounded, drop-when-full log funnel.
//!
//! Many producers `submit` lines without ever blocking. One consumer task writes them to a
//! single device. When the device stalls, lines are dropped instead of producers stalling.
//! When the device recovers, logging resumes by itself. 🦆

pub mod app_config;
pub mod demo;
mod error;
pub mod funnel;
mod throttled_log;
pub mod writers;

use anyhow::{Context, Result};

pub use error::FunnelError;
pub use funnel::{Admission, Funnel, FunnelConfig, FunnelHandle, FunnelState, FunnelStatsSnapshot, ShutdownOutcome};
pub use writers::Writer;

/// 🚀 Run the outage rehearsal described by `app_config`.
pub async fn run(app_config: app_config::AppConfig) -> Result<()> {
    demo::run(app_config).await.context("Failed to run the funnel demo")
}
