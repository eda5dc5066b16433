//! 🎬 *[a disk fills up. somewhere, fifty thousand tasks try to log about it.]*
//!
//! 💾 `FlakyDevice` wraps any [`Writer`] and lets someone else decide, at runtime, whether
//! that writer is having a good day. It is how we rehearse the outage: flip the switch,
//! watch writes stall, watch the funnel start dropping, flip it back, watch it recover.
//!
//! 🧠 Knowledge graph:
//! - Health lives in a `tokio::sync::watch` channel. The switch sends, the device receives.
//!   No shared bool, no data race, no "I appreciate we have a race here" comments.
//! - `Stalled` → `write` parks until health changes (the full-disk experience)
//! - `Failing` → `write` returns an error immediately (the angry-disk experience)
//! - `Healthy` → pass-through to the inner writer

use std::fmt;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::writers::Writer;

/// 🩺 How the device is feeling right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceHealth {
    #[default]
    Healthy,
    /// Writes hang until someone fixes things. Like a full disk behind stdout.
    Stalled,
    /// Writes fail fast with an error.
    Failing,
}

impl fmt::Display for DeviceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceHealth::Healthy => write!(f, "healthy"),
            DeviceHealth::Stalled => write!(f, "stalled"),
            DeviceHealth::Failing => write!(f, "failing"),
        }
    }
}

/// 🎛️ The remote control for a [`FlakyDevice`]. Clone it, hand it to a signal handler, go wild.
#[derive(Debug, Clone)]
pub struct DeviceSwitch {
    tx: watch::Sender<DeviceHealth>,
}

impl DeviceSwitch {
    pub fn health(&self) -> DeviceHealth {
        *self.tx.borrow()
    }

    /// Set health outright. Works even if the device has already been dropped.
    pub fn set(&self, health: DeviceHealth) {
        let previous = self.tx.send_replace(health);
        if previous != health {
            debug!("🩺 device health: {previous} → {health}");
        }
    }

    /// 🔄 Healthy ↔ Stalled, the Ctrl-C special. A failing device toggles back to healthy.
    pub fn toggle(&self) -> DeviceHealth {
        let next = match self.health() {
            DeviceHealth::Healthy => DeviceHealth::Stalled,
            DeviceHealth::Stalled | DeviceHealth::Failing => DeviceHealth::Healthy,
        };
        self.set(next);
        next
    }
}

/// 💾 A writer with a switchable bad day. See the module docs for the drama.
#[derive(Debug)]
pub struct FlakyDevice<W> {
    inner: W,
    health: watch::Receiver<DeviceHealth>,
}

impl<W: Writer> FlakyDevice<W> {
    /// 🏗️ Wrap `inner`, starting healthy. Returns the device and the switch that controls it.
    pub fn new(inner: W) -> (Self, DeviceSwitch) {
        let (tx, health) = watch::channel(DeviceHealth::Healthy);
        let switch = DeviceSwitch { tx };
        (Self { inner, health }, switch)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: Writer> Writer for FlakyDevice<W> {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        loop {
            let health = *self.health.borrow_and_update();
            match health {
                DeviceHealth::Healthy => return self.inner.write(payload).await,
                DeviceHealth::Failing => bail!("💀 device is failing; {} bytes bounced", payload.len()),
                DeviceHealth::Stalled => {
                    trace!("💤 device stalled, write parked until someone fixes the disk");
                    if self.health.changed().await.is_err() {
                        // -- the switch is gone, so nobody can ever un-stall us. park forever.
                        futures::future::pending::<()>().await;
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
