//! 🎬 The outage rehearsal.
//!
//! *[INT. SERVER ROOM. A dozen producer tasks log "N: log data" every few milliseconds.]*
//! *[Someone presses Ctrl-C. The disk "fills up". The producers do not notice. That's the point.]*
//! *[Ctrl-C again. The disk is "fixed". Lines start flowing again. Nobody restarted anything.]*
//!
//! 🧠 Knowledge graph:
//! - device from config → wrapped in [`FlakyDevice`] → fed to a [`Funnel`]
//! - N producers in a `JoinSet`, each on its own `submit` + sleep loop
//! - Ctrl-C toggles device health; SIGTERM/SIGQUIT or `run_for_secs` ends the show
//! - finale: producers aborted, funnel shut down with grace, stats table on stderr

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, Table, presets::NOTHING};
use tokio::task::JoinSet;
use tracing::info;

use crate::app_config::{AppConfig, DemoConfig, DeviceConfig};
use crate::funnel::{Funnel, FunnelHandle, ShutdownOutcome};
use crate::writers::{DeviceHealth, FileWriter, FlakyDevice, InMemoryWriter, StdoutWriter, WriterBackend};

/// 🚀 Run the rehearsal until told to stop.
pub async fn run(app_config: AppConfig) -> Result<()> {
    let device = build_device(&app_config.device).await?;
    let (device, switch) = FlakyDevice::new(device);
    let funnel = Funnel::with_config(device, app_config.funnel.clone())
        .context("💀 Could not build the funnel from the [funnel] config section")?;

    let mut producers = spawn_producers(funnel.handle(), &app_config.demo);
    info!(
        "🎬 {} producers logging through a funnel of {} lines. Ctrl-C toggles the device, SIGTERM ends it.",
        app_config.demo.producers,
        funnel.capacity()
    );

    let terminate = wait_for_terminate();
    tokio::pin!(terminate);
    let deadline = run_deadline(app_config.demo.run_for_secs);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            ctrl_c = tokio::signal::ctrl_c() => {
                ctrl_c.context("💀 Could not listen for Ctrl-C")?;
                let health = switch.toggle();
                info!("🔌 Ctrl-C: the device is now {health}");
            }
            terminated = &mut terminate => {
                terminated?;
                info!("🛑 termination signal received, wrapping up");
                break;
            }
            _ = &mut deadline => {
                info!("⏰ run time elapsed, wrapping up");
                break;
            }
        }
    }

    // -- 🧹 producers first, so nobody is submitting while the funnel closes
    producers.abort_all();
    while producers.join_next().await.is_some() {}

    let grace = Duration::from_millis(app_config.demo.shutdown_grace_ms);
    let outcome = funnel.shutdown_with_grace(grace).await;
    info!(stats = ?outcome.stats(), "🏁 funnel shut down");
    eprintln!("{}", render_report(&outcome, switch.health()));
    Ok(())
}

/// 🏭 Turn the `[device]` section into an actual writer.
pub async fn build_device(device_config: &DeviceConfig) -> Result<WriterBackend> {
    Ok(match device_config {
        DeviceConfig::Stdout => WriterBackend::Stdout(StdoutWriter::new()),
        DeviceConfig::File(file_config) => WriterBackend::File(
            FileWriter::new(file_config.clone())
                .await
                .context("💀 Could not open the file device")?,
        ),
        DeviceConfig::InMemory => WriterBackend::InMemory(InMemoryWriter::new()),
    })
}

/// 🧵 One task per producer, each logging forever (or until aborted, which is sooner).
pub(crate) fn spawn_producers(handle: FunnelHandle, demo: &DemoConfig) -> JoinSet<()> {
    let interval = Duration::from_millis(demo.produce_interval_ms);
    let mut producers = JoinSet::new();
    for id in 0..demo.producers {
        let handle = handle.clone();
        producers.spawn(async move {
            loop {
                handle.submit(format!("{id}: log data"));
                tokio::time::sleep(interval).await;
            }
        });
    }
    producers
}

async fn run_deadline(run_for_secs: Option<u64>) {
    match run_for_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => futures::future::pending::<()>().await,
    }
}

#[cfg(unix)]
async fn wait_for_terminate() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).context("💀 Could not listen for SIGTERM")?;
    let mut sigquit = signal(SignalKind::quit()).context("💀 Could not listen for SIGQUIT")?;
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_terminate() -> Result<()> {
    // -- no SIGTERM here. run_for_secs or closing the window, your call.
    futures::future::pending::<()>().await;
    Ok(())
}

/// 🍽️ The end-of-show summary. A table so comfy it has lumbar support.
pub(crate) fn render_report(outcome: &ShutdownOutcome, health: DeviceHealth) -> Table {
    let stats = outcome.stats();
    let verdict = match outcome {
        ShutdownOutcome::Drained(_) => "drained".to_string(),
        ShutdownOutcome::GraceExceeded { abandoned, .. } => {
            format!("grace exceeded, {} lines abandoned", format_number(*abandoned as u64))
        }
    };

    let mut table = Table::new();
    table.load_preset(NOTHING);
    let rows = [
        ("accepted", format_number(stats.accepted)),
        ("dropped", format_number(stats.dropped)),
        ("delivered", format_number(stats.delivered)),
        ("write failures", format_number(stats.write_failures)),
        ("device", health.to_string()),
        ("shutdown", verdict),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::FunnelStatsSnapshot;

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_the_report_tells_the_whole_story() {
        let outcome = ShutdownOutcome::GraceExceeded {
            stats: FunnelStatsSnapshot {
                accepted: 1500,
                dropped: 48000,
                delivered: 1490,
                write_failures: 0,
                queued: 10,
            },
            abandoned: 10,
        };

        let rendered = render_report(&outcome, DeviceHealth::Stalled).to_string();

        assert!(rendered.contains("48,000"), "dropped count missing:\n{rendered}");
        assert!(rendered.contains("1,490"), "delivered count missing:\n{rendered}");
        assert!(rendered.contains("stalled"), "device health missing:\n{rendered}");
        assert!(rendered.contains("10 lines abandoned"), "verdict missing:\n{rendered}");
    }

    #[tokio::test]
    async fn the_one_where_producers_keep_the_funnel_busy_until_aborted() -> Result<()> {
        let observer = InMemoryWriter::new();
        let funnel = Funnel::new(observer.clone(), 32)?;
        let demo = DemoConfig {
            producers: 3,
            produce_interval_ms: 1,
            ..DemoConfig::default()
        };

        let mut producers = spawn_producers(funnel.handle(), &demo);
        tokio::time::sleep(Duration::from_millis(30)).await;
        producers.abort_all();
        while producers.join_next().await.is_some() {}

        let stats = funnel.shutdown().await;
        let lines = observer.lines().await;
        assert!(stats.accepted >= 3, "three producers should each land at least one line");
        assert_eq!(lines.len() as u64, stats.delivered);
        assert!(lines.iter().all(|line| line.ends_with(": log data")));
        for id in 0..3 {
            assert!(
                lines.iter().any(|line| line == &format!("{id}: log data")),
                "producer {id} never made it into the log"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_config_picks_the_device() -> Result<()> {
        assert!(matches!(
            build_device(&DeviceConfig::InMemory).await?,
            WriterBackend::InMemory(_)
        ));
        assert!(matches!(
            build_device(&DeviceConfig::Stdout).await?,
            WriterBackend::Stdout(_)
        ));
        Ok(())
    }
}
