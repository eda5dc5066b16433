//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::funnel::FunnelConfig;
use crate::writers::FileWriterConfig;

/// 📦 The AppConfig: one struct to rule them all. Every section defaults, so an empty
/// environment with no file is a perfectly valid (if boring) configuration.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub funnel: FunnelConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

/// 💾 Where the consumer writes. One device per funnel. Monogamy, but for bytes.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub enum DeviceConfig {
    #[default]
    Stdout,
    File(FileWriterConfig),
    InMemory,
}

/// 🎬 The outage rehearsal: how many producers, how chatty, how long.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DemoConfig {
    /// Producer tasks, each logging on its own loop.
    #[serde(default = "default_producers")]
    pub producers: usize,
    /// Pause between one producer's lines.
    #[serde(default = "default_produce_interval_ms")]
    pub produce_interval_ms: u64,
    /// Stop after this long. `None` runs until SIGTERM/SIGQUIT.
    #[serde(default)]
    pub run_for_secs: Option<u64>,
    /// How long shutdown waits for the consumer to drain before cutting it short.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_producers() -> usize {
    10
}

fn default_produce_interval_ms() -> u64 {
    10
}

// -- ⏰ a stalled disk gets five seconds of our patience, then it's dead to us
fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            producers: default_producers(),
            produce_interval_ms: default_produce_interval_ms(),
            run_for_secs: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// 🚀 Load the config from env vars (`LOGFUNNEL_*`, nested with `__`) and an optional TOML file.
///
/// 📐 DESIGN NOTE:
///   - `None`  → env vars only. No file. No assumptions.
///   - `Some`  → env vars + TOML file, merged. TOML wins on conflicts.
///
/// 💀 Returns an error if config is unparseable, with context saying which sources were read.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("LOGFUNNEL_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (LOGFUNNEL_*). \
             The file exists in our hearts, but apparently not in valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (LOGFUNNEL_*). \
                 No file was provided, this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
