//! 🚀 logfunnel-cli: the front door, the bouncer, the maitre d' of logfunnel.
//!
//! 📦 Thin binary: sets up tracing, parses args, loads config, and lets the library
//! do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🎛️ Rehearse a logging outage: N producers, one funnel, one device you can break with Ctrl-C.
#[derive(Debug, Parser)]
#[command(name = "logfunnel", version, about)]
struct Args {
    /// TOML config file. Without it, config comes from LOGFUNNEL_* env vars and defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 logs go to stderr: stdout might be the device we're about to break on purpose
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // 🔒 Validate the config file exists before we get too emotionally attached
    if let Some(config_file) = args.config.as_deref() {
        let it_exists = config_file.try_exists().context(format!(
            "💀 Couldn't check whether the configuration file exists. Was checking here: '{}'",
            config_file.display()
        ))?;
        if !it_exists {
            anyhow::bail!(
                "💀 Configuration file not found at '{}'. If it's a relative path, \
                 double check your working directory, or use an absolute path.",
                config_file.display()
            );
        }
    }

    let app_config = logfunnel::app_config::load_config(args.config.as_deref())
        .context("💀 In logfunnel-cli, main, we couldn't load the config. Take a look at the file and LOGFUNNEL_* env vars.")?;

    // 🚀 SEND IT. No take-backs.
    if let Err(err) = logfunnel::run(app_config).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one layer at a time
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
        }
        std::process::exit(1);
    }

    Ok(())
}
