//! `serial-liveplot [CONFIG.yaml]`
//!
//! Without an argument, `serial-liveplot.yaml` in the working directory is
//! used when present. Set `RUST_LOG` to change log verbosity.

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use serial_liveplot::config::PlotterConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = PlotterConfig::load_or_default(path.as_deref())
        .context("failed to load configuration")?;
    tracing::info!(title = %config.title, "starting");

    serial_liveplot::run_app(config).map_err(|e| anyhow::anyhow!("window error: {e}"))?;
    Ok(())
}
