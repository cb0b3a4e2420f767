//! Dropbin CLI - runs the file drop server
//!
//! Flags override `DROPBIN_*` environment variables, which override defaults.

mod args;

use anyhow::Context;
use clap::Parser;
use dropbin_core::DropbinConfig;
use dropbin_core::tracing_setup::init_tracing;
use dropbin_web::{run_server, shutdown_signal};

use crate::args::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("failed to initialize logging")?;

    let mut config = DropbinConfig::from_env();
    cli.apply_to(&mut config);

    run_server(config, shutdown_signal())
        .await
        .context("server terminated with an error")?;

    Ok(())
}
