//! Command-line flags

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dropbin_core::DropbinConfig;
use dropbin_core::tracing_setup::CliLogLevel;

/// Anonymous file drop over HTTP.
///
/// `PUT` a file to any path and get back a short download URL.
#[derive(Debug, Parser)]
#[command(name = "dropbin")]
#[command(about = "Anonymous file drop over HTTP")]
#[command(version)]
pub struct Cli {
    /// HTTP Server port number [default: 8080]
    #[arg(long)]
    pub port: Option<u16>,

    /// Max upload file size in MB [default: 100]
    #[arg(long = "maxsize")]
    pub max_size_mb: Option<u64>,

    /// Directory for uploads [default: <temp dir>/uploads]
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Address to bind to [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Seconds in-flight requests may run after a shutdown signal [default: 30]
    #[arg(long)]
    pub shutdown_grace: Option<u64>,

    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info)]
    pub log_level: CliLogLevel,

    /// Directory for a full debug log of this run
    #[arg(long)]
    pub logs_dir: Option<PathBuf>,
}

impl Cli {
    /// Overrides `config` with every flag given on the command line.
    pub fn apply_to(&self, config: &mut DropbinConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(max_size_mb) = self.max_size_mb {
            config.server.max_upload_mb = max_size_mb;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(seconds) = self.shutdown_grace {
            config.server.shutdown_grace = Duration::from_secs(seconds);
        }
        if let Some(upload_dir) = &self.upload_dir {
            config.storage.upload_dir = Some(upload_dir.clone());
        }
    }
}
