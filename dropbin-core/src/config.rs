//! Centralized configuration for Dropbin.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::identifier::DEFAULT_IDENTIFIER_LENGTH;
use crate::storage::file_store::DEFAULT_MAX_ALLOCATION_ATTEMPTS;
use crate::storage::resolve_root;

/// Port used when none, or zero, is configured.
pub const DEFAULT_PORT: u16 = 8080;

/// Upload size limit in megabytes used when none, or zero, is configured.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 100;

/// Central configuration for all Dropbin components.
///
/// Passed explicitly into the server and store at construction time.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct DropbinConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 means default)
    pub port: u16,
    /// Maximum request body size in megabytes (0 means default)
    pub max_upload_mb: u64,
    /// How long in-flight requests may run after a shutdown signal
    pub shutdown_grace: Duration,
    /// Gzip level for compressed responses
    pub compression_level: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            shutdown_grace: Duration::from_secs(30),
            compression_level: 5,
        }
    }
}

impl ServerConfig {
    /// Port to bind, falling back to [`DEFAULT_PORT`] for zero.
    pub fn effective_port(&self) -> u16 {
        if self.port > 0 { self.port } else { DEFAULT_PORT }
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.effective_port())
    }

    /// Body size limit in bytes, falling back to [`DEFAULT_MAX_UPLOAD_MB`] for zero.
    pub fn max_upload_bytes(&self) -> usize {
        let megabytes = if self.max_upload_mb > 0 {
            self.max_upload_mb
        } else {
            DEFAULT_MAX_UPLOAD_MB
        };
        usize::try_from(megabytes.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Upload root directory (None = OS temp root plus `uploads`)
    pub upload_dir: Option<PathBuf>,
    /// Symbols per identifier
    pub identifier_length: usize,
    /// Identifiers tried per upload before giving up on collisions
    pub max_allocation_attempts: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: None,
            identifier_length: DEFAULT_IDENTIFIER_LENGTH,
            max_allocation_attempts: DEFAULT_MAX_ALLOCATION_ATTEMPTS,
        }
    }
}

impl StorageConfig {
    /// Resolves the upload root directory.
    pub fn upload_root(&self) -> PathBuf {
        resolve_root(self.upload_dir.as_deref())
    }
}

impl DropbinConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Reads `DROPBIN_PORT`, `DROPBIN_MAX_SIZE_MB`, `DROPBIN_UPLOAD_DIR` and
    /// `DROPBIN_SHUTDOWN_GRACE_SECS`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("DROPBIN_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(max_size) = std::env::var("DROPBIN_MAX_SIZE_MB") {
            if let Ok(megabytes) = max_size.parse::<u64>() {
                config.server.max_upload_mb = megabytes;
            }
        }

        if let Ok(grace) = std::env::var("DROPBIN_SHUTDOWN_GRACE_SECS") {
            if let Ok(seconds) = grace.parse::<u64>() {
                config.server.shutdown_grace = Duration::from_secs(seconds);
            }
        }

        if let Ok(upload_dir) = std::env::var("DROPBIN_UPLOAD_DIR") {
            if !upload_dir.is_empty() {
                config.storage.upload_dir = Some(PathBuf::from(upload_dir));
            }
        }

        config
    }

    /// Creates a configuration optimized for testing, rooted at `upload_dir`.
    pub fn for_testing(upload_dir: &Path) -> Self {
        Self {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                max_upload_mb: 1,
                shutdown_grace: Duration::from_secs(2),
                ..Default::default()
            },
            storage: StorageConfig {
                upload_dir: Some(upload_dir.to_path_buf()),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = DropbinConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_upload_mb, 100);
        assert_eq!(config.server.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(30));
        assert_eq!(config.server.compression_level, 5);
        assert_eq!(config.storage.identifier_length, 6);
        assert_eq!(config.storage.max_allocation_attempts, 4);
        assert_eq!(
            config.storage.upload_root(),
            std::env::temp_dir().join("uploads")
        );
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = ServerConfig {
            port: 0,
            max_upload_mb: 0,
            ..Default::default()
        };

        assert_eq!(config.effective_port(), 8080);
        assert_eq!(config.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.socket_addr().port(), 8080);
    }

    #[test]
    fn test_configured_upload_dir() {
        let config = StorageConfig {
            upload_dir: Some(PathBuf::from("/var/lib/dropbin")),
            ..Default::default()
        };

        assert_eq!(config.upload_root(), PathBuf::from("/var/lib/dropbin"));
    }

    #[test]
    fn test_testing_preset() {
        let config = DropbinConfig::for_testing(Path::new("/tmp/dropbin-test"));

        assert_eq!(config.server.max_upload_bytes(), 1024 * 1024);
        assert_eq!(
            config.storage.upload_root(),
            PathBuf::from("/tmp/dropbin-test")
        );
        assert!(config.server.host.is_loopback());
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("DROPBIN_PORT", "9090");
            std::env::set_var("DROPBIN_MAX_SIZE_MB", "5");
            std::env::set_var("DROPBIN_UPLOAD_DIR", "/srv/drops");
            std::env::set_var("DROPBIN_SHUTDOWN_GRACE_SECS", "not-a-number");
        }

        let config = DropbinConfig::from_env();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.max_upload_mb, 5);
        assert_eq!(config.storage.upload_root(), PathBuf::from("/srv/drops"));
        assert_eq!(config.server.shutdown_grace, Duration::from_secs(30));

        // Cleanup
        unsafe {
            std::env::remove_var("DROPBIN_PORT");
            std::env::remove_var("DROPBIN_MAX_SIZE_MB");
            std::env::remove_var("DROPBIN_UPLOAD_DIR");
            std::env::remove_var("DROPBIN_SHUTDOWN_GRACE_SECS");
        }
    }
}
