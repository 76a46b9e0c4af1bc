//! Command-line surface: two positional arguments, no environment
//! variables, no config file (see §6 of the specification this crate
//! implements).

use thiserror::Error;

pub const MIN_PORT: u16 = 1024;
pub const MAX_PORT: u16 = 65535;
pub const MIN_CACHE_MB: u64 = 1;
pub const MAX_CACHE_MB: u64 = 100;
pub const BYTES_PER_MB: u64 = 1_000_000;

/// Validated proxy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyConfig {
    pub port: u16,
    pub capacity_bytes: u64,
}

/// Every variant's `Display` is exactly the stdout message printed for
/// that failure; the binary prints it and exits non-zero.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Command should be: fetchcache <port> <cache size in MB>")]
    Usage,
    #[error("Port number should be equal to or larger than 1024 and smaller than 65535")]
    PortRange,
    #[error("Cache size must be between 1 MB and 100 MB")]
    CacheSizeRange,
}

impl ProxyConfig {
    /// Parses and validates exactly two positional arguments (port, cache
    /// size in MB). Does not consume argv[0]; pass `std::env::args().skip(1)`.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let args: Vec<String> = args.into_iter().collect();
        if args.len() != 2 {
            return Err(ConfigError::Usage);
        }

        let port: u16 = args[0].parse().map_err(|_| ConfigError::PortRange)?;
        if !(MIN_PORT..=MAX_PORT).contains(&port) {
            return Err(ConfigError::PortRange);
        }

        let cache_mb: u64 = args[1].parse().map_err(|_| ConfigError::CacheSizeRange)?;
        if !(MIN_CACHE_MB..=MAX_CACHE_MB).contains(&cache_mb) {
            return Err(ConfigError::CacheSizeRange);
        }

        Ok(Self {
            port,
            capacity_bytes: cache_mb * BYTES_PER_MB,
        })
    }
}
