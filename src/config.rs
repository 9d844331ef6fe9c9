use crate::decoder::DecodeOptions;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 3000);
pub const DEFAULT_MAX_UPLOADS: usize = 32;

/// Service settings, read from the environment only.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Year of the newest tour in an upload when the form does not set one.
    pub import_year: Option<i32>,
    pub skip_checksum: bool,
    /// Uploads kept for download before the oldest is dropped.
    pub max_uploads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            import_year: None,
            skip_checksum: false,
            max_uploads: DEFAULT_MAX_UPLOADS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `RUSTYHAC_*` variables, ignoring unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("RUSTYHAC_BIND_ADDR")
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.bind_addr),
            import_year: lookup("RUSTYHAC_IMPORT_YEAR").and_then(|value| value.parse().ok()),
            skip_checksum: lookup("RUSTYHAC_SKIP_CHECKSUM")
                .map(|value| parse_flag(&value))
                .unwrap_or(defaults.skip_checksum),
            max_uploads: lookup("RUSTYHAC_MAX_UPLOADS")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|&max| max > 0)
                .unwrap_or(defaults.max_uploads),
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            import_year: self.import_year,
            skip_checksum: self.skip_checksum,
        }
    }
}

/// Accepts the values HTML checkboxes and shells commonly use for "on".
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "true" | "on" | "1" | "yes")
}
