//! Client bootstrap configuration
//!
//! The server runs next to the application, so the defaults point at the
//! loopback interface on the standard port.

use std::env;

use tracing::warn;

use crate::protocol::DEFAULT_PORT;

pub const HOST_ENV: &str = "ENSEMBLE_HOST";
pub const PORT_ENV: &str = "ENSEMBLE_PORT";

/// Where and how to reach the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Disable Nagle's algorithm. Downcalls are small and latency bound.
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `ENSEMBLE_HOST` / `ENSEMBLE_PORT` when set
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup(HOST_ENV) {
            config.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            match port.parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %port, "ignoring invalid {}", PORT_ENV),
            }
        }
        config
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5002);
        assert!(config.nodelay);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ClientConfig::from_lookup(|key| match key {
            HOST_ENV => Some("ens.local".to_string()),
            PORT_ENV => Some("6002".to_string()),
            _ => None,
        });
        assert_eq!(config.host, "ens.local");
        assert_eq!(config.port, 6002);
    }

    #[test]
    fn test_bad_port_keeps_default() {
        let config = ClientConfig::from_lookup(|key| {
            (key == PORT_ENV).then(|| "not-a-port".to_string())
        });
        assert_eq!(config, ClientConfig::default());
    }
}
