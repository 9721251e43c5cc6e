use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::mongodb::Timeouts;

/// Expand environment variables and tilde in a path string.
/// Supports: $HOME, ${VAR}, ~/path
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub connections_file: PathBuf,
    pub timeouts: Timeouts,
}

impl Config {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connections_file: &str,
        timeouts: Timeouts,
    ) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            bail!("Host must not be empty");
        }
        if connections_file.trim().is_empty() {
            bail!("Connections file path must not be empty");
        }
        if timeouts.operation_secs == 0 || timeouts.connect_secs == 0 {
            bail!("Timeouts must be at least one second");
        }

        Ok(Self {
            host,
            port,
            connections_file: PathBuf::from(expand_path(connections_file)),
            timeouts,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = Config::new("0.0.0.0", 8080, "connections.json", Timeouts::default()).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.connections_file, PathBuf::from("connections.json"));
    }

    #[test]
    fn test_expands_home() {
        let Some(home) = std::env::var_os("HOME") else {
            return;
        };
        let config =
            Config::new("127.0.0.1", 8082, "~/console/connections.json", Timeouts::default())
                .unwrap();
        assert_eq!(
            config.connections_file,
            PathBuf::from(home).join("console/connections.json")
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::new("", 8082, "connections.json", Timeouts::default()).is_err());
        assert!(Config::new("127.0.0.1", 8082, " ", Timeouts::default()).is_err());

        let zero = Timeouts {
            operation_secs: 0,
            connect_secs: 10,
        };
        assert!(Config::new("127.0.0.1", 8082, "connections.json", zero).is_err());
    }
}
