//! Console configuration, read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8081/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a positive number of seconds, got '{value}'")]
    InvalidTimeout { var: &'static str, value: String },

    #[error("cannot determine a data directory; set TOUNET_TOKEN_PATH")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub api_url: String,
    /// File backing the durable token store.
    pub token_path: PathBuf,
    /// Transport-level timeout for every request; the session adds none.
    pub request_timeout: Duration,
}

impl ConsoleConfig {
    pub fn new(api_url: impl Into<String>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token_path: token_path.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `TOUNET_API_URL`, `TOUNET_TOKEN_PATH` and `TOUNET_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = match lookup("TOUNET_API_URL") {
            Some(value) => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(ConfigError::InvalidUrl {
                        var: "TOUNET_API_URL",
                        value,
                    });
                }
                value
            }
            None => DEFAULT_API_URL.to_string(),
        };

        let token_path = match lookup("TOUNET_TOKEN_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_token_path()?,
        };

        let request_timeout = match lookup("TOUNET_HTTP_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        var: "TOUNET_HTTP_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            request_timeout,
            ..Self::new(api_url, token_path)
        })
    }
}

fn default_token_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("tounet").join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_values_win() {
        let config = ConsoleConfig::from_lookup(lookup(&[
            ("TOUNET_API_URL", "https://core.example.org/api/v1/"),
            ("TOUNET_TOKEN_PATH", "/tmp/tounet/session.json"),
            ("TOUNET_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://core.example.org/api/v1");
        assert_eq!(config.token_path, PathBuf::from("/tmp/tounet/session.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn api_url_defaults_to_local_backend() {
        let config =
            ConsoleConfig::from_lookup(lookup(&[("TOUNET_TOKEN_PATH", "/tmp/t.json")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ConsoleConfig::from_lookup(lookup(&[("TOUNET_API_URL", "localhost:8081")])),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ConsoleConfig::from_lookup(lookup(&[
                ("TOUNET_TOKEN_PATH", "/tmp/t.json"),
                ("TOUNET_HTTP_TIMEOUT_SECS", "0"),
            ])),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }
}
