//! Environment-supplied configuration. The endpoint URL, auth token, and
//! listen port come from the process environment; there is no persisted
//! configuration file.

use std::time::Duration;

use crate::error::RelayError;

pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Flow endpoint URL
    pub endpoint: String,
    /// Bearer token for the endpoint
    pub api_key: String,
    /// Port the UI collaborator binds; carried here so one place owns the env
    pub port: u16,
    /// Overall deadline for each exchange
    pub timeout: Duration,
}

impl RelayConfig {
    /// Read configuration from the process environment. `RELAY_ENDPOINT` and
    /// `RELAY_API_KEY` are required; `RELAY_PORT` and `RELAY_TIMEOUT_SECS`
    /// fall back to defaults.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let endpoint = lookup("RELAY_ENDPOINT")
            .ok_or_else(|| RelayError::Config("RELAY_ENDPOINT must be set".to_string()))?;
        let api_key = lookup("RELAY_API_KEY")
            .ok_or_else(|| RelayError::Config("RELAY_API_KEY must be set".to_string()))?;

        let port = match lookup("RELAY_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                RelayError::Config(format!("RELAY_PORT is not a port number: {}", raw))
            })?,
            None => DEFAULT_PORT,
        };

        let timeout = match lookup("RELAY_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    RelayError::Config(format!("RELAY_TIMEOUT_SECS is not a number: {}", raw))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(RelayConfig {
            endpoint,
            api_key,
            port,
            timeout,
        })
    }
}
