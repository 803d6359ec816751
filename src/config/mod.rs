//! Typed configuration.
//!
//! Process settings come from environment variables and are loaded once at
//! startup. Endpoint settings come from `seda:` URIs or a TOML file with
//! `[[endpoint]]` tables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::WaitForTaskToComplete;

pub const DEFAULT_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;

const SCHEME: &str = "seda:";

#[derive(Debug)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let endpoint = match std::env::var("SEDA_ENDPOINT") {
            Ok(uri) => EndpointConfig::from_uri(&uri)?,
            Err(_) => EndpointConfig::default(),
        };
        Ok(Self {
            endpoint,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

/// Settings for one SEDA endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Queue name; the endpoint URI is `seda:<name>`.
    pub name: String,
    /// Queue capacity.
    pub size: usize,
    /// Number of consumer workers.
    pub concurrent_consumers: usize,
    /// Default wait policy for producers on this endpoint.
    pub wait_for_task_to_complete: WaitForTaskToComplete,
    /// Default wait bound in milliseconds; `<= 0` waits indefinitely.
    pub timeout_ms: i64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            size: DEFAULT_QUEUE_SIZE,
            concurrent_consumers: 1,
            wait_for_task_to_complete: WaitForTaskToComplete::IfReplyExpected,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct EndpointsFile {
    #[serde(default)]
    endpoint: Vec<EndpointConfig>,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn uri(&self) -> String {
        format!("{SCHEME}{}", self.name)
    }

    /// Parse `seda:name?size=..&concurrentConsumers=..&waitForTaskToComplete=..&timeout=..`.
    ///
    /// `seda://name` is accepted too. Unknown options are an error.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| Error::Config(format!("not a seda endpoint uri: {uri}")))?;
        let rest = rest.strip_prefix("//").unwrap_or(rest);

        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };

        let mut config = Self::new(name);
        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("option without value in {uri}: {pair}")))?;
            match key {
                "size" => config.size = parse_option(key, value)?,
                "concurrentConsumers" => config.concurrent_consumers = parse_option(key, value)?,
                "timeout" => config.timeout_ms = parse_option(key, value)?,
                "waitForTaskToComplete" => config.wait_for_task_to_complete = value.parse()?,
                _ => {
                    return Err(Error::Config(format!("unknown option {key} in {uri}")));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load every `[[endpoint]]` table from a TOML file.
    pub fn load_toml(path: &Path) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
            .map_err(|e| Error::Config(format!("bad endpoint config {}: {e}", path.display())))
    }

    /// Parse `[[endpoint]]` tables from TOML text.
    pub fn parse_toml(content: &str) -> Result<Vec<Self>> {
        let file: EndpointsFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        for endpoint in &file.endpoint {
            endpoint.validate()?;
        }
        Ok(file.endpoint)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("endpoint name must not be empty".to_string()));
        }
        if self.size == 0 {
            return Err(Error::Config(format!("{}: size must be at least 1", self.uri())));
        }
        if self.concurrent_consumers == 0 {
            return Err(Error::Config(format!(
                "{}: concurrentConsumers must be at least 1",
                self.uri()
            )));
        }
        Ok(())
    }
}

fn parse_option<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid value for {key}: {value} ({e})")))
}
