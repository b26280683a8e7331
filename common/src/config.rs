// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};
use thiserror::Error;
use url::Url;

/// Central configuration for the traffic monitor
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the firewall REST API (no trailing slash)
    pub api_url: String,
    /// Base URL of the push channel server (ws:// or wss://)
    pub push_url: String,
    /// Application whose traffic is monitored on startup
    pub app_id: Option<String>,
    pub page_size: u32,
    /// Bearer token issued by the auth service
    pub auth_token: Option<String>,

    pub session_check_interval_secs: u64,
    pub reconnect_max_backoff_secs: u64,
    pub report_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:4000".to_string(),
            push_url: "ws://localhost:4000".to_string(),
            app_id: None,
            page_size: 10,
            auth_token: None,

            session_check_interval_secs: 60,
            reconnect_max_backoff_secs: 60,
            report_interval_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // `CONFIG_DIR` wins; otherwise `config/` beside the working directory or one level up
        let config_dir = env::var("CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            ["./config", "../config"]
                .iter()
                .map(PathBuf::from)
                .find(|dir| dir.exists())
                .unwrap_or_else(|| PathBuf::from("./config"))
        });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__API_URL, APP__APP_ID, APP__AUTH_TOKEN, ...
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the sources are unusable
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration: {}", e);
                tracing::info!("Falling back to default configuration");
                Self::default()
            }
        }
    }

    /// Collection endpoint for one page of an application's traffic log
    pub fn traffic_log_url(&self, app_id: &str) -> Result<Url, EndpointError> {
        endpoint(&self.api_url, &["api", "apps", app_id, "traffic-log"])
    }

    /// Push channel endpoint scoped to one application
    pub fn push_channel_url(&self, app_id: &str) -> Result<Url, EndpointError> {
        let mut url = endpoint(&self.push_url, &["traffic"])?;
        url.query_pairs_mut().append_pair("appId", app_id);
        Ok(url)
    }
}

/// A configured base URL that cannot be turned into an endpoint
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("invalid base URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("base URL {0} cannot carry a path")]
    NotHierarchical(String),
}

/// Append percent-encoded path segments to `base`
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, EndpointError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| EndpointError::NotHierarchical(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
