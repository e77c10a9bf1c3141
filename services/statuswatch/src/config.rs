//! Configuration types for the statuswatch service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
    #[serde(default)]
    pub reload: Option<ReloadConfig>,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            settings_path: None,
            reload: None,
            dashboard: DashboardConfig::default(),
        }
    }
}

/// Which variant of the monitor is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorKind {
    PageHealth,
    ErrorPage,
}

/// Monitor configuration with tagged enum for the two poll variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorConfig {
    /// In-page monitor: 1s readiness polls against the page's own origin
    #[serde(rename = "page_health")]
    PageHealth {
        #[serde(default = "default_origin")]
        origin: String,
        #[serde(default = "default_page_path")]
        page_path: String,
        #[serde(default = "default_page_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default = "default_excluded_path_prefixes")]
        excluded_path_prefixes: Vec<String>,
    },
    /// Dedicated error-page monitor: fast polls until the failing URL recovers
    #[serde(rename = "error_page")]
    ErrorPage {
        original_url: String,
        #[serde(default = "default_error_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default = "default_start_delay_ms")]
        start_delay_ms: u64,
    },
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig::PageHealth {
            origin: default_origin(),
            page_path: default_page_path(),
            poll_interval_ms: default_page_poll_interval_ms(),
            excluded_path_prefixes: default_excluded_path_prefixes(),
        }
    }
}

impl MonitorConfig {
    pub fn kind(&self) -> MonitorKind {
        match self {
            MonitorConfig::PageHealth { .. } => MonitorKind::PageHealth,
            MonitorConfig::ErrorPage { .. } => MonitorKind::ErrorPage,
        }
    }

    pub fn poll_interval_ms(&self) -> u64 {
        match self {
            MonitorConfig::PageHealth {
                poll_interval_ms, ..
            } => *poll_interval_ms,
            MonitorConfig::ErrorPage {
                poll_interval_ms, ..
            } => *poll_interval_ms,
        }
    }

    /// Resolve the raw configuration into the values the engine runs on
    pub fn resolve(&self) -> crate::Result<MonitorSpec> {
        match self {
            MonitorConfig::PageHealth {
                origin,
                page_path,
                poll_interval_ms,
                excluded_path_prefixes,
            } => {
                let origin = parse_origin(origin)?;
                let reload_target = format!("{}{}", origin, page_path);
                Ok(MonitorSpec {
                    kind: MonitorKind::PageHealth,
                    origin,
                    page_path: page_path.clone(),
                    poll_interval: Duration::from_millis(*poll_interval_ms),
                    // First poll fires after one full interval, like the
                    // repeating timer it replaces
                    start_delay: Duration::from_millis(*poll_interval_ms),
                    excluded_path_prefixes: excluded_path_prefixes.clone(),
                    reload_target,
                })
            }
            MonitorConfig::ErrorPage {
                original_url,
                poll_interval_ms,
                start_delay_ms,
            } => {
                let url = url::Url::parse(original_url).map_err(|e| {
                    crate::WatchError::Config(format!(
                        "Invalid original_url {:?}: {}",
                        original_url, e
                    ))
                })?;
                let origin = parse_origin(original_url)?;
                Ok(MonitorSpec {
                    kind: MonitorKind::ErrorPage,
                    origin,
                    page_path: url.path().to_string(),
                    poll_interval: Duration::from_millis(*poll_interval_ms),
                    start_delay: Duration::from_millis(*start_delay_ms),
                    excluded_path_prefixes: Vec::new(),
                    reload_target: original_url.clone(),
                })
            }
        }
    }
}

/// Extract protocol+host+port from a URL, normalized (default ports elided)
fn parse_origin(raw: &str) -> crate::Result<String> {
    let url = url::Url::parse(raw)
        .map_err(|e| crate::WatchError::Config(format!("Invalid URL {:?}: {}", raw, e)))?;

    match url.origin() {
        url::Origin::Tuple(..) => Ok(url.origin().ascii_serialization()),
        url::Origin::Opaque(_) => Err(crate::WatchError::Config(format!(
            "URL {:?} has no usable origin",
            raw
        ))),
    }
}

/// Monitor configuration resolved for the engine
#[derive(Debug, Clone)]
pub struct MonitorSpec {
    pub kind: MonitorKind,
    pub origin: String,
    pub page_path: String,
    pub poll_interval: Duration,
    pub start_delay: Duration,
    pub excluded_path_prefixes: Vec<String>,
    pub reload_target: String,
}

impl MonitorSpec {
    /// Paths under an excluded prefix are never monitored
    pub fn is_excluded(&self) -> bool {
        self.excluded_path_prefixes
            .iter()
            .any(|prefix| self.page_path.starts_with(prefix.as_str()))
    }
}

/// Reload action configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReloadConfig {
    #[serde(rename = "webhook")]
    Webhook {
        url: String,
        #[serde(default)]
        token: Option<String>,
    },
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_dashboard_port(),
            history_size: default_history_size(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_page_path() -> String {
    "/".to_string()
}

fn default_page_poll_interval_ms() -> u64 {
    1000
}

fn default_excluded_path_prefixes() -> Vec<String> {
    vec!["/api/".to_string(), "/rest-api/".to_string()]
}

fn default_error_poll_interval_ms() -> u64 {
    100
}

fn default_start_delay_ms() -> u64 {
    200
}

pub(crate) fn default_true() -> bool {
    true
}

fn default_dashboard_port() -> u16 {
    11116
}

fn default_history_size() -> usize {
    100
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::WatchError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
