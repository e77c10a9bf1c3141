//! Persisted user settings and their live-change subscription
//!
//! The key names are an external contract shared with the settings UI and
//! are preserved verbatim in the JSON file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{default_true, MonitorKind};

/// User settings record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Page-health monitoring feature on/off
    #[serde(rename = "autoRefreshEnabled", default = "default_true")]
    pub auto_refresh_enabled: bool,
    /// Reload the page automatically when the server recovers
    #[serde(rename = "autoRefreshAutoReloadEnabled", default = "default_true")]
    pub auto_refresh_auto_reload_enabled: bool,
    #[serde(rename = "autoRefreshDarkMode", default)]
    pub auto_refresh_dark_mode: bool,
    /// Error-page variant: navigate back automatically on recovery
    #[serde(rename = "autoReloadEnabled", default)]
    pub auto_reload_enabled: bool,
    #[serde(rename = "errorPageDarkMode", default)]
    pub error_page_dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_refresh_enabled: true,
            auto_refresh_auto_reload_enabled: true,
            auto_refresh_dark_mode: false,
            auto_reload_enabled: false,
            error_page_dark_mode: false,
        }
    }
}

impl Settings {
    /// Whether the monitor may surface an overlay at all. The error page
    /// has no feature flag: it only exists because the server was down.
    pub fn feature_enabled_for(&self, kind: MonitorKind) -> bool {
        match kind {
            MonitorKind::PageHealth => self.auto_refresh_enabled,
            MonitorKind::ErrorPage => true,
        }
    }

    pub fn auto_reload_for(&self, kind: MonitorKind) -> bool {
        match kind {
            MonitorKind::PageHealth => self.auto_refresh_auto_reload_enabled,
            MonitorKind::ErrorPage => self.auto_reload_enabled,
        }
    }

    pub fn dark_mode_for(&self, kind: MonitorKind) -> bool {
        match kind {
            MonitorKind::PageHealth => self.auto_refresh_dark_mode,
            MonitorKind::ErrorPage => self.error_page_dark_mode,
        }
    }

    fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(value) = patch.auto_refresh_enabled {
            self.auto_refresh_enabled = value;
        }
        if let Some(value) = patch.auto_refresh_auto_reload_enabled {
            self.auto_refresh_auto_reload_enabled = value;
        }
        if let Some(value) = patch.auto_refresh_dark_mode {
            self.auto_refresh_dark_mode = value;
        }
        if let Some(value) = patch.auto_reload_enabled {
            self.auto_reload_enabled = value;
        }
        if let Some(value) = patch.error_page_dark_mode {
            self.error_page_dark_mode = value;
        }
    }
}

/// Partial settings update, written by the settings UI
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(rename = "autoRefreshEnabled", default)]
    pub auto_refresh_enabled: Option<bool>,
    #[serde(rename = "autoRefreshAutoReloadEnabled", default)]
    pub auto_refresh_auto_reload_enabled: Option<bool>,
    #[serde(rename = "autoRefreshDarkMode", default)]
    pub auto_refresh_dark_mode: Option<bool>,
    #[serde(rename = "autoReloadEnabled", default)]
    pub auto_reload_enabled: Option<bool>,
    #[serde(rename = "errorPageDarkMode", default)]
    pub error_page_dark_mode: Option<bool>,
}

/// Settings store: holds the current record, persists writes, and feeds a
/// change subscription the monitor reacts to without restarting its loop
#[derive(Debug, Clone)]
pub struct SettingsStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Load settings from a JSON file; a missing path or file means defaults
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let settings = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    crate::WatchError::Settings(format!(
                        "Failed to read settings file {:?}: {}",
                        p, e
                    ))
                })?;
                serde_json::from_str(&content)?
            }
            _ => Settings::default(),
        };

        let (tx, _rx) = watch::channel(settings);
        Ok(Self {
            inner: Arc::new(Inner {
                path: path.map(Path::to_path_buf),
                tx,
            }),
        })
    }

    /// Store without a backing file, starting from the given record
    pub fn in_memory(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self {
            inner: Arc::new(Inner { path: None, tx }),
        }
    }

    pub fn current(&self) -> Settings {
        *self.inner.tx.borrow()
    }

    /// Subscribe to live settings changes
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.inner.tx.subscribe()
    }

    /// Apply a partial update, persist it, and notify subscribers
    pub fn update(&self, patch: &SettingsPatch) -> crate::Result<Settings> {
        let mut next = self.current();
        next.apply(patch);
        self.persist(&next)?;
        self.inner.tx.send_replace(next);
        Ok(next)
    }

    /// Write back the auto-reload toggle for the running monitor variant
    pub fn set_auto_reload(&self, kind: MonitorKind, value: bool) -> crate::Result<Settings> {
        let patch = match kind {
            MonitorKind::PageHealth => SettingsPatch {
                auto_refresh_auto_reload_enabled: Some(value),
                ..SettingsPatch::default()
            },
            MonitorKind::ErrorPage => SettingsPatch {
                auto_reload_enabled: Some(value),
                ..SettingsPatch::default()
            },
        };
        self.update(&patch)
    }

    fn persist(&self, settings: &Settings) -> crate::Result<()> {
        if let Some(path) = &self.inner.path {
            let content = serde_json::to_string_pretty(settings)?;
            std::fs::write(path, content).map_err(|e| {
                crate::WatchError::Settings(format!(
                    "Failed to write settings file {:?}: {}",
                    path, e
                ))
            })?;
        }
        Ok(())
    }
}
