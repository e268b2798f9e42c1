//! Agent configuration
//!
//! Read from a TOML file named by `HITWINDOW_CONFIG` (default
//! `hitwindow.toml`). A missing file is not an error: the agent runs with
//! defaults.
//!
//! ```toml
//! window_seconds = 60
//! evict_interval_ms = 500
//! render_interval_ms = 10000
//!
//! [[metrics]]
//! name = "discord_events_received_total"
//! help = "Discord total events received last minute"
//! labels = ["event"]
//! ```

use crate::error::{HitError, Result};
use crate::exposition::WindowedGauge;
use crate::window::{WindowRegistry, DEFAULT_WINDOW_SECONDS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "HITWINDOW_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "hitwindow.toml";

/// One windowed metric: a gauge backed by its own registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Overrides the top-level window for this metric
    #[serde(default)]
    pub window_seconds: Option<u64>,
}

impl MetricConfig {
    pub fn new(name: impl Into<String>, help: impl Into<String>, labels: &[&str]) -> Self {
        MetricConfig {
            name: name.into(),
            help: help.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            window_seconds: None,
        }
    }

    /// Build the registry and gauge this entry describes
    pub fn build(&self, default_window: u64) -> Result<WindowedGauge> {
        let window = self.window_seconds.unwrap_or(default_window);
        let registry = Arc::new(WindowRegistry::new(self.labels.iter().cloned(), window));
        WindowedGauge::new(self.name.clone(), self.help.clone(), registry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// History kept by every counter, in seconds
    pub window_seconds: u64,
    /// Period of the background evictor, in milliseconds (1..=999)
    pub evict_interval_ms: u64,
    /// How often the binary writes the exposition to stdout
    pub render_interval_ms: u64,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
    pub metrics: Vec<MetricConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            evict_interval_ms: 500,
            render_interval_ms: 10_000,
            log_json: false,
            metrics: vec![MetricConfig::new(
                "discord_events_received_total",
                "Discord total events received last minute",
                &["event"],
            )],
        }
    }
}

impl Config {
    /// Parse a TOML document and validate it
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| HitError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| HitError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Load from the file named by `HITWINDOW_CONFIG`, or the default path
    pub fn from_env() -> Result<Self> {
        Self::load(&Self::path_from_env())
    }

    pub fn path_from_env() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        if self.evict_interval_ms == 0 || self.evict_interval_ms >= 1000 {
            return Err(HitError::Config(format!(
                "evict_interval_ms must be between 1 and 999, got {}",
                self.evict_interval_ms
            )));
        }
        if self.render_interval_ms == 0 {
            return Err(HitError::Config("render_interval_ms must be positive".into()));
        }
        for (i, metric) in self.metrics.iter().enumerate() {
            if metric.name.is_empty() {
                return Err(HitError::Config(format!("metrics[{}] has an empty name", i)));
            }
            if self.metrics[..i].iter().any(|m| m.name == metric.name) {
                return Err(HitError::Config(format!(
                    "metric {} is defined twice",
                    metric.name
                )));
            }
        }
        Ok(())
    }

    pub fn evict_interval(&self) -> Duration {
        Duration::from_millis(self.evict_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn metric(&self, name: &str) -> Option<&MetricConfig> {
        self.metrics.iter().find(|m| m.name == name)
    }
}
