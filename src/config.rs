//! Configuration shared by the session, the render loop and the UI.
//!
//! Every field has a default, so an empty (or absent) YAML file yields the
//! stock plotter: a 10 s trailing window, 1000 retained samples per series,
//! 50 ms redraw and a 1 s serial read timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::color_scheme::ColorScheme;
use crate::error::ConfigError;
use crate::parser::Grammar;
use crate::serial::ConnectionConfig;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "serial-liveplot.yaml";

// ─────────────────────────────────────────────────────────────────────────────
// Bound policy
// ─────────────────────────────────────────────────────────────────────────────

/// Rule deciding which old samples a series evicts.
///
/// Exactly one policy is active per store. `Count` keeps history that has
/// scrolled off screen; `Window` drops it as soon as it is older than the
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundPolicy {
    /// Keep at most `max_samples` entries; drop the oldest first.
    Count { max_samples: usize },
    /// Keep only entries within `window_secs` of the newest one.
    Window { window_secs: f64 },
}

impl Default for BoundPolicy {
    fn default() -> Self {
        BoundPolicy::Count { max_samples: 1000 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// X axis labelling
// ─────────────────────────────────────────────────────────────────────────────

/// How X tick labels are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XAxisMode {
    /// Local wall-clock time, `HH:MM:SS`.
    #[default]
    WallClock,
    /// Seconds elapsed since the current connection was opened.
    SinceConnect,
}

// ─────────────────────────────────────────────────────────────────────────────
// PlotterConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration for the plotter.
///
/// | Field               | Purpose |
/// |---------------------|---------|
/// | `time_window_secs`  | Width of the trailing X window |
/// | `bound`             | Per-series retention rule |
/// | `refresh_period_ms` | Render loop period |
/// | `y_padding`         | Fractional padding added above and below the data |
/// | `default_y_range`   | Y range used when nothing visible has data |
/// | `read_timeout_ms`   | Serial read timeout, bounds `disconnect()` latency |
/// | `grammar`           | Wire grammar accepted by the parser |
/// | `serial`            | Initial connection settings shown in the UI |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotterConfig {
    pub time_window_secs: f64,
    pub bound: BoundPolicy,
    pub refresh_period_ms: u64,
    pub y_padding: f64,
    pub default_y_range: [f64; 2],
    pub read_timeout_ms: u64,
    pub grammar: Grammar,
    pub color_scheme: ColorScheme,
    pub x_axis: XAxisMode,
    pub serial: ConnectionConfig,
    /// Native window title.
    pub title: String,
}

impl Default for PlotterConfig {
    fn default() -> Self {
        Self {
            time_window_secs: 10.0,
            bound: BoundPolicy::default(),
            refresh_period_ms: 50,
            y_padding: 0.1,
            default_y_range: [-10.0, 10.0],
            read_timeout_ms: 1000,
            grammar: Grammar::default(),
            color_scheme: ColorScheme::default(),
            x_axis: XAxisMode::default(),
            serial: ConnectionConfig::default(),
            title: "Realtime Serial Plotter".to_string(),
        }
    }
}

impl PlotterConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_period_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_window_secs.is_finite() && self.time_window_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "time_window_secs must be positive, got {}",
                self.time_window_secs
            )));
        }
        match self.bound {
            BoundPolicy::Count { max_samples: 0 } => {
                return Err(ConfigError::Invalid(
                    "bound.max_samples must be at least 1".into(),
                ));
            }
            BoundPolicy::Window { window_secs }
                if !(window_secs.is_finite() && window_secs > 0.0) =>
            {
                return Err(ConfigError::Invalid(format!(
                    "bound.window_secs must be positive, got {window_secs}"
                )));
            }
            _ => {}
        }
        if self.refresh_period_ms == 0 {
            return Err(ConfigError::Invalid("refresh_period_ms must be at least 1".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid("read_timeout_ms must be at least 1".into()));
        }
        if !(self.y_padding.is_finite() && self.y_padding >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "y_padding must be non-negative, got {}",
                self.y_padding
            )));
        }
        let [lo, hi] = self.default_y_range;
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ConfigError::Invalid(format!(
                "default_y_range must be increasing, got [{lo}, {hi}]"
            )));
        }
        Ok(())
    }

    /// Load and validate a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text, path)
    }

    fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        let cfg: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load `path` if given (it must exist); otherwise try
    /// [`DEFAULT_CONFIG_FILE`] and fall back to defaults when it is absent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            return Self::load(p);
        }
        let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
        if implicit.is_file() {
            tracing::info!(path = %implicit.display(), "loading configuration");
            Self::load(&implicit)
        } else {
            Ok(Self::default())
        }
    }
}
