// Engine configuration - RON file with per-section defaults

use crate::layout::view::{Stacking, ViewTransform};
use crate::sequencer::time::{Tempo, Tick};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Serialize(#[from] ron::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Debounce window for layout passes
    pub frame_interval_ms: u64,
    pub pixels_per_quarter: f32,
    pub lane_height: f32,
    pub lane_spacing: f32,
    pub min_block_width: f32,
    pub stacking: Stacking,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let view = ViewTransform::default();
        Self {
            frame_interval_ms: 16,
            pixels_per_quarter: view.pixels_per_quarter,
            lane_height: view.lane_height,
            lane_spacing: view.lane_spacing,
            min_block_width: view.min_block_width,
            stacking: view.stacking,
        }
    }
}

impl LayoutConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn view(&self) -> ViewTransform {
        ViewTransform {
            pixels_per_quarter: self.pixels_per_quarter,
            scroll_x: 0.0,
            lane_height: self.lane_height,
            lane_spacing: self.lane_spacing,
            min_block_width: self.min_block_width,
            stacking: self.stacking,
        }
    }
}

/// Longest skip distance accepted from a config file
pub const MAX_SKIP_QUARTERS: u64 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub command_capacity: usize,
    pub notification_capacity: usize,
    pub sample_rate: f64,
    pub tempo_bpm: f64,
    /// Skip back/forward distance, in quarter notes
    pub skip_quarters: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command_capacity: 256,
            notification_capacity: 64,
            sample_rate: 48_000.0,
            tempo_bpm: 120.0,
            skip_quarters: 4,
        }
    }
}

impl TransportConfig {
    pub fn tempo(&self) -> Option<Tempo> {
        Tempo::new(self.tempo_bpm)
    }

    pub fn skip_delta(&self) -> Tick {
        Tick::quarters(self.skip_quarters)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_undo: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_undo: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingConfig {
    /// Snap dragged blocks onto nearby block edges and events
    pub snap: bool,
    pub snap_window_ticks: u64,
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            snap: true,
            snap_window_ticks: Tick::PER_QUARTER / 4,
        }
    }
}

impl EditingConfig {
    /// Snap reach, `None` with snapping off
    pub fn snap_window(&self) -> Option<Tick> {
        self.snap.then_some(Tick(self.snap_window_ticks))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub transport: TransportConfig,
    pub history: HistoryConfig,
    pub editing: EditingConfig,
}

impl EngineConfig {
    /// Parse and validate a RON document. Missing fields take defaults.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let source = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, source)?;
        Ok(())
    }

    /// `<config dir>/blockseq/engine.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("blockseq").join("engine.ron"))
    }

    /// Config from the default path. A missing file gives defaults; a broken
    /// one is reported and replaced by defaults.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if layout.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("layout.frame_interval_ms must be > 0".into()));
        }
        if !(layout.pixels_per_quarter > 0.0) {
            return Err(ConfigError::Invalid("layout.pixels_per_quarter must be > 0".into()));
        }
        if !(layout.lane_height > 0.0) {
            return Err(ConfigError::Invalid("layout.lane_height must be > 0".into()));
        }
        if layout.lane_spacing < 0.0 || layout.min_block_width < 0.0 {
            return Err(ConfigError::Invalid(
                "layout spacing and minimum width must not be negative".into(),
            ));
        }

        let transport = &self.transport;
        if transport.command_capacity == 0 || transport.notification_capacity == 0 {
            return Err(ConfigError::Invalid("channel capacities must be > 0".into()));
        }
        if !(transport.sample_rate > 0.0) {
            return Err(ConfigError::Invalid("transport.sample_rate must be > 0".into()));
        }
        if transport.skip_quarters == 0 || transport.skip_quarters > MAX_SKIP_QUARTERS {
            return Err(ConfigError::Invalid(format!(
                "transport.skip_quarters must be within 1-{MAX_SKIP_QUARTERS}"
            )));
        }
        if transport.tempo().is_none() {
            return Err(ConfigError::Invalid(format!(
                "transport.tempo_bpm {} is outside {}-{}",
                transport.tempo_bpm,
                Tempo::MIN_BPM,
                Tempo::MAX_BPM
            )));
        }

        if self.history.max_undo == 0 {
            return Err(ConfigError::Invalid("history.max_undo must be > 0".into()));
        }
        Ok(())
    }
}
