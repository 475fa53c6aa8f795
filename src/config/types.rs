use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub overlay: OverlayConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Height of every overlay image, in text rows
    #[serde(default = "default_image_rows")]
    pub image_rows: u16,

    /// Maximum number of console input events drained per tick
    #[serde(default = "default_input_batch")]
    pub input_batch: usize,

    /// Sleep between ticks in milliseconds (0 = run flat out)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Try to decode a marker again on every scan even after it failed once
    #[serde(default = "default_retry_failed_markers")]
    pub retry_failed_markers: bool,

    /// Rescan the visible text on every tick, even when nothing moved
    #[serde(default = "default_rescan_every_frame")]
    pub rescan_every_frame: bool,
}

impl OverlayConfig {
    /// Rows blanked by a splice: the marker row plus the image rows beneath it.
    pub fn reserved_rows(&self) -> u16 {
        self.image_rows.saturating_add(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level filter ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// File the detached watcher writes its log to
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

// Default functions
fn default_image_rows() -> u16 {
    10
}

fn default_input_batch() -> usize {
    8
}

fn default_tick_interval_ms() -> u64 {
    0
}

fn default_retry_failed_markers() -> bool {
    false
}

fn default_rescan_every_frame() -> bool {
    false
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("terminlay.log")
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            image_rows: default_image_rows(),
            input_batch: default_input_batch(),
            tick_interval_ms: default_tick_interval_ms(),
            retry_failed_markers: default_retry_failed_markers(),
            rescan_every_frame: default_rescan_every_frame(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            log: LogConfig::default(),
        }
    }
}
