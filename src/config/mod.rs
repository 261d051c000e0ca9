//! Application Configuration
//!
//! User settings stored in TOML format, plus the calibration data written
//! by the calibration tool (JSON).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::decks::DEFAULT_HISTORY_WINDOW;
use crate::analysis::StabilityConfig;
use crate::capture::{Region, Roi};
use crate::error::ConfigError;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory API settings
    pub api: ApiSettings,
    /// Scan loop settings
    pub scan: ScanSettings,
    /// Deck analytics settings
    pub analytics: AnalyticsSettings,
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Inline calibration, overridden by a calibration file
    pub calibration: Option<Calibration>,
}

/// Directory API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// API root, no trailing slash needed
    pub base_url: String,
    /// Bearer token
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Delay before the single retry in milliseconds
    pub retry_delay_ms: u64,
    /// User-Agent header
    pub user_agent: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.clashroyale.com/v1".to_string(),
            token: None,
            timeout_secs: 15,
            retry_delay_ms: 1000,
            user_agent: "deckfinder/1.0".to_string(),
        }
    }
}

impl ApiSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Token from settings, rejecting blanks
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)
    }
}

/// Scan loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Pause between ticks in milliseconds
    pub interval_ms: u64,
    /// Minimum mean OCR confidence per field (0.0 - 100.0)
    pub min_confidence: f32,
    /// Minimum text length per field
    pub min_text_len: usize,
    /// Consecutive identical readings before a lookup
    pub stability_threshold: u32,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Minimum name similarity for a fuzzy player match (0 accepts any)
    pub min_player_similarity: f64,
    /// Stop after this many ticks; unbounded when absent
    pub max_ticks: Option<u64>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            interval_ms: 400,
            min_confidence: 35.0,
            min_text_len: 3,
            stability_threshold: 1,
            event_capacity: 256,
            min_player_similarity: 0.0,
            max_ticks: None,
        }
    }
}

impl ScanSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn stability(&self) -> StabilityConfig {
        StabilityConfig {
            min_text_len: self.min_text_len,
            min_confidence: self.min_confidence,
            threshold: self.stability_threshold.max(1),
        }
    }
}

/// Deck analytics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// Ladder battles compared against the current deck
    pub history_window: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract executable name or path
    pub tesseract_cmd: PathBuf,
    /// Traineddata language
    pub language: String,
    /// Optional tessdata directory
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_cmd: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            tessdata_dir: None,
        }
    }
}

/// Screen calibration: two absolute ROIs and an optional capture region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub roi_name: Roi,
    pub roi_clan: Roi,
    /// Absent means the whole primary monitor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_region: Option<Region>,
}

impl Calibration {
    /// Reject a capture region with non-positive size
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(r) = self.capture_region {
            Region::new(r.left, r.top, r.width, r.height)?;
        }
        Ok(())
    }
}

/// Load calibration written by the calibration tool
pub fn load_calibration(path: &Path) -> Result<Calibration, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let calibration: Calibration = serde_json::from_str(&content)?;
    calibration.validate()?;
    Ok(calibration)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
