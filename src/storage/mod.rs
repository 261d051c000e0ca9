//! Storage Layer
//!
//! Platform directories for the settings file and the calibration data.

use anyhow::Result;
use std::path::PathBuf;

/// File name of the settings file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";
/// File name the calibration tool writes
pub const CALIBRATION_FILE: &str = "calibration.json";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "deckscout", "DeckScout")
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs =
        project_dirs().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    let config_dir = proj_dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&config_dir)?;

    Ok(config_dir)
}

/// Default settings file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Default calibration file path
pub fn default_calibration_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CALIBRATION_FILE))
}
