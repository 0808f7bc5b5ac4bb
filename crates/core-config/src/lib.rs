//! Configuration loading and resolution.
//!
//! Sources, lowest to highest precedence: built-in defaults, a
//! `scenepilot.toml` file (working directory first, then the platform config
//! dir), the process environment (`SFU_API_BASE`, `DEVICE_ID`, `HID_W`,
//! `HID_H`), and CLI flags applied by the binary on top of the resolved
//! value. Unknown fields are ignored (TOML deserialization tolerance) so the
//! file can grow without breaking older binaries.
//!
//! The environment is captured once into [`EnvOverrides`] so resolution
//! stays a pure function of its inputs and tests never mutate process state.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Default HID injector endpoint when neither file nor environment names one.
pub const DEFAULT_API_BASE: &str = "http://192.168.124.45:8888/api/message";

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub base: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DeviceConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub hid_w: Option<i32>,
    #[serde(default)]
    pub hid_h: Option<i32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct DetectorConfig {
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Snapshot of the environment variables the resolver honours.
///
/// Empty values are treated as unset, matching the HID-enable rule: an empty
/// `DEVICE_ID` disables dispatch rather than addressing an empty device.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub api_base: Option<String>,
    pub device_id: Option<String>,
    pub hid_w: Option<i32>,
    pub hid_h: Option<i32>,
}

impl EnvOverrides {
    pub fn capture() -> Self {
        Self {
            api_base: read_var("SFU_API_BASE"),
            device_id: read_var("DEVICE_ID"),
            hid_w: read_var("HID_W").and_then(|v| v.parse().ok()),
            hid_h: read_var("HID_H").and_then(|v| v.parse().ok()),
        }
    }
}

fn read_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

/// Fully resolved configuration consumed by the binaries.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub device_id: String,
    pub hid_w: i32,
    pub hid_h: i32,
    pub template_dir: Option<PathBuf>,
}

impl Config {
    /// Merge file values and environment overrides onto the defaults.
    pub fn resolve(file: &ConfigFile, env: &EnvOverrides) -> Self {
        let api_base = env
            .api_base
            .clone()
            .or_else(|| file.api.base.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let device_id = env
            .device_id
            .clone()
            .or_else(|| file.device.id.clone())
            .unwrap_or_default();
        let hid_w = env.hid_w.or(file.device.hid_w).unwrap_or(0);
        let hid_h = env.hid_h.or(file.device.hid_h).unwrap_or(0);
        Self {
            api_base,
            device_id,
            hid_w,
            hid_h,
            template_dir: file.detector.template_dir.clone(),
        }
    }

    /// HID dispatch is enabled only with a device id and a nonzero screen
    /// size in both dimensions.
    pub fn hid_enabled(&self) -> bool {
        !self.device_id.is_empty() && self.hid_w > 0 && self.hid_h > 0
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    // Prefer a local working-directory `scenepilot.toml` before falling back
    // to the platform config dir.
    let local = PathBuf::from("scenepilot.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("scenepilot").join("scenepilot.toml");
    }
    // Final fallback relative filename.
    PathBuf::from("scenepilot.toml")
}

/// Load the config file, falling back to defaults when the file is missing
/// or malformed. A malformed file is logged and ignored rather than fatal;
/// the detector can always run with defaults.
pub fn load_from(path: Option<PathBuf>) -> Result<ConfigFile> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", file = %path.display(), "config_loaded");
                Ok(file)
            }
            Err(err) => {
                warn!(target: "config", file = %path.display(), %err, "config_parse_error");
                Ok(ConfigFile::default())
            }
        }
    } else {
        Ok(ConfigFile::default())
    }
}
