// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::{CodeType, DeviceSelector, LocationOptions, ScanOptions};
use crate::constants::{self, APP_ID};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How permission requests are answered
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionPolicy {
    /// Ask the user (terminal prompt or dialog)
    #[default]
    Prompt,
    /// Grant every request without asking
    Grant,
    /// Deny every request without asking
    Deny,
}

impl std::str::FromStr for PermissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(Self::Prompt),
            "grant" => Ok(Self::Grant),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown permission policy '{}'", other)),
        }
    }
}

/// Where camera frames come from
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScannerBackendType {
    /// V4L2 capture device
    #[default]
    V4l2,
    /// Still images listed in `image_sources`
    Images,
    /// Scripted demo codes
    Simulated,
}

/// Where location fixes come from
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationBackendType {
    /// GeoClue2 over the system bus
    #[default]
    GeoClue,
    /// JSON-lines file of fixes at `replay_path`
    Replay,
    /// Scripted walk
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How permission requests are answered
    pub permission_policy: PermissionPolicy,
    /// Camera to open for scanning
    pub camera: DeviceSelector,
    /// Scanner backend
    pub scanner_backend: ScannerBackendType,
    /// Image files used as frames by the image scanner
    pub image_sources: Vec<PathBuf>,
    /// Symbologies to report
    pub code_types: BTreeSet<CodeType>,
    /// Minimum time between decoded frames
    pub frame_interval_ms: u64,
    /// Location backend
    pub location_backend: LocationBackendType,
    /// Fix file for the replay backend
    pub replay_path: Option<PathBuf>,
    /// Options for "get position"
    pub single_fix: LocationOptions,
    /// Options for continuous tracking
    pub watch: LocationOptions,
    /// Desktop id reported to GeoClue (must match an installed .desktop file
    /// for the agent to authorize it)
    pub geoclue_desktop_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            permission_policy: PermissionPolicy::default(),
            camera: DeviceSelector::default(),
            scanner_backend: ScannerBackendType::default(),
            image_sources: Vec::new(),
            code_types: constants::scan::DEFAULT_CODE_TYPES.into_iter().collect(),
            frame_interval_ms: constants::scan::FRAME_INTERVAL.as_millis() as u64,
            location_backend: LocationBackendType::default(),
            replay_path: None,
            single_fix: LocationOptions::single_fix(),
            watch: LocationOptions::watch(),
            geoclue_desktop_id: APP_ID.to_string(),
        }
    }
}

impl Config {
    /// Default config file location: `<config dir>/capscreens/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_ID).join("config.json"))
    }

    /// Load configuration, falling back to defaults
    ///
    /// A missing file is normal on first run. A file that cannot be parsed is
    /// logged and ignored rather than blocking startup.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Ok(None) => {
                debug!(path = %path.display(), "No configuration file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable configuration");
                Self::default()
            }
        }
    }

    /// Read and validate a config file; `Ok(None)` if it does not exist
    pub fn read(path: &Path) -> AppResult<Option<Self>> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Write the configuration, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Reject values the sessions cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.code_types.is_empty() {
            return Err(AppError::Config("code_types must not be empty".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(AppError::Config("frame_interval_ms must be positive".into()));
        }
        for (name, options) in [("single_fix", &self.single_fix), ("watch", &self.watch)] {
            if options.timeout_ms == 0 {
                return Err(AppError::Config(format!("{}.timeout_ms must be positive", name)));
            }
            if !(options.distance_filter_m >= 0.0) {
                return Err(AppError::Config(format!(
                    "{}.distance_filter_m must be zero or positive",
                    name
                )));
            }
        }
        if self.watch.min_interval_ms == 0 {
            return Err(AppError::Config("watch.min_interval_ms must be positive".into()));
        }
        if self.location_backend == LocationBackendType::Replay && self.replay_path.is_none() {
            return Err(AppError::Config("replay backend needs replay_path".into()));
        }
        if self.geoclue_desktop_id.trim().is_empty() {
            return Err(AppError::Config("geoclue_desktop_id must not be empty".into()));
        }
        Ok(())
    }

    /// Scan options derived from the configuration
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            code_types: self.code_types.clone(),
            frame_interval: Duration::from_millis(self.frame_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"camera":"front"}"#).unwrap();
        assert_eq!(config.camera, DeviceSelector::Front);
        assert_eq!(config.single_fix, LocationOptions::single_fix());
        assert_eq!(config.permission_policy, PermissionPolicy::Prompt);
    }

    #[test]
    fn test_index_selector_serde() {
        let config: Config = serde_json::from_str(r#"{"camera":{"index":2}}"#).unwrap();
        assert_eq!(config.camera, DeviceSelector::Index(2));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("GRANT".parse::<PermissionPolicy>(), Ok(PermissionPolicy::Grant));
        assert!("maybe".parse::<PermissionPolicy>().is_err());
    }

    #[test]
    fn test_scan_options_follow_config() {
        let mut config = Config::default();
        config.code_types = [CodeType::Qr].into_iter().collect();
        config.frame_interval_ms = 250;
        let options = config.scan_options();
        assert!(options.accepts(CodeType::Qr));
        assert!(!options.accepts(CodeType::Ean13));
        assert_eq!(options.frame_interval, Duration::from_millis(250));
    }
}
