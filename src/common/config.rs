use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::error::{FaceGateError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Extra headers sent with every submission. The default suppresses the
    /// interstitial page of the tunnelling proxy in front of the service.
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    "https://52ve8mm1q0ra.share.zrok.io".to_string()
}
fn default_timeout_seconds() -> u64 { 20 }
fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("skip_zrok_interstitial".to_string(), "true".to_string())])
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            headers: default_headers(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    /// `999` means auto-detect.
    #[serde(default)]
    pub device_index: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_warmup_frames")]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_warmup_frames() -> u32 { 5 }
fn default_warmup_delay() -> u64 { 50 }
fn default_jpeg_quality() -> u8 { 70 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: default_width(),
            height: default_height(),
            warmup_frames: default_warmup_frames(),
            warmup_delay_ms: default_warmup_delay(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecognitionConfig {
    /// When false, face-only recognition is allowed and `cuil` is sent only
    /// if the caller has one.
    #[serde(default = "default_true")]
    pub require_cuil: bool,
}

fn default_true() -> bool { true }

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self { require_cuil: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NavigationConfig {
    #[serde(default = "default_home_screen")]
    pub home_screen: String,
}

fn default_home_screen() -> String {
    "Home".to_string()
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self { home_screen: default_home_screen() }
    }
}

impl Config {
    /// Resolve and load the config. An explicit path must exist; otherwise the
    /// search path is walked and, in dev mode only, defaults are used when
    /// nothing is found.
    pub fn load(explicit: Option<&Path>, dev_mode: bool) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let candidates = paths::config_search_path(dev_mode);
        if let Some(path) = candidates.iter().find(|p| p.exists()) {
            return Self::load_from_path(path);
        }

        if dev_mode {
            tracing::debug!("No config file found in {:?}, using defaults", candidates);
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }

        Err(FaceGateError::Config(format!(
            "Config file not found. Looked in: {}",
            display_paths(&candidates)
        )))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceGateError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| FaceGateError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.service.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(FaceGateError::Config(format!(
                "Service base_url must be an http(s) URL, got {:?}", self.service.base_url
            )));
        }

        if self.service.timeout_seconds < 1 || self.service.timeout_seconds > 120 {
            return Err(FaceGateError::Config(format!(
                "Timeout must be between 1 and 120 seconds, got {}",
                self.service.timeout_seconds
            )));
        }

        // Validate camera dimensions
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceGateError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceGateError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(FaceGateError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}", self.camera.jpeg_quality
            )));
        }

        if self.navigation.home_screen.trim().is_empty() {
            return Err(FaceGateError::Config("Navigation home_screen must not be empty".into()));
        }

        Ok(())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.service.timeout_seconds, 20);
        assert_eq!(
            config.service.headers.get("skip_zrok_interstitial").map(String::as_str),
            Some("true")
        );
        assert!(config.recognition.require_cuil);
        assert_eq!(config.navigation.home_screen, "Home");
        assert_eq!(config.camera.jpeg_quality, 70);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            [service]
            base_url = "http://localhost:5000"
            timeout_seconds = 5

            [recognition]
            require_cuil = false
            "#,
        )
        .unwrap();

        assert_eq!(config.service.base_url, "http://localhost:5000");
        assert_eq!(config.service.timeout(), Duration::from_secs(5));
        assert!(!config.recognition.require_cuil);
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let err = Config::from_toml("[service]\ntimeout_seconds = 0\n").unwrap_err();
        assert!(err.to_string().contains("Timeout"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = Config::from_toml("[service]\nbase_url = \"ftp://host\"\n").unwrap_err();
        assert!(matches!(err, FaceGateError::Config(_)));
    }

    #[test]
    fn rejects_bad_jpeg_quality() {
        assert!(Config::from_toml("[camera]\njpeg_quality = 0\n").is_err());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/face-gate.toml")), true).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
