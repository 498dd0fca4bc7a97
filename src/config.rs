//! Runtime configuration.
//!
//! Layered: built-in defaults, then an optional JSON file named by
//! `VIEWFINDER_CONFIG` (all fields optional), then `VIEWFINDER_*` env
//! overrides, then validation. The daemon calls [`ViewfinderConfig::load`]
//! once at startup.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::frame::CameraConfig;
use crate::sheet::SheetConfig;

const DEFAULT_CAMERA_URL: &str = "stub://front_camera";
const DEFAULT_CAMERA_WIDTH: u32 = 1280;
const DEFAULT_CAMERA_HEIGHT: u32 = 720;
const DEFAULT_CAMERA_WARMUP_MS: u64 = 0;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_VIEWPORT_HEIGHT: f32 = 800.0;
const DEFAULT_COLLAPSED_RATIO: f32 = 0.1;
const DEFAULT_EXPANDED_RATIO: f32 = 0.4;
const DEFAULT_VELOCITY_THRESHOLD: f32 = 0.2;
const DEFAULT_DISTANCE_RATIO: f32 = 0.15;

#[derive(Debug, Deserialize, Default)]
struct ViewfinderConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    sheet: Option<SheetConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    warmup_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct SheetConfigFile {
    viewport_height: Option<f32>,
    collapsed_height_ratio: Option<f32>,
    expanded_height_ratio: Option<f32>,
    velocity_threshold: Option<f32>,
    distance_threshold_ratio: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ViewfinderConfig {
    pub camera: CameraSettings,
    pub backend: String,
    pub interval: Duration,
    pub sheet: SheetSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub warmup: Duration,
}

#[derive(Debug, Clone)]
pub struct SheetSettings {
    pub viewport_height: f32,
    pub collapsed_height_ratio: f32,
    pub expanded_height_ratio: f32,
    pub velocity_threshold: f32,
    pub distance_threshold_ratio: f32,
}

impl ViewfinderConfig {
    /// Load from the file named by `VIEWFINDER_CONFIG` (JSON, all fields
    /// optional), then apply env overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VIEWFINDER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ViewfinderConfigFile) -> Self {
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            warmup: Duration::from_millis(
                file.camera
                    .as_ref()
                    .and_then(|camera| camera.warmup_ms)
                    .unwrap_or(DEFAULT_CAMERA_WARMUP_MS),
            ),
        };
        let backend = file
            .detector
            .as_ref()
            .and_then(|detector| detector.backend.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let interval = Duration::from_millis(
            file.detector
                .as_ref()
                .and_then(|detector| detector.interval_ms)
                .unwrap_or(DEFAULT_INTERVAL_MS),
        );
        let sheet = SheetSettings {
            viewport_height: file
                .sheet
                .as_ref()
                .and_then(|sheet| sheet.viewport_height)
                .unwrap_or(DEFAULT_VIEWPORT_HEIGHT),
            collapsed_height_ratio: file
                .sheet
                .as_ref()
                .and_then(|sheet| sheet.collapsed_height_ratio)
                .unwrap_or(DEFAULT_COLLAPSED_RATIO),
            expanded_height_ratio: file
                .sheet
                .as_ref()
                .and_then(|sheet| sheet.expanded_height_ratio)
                .unwrap_or(DEFAULT_EXPANDED_RATIO),
            velocity_threshold: file
                .sheet
                .as_ref()
                .and_then(|sheet| sheet.velocity_threshold)
                .unwrap_or(DEFAULT_VELOCITY_THRESHOLD),
            distance_threshold_ratio: file
                .sheet
                .as_ref()
                .and_then(|sheet| sheet.distance_threshold_ratio)
                .unwrap_or(DEFAULT_DISTANCE_RATIO),
        };
        Self {
            camera,
            backend,
            interval,
            sheet,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("VIEWFINDER_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(backend) = std::env::var("VIEWFINDER_BACKEND") {
            if !backend.trim().is_empty() {
                self.backend = backend;
            }
        }
        if let Ok(interval) = std::env::var("VIEWFINDER_INTERVAL_MS") {
            let millis: u64 = interval
                .parse()
                .map_err(|_| anyhow!("VIEWFINDER_INTERVAL_MS must be an integer number of milliseconds"))?;
            self.interval = Duration::from_millis(millis);
        }
        if let Ok(height) = std::env::var("VIEWFINDER_VIEWPORT_HEIGHT") {
            let height: f32 = height
                .parse()
                .map_err(|_| anyhow!("VIEWFINDER_VIEWPORT_HEIGHT must be a number of pixels"))?;
            self.sheet.viewport_height = height;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("detector interval must be greater than zero"));
        }
        if self.sheet.viewport_height <= 0.0 {
            return Err(anyhow!("viewport height must be greater than zero"));
        }
        for (name, ratio) in [
            ("collapsed_height_ratio", self.sheet.collapsed_height_ratio),
            ("expanded_height_ratio", self.sheet.expanded_height_ratio),
            ("distance_threshold_ratio", self.sheet.distance_threshold_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(anyhow!("{} must be within 0..=1", name));
            }
        }
        if self.sheet.expanded_height_ratio <= self.sheet.collapsed_height_ratio {
            return Err(anyhow!(
                "expanded_height_ratio must exceed collapsed_height_ratio"
            ));
        }
        if self.sheet.velocity_threshold < 0.0 {
            return Err(anyhow!("velocity_threshold must not be negative"));
        }
        Ok(())
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            url: self.camera.url.clone(),
            width: self.camera.width,
            height: self.camera.height,
            warmup: self.camera.warmup,
        }
    }

    pub fn sheet_config(&self) -> SheetConfig {
        SheetConfig {
            viewport_height: self.sheet.viewport_height,
            collapsed_height_ratio: self.sheet.collapsed_height_ratio,
            expanded_height_ratio: self.sheet.expanded_height_ratio,
            velocity_threshold: self.sheet.velocity_threshold,
            distance_threshold_ratio: self.sheet.distance_threshold_ratio,
            ..SheetConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<ViewfinderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
