//! Run configuration – reads `skewray.toml`.
//!
//! Lookup order: `--config <path>`, then `$SKEWRAY_CONFIG`, then
//! `./skewray.toml`.  A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skewray_geometry::Transform;
use skewray_runtime::PipelineConfig;
use skewray_types::{PixelShift, RigConfig};

use crate::error::CliError;

/// Rigid transform applied to every emitted point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTransform {
    /// Rotation about X, Y and Z in degrees, composed as `Rz · Rx · Ry`.
    #[serde(default)]
    pub rotation_deg: [f64; 3],
    #[serde(default)]
    pub translation: [f64; 3],
}

impl OutputTransform {
    pub fn to_transform(&self) -> Transform {
        Transform::from_euler_degrees(self.rotation_deg, self.translation)
    }
}

/// Contents of `skewray.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of camera streams in the rig.
    #[serde(default = "default_cameras")]
    pub cameras: usize,

    #[serde(default = "default_pixel_shift_x")]
    pub pixel_shift_x: f64,

    #[serde(default = "default_pixel_shift_y")]
    pub pixel_shift_y: f64,

    /// Relative parallelism tolerance of the skew-line solver.
    #[serde(default = "default_parallel_tolerance")]
    pub parallel_tolerance: f64,

    /// Emit the pairwise closest points next to each center.
    #[serde(default = "default_true")]
    pub include_diagnostics: bool,

    /// Compute reprojection residuals.
    #[serde(default = "default_true")]
    pub reproject: bool,

    /// `0` runs frames sequentially; `n > 0` runs up to `n` frames at once.
    #[serde(default)]
    pub workers: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_transform: Option<OutputTransform>,
}

fn default_cameras() -> usize {
    RigConfig::default().cameras
}
fn default_pixel_shift_x() -> f64 {
    PixelShift::default().x
}
fn default_pixel_shift_y() -> f64 {
    PixelShift::default().y
}
fn default_parallel_tolerance() -> f64 {
    PipelineConfig::default().parallel_tolerance
}
fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cameras: default_cameras(),
            pixel_shift_x: default_pixel_shift_x(),
            pixel_shift_y: default_pixel_shift_y(),
            parallel_tolerance: default_parallel_tolerance(),
            include_diagnostics: true,
            reproject: true,
            workers: 0,
            output_transform: None,
        }
    }
}

impl Config {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.cameras == 0 {
            return Err(CliError::Config("cameras must be at least 1".to_string()));
        }
        if !(self.parallel_tolerance.is_finite() && self.parallel_tolerance > 0.0) {
            return Err(CliError::Config(format!(
                "parallel_tolerance must be finite and positive, got {}",
                self.parallel_tolerance
            )));
        }
        if !(self.pixel_shift_x.is_finite() && self.pixel_shift_y.is_finite()) {
            return Err(CliError::Config("pixel shift must be finite".to_string()));
        }
        if let Some(t) = &self.output_transform
            && !t.to_transform().is_finite()
        {
            return Err(CliError::Config("output_transform must be finite".to_string()));
        }
        Ok(())
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            rig: RigConfig {
                cameras: self.cameras,
                pixel_shift: PixelShift::new(self.pixel_shift_x, self.pixel_shift_y),
            },
            parallel_tolerance: self.parallel_tolerance,
            include_diagnostics: self.include_diagnostics,
            reproject: self.reproject,
            output_transform: self.output_transform.as_ref().map(OutputTransform::to_transform),
        }
    }
}

/// Resolve the config path from the CLI flag, the environment, or the
/// working directory.
pub fn config_path(flag: Option<&Path>) -> PathBuf {
    if let Some(p) = flag {
        return p.to_path_buf();
    }
    std::env::var("SKEWRAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("skewray.toml"))
}

/// Load, override from the environment, and validate.
pub fn load(flag: Option<&Path>) -> Result<Config, CliError> {
    let path = config_path(flag);
    let mut cfg = load_from(&path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, CliError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = toml::from_str(&raw).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(cfg))
}

/// Apply `SKEWRAY_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SKEWRAY_CAMERAS` | `cameras` |
/// | `SKEWRAY_PIXEL_SHIFT_X` | `pixel_shift_x` |
/// | `SKEWRAY_PIXEL_SHIFT_Y` | `pixel_shift_y` |
/// | `SKEWRAY_WORKERS` | `workers` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SKEWRAY_CAMERAS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.cameras = n;
    }
    if let Ok(v) = std::env::var("SKEWRAY_PIXEL_SHIFT_X")
        && let Ok(x) = v.parse::<f64>()
    {
        cfg.pixel_shift_x = x;
    }
    if let Ok(v) = std::env::var("SKEWRAY_PIXEL_SHIFT_Y")
        && let Ok(y) = v.parse::<f64>()
    {
        cfg.pixel_shift_y = y;
    }
    if let Ok(v) = std::env::var("SKEWRAY_WORKERS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.workers = n;
    }
}
