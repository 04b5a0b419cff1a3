use crate::transport::OD4_PORT;
use crate::types::{HsvRange, Roi};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub steering: SteeringConfig,
    pub telemetry: TelemetryConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Contour area (px²) above which a region is treated as a cone.
    pub cone_area_threshold: f64,
    /// Used during calibration to look for yellow cones on the right.
    pub right_roi: Roi,
    /// Used while steering.
    pub center_roi: Roi,
    pub blue: HsvRange,
    pub yellow: HsvRange,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cone_area_threshold: 60.0,
            right_roi: Roi::new(415, 265, 150, 125),
            center_roi: Roi::new(200, 245, 230, 115),
            blue: HsvRange {
                lower: [102, 88, 43],
                upper: [150, 165, 222],
            },
            yellow: HsvRange {
                lower: [0, 75, 170],
                upper: [42, 221, 255],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    /// Frames counted before steering starts; calibration runs below it.
    pub calibration_frames: u64,
    pub min_angle: f32,
    pub max_angle: f32,
    pub turn_right: f32,
    pub turn_left: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            calibration_frames: 5,
            min_angle: -0.3,
            max_angle: 0.3,
            turn_right: 0.025,
            turn_left: -0.025,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub label: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            label: "group_16".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { port: OD4_PORT }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let steering = &self.steering;
        if steering.min_angle >= steering.max_angle {
            bail!(
                "steering bounds are inverted: min {} >= max {}",
                steering.min_angle,
                steering.max_angle
            );
        }
        let detection = &self.detection;
        if detection.right_roi.is_empty() || detection.center_roi.is_empty() {
            bail!("regions of interest must have a positive size");
        }
        if !detection.blue.is_ordered() || !detection.yellow.is_ordered() {
            bail!("HSV ranges must have lower <= upper on every channel");
        }
        if detection.cone_area_threshold < 0.0 {
            bail!("cone area threshold must not be negative");
        }
        Ok(())
    }

    /// Checks that both regions fit in frames of the given size.
    pub fn validate_frame_size(&self, width: usize, height: usize) -> Result<()> {
        for (name, roi) in [
            ("right", self.detection.right_roi),
            ("center", self.detection.center_roi),
        ] {
            if !roi.fits_within(width, height) {
                bail!(
                    "{} region {:?} does not fit in a {}x{} frame",
                    name,
                    roi,
                    width,
                    height
                );
            }
        }
        Ok(())
    }
}
