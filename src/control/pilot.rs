// src/control/pilot.rs
//
// Owns all state that survives from one frame to the next: the frame
// counter, the calibrated direction and the running steering angle.
// Frames below `calibration_frames` only calibrate; from there on every
// frame steers.

use super::calibration::DirectionCalibrator;
use super::steering::{SteeringController, SteeringDecision};
use crate::config::Config;
use crate::types::{ConeColor, Contour, Direction};
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Where the pilot gets its contours from for the current frame.
pub trait ConeScanner {
    /// Yellow contours in the right region (calibration).
    fn right_yellow(&mut self) -> Result<Vec<Contour>>;

    /// Contours of `color` in the center region (steering).
    fn center(&mut self, color: ConeColor) -> Result<Vec<Contour>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FramePhase {
    Calibrating,
    Steering,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    pub phase: FramePhase,
    /// Set on calibration frames.
    pub yellow_seen: Option<bool>,
    /// Set on steering frames.
    pub decision: Option<SteeringDecision>,
    pub direction: Direction,
    pub steering_angle: f32,
}

pub struct ConePilot {
    calibration_frames: u64,
    frame_counter: u64,
    calibrator: DirectionCalibrator,
    steering: SteeringController,
}

impl ConePilot {
    pub fn new(config: &Config) -> Self {
        let threshold = config.detection.cone_area_threshold;
        Self {
            calibration_frames: config.steering.calibration_frames,
            frame_counter: 0,
            calibrator: DirectionCalibrator::new(threshold),
            steering: SteeringController::new(config.steering.clone(), threshold),
        }
    }

    pub fn direction(&self) -> Direction {
        self.calibrator.direction()
    }

    pub fn steering_angle(&self) -> f32 {
        self.steering.angle()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_counter
    }

    /// Phase a frame with the given counter value falls in.
    pub fn phase_for(&self, frame_counter: u64) -> FramePhase {
        if frame_counter < self.calibration_frames {
            FramePhase::Calibrating
        } else {
            FramePhase::Steering
        }
    }

    /// Count a frame that arrived but could not be analyzed. Returns the
    /// counter value it took.
    pub fn skip_frame(&mut self) -> u64 {
        self.frame_counter += 1;
        self.frame_counter
    }

    /// Count a new frame and run whichever stage it belongs to.
    pub fn process<S: ConeScanner>(&mut self, scanner: &mut S) -> Result<FrameReport> {
        self.frame_counter += 1;
        let frame_index = self.frame_counter;
        let phase = self.phase_for(frame_index);

        let mut yellow_seen = None;
        let mut decision = None;

        match phase {
            FramePhase::Calibrating => {
                let contours = scanner.right_yellow()?;
                yellow_seen = Some(self.calibrator.observe(&contours));
            }
            FramePhase::Steering => {
                if frame_index == self.calibration_frames {
                    info!(
                        "Calibration finished after {} frame(s): driving {} ({} frame(s) with yellow on the right)",
                        self.calibrator.frames_observed(),
                        self.calibrator.direction(),
                        self.calibrator.frames_with_yellow()
                    );
                }
                let direction = self.calibrator.direction();
                let blue = scanner.center(ConeColor::Blue)?;
                decision = Some(self.steering.update(direction, &blue, || {
                    scanner.center(ConeColor::Yellow)
                })?);
            }
        }

        Ok(FrameReport {
            frame_index,
            phase,
            yellow_seen,
            decision,
            direction: self.calibrator.direction(),
            steering_angle: self.steering.angle(),
        })
    }
}
