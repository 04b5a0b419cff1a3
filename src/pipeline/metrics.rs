// src/pipeline/metrics.rs
//
// Counters for the control loop, reported when it shuts down.

use crate::control::{FramePhase, FrameReport, SteeringDecision};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct LoopMetrics {
    pub total_frames: u64,
    pub calibration_frames: u64,
    pub steering_frames: u64,
    pub failed_frames: u64,
    pub blue_adjustments: u64,
    pub yellow_adjustments: u64,
    pub bound_resets: u64,
    pub empty_frames: u64,
    pub started_at: Instant,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: 0,
            calibration_frames: 0,
            steering_frames: 0,
            failed_frames: 0,
            blue_adjustments: 0,
            yellow_adjustments: 0,
            bound_resets: 0,
            empty_frames: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record(&mut self, report: &FrameReport) {
        self.total_frames += 1;
        match report.phase {
            FramePhase::Calibrating => self.calibration_frames += 1,
            FramePhase::Steering => self.steering_frames += 1,
        }
        match report.decision {
            Some(SteeringDecision::BlueInBounds) => self.blue_adjustments += 1,
            Some(SteeringDecision::YellowInBounds) => self.yellow_adjustments += 1,
            Some(SteeringDecision::BlueOutOfBounds) | Some(SteeringDecision::YellowOutOfBounds) => {
                self.bound_resets += 1
            }
            Some(SteeringDecision::NoCones) => self.empty_frames += 1,
            None => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_frames += 1;
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            self.total_frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames,
            calibration_frames: self.calibration_frames,
            steering_frames: self.steering_frames,
            failed_frames: self.failed_frames,
            blue_adjustments: self.blue_adjustments,
            yellow_adjustments: self.yellow_adjustments,
            bound_resets: self.bound_resets,
            empty_frames: self.empty_frames,
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for LoopMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub calibration_frames: u64,
    pub steering_frames: u64,
    pub failed_frames: u64,
    pub blue_adjustments: u64,
    pub yellow_adjustments: u64,
    pub bound_resets: u64,
    pub empty_frames: u64,
    pub fps: f64,
    pub elapsed_secs: f64,
}
