// src/control/calibration.rs
//
// Travel direction from the first few frames. Yellow cones on the right
// side of the car mean the track is driven clockwise; if none show up
// during the window the car keeps the counter-clockwise default.

use crate::types::{Contour, Direction};
use tracing::debug;

pub struct DirectionCalibrator {
    direction: Direction,
    area_threshold: f64,
    frames_observed: u64,
    frames_with_yellow: u64,
}

impl DirectionCalibrator {
    pub fn new(area_threshold: f64) -> Self {
        Self {
            direction: Direction::CounterClockwise,
            area_threshold,
            frames_observed: 0,
            frames_with_yellow: 0,
        }
    }

    /// Feed the yellow contours found in the right region for one frame.
    /// Returns whether a yellow cone was seen.
    pub fn observe(&mut self, right_yellow: &[Contour]) -> bool {
        self.frames_observed += 1;

        let mut yellow_seen = false;
        for contour in right_yellow {
            if contour.is_significant(self.area_threshold) {
                yellow_seen = true;
                self.direction = Direction::Clockwise;
            }
        }

        if yellow_seen {
            self.frames_with_yellow += 1;
            debug!(
                "Yellow cone on the right in calibration frame {}",
                self.frames_observed
            );
        }
        yellow_seen
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }

    pub fn frames_with_yellow(&self) -> u64 {
        self.frames_with_yellow
    }
}
