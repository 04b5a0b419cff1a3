// src/vision/mod.rs
//
// OpenCV-backed perception, capture and debug display.

pub mod capture;
pub mod overlay;
pub mod perception;

pub use capture::CaptureFeeder;
pub use overlay::DebugOverlay;
pub use perception::{frame_to_bgr, ConeDetector, FrameScanner};

use crate::config::DetectionConfig;
use crate::control::FrameReport;
use crate::pipeline::FrameAnalyzer;
use crate::types::Frame;
use anyhow::Result;

pub struct OpenCvAnalyzer {
    detector: ConeDetector,
    overlay: Option<DebugOverlay>,
}

impl OpenCvAnalyzer {
    pub fn new(config: DetectionConfig, verbose: bool) -> Self {
        let overlay =
            verbose.then(|| DebugOverlay::new(config.cone_area_threshold, config.center_roi));
        Self {
            detector: ConeDetector::new(config),
            overlay,
        }
    }
}

impl FrameAnalyzer for OpenCvAnalyzer {
    type Scanner = FrameScanner;

    fn scanner_for(&mut self, frame: &Frame) -> Result<FrameScanner> {
        let bgr = frame_to_bgr(frame)?;
        Ok(FrameScanner::new(self.detector.clone(), bgr))
    }

    fn after_frame(
        &mut self,
        frame: &Frame,
        scanner: &FrameScanner,
        report: &FrameReport,
        reference: f32,
    ) -> Result<()> {
        let Some(overlay) = &self.overlay else {
            return Ok(());
        };

        if let Some(blue) = &scanner.center_blue {
            overlay.show_contours("Blue Contours", blue)?;
        }
        if let Some(yellow) = &scanner.center_yellow {
            overlay.show_contours("Yellow Contours", yellow)?;
        }
        overlay.show_frame(
            scanner.image(),
            report.steering_angle,
            reference,
            frame.timestamp_us,
        )
    }
}
