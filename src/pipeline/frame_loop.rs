// src/pipeline/frame_loop.rs
//
// The control loop: wait for a frame, let the analyzer turn it into cone
// contours, run the pilot, print the telemetry line. Runs on its own
// thread until the run flag is cleared; a frame that has started is
// always finished.

use crate::control::{ConePilot, ConeScanner, FrameReport};
use crate::frame_region::FrameReader;
use crate::pipeline::metrics::{LoopMetrics, MetricsSummary};
use crate::reference::ReferenceReader;
use crate::run_flag::RunFlag;
use crate::telemetry::{FrameRecorder, TelemetrySink};
use crate::types::Frame;
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// Turns a raw frame into something the pilot can query for contours.
pub trait FrameAnalyzer {
    type Scanner: ConeScanner;

    fn scanner_for(&mut self, frame: &Frame) -> Result<Self::Scanner>;

    /// Called after the pilot has handled the frame, e.g. for overlays.
    fn after_frame(
        &mut self,
        _frame: &Frame,
        _scanner: &Self::Scanner,
        _report: &FrameReport,
        _reference: f32,
    ) -> Result<()> {
        Ok(())
    }
}

pub struct FrameLoop<A: FrameAnalyzer, W: Write> {
    pilot: ConePilot,
    analyzer: A,
    frames: FrameReader,
    reference: ReferenceReader,
    telemetry: TelemetrySink<W>,
    recorder: Option<FrameRecorder<BufWriter<File>>>,
    metrics: LoopMetrics,
    running: RunFlag,
    poll: Duration,
}

impl<A: FrameAnalyzer, W: Write> FrameLoop<A, W> {
    pub fn new(
        pilot: ConePilot,
        analyzer: A,
        frames: FrameReader,
        reference: ReferenceReader,
        telemetry: TelemetrySink<W>,
        running: RunFlag,
    ) -> Self {
        Self {
            pilot,
            analyzer,
            frames,
            reference,
            telemetry,
            recorder: None,
            metrics: LoopMetrics::new(),
            running,
            poll: DEFAULT_POLL,
        }
    }

    pub fn with_recorder(mut self, recorder: FrameRecorder<BufWriter<File>>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn pilot(&self) -> &ConePilot {
        &self.pilot
    }

    pub fn telemetry(&self) -> &TelemetrySink<W> {
        &self.telemetry
    }

    /// Handle at most one frame. `Ok(None)` means no frame arrived within
    /// the poll interval or the frame could not be analyzed.
    pub fn step(&mut self) -> Result<Option<FrameReport>> {
        let frame = match self.frames.next_frame(self.poll) {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let mut scanner = match self.analyzer.scanner_for(&frame) {
            Ok(scanner) => scanner,
            Err(e) => {
                let index = self.pilot.skip_frame();
                warn!(
                    "Skipping frame {} at {} µs: {:#}",
                    index, frame.timestamp_us, e
                );
                self.metrics.record_failure();
                return Ok(None);
            }
        };

        let report = match self.pilot.process(&mut scanner) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    "Cone detection failed on frame {}: {:#}",
                    self.pilot.frames_processed(),
                    e
                );
                self.metrics.record_failure();
                return Ok(None);
            }
        };
        self.metrics.record(&report);

        let reference = self.reference.get();
        self.telemetry.emit(frame.timestamp_us, report.steering_angle)?;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&report, frame.timestamp_us, reference)?;
        }

        debug!(
            "Frame {} ({:?}): steering={:.3} reference={:.3} direction={} decision={:?}",
            report.frame_index,
            report.phase,
            report.steering_angle,
            reference,
            report.direction,
            report.decision
        );

        if let Err(e) = self
            .analyzer
            .after_frame(&frame, &scanner, &report, reference)
        {
            warn!("Frame overlay failed: {:#}", e);
        }

        Ok(Some(report))
    }

    /// Process frames until the run flag is cleared.
    pub fn run(mut self) -> Result<MetricsSummary> {
        info!(
            "Control loop started on frame region '{}' ({}x{})",
            self.frames.region().name(),
            self.frames.region().width(),
            self.frames.region().height()
        );

        let mut producer_gone_reported = false;
        while self.running.is_running() {
            self.step()?;

            if !producer_gone_reported && self.frames.region().is_closed() {
                info!("Frame producer finished; waiting for interrupt");
                producer_gone_reported = true;
            }
        }

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.flush()?;
        }

        let summary = self.metrics.summary();
        info!(
            "Control loop stopped: {} frame(s) ({} calibration, {} steering, {} failed) at {:.1} FPS, direction {}, final angle {:.3}",
            summary.total_frames,
            summary.calibration_frames,
            summary.steering_frames,
            summary.failed_frames,
            summary.fps,
            self.pilot.direction(),
            self.pilot.steering_angle()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::control::{FramePhase, SteeringDecision};
    use crate::frame_region::SharedFrameRegion;
    use crate::reference::ReferenceSteering;
    use crate::types::{ConeColor, Contour, Direction};
    use anyhow::bail;
    use std::sync::Arc;

    const NOTHING: u8 = 0;
    const BLUE_AHEAD: u8 = 1;
    const YELLOW_RIGHT: u8 = 2;
    const BROKEN: u8 = 3;
    const UNREADABLE: u8 = 4;

    /// Reads the scene from the first pixel byte of the frame.
    struct MarkerScanner {
        scene: u8,
    }

    impl ConeScanner for MarkerScanner {
        fn right_yellow(&mut self) -> Result<Vec<Contour>> {
            match self.scene {
                YELLOW_RIGHT => Ok(vec![Contour::with_area(120.0)]),
                BROKEN => bail!("segmentation failed"),
                _ => Ok(vec![]),
            }
        }

        fn center(&mut self, color: ConeColor) -> Result<Vec<Contour>> {
            match (self.scene, color) {
                (BLUE_AHEAD, ConeColor::Blue) => Ok(vec![Contour::with_area(120.0)]),
                (BROKEN, _) => bail!("segmentation failed"),
                _ => Ok(vec![]),
            }
        }
    }

    struct MarkerAnalyzer;

    impl FrameAnalyzer for MarkerAnalyzer {
        type Scanner = MarkerScanner;

        fn scanner_for(&mut self, frame: &Frame) -> Result<MarkerScanner> {
            if frame.data[0] == UNREADABLE {
                bail!("frame could not be decoded");
            }
            Ok(MarkerScanner {
                scene: frame.data[0],
            })
        }
    }

    fn frame_loop(
        region: &Arc<SharedFrameRegion>,
        reference: &ReferenceSteering,
        running: RunFlag,
    ) -> FrameLoop<MarkerAnalyzer, Vec<u8>> {
        FrameLoop::new(
            ConePilot::new(&Config::default()),
            MarkerAnalyzer,
            region.reader(),
            reference.reader(),
            TelemetrySink::new("group_16", Vec::new()),
            running,
        )
        .with_poll_interval(Duration::from_millis(10))
    }

    fn publish(region: &SharedFrameRegion, scene: u8, timestamp_us: u64) {
        let mut pixels = vec![0u8; region.size()];
        pixels[0] = scene;
        region.publish(&pixels, timestamp_us).unwrap();
    }

    #[test]
    fn test_scenario_through_loop_prints_telemetry() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let mut lp = frame_loop(&region, &reference, RunFlag::new());

        for i in 0..4 {
            publish(&region, NOTHING, 1_000 + i);
            let report = lp.step().unwrap().unwrap();
            assert_eq!(report.phase, FramePhase::Calibrating);
        }
        publish(&region, BLUE_AHEAD, 1234567);
        let report = lp.step().unwrap().unwrap();
        assert_eq!(report.decision, Some(SteeringDecision::BlueInBounds));
        assert_eq!(lp.pilot().direction(), Direction::CounterClockwise);

        let text = String::from_utf8(lp.telemetry().get_ref().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "group_16;1000;0");
        assert_eq!(lines[4], "group_16;1234567;0.025");
    }

    #[test]
    fn test_yellow_on_right_during_calibration_flips_direction() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let mut lp = frame_loop(&region, &reference, RunFlag::new());

        for scene in [NOTHING, NOTHING, YELLOW_RIGHT, NOTHING] {
            publish(&region, scene, 1);
            lp.step().unwrap();
        }
        publish(&region, BLUE_AHEAD, 2);
        let report = lp.step().unwrap().unwrap();
        assert_eq!(report.direction, Direction::Clockwise);
        assert_eq!(report.steering_angle, -0.025);
    }

    #[test]
    fn test_reference_value_does_not_change_steering() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let mut lp = frame_loop(&region, &reference, RunFlag::new());

        for _ in 0..4 {
            publish(&region, NOTHING, 1);
            lp.step().unwrap();
        }
        reference.set(0.29);
        publish(&region, NOTHING, 2);
        let report = lp.step().unwrap().unwrap();
        assert_eq!(report.steering_angle, 0.0);
    }

    #[test]
    fn test_no_frame_and_failed_frame_produce_no_line() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let mut lp = frame_loop(&region, &reference, RunFlag::new());

        assert!(lp.step().unwrap().is_none());
        publish(&region, BROKEN, 1);
        assert!(lp.step().unwrap().is_none());
        assert_eq!(lp.telemetry().lines_written(), 0);
        assert_eq!(lp.pilot().frames_processed(), 1);
    }

    #[test]
    fn test_undecodable_frame_still_advances_counter() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let mut lp = frame_loop(&region, &reference, RunFlag::new());

        publish(&region, UNREADABLE, 1);
        assert!(lp.step().unwrap().is_none());
        publish(&region, BROKEN, 2);
        assert!(lp.step().unwrap().is_none());
        assert_eq!(lp.pilot().frames_processed(), 2);
        assert_eq!(lp.telemetry().lines_written(), 0);

        // Counters 3 and 4 calibrate, 5 steers.
        for ts in 3..5 {
            publish(&region, NOTHING, ts);
            let report = lp.step().unwrap().unwrap();
            assert_eq!(report.phase, FramePhase::Calibrating);
        }
        publish(&region, BLUE_AHEAD, 5);
        let report = lp.step().unwrap().unwrap();
        assert_eq!(report.frame_index, 5);
        assert_eq!(report.phase, FramePhase::Steering);
    }

    #[test]
    fn test_run_returns_when_flag_cleared() {
        let region = SharedFrameRegion::new("img", 8, 8).unwrap();
        let reference = ReferenceSteering::new();
        let running = RunFlag::new();
        let lp = frame_loop(&region, &reference, running.clone());

        let handle = std::thread::spawn(move || lp.run());
        publish(&region, NOTHING, 1);
        std::thread::sleep(Duration::from_millis(50));
        running.stop();
        let summary = handle.join().unwrap().unwrap();
        assert!(summary.total_frames <= 1);
    }
}
