// src/vision/capture.rs
//
// Producer side of the frame region: reads an OpenCV capture source and
// publishes fixed-size BGRA frames at the source's own pace.

use crate::frame_region::SharedFrameRegion;
use crate::run_flag::RunFlag;
use anyhow::{bail, Context, Result};
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub struct CaptureFeeder {
    cap: VideoCapture,
    source: String,
    frame_interval: Option<Duration>,
    region: Arc<SharedFrameRegion>,
}

impl CaptureFeeder {
    /// Open `source` (device index, file path or GStreamer pipeline) as
    /// the producer for `region`.
    pub fn attach(source: &str, region: Arc<SharedFrameRegion>) -> Result<Self> {
        let cap = match source.parse::<i32>() {
            Ok(index) => VideoCapture::new(index, videoio::CAP_ANY)?,
            Err(_) => VideoCapture::from_file(source, videoio::CAP_ANY)?,
        };
        if !cap.is_opened()? {
            bail!("cannot attach to frame source '{}'", source);
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let frame_interval = if fps > 0.0 && fps.is_finite() {
            Some(Duration::from_secs_f64(1.0 / fps))
        } else {
            None
        };

        info!(
            "Attached to frame source '{}' as region '{}' ({} bytes, {:.1} FPS)",
            source,
            region.name(),
            region.size(),
            fps
        );

        Ok(Self {
            cap,
            source: source.to_string(),
            frame_interval,
            region,
        })
    }

    pub fn spawn(self, running: RunFlag) -> Result<JoinHandle<Result<u64>>> {
        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || self.run(running))
            .context("spawning capture thread")?;
        Ok(handle)
    }

    fn run(mut self, running: RunFlag) -> Result<u64> {
        let mut published: u64 = 0;
        let mut raw = Mat::default();

        while running.is_running() {
            let started = Instant::now();

            if !self.cap.read(&mut raw)? || raw.empty() {
                info!(
                    "Frame source '{}' ended after {} frame(s)",
                    self.source, published
                );
                break;
            }

            let pixels = match self.to_region_pixels(&raw) {
                Ok(pixels) => pixels,
                Err(e) => {
                    warn!("Dropping frame from '{}': {:#}", self.source, e);
                    continue;
                }
            };
            self.region.publish(&pixels, now_micros())?;
            published += 1;

            if let Some(interval) = self.frame_interval {
                if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                    thread::sleep(remaining);
                }
            }
        }

        self.region.close();
        Ok(published)
    }

    /// Resize to the region size and convert to 4-channel BGRA bytes.
    fn to_region_pixels(&self, raw: &Mat) -> Result<Vec<u8>> {
        let width = self.region.width() as i32;
        let height = self.region.height() as i32;

        let mut sized = Mat::default();
        if raw.cols() != width || raw.rows() != height {
            imgproc::resize(
                raw,
                &mut sized,
                Size::new(width, height),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
        } else {
            sized = raw.try_clone()?;
        }

        let code = match sized.channels() {
            1 => imgproc::COLOR_GRAY2BGRA,
            3 => imgproc::COLOR_BGR2BGRA,
            4 => return Ok(sized.data_bytes()?.to_vec()),
            n => bail!("unsupported channel count {}", n),
        };
        let mut bgra = Mat::default();
        imgproc::cvt_color_def(&sized, &mut bgra, code)?;
        Ok(bgra.data_bytes()?.to_vec())
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
