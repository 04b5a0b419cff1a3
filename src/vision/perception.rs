// src/vision/perception.rs
//
// Cone segmentation on a BGR frame:
//   crop ROI → HSV → in_range → 5x5 Gaussian blur → dilate → erode
//   → find_contours (tree, simple chain) → contour_area
//
// Contours come back in the order OpenCV extracts them; the steering
// rules depend on that order only through "first cone wins".

use crate::config::DetectionConfig;
use crate::control::ConeScanner;
use crate::types::{ConeColor, Contour, Frame, HsvRange, Roi};
use anyhow::{bail, Result};
use opencv::{
    core::{self, Mat, Point, Rect, Scalar, Size, Vector},
    imgproc,
    prelude::*,
};

/// Copy a BGRA frame into an owned 3-channel BGR `Mat`.
pub fn frame_to_bgr(frame: &Frame) -> Result<Mat> {
    if frame.data.len() != Frame::byte_len(frame.width, frame.height) {
        bail!(
            "frame buffer has {} bytes, expected {}x{}x4",
            frame.data.len(),
            frame.width,
            frame.height
        );
    }

    let mut bgra = Mat::new_rows_cols_with_default(
        frame.height as i32,
        frame.width as i32,
        core::CV_8UC4,
        Scalar::all(0.0),
    )?;
    bgra.data_bytes_mut()?.copy_from_slice(&frame.data);

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&bgra, &mut bgr, imgproc::COLOR_BGRA2BGR)?;
    Ok(bgr)
}

#[derive(Debug, Clone)]
pub struct ConeDetector {
    config: DetectionConfig,
}

impl ConeDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn range_for(&self, color: ConeColor) -> &HsvRange {
        match color {
            ConeColor::Blue => &self.config.blue,
            ConeColor::Yellow => &self.config.yellow,
        }
    }

    /// Crop `roi` out of a BGR image.
    pub fn crop(&self, bgr: &Mat, roi: Roi) -> Result<Mat> {
        if !roi.fits_within(bgr.cols() as usize, bgr.rows() as usize) {
            bail!(
                "region {:?} lies outside the {}x{} frame",
                roi,
                bgr.cols(),
                bgr.rows()
            );
        }
        let rect = Rect::new(roi.x, roi.y, roi.width, roi.height);
        let region = Mat::roi(bgr, rect)?.try_clone()?;
        Ok(region)
    }

    /// Binary mask of the pixels inside `range`.
    pub fn segment(&self, region: &Mat, range: &HsvRange) -> Result<Mat> {
        let mut hsv = Mat::default();
        imgproc::cvt_color_def(region, &mut hsv, imgproc::COLOR_BGR2HSV)?;

        let lower = Scalar::new(
            range.lower[0] as f64,
            range.lower[1] as f64,
            range.lower[2] as f64,
            0.0,
        );
        let upper = Scalar::new(
            range.upper[0] as f64,
            range.upper[1] as f64,
            range.upper[2] as f64,
            0.0,
        );
        let mut mask = Mat::default();
        core::in_range(&hsv, &lower, &upper, &mut mask)?;
        Ok(mask)
    }

    /// Blur, then one dilate and one erode with the default 3x3 kernel.
    pub fn clean(&self, mask: &Mat) -> Result<Mat> {
        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(mask, &mut blurred, Size::new(5, 5), 0.0)?;

        let kernel = Mat::default();
        let mut dilated = Mat::default();
        imgproc::dilate_def(&blurred, &mut dilated, &kernel)?;
        let mut eroded = Mat::default();
        imgproc::erode_def(&dilated, &mut eroded, &kernel)?;
        Ok(eroded)
    }

    pub fn extract(&self, mask: &Mat) -> Result<Vec<Contour>> {
        let mut found = Vector::<Vector<Point>>::new();
        imgproc::find_contours_def(
            mask,
            &mut found,
            imgproc::RETR_TREE,
            imgproc::CHAIN_APPROX_SIMPLE,
        )?;

        let mut contours = Vec::with_capacity(found.len());
        for outline in found.iter() {
            let area = imgproc::contour_area_def(&outline)?;
            let points = outline.iter().map(|p| (p.x, p.y)).collect();
            contours.push(Contour { area, points });
        }
        Ok(contours)
    }

    /// Full chain for one region and one color.
    pub fn detect(&self, bgr: &Mat, roi: Roi, color: ConeColor) -> Result<Vec<Contour>> {
        let region = self.crop(bgr, roi)?;
        let mask = self.segment(&region, self.range_for(color))?;
        let cleaned = self.clean(&mask)?;
        self.extract(&cleaned)
    }
}

/// Scanner over one decoded frame. Keeps what it found in the center
/// region so overlays can draw it afterwards.
pub struct FrameScanner {
    detector: ConeDetector,
    bgr: Mat,
    pub center_blue: Option<Vec<Contour>>,
    pub center_yellow: Option<Vec<Contour>>,
}

impl FrameScanner {
    pub fn new(detector: ConeDetector, bgr: Mat) -> Self {
        Self {
            detector,
            bgr,
            center_blue: None,
            center_yellow: None,
        }
    }

    pub fn image(&self) -> &Mat {
        &self.bgr
    }
}

impl ConeScanner for FrameScanner {
    fn right_yellow(&mut self) -> Result<Vec<Contour>> {
        let roi = self.detector.config().right_roi;
        self.detector.detect(&self.bgr, roi, ConeColor::Yellow)
    }

    fn center(&mut self, color: ConeColor) -> Result<Vec<Contour>> {
        let roi = self.detector.config().center_roi;
        let contours = self.detector.detect(&self.bgr, roi, color)?;
        match color {
            ConeColor::Blue => self.center_blue = Some(contours.clone()),
            ConeColor::Yellow => self.center_yellow = Some(contours.clone()),
        }
        Ok(contours)
    }
}
