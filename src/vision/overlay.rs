// src/vision/overlay.rs
//
// Debug windows shown with --verbose.

use crate::telemetry::overlay_text;
use crate::types::{Contour, Roi};
use anyhow::Result;
use opencv::{
    core::{self, Mat, Point, Scalar, Vector},
    highgui, imgproc,
    prelude::*,
};

const CONTOUR_COLOR: (f64, f64, f64) = (255.0, 255.0, 0.0);

pub struct DebugOverlay {
    cone_area_threshold: f64,
    center_roi: Roi,
}

impl DebugOverlay {
    pub fn new(cone_area_threshold: f64, center_roi: Roi) -> Self {
        Self {
            cone_area_threshold,
            center_roi,
        }
    }

    /// Filled outlines of the cones in a black image the size of the
    /// center region.
    pub fn contour_image(&self, contours: &[Contour]) -> Result<Mat> {
        let mut canvas = Mat::new_rows_cols_with_default(
            self.center_roi.height,
            self.center_roi.width,
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;

        let mut outlines = Vector::<Vector<Point>>::new();
        for contour in contours
            .iter()
            .filter(|c| c.is_significant(self.cone_area_threshold))
        {
            let outline: Vector<Point> = contour
                .points
                .iter()
                .map(|&(x, y)| Point::new(x, y))
                .collect();
            outlines.push(outline);
        }

        if !outlines.is_empty() {
            imgproc::draw_contours(
                &mut canvas,
                &outlines,
                -1,
                Scalar::new(CONTOUR_COLOR.0, CONTOUR_COLOR.1, CONTOUR_COLOR.2, 0.0),
                -1,
                imgproc::LINE_8,
                &Mat::default(),
                i32::MAX,
                Point::new(0, 0),
            )?;
        }
        Ok(canvas)
    }

    pub fn annotate(&self, image: &Mat, angle: f32, reference: f32, timestamp_us: u64) -> Result<Mat> {
        let mut output = image.try_clone()?;
        imgproc::put_text_def(
            &mut output,
            &overlay_text(angle, reference, timestamp_us),
            Point::new(1, 50),
            imgproc::FONT_HERSHEY_DUPLEX,
            0.35,
            Scalar::new(154.0, 250.0, 0.0, 0.0),
        )?;
        Ok(output)
    }

    pub fn show_contours(&self, window: &str, contours: &[Contour]) -> Result<()> {
        let canvas = self.contour_image(contours)?;
        highgui::imshow(window, &canvas)?;
        highgui::wait_key(1)?;
        Ok(())
    }

    pub fn show_frame(&self, image: &Mat, angle: f32, reference: f32, timestamp_us: u64) -> Result<()> {
        let annotated = self.annotate(image, angle, reference, timestamp_us)?;
        highgui::imshow("Debug", &annotated)?;
        highgui::wait_key(1)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contour_image_fills_only_cones() {
        let overlay = DebugOverlay::new(60.0, Roi::new(0, 0, 100, 50));
        let cone = Contour {
            area: 400.0,
            points: vec![(10, 10), (10, 30), (30, 30), (30, 10)],
        };
        let speck = Contour {
            area: 4.0,
            points: vec![(60, 10), (60, 12), (62, 12), (62, 10)],
        };
        let canvas = overlay.contour_image(&[cone, speck]).unwrap();
        assert_eq!((canvas.cols(), canvas.rows()), (100, 50));

        let inside = canvas.at_2d::<core::Vec3b>(20, 20).unwrap();
        assert_eq!(inside[0], 255);
        let speck_px = canvas.at_2d::<core::Vec3b>(11, 61).unwrap();
        assert_eq!(speck_px[0], 0);
    }

    #[test]
    fn test_annotate_keeps_frame_size() {
        let overlay = DebugOverlay::new(60.0, Roi::new(0, 0, 100, 50));
        let image = Mat::new_rows_cols_with_default(480, 640, core::CV_8UC3, Scalar::all(0.0)).unwrap();
        let annotated = overlay.annotate(&image, 0.025, -0.1, 1234567).unwrap();
        assert_eq!((annotated.cols(), annotated.rows()), (640, 480));
    }
}
