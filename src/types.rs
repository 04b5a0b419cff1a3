use serde::{Deserialize, Serialize};

/// A 4-channel (BGRA) frame copied out of the frame region.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_us: u64,
}

impl Frame {
    pub const CHANNELS: usize = 4;

    pub fn byte_len(width: usize, height: usize) -> usize {
        width * height * Self::CHANNELS
    }
}

/// Axis-aligned region of interest in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Roi {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the whole rectangle lies inside a `width` x `height` frame.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= width as i64
            && self.y as i64 + self.height as i64 <= height as i64
    }
}

/// Inclusive HSV bounds on the 8-bit OpenCV scale (H 0-180, S/V 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub fn is_ordered(&self) -> bool {
        self.lower.iter().zip(self.upper.iter()).all(|(lo, hi)| lo <= hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConeColor {
    Blue,
    Yellow,
}

impl ConeColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConeColor::Blue => "BLUE",
            ConeColor::Yellow => "YELLOW",
        }
    }
}

impl std::fmt::Display for ConeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A closed region found in a cleaned color mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub area: f64,
    /// Outline in ROI coordinates, kept for overlays.
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    pub fn with_area(area: f64) -> Self {
        Self {
            area,
            points: Vec::new(),
        }
    }

    /// A contour counts as a cone once its area exceeds the detection threshold.
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.area > threshold
    }
}

/// Sense of travel around the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    #[default]
    CounterClockwise,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Clockwise => "CLOCKWISE",
            Direction::CounterClockwise => "COUNTERCLOCKWISE",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
