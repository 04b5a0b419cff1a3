// src/control/mod.rs

pub mod calibration;
pub mod pilot;
pub mod steering;

pub use calibration::DirectionCalibrator;
pub use pilot::{ConePilot, ConeScanner, FramePhase, FrameReport};
pub use steering::{SteeringController, SteeringDecision};
