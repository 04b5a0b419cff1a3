// src/lib.rs

pub mod cli;
pub mod config;
pub mod control;
pub mod frame_region;
pub mod pipeline;
pub mod reference;
pub mod run_flag;
pub mod telemetry;
pub mod transport;
pub mod types;

#[cfg(feature = "vision")]
pub mod vision;
