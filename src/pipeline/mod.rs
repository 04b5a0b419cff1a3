// src/pipeline/mod.rs

pub mod frame_loop;
pub mod metrics;

pub use frame_loop::{FrameAnalyzer, FrameLoop};
pub use metrics::{LoopMetrics, MetricsSummary};
