// src/telemetry.rs
//
// One line per frame on stdout: `<label>;<timestamp_us>;<angle>`.
// Angles are printed like a default C++ float stream (6 significant
// digits, no trailing zeros) so downstream tooling sees the same text as
// the reference recordings.

use crate::control::FrameReport;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const SIGNIFICANT_DIGITS: usize = 6;

/// `%g`-style formatting with `SIGNIFICANT_DIGITS` digits.
pub fn format_angle(value: f32) -> String {
    let value = value as f64;
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round once in scientific form so the exponent reflects carries.
    let sci = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

pub fn telemetry_line(label: &str, timestamp_us: u64, angle: f32) -> String {
    format!("{};{};{}", label, timestamp_us, format_angle(angle))
}

/// Text drawn on the debug window.
pub fn overlay_text(angle: f32, reference: f32, timestamp_us: u64) -> String {
    format!(
        "Calculated Ground Steering: {} Actual Ground Steering: {} Time Stamp: {}",
        format_angle(angle),
        format_angle(reference),
        timestamp_us
    )
}

pub struct TelemetrySink<W: Write> {
    label: String,
    out: W,
    lines: u64,
}

impl<W: Write> TelemetrySink<W> {
    pub fn new(label: impl Into<String>, out: W) -> Self {
        Self {
            label: label.into(),
            out,
            lines: 0,
        }
    }

    pub fn emit(&mut self, timestamp_us: u64, angle: f32) -> Result<()> {
        writeln!(
            self.out,
            "{}",
            telemetry_line(&self.label, timestamp_us, angle)
        )?;
        self.out.flush()?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    frame: u64,
    timestamp_us: u64,
    steering: f32,
    reference: f32,
    direction: &'a str,
    phase: &'a str,
    decision: Option<&'a str>,
}

/// Per-frame JSON lines for offline analysis.
pub struct FrameRecorder<W: Write> {
    out: W,
}

impl FrameRecorder<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("creating record file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FrameRecorder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn record(&mut self, report: &FrameReport, timestamp_us: u64, reference: f32) -> Result<()> {
        let record = FrameRecord {
            frame: report.frame_index,
            timestamp_us,
            steering: report.steering_angle,
            reference,
            direction: report.direction.as_str(),
            phase: match report.phase {
                crate::control::FramePhase::Calibrating => "CALIBRATING",
                crate::control::FramePhase::Steering => "STEERING",
            },
            decision: report.decision.map(|d| d.as_str()),
        };
        serde_json::to_writer(&mut self.out, &record)?;
        writeln!(self.out)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
