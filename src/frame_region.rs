// src/frame_region.rs
//
// Named frame slot shared between one producer and the control loop.
// The producer writes pixels + timestamp under the lock and notifies;
// the consumer waits for a sequence number it has not seen yet and
// copies the frame out under the same lock. Only the newest frame is
// kept: a slow consumer simply picks up whatever is there when it wakes.

use crate::types::Frame;
use anyhow::{bail, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot {
    data: Vec<u8>,
    timestamp_us: u64,
    sequence: u64,
    closed: bool,
}

pub struct SharedFrameRegion {
    name: String,
    width: usize,
    height: usize,
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl SharedFrameRegion {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Result<Arc<Self>> {
        if width == 0 || height == 0 {
            bail!("frame region needs a positive size, got {}x{}", width, height);
        }
        Ok(Arc::new(Self {
            name: name.into(),
            width,
            height,
            slot: Mutex::new(Slot {
                data: vec![0; Frame::byte_len(width, height)],
                timestamp_us: 0,
                sequence: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Size of the pixel area in bytes.
    pub fn size(&self) -> usize {
        Frame::byte_len(self.width, self.height)
    }

    /// Replace the current frame and wake the consumer.
    pub fn publish(&self, pixels: &[u8], timestamp_us: u64) -> Result<()> {
        if pixels.len() != self.size() {
            bail!(
                "frame for region '{}' has {} bytes, expected {}",
                self.name,
                pixels.len(),
                self.size()
            );
        }

        let mut slot = self.slot.lock();
        if slot.closed {
            bail!("frame region '{}' is closed", self.name);
        }
        slot.data.copy_from_slice(pixels);
        slot.timestamp_us = timestamp_us;
        slot.sequence += 1;
        drop(slot);

        self.ready.notify_all();
        Ok(())
    }

    /// No further frames will be published.
    pub fn close(&self) {
        self.slot.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    pub fn reader(self: &Arc<Self>) -> FrameReader {
        FrameReader {
            region: Arc::clone(self),
            last_sequence: 0,
        }
    }
}

/// Consumer side; remembers which frame it saw last.
pub struct FrameReader {
    region: Arc<SharedFrameRegion>,
    last_sequence: u64,
}

impl FrameReader {
    pub fn region(&self) -> &SharedFrameRegion {
        &self.region
    }

    /// Wait up to `timeout` for a frame newer than the last one returned.
    pub fn next_frame(&mut self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        let region = &self.region;
        let mut slot = region.slot.lock();

        while slot.sequence == self.last_sequence && !slot.closed {
            if region.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }

        if slot.sequence == self.last_sequence {
            return None;
        }

        self.last_sequence = slot.sequence;
        Some(Frame {
            data: slot.data.clone(),
            width: region.width,
            height: region.height,
            timestamp_us: slot.timestamp_us,
        })
    }
}
