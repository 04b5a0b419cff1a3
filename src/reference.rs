// src/reference.rs
//
// Last steering value reported over the network. Written by the transport
// listener, read once per frame for telemetry and the overlay. It never
// feeds into the steering decision.

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ReferenceSteering {
    value: Arc<Mutex<f32>>,
}

impl ReferenceSteering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f32) {
        *self.value.lock() = value;
    }

    pub fn get(&self) -> f32 {
        *self.value.lock()
    }

    /// Read-only handle for the telemetry side.
    pub fn reader(&self) -> ReferenceReader {
        ReferenceReader {
            value: Arc::clone(&self.value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceReader {
    value: Arc<Mutex<f32>>,
}

impl ReferenceReader {
    pub fn get(&self) -> f32 {
        *self.value.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        let reference = ReferenceSteering::new();
        assert_eq!(reference.get(), 0.0);
        assert_eq!(reference.reader().get(), 0.0);
    }

    #[test]
    fn test_reader_sees_last_write() {
        let reference = ReferenceSteering::new();
        let reader = reference.reader();
        reference.set(0.12);
        reference.set(-0.07);
        assert_eq!(reader.get(), -0.07);
    }

    #[test]
    fn test_concurrent_writers_leave_one_of_their_values() {
        let reference = ReferenceSteering::new();
        let reader = reference.reader();
        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let writer = reference.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        writer.set(i as f32 * 0.01);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let last = reader.get();
        assert!((1..=8).any(|i| (i as f32 * 0.01) == last));
    }
}
