use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Waits between consecutive upstream calls.
pub trait Pacer {
    fn pause(&self);
}

/// Sleeps for a fixed duration after every call.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Pacer for FixedDelay {
    fn pause(&self) {
        if !self.0.is_zero() {
            thread::sleep(self.0);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Counts pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: AtomicUsize,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::Relaxed)
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn recording_pacer_counts() {
        let pacer = RecordingPacer::new();
        pacer.pause();
        pacer.pause();
        assert_eq!(pacer.pauses(), 2);
    }

    #[test]
    fn fixed_delay_sleeps_at_least_duration() {
        let started = Instant::now();
        FixedDelay(Duration::from_millis(5)).pause();
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
