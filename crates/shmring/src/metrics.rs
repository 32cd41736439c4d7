//! Optional, purely-additive counters for observing ring activity.
//!
//! Metrics never change `write`/`read` control flow or ordering — enabling
//! them only adds a handful of relaxed atomic increments to the hot path.
//! They are the one way to distinguish the three conditions a `read` of `0`
//! otherwise conflates: no data, a partial frame in flight, and a skipped
//! oversized frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    messages_written: AtomicU64,
    messages_read: AtomicU64,
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    frames_skipped_oversized: AtomicU64,
    write_full_events: AtomicU64,
    oversized_write_rejections: AtomicU64,
}

/// A cheap handle to a ring's counters. Cloning shares the same counters;
/// there is always at most one producer-side and one consumer-side clone in
/// practice, matching the SPSC discipline of the ring itself.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    counters: Arc<Counters>,
}

/// A point-in-time copy of a [`Metrics`] handle's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_written: u64,
    pub messages_read: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub frames_skipped_oversized: u64,
    pub write_full_events: u64,
    pub oversized_write_rejections: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_write(&self, len: u32) {
        self.counters.messages_written.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_written
            .fetch_add(u64::from(len), Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self, len: u32) {
        self.counters.messages_read.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_read
            .fetch_add(u64::from(len), Ordering::Relaxed);
    }

    pub(crate) fn record_write_full(&self) {
        self.counters.write_full_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversized_write(&self) {
        self.counters
            .oversized_write_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_oversized(&self, _len: u32) {
        self.counters
            .frames_skipped_oversized
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_written: self.counters.messages_written.load(Ordering::Relaxed),
            messages_read: self.counters.messages_read.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.counters.bytes_read.load(Ordering::Relaxed),
            frames_skipped_oversized: self
                .counters
                .frames_skipped_oversized
                .load(Ordering::Relaxed),
            write_full_events: self.counters.write_full_events.load(Ordering::Relaxed),
            oversized_write_rejections: self
                .counters
                .oversized_write_rejections
                .load(Ordering::Relaxed),
        }
    }
}
