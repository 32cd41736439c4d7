//! `Producer`/`Consumer` facades: the ergonomic API callers use, composing a
//! [`Region`] with a [`RingView`].

use crate::backoff::Backoff;
use crate::config::{ConsumerOptions, ProducerOptions};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::region::{Region, RegionError};
use crate::ring::RingView;

const HEADER_LEN: usize = 16;

/// The producer end of a channel. Constructs (or recreates) the named
/// region and initialises the ring header.
///
/// Not `Clone` — cloning would let two threads write `head`, breaking the
/// single-producer invariant the whole protocol depends on.
pub struct Producer {
    region: Region,
    view: RingView,
}

impl Producer {
    /// Create a new named region sized `16 + options.capacity` (rounded down
    /// to a power of two) and initialise it in producer mode.
    pub fn create(name: &str, options: ProducerOptions) -> Result<Self, RegionError> {
        // `RingView` rounds the data area down to a power of two no smaller
        // than 4 (spec I1); clamp here so the mapped region always has room
        // for that floor instead of letting a sub-4-byte request under-map.
        let total_len = HEADER_LEN + options.capacity.max(4);
        let region = Region::create(name, total_len, options.persist)?;
        let metrics = options.enable_metrics.then(Metrics::new);
        let view = RingView::init_producer(region.as_ptr(), region.len(), metrics);
        Ok(Self { region, view })
    }

    /// Write a single message. See [`RingView::write`] for the full
    /// contract: returns `false` with no side effects on back-pressure or on
    /// an oversized payload, never blocks or retries.
    pub fn write(&self, payload: &[u8]) -> bool {
        self.view.write(payload)
    }

    /// Write a single message, retrying with an adaptive backoff until it
    /// succeeds or the backoff gives up. This sits beside [`Self::write`],
    /// not inside it — the core operation never retries on its own.
    pub fn write_with_backoff(&self, payload: &[u8]) -> bool {
        let mut backoff = Backoff::new();
        loop {
            if self.view.write(payload) {
                return true;
            }
            if backoff.is_completed() {
                return false;
            }
            backoff.snooze();
        }
    }

    pub fn writeable_bytes(&self) -> u32 {
        self.view.writeable_bytes()
    }

    pub fn capacity(&self) -> u32 {
        self.view.capacity()
    }

    pub fn is_valid(&self) -> bool {
        self.view.is_valid()
    }

    /// Remove the region's name from the namespace. Already-mapped handles
    /// (this one included) stay valid until dropped.
    pub fn destroy(&mut self) {
        self.region.destroy();
    }

    /// Snapshot of this end's metrics counters, if enabled at construction.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.view
            .metrics()
            .map(|m| m.snapshot())
            .unwrap_or_default()
    }
}

/// The consumer end of a channel. Opens the named region by name and reads
/// `capacity` from the existing header.
///
/// Not `Clone`, for the same reason as [`Producer`].
pub struct Consumer {
    #[allow(dead_code)]
    region: Region,
    view: RingView,
}

impl Consumer {
    /// Open an existing named region. If `options.size_hint == 0`, the
    /// region's size is auto-detected.
    pub fn open(name: &str, options: ConsumerOptions) -> Result<Self, RegionError> {
        let total_size_hint = if options.size_hint == 0 {
            0
        } else {
            HEADER_LEN + options.size_hint
        };
        let region = Region::open(name, total_size_hint)?;
        let metrics = options.enable_metrics.then(Metrics::new);
        let view = match RingView::init_consumer(region.as_ptr(), metrics) {
            Some(view) => view,
            None => {
                return Err(RegionError::OpenFailed {
                    name: name.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "header capacity is not a valid power of two",
                    ),
                })
            }
        };
        Ok(Self { region, view })
    }

    /// Read a single message into `dst`. See [`RingView::read`] for the full
    /// contract: a return of `0` means no data, a partial frame in flight,
    /// or (irreversibly) a skipped oversized frame — enable metrics to tell
    /// these apart.
    pub fn read(&self, dst: &mut [u8]) -> usize {
        self.view.read(dst)
    }

    /// Read a single message, retrying with an adaptive backoff until one
    /// arrives or the backoff gives up. Sits beside [`Self::read`], never
    /// inside it.
    pub fn read_with_backoff(&self, dst: &mut [u8]) -> usize {
        let mut backoff = Backoff::new();
        loop {
            let n = self.view.read(dst);
            if n > 0 {
                return n;
            }
            if backoff.is_completed() {
                return 0;
            }
            backoff.snooze();
        }
    }

    pub fn readable_bytes(&self) -> u32 {
        self.view.readable_bytes()
    }

    pub fn has_data(&self) -> bool {
        self.view.has_data()
    }

    pub fn capacity(&self) -> u32 {
        self.view.capacity()
    }

    pub fn is_valid(&self) -> bool {
        self.view.is_valid()
    }

    /// Snapshot of this end's metrics counters, if enabled at construction.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.view
            .metrics()
            .map(|m| m.snapshot())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn producer_consumer_roundtrip() {
        let name = format!("shmring-channel-test-{}", std::process::id());
        let producer = Producer::create(&name, ProducerOptions::new(256)).unwrap();
        assert!(producer.write(b"hello from producer"));

        let consumer = Consumer::open(&name, ConsumerOptions::new()).unwrap();
        assert!(consumer.has_data());

        let mut buf = [0u8; 256];
        let n = consumer.read(&mut buf);
        assert_eq!(&buf[..n], b"hello from producer");

        let mut producer = producer;
        producer.destroy();
    }

    #[cfg(unix)]
    #[test]
    fn open_rejects_unknown_name() {
        let name = format!("shmring-nonexistent-{}", std::process::id());
        assert!(Consumer::open(&name, ConsumerOptions::new()).is_err());
    }
}
