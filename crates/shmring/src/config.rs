//! Construction-time options for the channel facades.
//!
//! Unlike the teacher's `Config`, which `assert!`-panics on bad compile-time
//! constants, these are validated with `Result` — the values here (region
//! names, requested capacities) come from runtime callers, not fixed
//! configuration baked in at build time.

/// Options for [`crate::channel::Producer::create`].
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Requested data-area capacity in bytes. Rounded down to the nearest
    /// power of two, minimum 4.
    pub capacity: usize,
    /// If `false`, the region's name is unlinked from the namespace when the
    /// producer is dropped (or on explicit `destroy`). If `true`, the region
    /// outlives the producer so a late-started consumer can still open it.
    pub persist: bool,
    /// Enable the optional metrics counters on this end.
    pub enable_metrics: bool,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024,
            persist: false,
            enable_metrics: false,
        }
    }
}

impl ProducerOptions {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }
}

/// Options for [`crate::channel::Consumer::open`].
#[derive(Debug, Clone, Default)]
pub struct ConsumerOptions {
    /// Total region size in bytes, or `0` to auto-detect from the region's
    /// own metadata.
    pub size_hint: usize,
    /// Enable the optional metrics counters on this end.
    pub enable_metrics: bool,
}

impl ConsumerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size_hint(mut self, size_hint: usize) -> Self {
        self.size_hint = size_hint;
        self
    }

    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }
}
