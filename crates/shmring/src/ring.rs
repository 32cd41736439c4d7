//! The wire-compatible ring: header layout, framing, and the acquire/release
//! write/read protocol.
//!
//! [`RingView`] is a non-owning view bound to a base pointer and length. It
//! never allocates and never blocks — every operation here is a single pass
//! over shared memory; back-pressure is reported to the caller, not retried
//! inside the core.

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(debug_assertions)]
use crate::invariants::{
    debug_assert_monotonic, debug_assert_occupancy_bounded, debug_assert_tail_not_past_head,
    debug_assert_within_published_range,
};
use crate::metrics::Metrics;

const HEADER_LEN: usize = 16;
const FRAME_PREFIX_LEN: u32 = 4;

/// A non-owning view over a mapped byte range, interpreting the first 16
/// bytes as a header and the rest as a circular data area.
///
/// Safety rests entirely on the caller: `base` must stay valid, aligned to
/// at least 4 bytes, and mapped read/write for as long as this view exists.
/// Exactly one `RingView` per process end may call `write`, and exactly one
/// may call `read` — this type does not enforce SPSC discipline, it only
/// implements the protocol correctly under that discipline.
pub struct RingView {
    base: *mut u8,
    mask: u32,
    capacity: u32,
    metrics: Option<Metrics>,
    valid: std::cell::Cell<bool>,
}

// SAFETY: all shared mutable state is reached only through the atomic header
// fields and through byte ranges whose exclusivity is guaranteed by the SPSC
// discipline documented on the type.
unsafe impl Send for RingView {}
unsafe impl Sync for RingView {}

impl RingView {
    fn head(&self) -> &AtomicU32 {
        unsafe { AtomicU32::from_ptr(self.base.cast()) }
    }

    fn tail(&self) -> &AtomicU32 {
        unsafe { AtomicU32::from_ptr(self.base.add(4).cast()) }
    }

    fn capacity_field(&self) -> &AtomicU32 {
        unsafe { AtomicU32::from_ptr(self.base.add(8).cast()) }
    }

    fn reserved_field(&self) -> &AtomicU32 {
        unsafe { AtomicU32::from_ptr(self.base.add(12).cast()) }
    }

    fn data(&self) -> *mut u8 {
        unsafe { self.base.add(HEADER_LEN) }
    }

    /// Largest power of two `<= n`, clamped to the valid capacity range.
    fn round_capacity(n: usize) -> u32 {
        if n < 4 {
            return 4;
        }
        let capped = n.min(1usize << 31);
        let mut pow = 1u32;
        while (pow as usize) * 2 <= capped {
            pow *= 2;
        }
        pow
    }

    /// Construct a producer-side view: zeroes `tail`/`head`/`reserved`,
    /// writes `capacity` as the largest power of two fitting in
    /// `total_len - 16`, then issues a release fence.
    ///
    /// `base` must point to at least `total_len` bytes, `total_len >= 20`.
    pub(crate) fn init_producer(base: *mut u8, total_len: usize, metrics: Option<Metrics>) -> Self {
        let capacity = Self::round_capacity(total_len - HEADER_LEN);
        let view = Self {
            base,
            mask: capacity - 1,
            capacity,
            metrics,
            valid: std::cell::Cell::new(true),
        };
        view.reserved_field().store(0, Ordering::Relaxed);
        view.capacity_field().store(capacity, Ordering::Relaxed);
        view.tail().store(0, Ordering::Relaxed);
        view.head().store(0, Ordering::Release);
        view
    }

    /// Construct a consumer-side view: acquire-fences, reads `capacity`, and
    /// validates it is a power of two in `[4, 2^31]`. Returns `None` if the
    /// header is corrupt, matching the recommended "mark invalid" recovery
    /// for an unrecognisable capacity.
    pub(crate) fn init_consumer(base: *mut u8, metrics: Option<Metrics>) -> Option<Self> {
        let probe = unsafe { AtomicU32::from_ptr(base.add(8).cast::<u32>()) };
        let capacity = probe.load(Ordering::Acquire);
        if capacity < 4 || capacity > (1u32 << 31) || !capacity.is_power_of_two() {
            return None;
        }
        Some(Self {
            base,
            mask: capacity - 1,
            capacity,
            metrics,
            valid: std::cell::Cell::new(true),
        })
    }

    /// Size of the data area in bytes. Always a power of two.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    /// This view's metrics handle, if enabled at construction.
    pub(crate) fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Bytes immediately available to read (occupancy). Does not imply a
    /// complete frame is present — see [`Self::has_data`].
    ///
    /// Called from either end (the producer queries it via
    /// [`Self::writeable_bytes`]), so both fields are loaded with `Acquire`
    /// rather than assuming which one is "owned" by the caller.
    pub fn readable_bytes(&self) -> u32 {
        let head = self.head().load(Ordering::Acquire);
        let tail = self.tail().load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// Bytes immediately available to write.
    pub fn writeable_bytes(&self) -> u32 {
        self.capacity - self.readable_bytes()
    }

    /// `true` iff at least a length prefix's worth of bytes is readable.
    pub fn has_data(&self) -> bool {
        self.readable_bytes() >= FRAME_PREFIX_LEN
    }

    /// Copy `len` bytes from `src` into the data area starting at logical
    /// position `pos`, wrapping at the capacity boundary.
    fn copy_in(&self, pos: u32, src: &[u8]) {
        let off = (pos & self.mask) as usize;
        let cap = self.capacity as usize;
        let first = (cap - off).min(src.len());
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.data().add(off), first);
            if first < src.len() {
                std::ptr::copy_nonoverlapping(
                    src.as_ptr().add(first),
                    self.data(),
                    src.len() - first,
                );
            }
        }
    }

    /// Copy `dst.len()` bytes from the data area starting at logical
    /// position `pos` into `dst`, wrapping at the capacity boundary.
    fn copy_out(&self, pos: u32, dst: &mut [u8]) {
        let off = (pos & self.mask) as usize;
        let cap = self.capacity as usize;
        let first = (cap - off).min(dst.len());
        unsafe {
            std::ptr::copy_nonoverlapping(self.data().add(off), dst.as_mut_ptr(), first);
            if first < dst.len() {
                std::ptr::copy_nonoverlapping(
                    self.data(),
                    dst.as_mut_ptr().add(first),
                    dst.len() - first,
                );
            }
        }
    }

    /// Write a single message. Returns `false` (no side effects) if the
    /// payload could never fit regardless of current occupancy, or if there
    /// is not enough free space for the length prefix plus payload right now.
    pub fn write(&self, payload: &[u8]) -> bool {
        if !self.valid.get() {
            return false;
        }
        let len = payload.len() as u32;
        if len == 0 {
            // A length prefix of 0 is reserved as "no frame"; writing one
            // would produce a frame the read side can never observe.
            return false;
        }
        let total = FRAME_PREFIX_LEN + len;

        if total > self.capacity {
            if let Some(m) = &self.metrics {
                m.record_oversized_write();
            }
            return false;
        }

        let head = self.head().load(Ordering::Relaxed);
        let tail = self.tail().load(Ordering::Acquire);
        let occupied = head.wrapping_sub(tail);
        #[cfg(debug_assertions)]
        debug_assert_occupancy_bounded!(occupied, self.capacity);

        let free = self.capacity - occupied;
        if free < total {
            if let Some(m) = &self.metrics {
                m.record_write_full();
            }
            return false;
        }

        self.copy_in(head, &len.to_le_bytes());
        self.copy_in(head.wrapping_add(FRAME_PREFIX_LEN), payload);

        let new_head = head.wrapping_add(total);
        #[cfg(debug_assertions)]
        debug_assert_monotonic!("head", head, new_head);
        self.head().store(new_head, Ordering::Release);

        if let Some(m) = &self.metrics {
            m.record_write(len);
        }
        true
    }

    /// Read a single message into `dst`. Returns the payload length copied,
    /// or `0` if nothing was available, a frame is only partially published,
    /// or the frame was skipped because it was larger than `dst`.
    pub fn read(&self, dst: &mut [u8]) -> usize {
        if !self.valid.get() {
            return 0;
        }
        let tail = self.tail().load(Ordering::Relaxed);
        let head = self.head().load(Ordering::Acquire);
        let avail = head.wrapping_sub(tail);
        if avail < FRAME_PREFIX_LEN {
            return 0;
        }

        let mut len_bytes = [0u8; 4];
        self.copy_out(tail, &mut len_bytes);
        let len = u32::from_le_bytes(len_bytes);

        if len == 0 || avail < FRAME_PREFIX_LEN + len {
            return 0;
        }

        // The full frame, length prefix plus payload, must lie entirely
        // within the currently-published [tail, head) range before any
        // payload byte is copied out.
        #[cfg(debug_assertions)]
        debug_assert_within_published_range!(
            tail.wrapping_add(FRAME_PREFIX_LEN + len).wrapping_sub(1),
            tail,
            head
        );

        let new_tail = tail.wrapping_add(FRAME_PREFIX_LEN + len);
        #[cfg(debug_assertions)]
        debug_assert_tail_not_past_head!(new_tail, head);

        if (len as usize) > dst.len() {
            // Caller's buffer is too small: skip, never buffer a partial
            // frame outside shared memory.
            #[cfg(debug_assertions)]
            debug_assert_monotonic!("tail", tail, new_tail);
            self.tail().store(new_tail, Ordering::Release);
            if let Some(m) = &self.metrics {
                m.record_skipped_oversized(len);
            }
            return 0;
        }

        self.copy_out(tail.wrapping_add(FRAME_PREFIX_LEN), &mut dst[..len as usize]);

        #[cfg(debug_assertions)]
        debug_assert_monotonic!("tail", tail, new_tail);
        self.tail().store(new_tail, Ordering::Release);

        if let Some(m) = &self.metrics {
            m.record_read(len);
        }
        len as usize
    }

    /// Mark this view invalid after detecting header corruption elsewhere
    /// (e.g. a capacity sanity check failing post-construction). All
    /// further `write`/`read` calls become inert no-ops.
    pub(crate) fn mark_invalid(&self) {
        self.valid.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn round_capacity_rounds_down() {
        assert_eq!(RingView::round_capacity(100), 64);
        assert_eq!(RingView::round_capacity(128), 128);
        assert_eq!(RingView::round_capacity(33), 32);
        assert_eq!(RingView::round_capacity(1), 4);
    }

    #[test]
    fn scenario_basic_roundtrip() {
        let mut buf = backing(16 + 64);
        let producer = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
        assert!(producer.write(b"hello"));

        let mut out = [0u8; 64];
        let n = producer.read(&mut out);
        assert_eq!(n, 5);
        assert_eq!(&out[..5], b"hello");
        assert_eq!(producer.readable_bytes(), 0);
        assert_eq!(producer.writeable_bytes(), 64);
    }

    #[test]
    fn scenario_wrap_around() {
        let mut buf = backing(16 + 32);
        let ring = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);

        assert!(ring.write(&[0x41; 20]));
        let mut out = [0u8; 32];
        assert_eq!(ring.read(&mut out), 20);
        assert!(out[..20].iter().all(|&b| b == 0x41));

        assert!(ring.write(&[0x42; 20]));
        assert_eq!(ring.read(&mut out), 20);
        assert!(out[..20].iter().all(|&b| b == 0x42));
    }

    #[test]
    fn scenario_exact_fill_then_reject() {
        let mut buf = backing(16 + 16);
        let ring = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);

        assert!(ring.write(&[1u8; 12]));
        assert_eq!(ring.writeable_bytes(), 0);
        assert!(!ring.write(&[2u8; 1]));

        let mut out = [0u8; 16];
        assert_eq!(ring.read(&mut out), 12);
        assert!(out[..12].iter().all(|&b| b == 1));
    }

    #[test]
    fn scenario_capacity_rounding() {
        let mut buf100 = backing(16 + 100);
        let r100 = RingView::init_producer(buf100.as_mut_ptr(), buf100.len(), None);
        assert_eq!(r100.capacity(), 64);

        let mut buf128 = backing(16 + 128);
        let r128 = RingView::init_producer(buf128.as_mut_ptr(), buf128.len(), None);
        assert_eq!(r128.capacity(), 128);

        let mut buf33 = backing(16 + 33);
        let r33 = RingView::init_producer(buf33.as_mut_ptr(), buf33.len(), None);
        assert_eq!(r33.capacity(), 32);
    }

    #[test]
    fn scenario_oversized_payload_is_skipped() {
        let mut buf = backing(16 + 64);
        let ring = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
        assert!(ring.write(b"hello world!"));

        let mut small = [0u8; 4];
        assert_eq!(ring.read(&mut small), 0);
        assert!(!ring.has_data());
    }

    #[test]
    fn scenario_cross_view_same_buffer() {
        let mut buf = backing(16 + 64);
        let producer = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
        assert!(producer.write(b"cross-lang"));

        let consumer = RingView::init_consumer(buf.as_mut_ptr(), None).unwrap();
        assert!(consumer.has_data());
        let mut out = [0u8; 64];
        assert_eq!(consumer.read(&mut out), 10);
        assert_eq!(&out[..10], b"cross-lang");
    }

    #[test]
    fn rejects_zero_length_payload() {
        let mut buf = backing(16 + 64);
        let ring = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
        assert!(!ring.write(b""));
        assert_eq!(ring.readable_bytes(), 0);
    }

    #[test]
    fn consumer_rejects_corrupt_capacity() {
        let mut buf = backing(16 + 64);
        buf[8..12].copy_from_slice(&100u32.to_le_bytes());
        assert!(RingView::init_consumer(buf.as_mut_ptr(), None).is_none());
    }

    #[test]
    fn full_buffer_does_not_advance_head() {
        let mut buf = backing(16 + 16);
        let ring = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
        assert!(ring.write(&[9u8; 12]));
        let head_before = ring.head().load(Ordering::Relaxed);
        assert!(!ring.write(&[9u8; 1]));
        assert_eq!(ring.head().load(Ordering::Relaxed), head_before);
    }
}
