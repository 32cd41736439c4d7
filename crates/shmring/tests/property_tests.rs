//! Property-based tests for the byte-oriented ring buffer protocol.
//!
//! These exercise `RingView` over a plain heap-allocated backing buffer —
//! the protocol doesn't care whether the bytes came from `mmap` or a `Vec`,
//! only that all accesses go through the atomic header fields.

use proptest::prelude::*;
use shmring::RingView;

fn producer_over(total_len: usize) -> (Vec<u8>, RingView) {
    let mut buf = vec![0u8; total_len];
    let view = RingView::init_producer(buf.as_mut_ptr(), buf.len(), None);
    (buf, view)
}

proptest! {
    /// Occupancy never exceeds capacity after any sequence of writes/reads.
    #[test]
    fn prop_occupancy_bounded(
        payload_lens in prop::collection::vec(1usize..20, 0..50),
    ) {
        let (_buf, ring) = producer_over(16 + 64);
        let capacity = ring.capacity();

        for len in payload_lens {
            let payload = vec![0xABu8; len];
            let _ = ring.write(&payload);
            prop_assert!(ring.readable_bytes() <= capacity);
        }
    }

    /// `ReadableBytes() + WriteableBytes() == Capacity()` at every observation.
    #[test]
    fn prop_readable_plus_writeable_equals_capacity(
        ops in prop::collection::vec((prop::bool::ANY, 1usize..20), 0..80),
    ) {
        let (_buf, ring) = producer_over(16 + 128);
        let mut out = [0u8; 128];

        for (is_write, len) in ops {
            if is_write {
                let payload = vec![0x11u8; len];
                let _ = ring.write(&payload);
            } else {
                let _ = ring.read(&mut out);
            }
            prop_assert_eq!(
                ring.readable_bytes() + ring.writeable_bytes(),
                ring.capacity()
            );
        }
    }

    /// Round-trip identity: writing a sequence of payloads that all fit and
    /// reading them back yields the same payloads in the same order.
    #[test]
    fn prop_round_trip_identity(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..10), 1..8),
    ) {
        let (_buf, ring) = producer_over(16 + 256);

        let mut accepted = Vec::new();
        for p in &payloads {
            if ring.write(p) {
                accepted.push(p.clone());
            } else {
                break;
            }
        }

        let mut out = [0u8; 256];
        for expected in &accepted {
            let n = ring.read(&mut out);
            prop_assert_eq!(&out[..n], expected.as_slice());
        }
    }

    /// Capacity rounding: actual capacity is the largest power of two <= requested.
    #[test]
    fn prop_capacity_rounds_down(requested in 4usize..=1_000_000) {
        let (_buf, ring) = producer_over(16 + requested);
        let cap = ring.capacity() as usize;
        prop_assert!(cap.is_power_of_two());
        prop_assert!(cap <= requested);
        prop_assert!(cap * 2 > requested || cap == requested);
    }

    /// A write that cannot fit given current occupancy leaves `head` and the
    /// data area untouched.
    #[test]
    fn prop_full_rejection_is_a_no_op(fill_len in 1usize..60, extra_len in 1usize..60) {
        let (_buf, ring) = producer_over(16 + 64);
        let _ = ring.write(&vec![1u8; fill_len]);
        let readable_before = ring.readable_bytes();

        let ok = ring.write(&vec![2u8; extra_len]);
        if !ok {
            prop_assert_eq!(ring.readable_bytes(), readable_before);
        }
    }

    /// Draining to empty makes `HasData` false and further reads inert.
    #[test]
    fn prop_empty_after_drain(len in 1usize..30) {
        let (_buf, ring) = producer_over(16 + 64);
        assert!(ring.write(&vec![7u8; len]));

        let mut out = [0u8; 64];
        let n = ring.read(&mut out);
        prop_assert_eq!(n, len);
        prop_assert!(!ring.has_data());
        prop_assert_eq!(ring.read(&mut out), 0);
    }

    /// A reader buffer smaller than the frame's payload causes the frame to
    /// be skipped (consumed) but zero bytes are copied out.
    #[test]
    fn prop_oversized_skip(payload_len in 5usize..40) {
        let (_buf, ring) = producer_over(16 + 64);
        assert!(ring.write(&vec![3u8; payload_len]));

        let mut small = vec![0u8; payload_len - 1];
        let n = ring.read(&mut small);
        prop_assert_eq!(n, 0);
        prop_assert!(!ring.has_data());
    }
}
