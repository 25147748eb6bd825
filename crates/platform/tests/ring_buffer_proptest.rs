//! Property-based tests for the SPSC ring buffer.
//! The buffer must behave exactly like a bounded FIFO of capacity N - 1.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::VecDeque;

use platform::ring_buffer::RingBuffer;

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Get,
}

fn op() -> impl proptest::strategy::Strategy<Value = Op> {
    use proptest::prelude::*;
    prop_oneof![any::<u8>().prop_map(Op::Put), Just(Op::Get)]
}

proptest::proptest! {
    /// Any interleaving of puts and gets matches a bounded VecDeque model.
    #[test]
    fn matches_bounded_fifo_model(ops in proptest::collection::vec(op(), 0..200)) {
        let mut rb = RingBuffer::<8>::new();
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Op::Put(byte) => {
                    let fits = model.len() < 7;
                    assert_eq!(rb.try_put(byte), fits);
                    if fits {
                        model.push_back(byte);
                    }
                }
                Op::Get => assert_eq!(rb.try_get(), model.pop_front()),
            }
            assert_eq!(rb.available(), model.len());
            assert_eq!(rb.is_empty(), model.is_empty());
            assert_eq!(rb.is_full(), model.len() == 7);
        }
    }

    /// Filling to capacity then draining returns the same bytes in order.
    #[test]
    fn fill_then_drain_preserves_order(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..=15)) {
        let mut rb = RingBuffer::<16>::new();
        let (mut tx, mut rx) = rb.split();
        for &b in &bytes {
            assert!(tx.try_put(b));
        }
        let drained: Vec<u8> = std::iter::from_fn(|| rx.try_get()).collect();
        assert_eq!(drained, bytes);
    }
}
