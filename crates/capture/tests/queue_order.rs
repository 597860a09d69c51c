//! Property-based tests for the bounded request FIFO.
//! Verifies ordering and backpressure invariants for arbitrary push/pop
//! interleavings, not just fixed examples.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::panic)]

use capture::{CaptureError, RequestQueue};

proptest::proptest! {
    /// Items always come out in push order, regardless of how pushes and
    /// pops interleave.
    #[test]
    fn fifo_order_holds_for_any_interleaving(ops in proptest::collection::vec(
        proptest::bool::weighted(0.6), 1..200,
    )) {
        let mut queue: RequestQueue<u32, 16> = RequestQueue::new();
        let mut next_in: u32 = 0;
        let mut next_out: u32 = 0;

        for is_push in ops {
            if is_push {
                match queue.push(next_in) {
                    Ok(()) => next_in += 1,
                    Err(CaptureError::QueueFull) => assert!(queue.is_full()),
                    Err(other) => panic!("unexpected push error: {other:?}"),
                }
            } else {
                match queue.pop() {
                    Ok(value) => {
                        assert_eq!(value, next_out);
                        next_out += 1;
                    }
                    Err(CaptureError::QueuePop) => assert!(queue.is_empty()),
                    Err(other) => panic!("unexpected pop error: {other:?}"),
                }
            }
            assert_eq!(queue.len() as u32, next_in - next_out);
        }
    }

    /// A rejected push never disturbs the queued items.
    #[test]
    fn rejected_push_is_side_effect_free(extra in 0u32..1000) {
        let mut queue: RequestQueue<u32, 4> = RequestQueue::new();
        for value in 0..4 {
            queue.push(value).unwrap();
        }
        assert_eq!(queue.push(extra), Err(CaptureError::QueueFull));
        for expected in 0..4 {
            assert_eq!(queue.pop().unwrap(), expected);
        }
    }

    /// Peek always agrees with the next pop.
    #[test]
    fn peek_matches_next_pop(values in proptest::collection::vec(0u32..1000, 1..16)) {
        let mut queue: RequestQueue<u32, 16> = RequestQueue::new();
        for &value in &values {
            queue.push(value).unwrap();
        }
        while let Some(&front) = queue.peek() {
            assert_eq!(queue.pop().unwrap(), front);
        }
        assert!(queue.is_empty());
    }
}
