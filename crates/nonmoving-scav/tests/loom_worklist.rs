//! Loom tests for the generation's pending-work lists.
//!
//! These tests check that a segment is queued at most once and that every
//! queued item is popped by exactly one worker.

use std::sync::Arc;

use nonmoving_scav::{Closure, LargeObject, NonmovingGen, NonmovingSegment, Word};

fn segment() -> Arc<NonmovingSegment> {
    Arc::new(NonmovingSegment::new(Word::new(0x1000), 16, 2))
}

/// Two racing pushes of the same segment queue it once.
#[test]
#[ignore = "loom test - run with cargo test --release --test loom_worklist test_racing_segment_pushes_queue_once -- --ignored"]
fn test_racing_segment_pushes_queue_once() {
    loom::model(|| {
        let gen = Arc::new(NonmovingGen::new(1));
        let seg = segment();

        let pushers: Vec<_> = (0..2)
            .map(|_| {
                let gen = Arc::clone(&gen);
                let seg = Arc::clone(&seg);
                loom::thread::spawn(move || gen.push_todo_segment(seg))
            })
            .collect();

        let queued = pushers
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|&queued| queued)
            .count();

        assert_eq!(queued, 1);
        assert_eq!(gen.todo_segment_count(), 1);
    });
}

/// Concurrent pops hand each large object to exactly one worker.
#[test]
#[ignore = "loom test - run with cargo test --release --test loom_worklist test_concurrent_pops_take_each_object_once -- --ignored"]
fn test_concurrent_pops_take_each_object_once() {
    loom::model(|| {
        let gen = Arc::new(NonmovingGen::new(1));
        for i in 0..2 {
            gen.push_todo_large_object(Arc::new(LargeObject::new(
                Word::new(0x10_000 * (i + 1)),
                Closure::arr_words(8),
            )));
        }

        let poppers: Vec<_> = (0..2)
            .map(|_| {
                let gen = Arc::clone(&gen);
                loom::thread::spawn(move || gen.pop_todo_large_object().map(|lo| lo.start()))
            })
            .collect();

        let mut taken: Vec<Word> = poppers
            .into_iter()
            .filter_map(|t| t.join().unwrap())
            .collect();
        taken.sort_unstable();
        taken.dedup();

        assert_eq!(taken.len(), 2);
        assert!(!gen.has_pending_work());
    });
}

/// A pop racing a push either misses the segment or clears its queued flag.
#[test]
#[ignore = "loom test - run with cargo test --release --test loom_worklist test_pop_then_requeue -- --ignored"]
fn test_pop_then_requeue() {
    loom::model(|| {
        let gen = Arc::new(NonmovingGen::new(1));
        let seg = segment();
        assert!(gen.push_todo_segment(Arc::clone(&seg)));

        let popper = {
            let gen = Arc::clone(&gen);
            loom::thread::spawn(move || gen.pop_todo_segment().is_some())
        };
        let popped = popper.join().unwrap();

        assert!(popped);
        assert!(!seg.is_queued());
        assert!(gen.push_todo_segment(seg));
    });
}
