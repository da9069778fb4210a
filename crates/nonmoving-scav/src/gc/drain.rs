//! Fixpoint drain of the non-moving generation's pending work.

use std::sync::Arc;
use std::time::Instant;

use super::context::ScanContext;
use super::evacuate::Evacuator;
use super::scavenge::Scavenger;
use crate::heap::NonmovingGen;

/// Scavenge everything pending in `gen`, including work generated while
/// scavenging, until both worklists are empty.
///
/// Every pass drains all pending large objects before any pending segment.
/// Forced promotion is on for the whole call and restored to its entry value
/// on return, whether or not any work was found and even if a fatal
/// diagnostic unwinds out of the call.
///
/// Several workers may call this concurrently on the same generation, each
/// with its own evacuator and context. Every queued item is taken by exactly
/// one of them.
///
/// # Panics
///
/// Panics on heap corruption; see [`Scavenger::scavenge_one`].
pub fn scavenge_nonmoving_heap<E: Evacuator + ?Sized>(
    gen: &NonmovingGen,
    evac: &mut E,
    ctx: &mut ScanContext,
) {
    let mut ctx = ctx.force_promotion();

    #[cfg(feature = "tracing")]
    let _span = crate::tracing::internal::trace_scavenge(
        ctx.worker_id(),
        gen.no(),
        crate::tracing::internal::next_gc_id(),
    );

    let start = Instant::now();
    let mut scavenger = Scavenger::new(gen, evac, &mut ctx);

    loop {
        let (large_objects, segments) = drain_pass(&mut scavenger);
        let ctx = scavenger.context_mut();
        ctx.record(|s| s.passes += 1);

        #[cfg(feature = "tracing")]
        super::tracing::log_pass(ctx.stats().passes, large_objects, segments);

        if large_objects == 0 && segments == 0 {
            break;
        }
    }

    let elapsed = start.elapsed();
    ctx.record(|s| s.duration += elapsed);

    #[cfg(feature = "tracing")]
    super::tracing::log_scavenge_done(ctx.stats());
}

/// One pass over both worklists. Returns how many large objects and
/// segments it took.
fn drain_pass<E: Evacuator + ?Sized>(scavenger: &mut Scavenger<'_, E>) -> (usize, usize) {
    let gen = scavenger.generation();

    let mut large_objects = 0;
    while let Some(object) = gen.pop_todo_large_object() {
        gen.link_scavenged_large_object(Arc::clone(&object));
        scavenger.scavenge_large_object(&object);
        large_objects += 1;
    }

    let mut segments = 0;
    while let Some(segment) = gen.pop_todo_segment() {
        scavenger.scavenge_segment(&segment);
        segments += 1;
    }

    (large_objects, segments)
}
