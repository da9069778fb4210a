//! The collector services the scavenger calls into.
//!
//! The scavenger decides *which* fields of an object to follow. Moving the
//! referenced objects, and tracing the few shapes whose layout depends on
//! information outside the object itself, is left to an [`Evacuator`].

use super::context::ScanContext;
use super::fatal::barf;
use crate::closure::{layout, Closure, InfoTable, Word};

/// Evacuation primitive plus the specialized tracers for complex shapes.
///
/// Every method receives the calling worker's [`ScanContext`]. An
/// implementation reports a reference it could not promote out of a younger
/// generation with [`ScanContext::set_failed_to_evac`], and must honour
/// [`ScanContext::forced_promotion`] by targeting the non-moving generation.
///
/// Objects promoted into the non-moving generation are handed back to the
/// scavenger by pushing them onto the generation's worklists. A segment must
/// only be pushed once it will receive no further allocation this cycle;
/// each walk covers the blocks below the cursor at the time of the walk.
pub trait Evacuator {
    /// Make the object referenced by `slot` resident in an acceptably old
    /// generation and rewrite `slot` to its final address.
    fn evacuate(&mut self, ctx: &mut ScanContext, slot: &mut Word);

    /// Trace the static reference table of a thunk or function.
    fn scavenge_srt(&mut self, ctx: &mut ScanContext, info: &InfoTable);

    /// Trace the frames of a stack chunk, from the stack pointer to the end.
    fn scavenge_stack(&mut self, ctx: &mut ScanContext, stack: &mut [Word]);

    /// Trace a lightweight task's state object.
    fn scavenge_tso(&mut self, ctx: &mut ScanContext, tso: &mut Closure);

    /// Trace a partial application. Returns the index of the first payload
    /// word past the application.
    fn scavenge_pap(&mut self, ctx: &mut ScanContext, pap: &mut Closure) -> usize;

    /// Trace an application accumulator.
    fn scavenge_ap(&mut self, ctx: &mut ScanContext, ap: &mut Closure);

    /// Trace a weak reference as if its key were alive.
    ///
    /// Key liveness is only known after the mark phase, when it is too late
    /// to evacuate, so every field but the link is followed here.
    fn scavenge_live_weak(&mut self, ctx: &mut ScanContext, weak: &mut Closure) {
        let fields = weak.payload_mut();
        self.evacuate(ctx, &mut fields[layout::weak::VALUE]);
        self.evacuate(ctx, &mut fields[layout::weak::KEY]);
        self.evacuate(ctx, &mut fields[layout::weak::FINALIZER]);
        self.evacuate(ctx, &mut fields[layout::weak::CFINALIZERS]);
    }

    /// Trace every element of a mutable pointer array.
    ///
    /// Each card-table word is set to 1 if an element it covers stayed in a
    /// younger generation and 0 otherwise. The failed-to-evacuate flag ends
    /// up set if any card is.
    ///
    /// # Panics
    ///
    /// Panics if the payload is too short for the element count and its
    /// card table.
    fn scavenge_mut_arr_ptrs(&mut self, ctx: &mut ScanContext, array: &mut Closure) {
        use layout::mut_arr_ptrs::{cards, CARD_SIZE, ELEMS, PTRS};

        let fields = array.payload_mut();
        let ptrs = fields.get(PTRS).map_or(0, |ptrs| ptrs.raw());
        let required = ptrs
            .checked_add(cards(ptrs))
            .and_then(|words| words.checked_add(ELEMS));
        if required.is_none_or(|required| fields.len() < required) {
            barf!(
                "mutable array of {ptrs} elements has a truncated card table ({} payload words)",
                fields.len()
            );
        }
        let (elems, cards) = fields[ELEMS..].split_at_mut(ptrs);
        let mut any_failed = false;

        for (card, chunk) in cards.iter_mut().zip(elems.chunks_mut(CARD_SIZE)) {
            ctx.set_failed_to_evac_to(false);
            for slot in chunk {
                self.evacuate(ctx, slot);
            }
            let failed = ctx.failed_to_evac();
            *card = Word::new(usize::from(failed));
            any_failed |= failed;
        }

        ctx.set_failed_to_evac_to(any_failed);
    }
}

impl<E: Evacuator + ?Sized> Evacuator for &mut E {
    fn evacuate(&mut self, ctx: &mut ScanContext, slot: &mut Word) {
        (**self).evacuate(ctx, slot);
    }

    fn scavenge_srt(&mut self, ctx: &mut ScanContext, info: &InfoTable) {
        (**self).scavenge_srt(ctx, info);
    }

    fn scavenge_stack(&mut self, ctx: &mut ScanContext, stack: &mut [Word]) {
        (**self).scavenge_stack(ctx, stack);
    }

    fn scavenge_tso(&mut self, ctx: &mut ScanContext, tso: &mut Closure) {
        (**self).scavenge_tso(ctx, tso);
    }

    fn scavenge_pap(&mut self, ctx: &mut ScanContext, pap: &mut Closure) -> usize {
        (**self).scavenge_pap(ctx, pap)
    }

    fn scavenge_ap(&mut self, ctx: &mut ScanContext, ap: &mut Closure) {
        (**self).scavenge_ap(ctx, ap);
    }

    fn scavenge_live_weak(&mut self, ctx: &mut ScanContext, weak: &mut Closure) {
        (**self).scavenge_live_weak(ctx, weak);
    }

    fn scavenge_mut_arr_ptrs(&mut self, ctx: &mut ScanContext, array: &mut Closure) {
        (**self).scavenge_mut_arr_ptrs(ctx, array);
    }
}
