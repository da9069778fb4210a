//! Field tracing of individual objects and segments.
//!
//! [`Scavenger::scavenge_one`] dispatches on the object's shape, evacuates its
//! pointer fields and moves mutable-capable shapes to their clean tag. After
//! every object, [`Scavenger::record_if_failed`] decides whether it stays on
//! the generation's mutable list.

use std::ops::Range;

use super::context::ScanContext;
use super::evacuate::Evacuator;
use super::fatal::barf;
use crate::closure::layout::{
    ap_stack, bco, blocking_queue, ind, mut_var, mvar, selector, small_mut_arr_ptrs, stack,
    trec_chunk, tvar,
};
use crate::closure::{Closure, ClosureType, Word};
use crate::heap::{BlockFlags, LargeObject, NonmovingGen, NonmovingSegment};

/// Traces objects of one non-moving generation on behalf of one worker.
pub struct Scavenger<'a, E: Evacuator + ?Sized> {
    gen: &'a NonmovingGen,
    evac: &'a mut E,
    ctx: &'a mut ScanContext,
}

impl<'a, E: Evacuator + ?Sized> Scavenger<'a, E> {
    /// Create a scavenger for `gen` using the worker's evacuator and context.
    pub fn new(gen: &'a NonmovingGen, evac: &'a mut E, ctx: &'a mut ScanContext) -> Self {
        Self { gen, evac, ctx }
    }

    /// The generation being scavenged.
    #[must_use]
    pub const fn generation(&self) -> &'a NonmovingGen {
        self.gen
    }

    /// The worker's context.
    #[must_use]
    pub fn context(&self) -> &ScanContext {
        &*self.ctx
    }

    pub(crate) fn context_mut(&mut self) -> &mut ScanContext {
        &mut *self.ctx
    }

    #[inline]
    const fn checks(&self) -> bool {
        self.ctx.config().invariant_checks
    }

    // ------------------------------------------------------------------------
    // Field tracer
    // ------------------------------------------------------------------------

    /// Trace the object at `addr` and update its mutable-list membership.
    ///
    /// # Panics
    ///
    /// Panics if the header tag is unknown or names a shape that never lives
    /// in the non-moving heap, and if a stack, saved stack, array or
    /// transaction chunk claims fields past its payload. With invariant
    /// checks on, also panics on a
    /// payload too short for its shape and on a shape that must be fully
    /// evacuated but was not.
    pub fn scavenge_one(&mut self, addr: Word, closure: &mut Closure) {
        use ClosureType as T;

        let ty = match closure.closure_type() {
            Ok(ty) => ty,
            Err(raw) => barf!("unimplemented/strange closure type {raw} @ {addr}"),
        };
        if self.checks() && !closure.looks_like_closure(ty) {
            barf!(
                "{ty} @ {addr} does not look like a closure ({} payload words)",
                closure.payload().len()
            );
        }

        match ty {
            T::MvarClean | T::MvarDirty => {
                self.evacuate_fields(closure, &[mvar::HEAD, mvar::TAIL, mvar::VALUE]);
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::TvarClean | T::TvarDirty => {
                self.evacuate_fields(
                    closure,
                    &[tvar::CURRENT_VALUE, tvar::FIRST_WATCH_QUEUE_ENTRY],
                );
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::Fun2_0 | T::Thunk2_0 => {
                self.scavenge_srt(closure);
                self.evacuate_fields(closure, &[1, 0]);
            }
            T::Constr2_0 => self.evacuate_fields(closure, &[1, 0]),

            T::Fun1_0 | T::Fun1_1 | T::Thunk1_0 | T::Thunk1_1 => {
                self.scavenge_srt(closure);
                self.evacuate_fields(closure, &[0]);
            }
            T::Constr1_0 | T::Constr1_1 => self.evacuate_fields(closure, &[0]),

            T::Fun0_1 | T::Fun0_2 | T::Thunk0_1 | T::Thunk0_2 => self.scavenge_srt(closure),
            T::Constr0_1 | T::Constr0_2 => {}

            T::Fun | T::Thunk => {
                self.scavenge_srt(closure);
                let ptrs = Self::span(closure, 0, closure.ptrs(), ty, addr);
                self.evacuate_range(closure, ptrs);
            }
            T::Constr | T::ConstrNoCaf | T::Prim => {
                let ptrs = Self::span(closure, 0, closure.ptrs(), ty, addr);
                self.evacuate_range(closure, ptrs);
            }

            // Key liveness is decided after marking, too late to evacuate,
            // so every field is followed as if the key were alive.
            T::Weak => self.evac.scavenge_live_weak(self.ctx, closure),

            T::Bco => self.evacuate_fields(closure, &[bco::INSTRS, bco::LITERALS, bco::PTRS]),

            T::Blackhole => self.evacuate_fields(closure, &[ind::INDIRECTEE]),

            T::MutVarClean | T::MutVarDirty => {
                self.evacuate_fields(closure, &[mut_var::VAR]);
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::BlockingQueueClean | T::BlockingQueueDirty => {
                self.evacuate_fields(
                    closure,
                    &[
                        blocking_queue::BH,
                        blocking_queue::OWNER,
                        blocking_queue::QUEUE,
                        blocking_queue::LINK,
                    ],
                );
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::ThunkSelector => self.evacuate_fields(closure, &[selector::SELECTEE]),

            T::ApStack => {
                let size = Self::word(closure, ap_stack::SIZE, ty, addr);
                let saved = Self::span(
                    closure,
                    ap_stack::STACK,
                    ap_stack::STACK.saturating_add(size),
                    ty,
                    addr,
                );
                self.evacuate_fields(closure, &[ap_stack::FUN]);
                self.evac
                    .scavenge_stack(self.ctx, &mut closure.payload_mut()[saved]);
            }

            T::Pap => {
                self.evac.scavenge_pap(self.ctx, closure);
            }
            T::Ap => self.evac.scavenge_ap(self.ctx, closure),

            T::ArrWords => {}

            T::MutArrPtrsClean | T::MutArrPtrsDirty => {
                self.evac.scavenge_mut_arr_ptrs(self.ctx, closure);
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
                // Always keep it on the mutable list
                self.ctx.set_failed_to_evac();
            }

            T::MutArrPtrsFrozenClean | T::MutArrPtrsFrozenDirty => {
                self.evac.scavenge_mut_arr_ptrs(self.ctx, closure);
                self.check_fully_evacuated(ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::SmallMutArrPtrsClean | T::SmallMutArrPtrsDirty => {
                self.scavenge_small_array(closure, ty, addr);
                Self::make_clean(closure, ty, addr);
                // Always keep it on the mutable list
                self.ctx.set_failed_to_evac();
            }

            T::SmallMutArrPtrsFrozenClean | T::SmallMutArrPtrsFrozenDirty => {
                self.scavenge_small_array(closure, ty, addr);
                Self::make_clean(closure, ty, addr);
            }

            T::Tso => self.evac.scavenge_tso(self.ctx, closure),

            T::Stack => {
                let size = Self::word(closure, stack::STACK_SIZE, ty, addr);
                let sp = Self::word(closure, stack::SP, ty, addr);
                let live = Self::span(
                    closure,
                    stack::STACK.saturating_add(sp),
                    stack::STACK.saturating_add(size),
                    ty,
                    addr,
                );
                self.evac
                    .scavenge_stack(self.ctx, &mut closure.payload_mut()[live]);
                closure.payload_mut()[stack::DIRTY] =
                    Word::new(usize::from(self.ctx.failed_to_evac()));
            }

            T::MutPrim => {
                let ptrs = Self::span(closure, 0, closure.ptrs(), ty, addr);
                self.evacuate_range(closure, ptrs);
                self.ctx.set_failed_to_evac();
            }

            T::TrecChunk => {
                let entries = Self::word(closure, trec_chunk::NEXT_ENTRY_IDX, ty, addr);
                Self::span(
                    closure,
                    trec_chunk::ENTRIES,
                    entries
                        .saturating_mul(trec_chunk::ENTRY_WORDS)
                        .saturating_add(trec_chunk::ENTRIES),
                    ty,
                    addr,
                );
                self.evacuate_fields(closure, &[trec_chunk::PREV_CHUNK]);
                for entry in 0..entries {
                    let base = trec_chunk::ENTRIES + entry * trec_chunk::ENTRY_WORDS;
                    self.evacuate_fields(
                        closure,
                        &[
                            base + trec_chunk::TVAR,
                            base + trec_chunk::EXPECTED_VALUE,
                            base + trec_chunk::NEW_VALUE,
                        ],
                    );
                }
                self.ctx.set_failed_to_evac();
            }

            T::InvalidObject
            | T::FunStatic
            | T::ThunkStatic
            | T::Ind
            | T::IndStatic
            | T::RetBco
            | T::RetSmall
            | T::RetBig
            | T::RetFun
            | T::UpdateFrame
            | T::CatchFrame
            | T::UnderflowFrame
            | T::StopFrame
            | T::AtomicallyFrame
            | T::CatchRetryFrame
            | T::CatchStmFrame
            | T::Whitehole
            | T::CompactNfdata => {
                barf!(
                    "unimplemented/strange closure type {} ({ty}) @ {addr}",
                    ty.raw()
                )
            }
        }

        self.ctx.record(|s| s.objects_scavenged += 1);
        self.record_if_failed(addr);
    }

    fn evacuate_fields(&mut self, closure: &mut Closure, indices: &[usize]) {
        let fields = closure.payload_mut();
        for &index in indices {
            self.evac.evacuate(self.ctx, &mut fields[index]);
        }
    }

    fn evacuate_range(&mut self, closure: &mut Closure, range: Range<usize>) {
        for slot in &mut closure.payload_mut()[range] {
            self.evac.evacuate(self.ctx, slot);
        }
    }

    fn scavenge_srt(&mut self, closure: &Closure) {
        let info = *closure.info();
        self.evac.scavenge_srt(self.ctx, &info);
    }

    fn scavenge_small_array(&mut self, closure: &mut Closure, ty: ClosureType, addr: Word) {
        let ptrs = Self::word(closure, small_mut_arr_ptrs::PTRS, ty, addr);
        let elems = Self::span(
            closure,
            small_mut_arr_ptrs::ELEMS,
            small_mut_arr_ptrs::ELEMS.saturating_add(ptrs),
            ty,
            addr,
        );
        for slot in &mut closure.payload_mut()[elems] {
            self.evac.evacuate(self.ctx, slot);
            self.check_fully_evacuated(ty, addr);
        }
    }

    /// Length or index word `index` of the payload.
    fn word(closure: &Closure, index: usize, ty: ClosureType, addr: Word) -> usize {
        match closure.payload().get(index) {
            Some(word) => word.raw(),
            None => barf!(
                "{ty} @ {addr} is missing header word {index} ({} payload words)",
                closure.payload().len()
            ),
        }
    }

    /// Payload words `start..end`, which must lie inside the payload.
    fn span(
        closure: &Closure,
        start: usize,
        end: usize,
        ty: ClosureType,
        addr: Word,
    ) -> Range<usize> {
        let len = closure.payload().len();
        if start > end || end > len {
            barf!("{ty} @ {addr} has fields {start}..{end} outside its {len} payload words");
        }
        start..end
    }

    /// Shapes traced here under forced promotion must not leave anything
    /// behind in a younger generation.
    fn check_fully_evacuated(&self, ty: ClosureType, addr: Word) {
        if self.checks() && self.ctx.failed_to_evac() {
            barf!("{ty} @ {addr} still references a younger generation after forced promotion");
        }
    }

    fn make_clean(closure: &mut Closure, ty: ClosureType, addr: Word) {
        if closure.mark_clean().is_none() {
            barf!("{ty} @ {addr} has no clean state");
        }
    }

    // ------------------------------------------------------------------------
    // Mutability bookkeeping
    // ------------------------------------------------------------------------

    /// Consume the failed-to-evacuate flag for the object at `addr`.
    ///
    /// If it was set, the object is appended to the generation's mutable
    /// list, unless the generation is the youngest. Returns whether the
    /// object was recorded.
    pub fn record_if_failed(&mut self, addr: Word) -> bool {
        if !self.ctx.take_failed_to_evac() {
            return false;
        }
        if self.gen.no() == 0 {
            return false;
        }

        self.gen.record_mutable(addr);
        self.ctx.record(|s| s.mutable_records += 1);
        #[cfg(feature = "tracing")]
        super::tracing::log_record_mutable(addr, self.gen.no());
        true
    }

    // ------------------------------------------------------------------------
    // Segment walker
    // ------------------------------------------------------------------------

    /// Trace every block below the segment's cursor that did not survive the
    /// previous cycle.
    ///
    /// # Panics
    ///
    /// Panics if a traced block is corrupt; see [`Self::scavenge_one`].
    pub fn scavenge_segment(&mut self, segment: &NonmovingSegment) {
        let next_free = segment.next_free();
        let mut skipped = 0;

        for index in 0..next_free {
            // set = survived the previous cycle, already scanned
            // clear = allocated this cycle, scavenge it
            if segment.is_marked(index) {
                skipped += 1;
                continue;
            }
            let mut block = segment.block(index);
            self.scavenge_one(segment.block_addr(index), &mut block);
        }

        self.ctx.record(|s| {
            s.blocks_skipped += skipped;
            s.segments_scavenged += 1;
        });
        #[cfg(feature = "tracing")]
        super::tracing::log_segment(segment.base(), next_free, next_free - skipped);
    }

    /// Trace a large object already moved onto the scavenged list.
    ///
    /// # Panics
    ///
    /// Panics if the object is corrupt; see [`Self::scavenge_one`]. With
    /// invariant checks on, also panics if its block is not flagged
    /// non-moving.
    pub fn scavenge_large_object(&mut self, object: &LargeObject) {
        if self.checks() && !object.flags().contains(BlockFlags::NONMOVING) {
            barf!(
                "large object @ {} is not in the non-moving heap (flags {:#x})",
                object.start(),
                object.flags().bits()
            );
        }

        let mut closure = object.closure();
        self.scavenge_one(object.start(), &mut closure);

        self.ctx.record(|s| {
            s.large_objects_scavenged += 1;
            s.large_blocks_scavenged += object.blocks();
        });
        #[cfg(feature = "tracing")]
        super::tracing::log_large_object(object.start(), object.blocks());
    }
}
