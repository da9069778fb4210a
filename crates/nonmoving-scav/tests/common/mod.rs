//! Model collector shared by the integration tests.
//!
//! Young objects live in a map keyed by address. Evacuating one promotes it
//! into the non-moving generation as a fresh large object and queues it, so
//! the drain sees the work it generates.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nonmoving_scav::{
    Closure, ClosureType, Evacuator, InfoTable, LargeObject, NonmovingGen, NonmovingSegment,
    ScanContext, Word,
};
use parking_lot::Mutex;

/// First address handed out to promoted objects.
pub const PROMOTED_BASE: usize = 0x1000_0000;

#[derive(Default)]
struct State {
    young: HashMap<Word, Closure>,
    forwarded: HashMap<Word, Word>,
}

/// The younger generations plus the non-moving generation they promote into.
pub struct ModelHeap {
    pub gen: NonmovingGen,
    state: Mutex<State>,
    /// Young objects that cannot be promoted this cycle.
    stuck: Mutex<HashSet<Word>>,
    next_addr: AtomicUsize,
    promotions: AtomicUsize,
}

impl ModelHeap {
    pub fn new(gen_no: u32) -> Arc<Self> {
        Arc::new(Self {
            gen: NonmovingGen::new(gen_no),
            state: Mutex::new(State::default()),
            stuck: Mutex::new(HashSet::new()),
            next_addr: AtomicUsize::new(PROMOTED_BASE),
            promotions: AtomicUsize::new(0),
        })
    }

    /// Place `closure` in the young generation at `addr`.
    pub fn young(&self, addr: usize, closure: Closure) -> Word {
        let addr = Word::new(addr);
        self.state.lock().young.insert(addr, closure);
        addr
    }

    /// Make references to `addr` fail to evacuate.
    pub fn stick(&self, addr: usize) -> Word {
        let addr = Word::new(addr);
        self.stuck.lock().insert(addr);
        addr
    }

    pub fn is_young(&self, addr: Word) -> bool {
        self.state.lock().young.contains_key(&addr)
    }

    pub fn is_stuck(&self, addr: Word) -> bool {
        self.stuck.lock().contains(&addr)
    }

    pub fn young_count(&self) -> usize {
        self.state.lock().young.len()
    }

    pub fn forwarded(&self, addr: Word) -> Option<Word> {
        self.state.lock().forwarded.get(&addr).copied()
    }

    pub fn promotions(&self) -> usize {
        self.promotions.load(Ordering::SeqCst)
    }

    /// Queue an old large object holding `closure` at `addr`.
    pub fn old_large_object(&self, addr: usize, closure: Closure) -> Arc<LargeObject> {
        let object = Arc::new(LargeObject::new(Word::new(addr), closure));
        self.gen.push_todo_large_object(Arc::clone(&object));
        object
    }

    /// Build a segment holding `closures` and queue it.
    pub fn old_segment(&self, base: usize, closures: Vec<Closure>) -> Arc<NonmovingSegment> {
        let segment = Arc::new(NonmovingSegment::new(
            Word::new(base),
            64,
            closures.len().max(1),
        ));
        for closure in closures {
            segment.allocate(closure).expect("segment sized for its closures");
        }
        assert!(self.gen.push_todo_segment(Arc::clone(&segment)));
        segment
    }

    fn promote(&self, addr: Word) -> Option<Word> {
        let mut state = self.state.lock();
        if let Some(&to) = state.forwarded.get(&addr) {
            return Some(to);
        }
        let closure = state.young.remove(&addr)?;

        let blocks = LargeObject::new(Word::NULL, closure.clone()).blocks();
        let to = Word::new(
            self.next_addr
                .fetch_add(blocks * nonmoving_scav::heap::BLOCK_SIZE, Ordering::SeqCst),
        );
        state.forwarded.insert(addr, to);
        drop(state);

        self.promotions.fetch_add(1, Ordering::SeqCst);
        self.gen
            .push_todo_large_object(Arc::new(LargeObject::new(to, closure)));
        Some(to)
    }
}

/// Per-worker evacuator over a shared [`ModelHeap`].
pub struct ModelEvacuator {
    heap: Arc<ModelHeap>,
    /// Every slot value handed to `evacuate`, in call order.
    pub evacuated: Vec<Word>,
    pub srts: Vec<InfoTable>,
}

impl ModelEvacuator {
    pub fn new(heap: &Arc<ModelHeap>) -> Self {
        Self {
            heap: Arc::clone(heap),
            evacuated: Vec::new(),
            srts: Vec::new(),
        }
    }

    fn evacuate_all(&mut self, ctx: &mut ScanContext, words: &mut [Word]) {
        for slot in words {
            self.evacuate(ctx, slot);
        }
    }
}

impl Evacuator for ModelEvacuator {
    fn evacuate(&mut self, ctx: &mut ScanContext, slot: &mut Word) {
        assert!(
            ctx.forced_promotion(),
            "evacuation outside forced promotion"
        );
        self.evacuated.push(*slot);
        if slot.is_null() {
            return;
        }
        if self.heap.is_stuck(*slot) {
            ctx.set_failed_to_evac();
            return;
        }
        if let Some(to) = self.heap.promote(*slot) {
            *slot = to;
        }
    }

    fn scavenge_srt(&mut self, _ctx: &mut ScanContext, info: &InfoTable) {
        self.srts.push(*info);
    }

    fn scavenge_stack(&mut self, ctx: &mut ScanContext, stack: &mut [Word]) {
        self.evacuate_all(ctx, stack);
    }

    fn scavenge_tso(&mut self, ctx: &mut ScanContext, tso: &mut Closure) {
        self.evacuate_all(ctx, tso.payload_mut());
    }

    fn scavenge_pap(&mut self, ctx: &mut ScanContext, pap: &mut Closure) -> usize {
        self.evacuate_all(ctx, pap.payload_mut());
        pap.payload().len()
    }

    fn scavenge_ap(&mut self, ctx: &mut ScanContext, ap: &mut Closure) {
        self.evacuate_all(ctx, ap.payload_mut());
    }
}

/// A constructor whose payload words are all pointers.
pub fn cons(fields: &[usize]) -> Closure {
    let ty = match fields.len() {
        1 => ClosureType::Constr1_0,
        2 => ClosureType::Constr2_0,
        _ => ClosureType::Constr,
    };
    Closure::new(ty, fields.iter().copied().map(Word::new).collect())
}
