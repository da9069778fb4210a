//! Storage of the non-moving generation.
//!
//! The oldest generation keeps small objects in fixed-size segments and big
//! ones in large-object blocks. Neither is ever moved. This module holds those
//! containers plus the generation-wide worklists the scavenger drains.
//!
//! # Segment layout
//!
//! A segment is `capacity` equally sized blocks starting at `base`. Block `i`
//! lives at `base + i * block_size`. Blocks below `next_free` are allocated;
//! blocks at or past it are not traced. Each block has one bit in the
//! segment's [`MarkBitmap`]: set means it survived the previous cycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::closure::{Closure, Word};
use crate::gc::mark::MarkBitmap;
use crate::gc::worklist::Worklist;

// ============================================================================
// Constants
// ============================================================================

/// Size of a heap block in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Default number of blocks per segment.
pub const DEFAULT_SEGMENT_BLOCKS: usize = 256;

// ============================================================================
// NonmovingSegment
// ============================================================================

/// A fixed-capacity region of equally sized object blocks.
///
/// Blocks are individually locked so that a worker walking the segment and an
/// allocator filling later blocks never contend on the same lock.
#[derive(Debug)]
pub struct NonmovingSegment {
    /// Address of block 0.
    base: Word,
    /// Size of each block in bytes.
    block_size: usize,
    /// Index of the next block to allocate.
    next_free: AtomicUsize,
    /// Survived-previous-cycle bits.
    bitmap: MarkBitmap,
    /// Whether the segment currently sits on a pending list.
    queued: AtomicBool,
    /// Serializes allocators.
    alloc_lock: Mutex<()>,
    blocks: Box<[Mutex<Closure>]>,
}

impl NonmovingSegment {
    /// Create an empty segment.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero or `capacity` is zero.
    #[must_use]
    pub fn new(base: Word, block_size: usize, capacity: usize) -> Self {
        assert!(block_size > 0, "segment block size must be nonzero");
        assert!(capacity > 0, "segment capacity must be nonzero");
        Self {
            base,
            block_size,
            next_free: AtomicUsize::new(0),
            bitmap: MarkBitmap::new(capacity),
            queued: AtomicBool::new(false),
            alloc_lock: Mutex::new(()),
            blocks: (0..capacity).map(|_| Mutex::new(Closure::free())).collect(),
        }
    }

    /// Address of block 0.
    #[must_use]
    pub const fn base(&self) -> Word {
        self.base
    }

    /// Size of each block in bytes.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    /// Index of the next free block.
    #[must_use]
    pub fn next_free(&self) -> usize {
        self.next_free.load(Ordering::Acquire)
    }

    /// Move the allocation cursor, e.g. after a sweep.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the capacity.
    pub fn set_next_free(&self, index: usize) {
        assert!(
            index <= self.capacity(),
            "segment cursor {index} past capacity {}",
            self.capacity()
        );
        self.next_free.store(index, Ordering::Release);
    }

    /// Address of block `index`.
    #[must_use]
    pub const fn block_addr(&self, index: usize) -> Word {
        self.base.offset(index * self.block_size)
    }

    /// Index of the block at `addr`, if it belongs to this segment.
    #[must_use]
    pub fn block_index(&self, addr: Word) -> Option<usize> {
        let offset = addr.raw().checked_sub(self.base.raw())?;
        let index = offset / self.block_size;
        (offset % self.block_size == 0 && index < self.capacity()).then_some(index)
    }

    /// Lock block `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the capacity.
    pub fn block(&self, index: usize) -> MutexGuard<'_, Closure> {
        self.blocks[index].lock()
    }

    /// Store `closure` into block `index` without moving the cursor.
    ///
    /// Used to lay out blocks that survived an earlier cycle.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the capacity.
    pub fn place(&self, index: usize, closure: Closure) {
        *self.blocks[index].lock() = closure;
    }

    /// Allocate `closure` in the first free block at or after the cursor.
    ///
    /// Blocks that survived the previous cycle are never overwritten; the
    /// cursor moves past them before and after the store. Returns the
    /// object's address, or `None` if the segment is full.
    pub fn allocate(&self, closure: Closure) -> Option<Word> {
        let _guard = self.alloc_lock.lock();
        let index = self.skip_marked(self.next_free.load(Ordering::Relaxed));
        if index >= self.capacity() {
            self.next_free.store(index, Ordering::Release);
            return None;
        }
        *self.blocks[index].lock() = closure;

        let next = self.skip_marked(index + 1);
        self.next_free.store(next, Ordering::Release);
        Some(self.block_addr(index))
    }

    fn skip_marked(&self, mut index: usize) -> usize {
        while index < self.capacity() && self.bitmap.is_marked(index) {
            index += 1;
        }
        index
    }

    /// Whether the segment has no free block left.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.next_free() >= self.capacity()
    }

    /// Whether block `index` survived the previous cycle.
    #[must_use]
    pub fn is_marked(&self, index: usize) -> bool {
        self.bitmap.is_marked(index)
    }

    /// Record that block `index` survived the previous cycle.
    pub fn set_mark(&self, index: usize) {
        self.bitmap.mark(index);
    }

    /// Clear the survival bit of block `index`.
    pub fn clear_mark(&self, index: usize) {
        self.bitmap.unmark(index);
    }

    /// Clear every survival bit.
    pub fn clear_marks(&self) {
        self.bitmap.clear();
    }

    /// The segment's mark bitmap.
    #[must_use]
    pub const fn bitmap(&self) -> &MarkBitmap {
        &self.bitmap
    }

    /// Whether the segment is waiting on a pending list.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }
}

// ============================================================================
// LargeObject
// ============================================================================

/// Block descriptor flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockFlags(u16);

impl BlockFlags {
    /// Block group holds a single large object.
    pub const LARGE: Self = Self(1 << 0);
    /// Block belongs to the non-moving heap.
    pub const NONMOVING: Self = Self(1 << 1);

    /// No flags.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Whether every flag of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// An object too big for any segment, owning a whole group of blocks.
#[derive(Debug)]
pub struct LargeObject {
    start: Word,
    blocks: usize,
    flags: BlockFlags,
    closure: Mutex<Closure>,
}

impl LargeObject {
    /// A large object of the non-moving heap.
    #[must_use]
    pub fn new(start: Word, closure: Closure) -> Self {
        let bytes = std::mem::size_of::<usize>() * (1 + closure.payload().len());
        Self::with_flags(
            start,
            bytes.div_ceil(BLOCK_SIZE).max(1),
            BlockFlags::LARGE.union(BlockFlags::NONMOVING),
            closure,
        )
    }

    /// A large object with explicit block count and flags.
    #[must_use]
    pub const fn with_flags(
        start: Word,
        blocks: usize,
        flags: BlockFlags,
        closure: Closure,
    ) -> Self {
        Self {
            start,
            blocks,
            flags,
            closure: Mutex::new(closure),
        }
    }

    /// Address of the object.
    #[must_use]
    pub const fn start(&self) -> Word {
        self.start
    }

    /// Number of blocks the object occupies.
    #[must_use]
    pub const fn blocks(&self) -> usize {
        self.blocks
    }

    /// Block descriptor flags.
    #[must_use]
    pub const fn flags(&self) -> BlockFlags {
        self.flags
    }

    /// Lock the object.
    pub fn closure(&self) -> MutexGuard<'_, Closure> {
        self.closure.lock()
    }
}

// ============================================================================
// NonmovingGen
// ============================================================================

/// The oldest, non-moving generation as seen by the scavenger.
#[derive(Debug)]
pub struct NonmovingGen {
    /// Generation number; the youngest generation is 0.
    no: u32,
    /// Segments holding untraced blocks.
    todo_segments: Worklist<Arc<NonmovingSegment>>,
    /// Large objects not yet traced this cycle.
    todo_large_objects: Worklist<Arc<LargeObject>>,
    /// Large objects traced this cycle.
    scavenged_large_objects: Mutex<Vec<Arc<LargeObject>>>,
    /// Blocks held by `scavenged_large_objects`.
    n_scavenged_large_blocks: AtomicUsize,
    /// Objects to rescan in future cycles.
    mut_list: Mutex<Vec<Word>>,
}

impl NonmovingGen {
    /// Create an empty generation with number `no`.
    #[must_use]
    pub const fn new(no: u32) -> Self {
        Self {
            no,
            todo_segments: Worklist::new(),
            todo_large_objects: Worklist::new(),
            scavenged_large_objects: Mutex::new(Vec::new()),
            n_scavenged_large_blocks: AtomicUsize::new(0),
            mut_list: Mutex::new(Vec::new()),
        }
    }

    /// Generation number.
    #[must_use]
    pub const fn no(&self) -> u32 {
        self.no
    }

    /// Queue a segment with untraced blocks.
    ///
    /// A segment already waiting on the list is not queued again. Returns
    /// whether it was queued.
    pub fn push_todo_segment(&self, segment: Arc<NonmovingSegment>) -> bool {
        if segment.queued.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.todo_segments.push(segment);
        true
    }

    /// Take one pending segment.
    pub fn pop_todo_segment(&self) -> Option<Arc<NonmovingSegment>> {
        let segment = self.todo_segments.pop()?;
        segment.queued.store(false, Ordering::Release);
        Some(segment)
    }

    /// Queue a large object for tracing.
    pub fn push_todo_large_object(&self, object: Arc<LargeObject>) {
        self.todo_large_objects.push(object);
    }

    /// Take one large object from the to-do list.
    pub fn pop_todo_large_object(&self) -> Option<Arc<LargeObject>> {
        self.todo_large_objects.pop()
    }

    /// Move a large object onto the scavenged list and count its blocks.
    pub fn link_scavenged_large_object(&self, object: Arc<LargeObject>) {
        self.n_scavenged_large_blocks
            .fetch_add(object.blocks(), Ordering::Relaxed);
        self.scavenged_large_objects.lock().push(object);
    }

    /// Number of segments waiting to be walked.
    #[must_use]
    pub fn todo_segment_count(&self) -> usize {
        self.todo_segments.len()
    }

    /// Number of large objects waiting to be traced.
    #[must_use]
    pub fn todo_large_object_count(&self) -> usize {
        self.todo_large_objects.len()
    }

    /// Whether either worklist still holds work.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        !self.todo_segments.is_empty() || !self.todo_large_objects.is_empty()
    }

    /// Number of large objects traced this cycle.
    #[must_use]
    pub fn scavenged_large_object_count(&self) -> usize {
        self.scavenged_large_objects.lock().len()
    }

    /// Blocks held by large objects traced this cycle.
    #[must_use]
    pub fn n_scavenged_large_blocks(&self) -> usize {
        self.n_scavenged_large_blocks.load(Ordering::Relaxed)
    }

    /// Whether the large object at `start` has been traced this cycle.
    #[must_use]
    pub fn is_large_object_scavenged(&self, start: Word) -> bool {
        self.scavenged_large_objects
            .lock()
            .iter()
            .any(|object| object.start() == start)
    }

    /// Take the scavenged list, resetting the block counter.
    pub fn take_scavenged_large_objects(&self) -> Vec<Arc<LargeObject>> {
        self.n_scavenged_large_blocks.store(0, Ordering::Relaxed);
        std::mem::take(&mut *self.scavenged_large_objects.lock())
    }

    /// Remember `object` for rescanning in future cycles.
    pub fn record_mutable(&self, object: Word) {
        self.mut_list.lock().push(object);
    }

    /// Snapshot of the mutable list.
    #[must_use]
    pub fn mutable_list(&self) -> Vec<Word> {
        self.mut_list.lock().clone()
    }

    /// Whether `object` is on the mutable list.
    #[must_use]
    pub fn is_on_mutable_list(&self, object: Word) -> bool {
        self.mut_list.lock().contains(&object)
    }

    /// Take the mutable list so the next cycle can rebuild it.
    pub fn take_mutable_list(&self) -> Vec<Word> {
        std::mem::take(&mut *self.mut_list.lock())
    }
}
