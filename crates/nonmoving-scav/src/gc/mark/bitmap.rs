//! Per-segment mark bitmap.
//!
//! One bit per block slot. A set bit means the block survived a previous
//! cycle and has already been scanned; a clear bit means the block was
//! allocated during the current cycle and still has to be scavenged.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

const BITS_PER_WORD: usize = 64;

/// A segment-level bitmap recording which blocks survived the previous cycle.
///
/// # Example
///
/// ```
/// use nonmoving_scav::gc::mark::MarkBitmap;
///
/// let bitmap = MarkBitmap::new(3);
/// assert_eq!(bitmap.capacity(), 3);
/// assert!(!bitmap.is_marked(0));
///
/// bitmap.mark(2);
/// assert!(bitmap.is_marked(2));
/// ```
#[derive(Debug)]
pub struct MarkBitmap {
    /// Bitmap storage, one bit per block slot.
    bitmap: Box<[AtomicU64]>,
    /// Number of block slots covered.
    capacity: usize,
    /// Number of marked slots (atomic for parallel access).
    marked_count: AtomicUsize,
}

impl MarkBitmap {
    /// Create a cleared bitmap covering `capacity` slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let words = capacity.div_ceil(BITS_PER_WORD);
        let bitmap = (0..words).map(|_| AtomicU64::new(0)).collect();
        Self {
            bitmap,
            capacity,
            marked_count: AtomicUsize::new(0),
        }
    }

    /// Number of slots covered by the bitmap.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of marked slots.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.marked_count.load(Ordering::Relaxed)
    }

    #[inline]
    fn locate(&self, slot_index: usize) -> (usize, u64) {
        assert!(
            slot_index < self.capacity,
            "mark bitmap index {slot_index} out of range (capacity {})",
            self.capacity
        );
        (slot_index / BITS_PER_WORD, 1u64 << (slot_index % BITS_PER_WORD))
    }

    /// Mark a slot as having survived a previous cycle.
    ///
    /// # Panics
    ///
    /// Panics if `slot_index` is out of range.
    pub fn mark(&self, slot_index: usize) {
        let (word, mask) = self.locate(slot_index);
        let prev = self.bitmap[word].fetch_or(mask, Ordering::Relaxed);
        // Only count transitions so repeated marking stays idempotent
        if prev & mask == 0 {
            self.marked_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Clear the mark of a single slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot_index` is out of range.
    pub fn unmark(&self, slot_index: usize) {
        let (word, mask) = self.locate(slot_index);
        let prev = self.bitmap[word].fetch_and(!mask, Ordering::Relaxed);
        if prev & mask != 0 {
            self.marked_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Check whether a slot is marked.
    ///
    /// # Panics
    ///
    /// Panics if `slot_index` is out of range.
    #[must_use]
    pub fn is_marked(&self, slot_index: usize) -> bool {
        let (word, mask) = self.locate(slot_index);
        self.bitmap[word].load(Ordering::Relaxed) & mask != 0
    }

    /// Clear all marks for reuse.
    pub fn clear(&self) {
        for word in &*self.bitmap {
            word.store(0, Ordering::Relaxed);
        }
        self.marked_count.store(0, Ordering::Relaxed);
    }
}
