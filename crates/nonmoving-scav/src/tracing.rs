//! Scavenger tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! spans for scavenging runs.

#[cfg(feature = "tracing")]
pub mod internal {
    use std::sync::atomic::{AtomicU64, Ordering};
    use tracing::{span, Level};

    /// Stable identifier for one scavenging run of one worker.
    ///
    /// Used to correlate every event emitted by that run. Monotonically
    /// increasing from 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Global counter for generating unique run ids.
    static NEXT_GC_ID: AtomicU64 = AtomicU64::new(1);

    /// Generate the next unique run id.
    pub fn next_gc_id() -> GcId {
        GcId(NEXT_GC_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a span covering a whole drain of the non-moving heap.
    pub fn trace_scavenge(worker_id: usize, gen_no: u32, gc_id: GcId) -> span::EnteredSpan {
        span!(
            Level::DEBUG,
            "scavenge_nonmoving_heap",
            worker_id = worker_id,
            gen_no = gen_no,
            gc_id = gc_id.0
        )
        .entered()
    }
}

#[cfg(not(feature = "tracing"))]
pub mod internal {
    /// Stub type when tracing is disabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GcId(pub u64);

    /// Stub function when tracing is disabled.
    #[allow(dead_code)]
    pub const fn next_gc_id() -> GcId {
        GcId(0)
    }
}

pub use internal::GcId;
