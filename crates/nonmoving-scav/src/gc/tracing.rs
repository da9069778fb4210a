//! Scavenger-level tracing events.

use crate::closure::Word;
use crate::metrics::ScavengeStats;

/// Log the end of one fixpoint pass.
pub fn log_pass(pass: usize, large_objects: usize, segments: usize) {
    tracing::debug!(pass, large_objects, segments, "scavenge_pass");
}

/// Log a large object moved to the scavenged list.
pub fn log_large_object(start: Word, blocks: usize) {
    tracing::trace!(start = %start, blocks, "scavenge_large_object");
}

/// Log a walked segment.
pub fn log_segment(base: Word, next_free: usize, scanned: usize) {
    tracing::trace!(base = %base, next_free, scanned, "scavenge_segment");
}

/// Log an object appended to the mutable list.
pub fn log_record_mutable(object: Word, gen_no: u32) {
    tracing::trace!(object = %object, gen_no, "record_mutable");
}

/// Log the totals of a finished drain.
pub fn log_scavenge_done(stats: &ScavengeStats) {
    tracing::debug!(
        objects_scavenged = stats.objects_scavenged,
        blocks_skipped = stats.blocks_skipped,
        segments_scavenged = stats.segments_scavenged,
        large_objects_scavenged = stats.large_objects_scavenged,
        mutable_records = stats.mutable_records,
        passes = stats.passes,
        "scavenge_done"
    );
}

/// Log a fatal heap-corruption diagnostic.
pub fn log_fatal(args: &std::fmt::Arguments<'_>) {
    tracing::error!(diagnostic = %args, "heap_corruption");
}
