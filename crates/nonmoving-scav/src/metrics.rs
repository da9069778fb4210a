//! Scavenging statistics.

use std::time::Duration;

/// Counters accumulated by one worker while scavenging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScavengeStats {
    /// Objects handed to the field tracer.
    pub objects_scavenged: usize,
    /// Segment blocks skipped because they survived the previous cycle.
    pub blocks_skipped: usize,
    /// Segments walked.
    pub segments_scavenged: usize,
    /// Large objects moved from the to-do list to the scavenged list.
    pub large_objects_scavenged: usize,
    /// Blocks of those large objects.
    pub large_blocks_scavenged: usize,
    /// Objects appended to the mutable list.
    pub mutable_records: usize,
    /// Fixpoint passes, including the final empty one.
    pub passes: usize,
    /// Wall time spent in the drainer.
    pub duration: Duration,
}

impl ScavengeStats {
    /// All counters zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            objects_scavenged: 0,
            blocks_skipped: 0,
            segments_scavenged: 0,
            large_objects_scavenged: 0,
            large_blocks_scavenged: 0,
            mutable_records: 0,
            passes: 0,
            duration: Duration::ZERO,
        }
    }

    /// Add another worker's counters to these.
    pub fn merge(&mut self, other: &Self) {
        self.objects_scavenged += other.objects_scavenged;
        self.blocks_skipped += other.blocks_skipped;
        self.segments_scavenged += other.segments_scavenged;
        self.large_objects_scavenged += other.large_objects_scavenged;
        self.large_blocks_scavenged += other.large_blocks_scavenged;
        self.mutable_records += other.mutable_records;
        self.passes += other.passes;
        self.duration += other.duration;
    }
}

#[cfg(test)]
mod tests {
    use super::ScavengeStats;
    use std::time::Duration;

    #[test]
    fn test_merge_sums_counters() {
        let mut total = ScavengeStats::new();
        let worker = ScavengeStats {
            objects_scavenged: 3,
            blocks_skipped: 1,
            segments_scavenged: 1,
            large_objects_scavenged: 2,
            large_blocks_scavenged: 5,
            mutable_records: 1,
            passes: 2,
            duration: Duration::from_millis(4),
        };

        total.merge(&worker);
        total.merge(&worker);

        assert_eq!(total.objects_scavenged, 6);
        assert_eq!(total.large_blocks_scavenged, 10);
        assert_eq!(total.passes, 4);
        assert_eq!(total.duration, Duration::from_millis(8));
    }
}
