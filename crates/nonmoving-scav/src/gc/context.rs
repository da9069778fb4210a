//! Worker-local scan state.
//!
//! Each collection worker owns one [`ScanContext`] and passes it by `&mut`
//! to every delegate. Nothing in here is shared between workers.

use std::ops::{Deref, DerefMut};

use super::config::ScavengeConfig;
use crate::metrics::ScavengeStats;

/// Private state of one scavenging worker.
#[derive(Debug)]
pub struct ScanContext {
    worker_id: usize,
    /// Set by evacuation when a referenced object stayed in a younger
    /// generation. Consumed once per traced object.
    failed_to_evac: bool,
    /// Evacuate everything into the non-moving generation.
    forced_promotion: bool,
    config: ScavengeConfig,
    stats: ScavengeStats,
}

impl ScanContext {
    /// Context for worker `worker_id` with the default configuration.
    #[must_use]
    pub fn new(worker_id: usize) -> Self {
        Self::with_config(worker_id, ScavengeConfig::default())
    }

    /// Context for worker `worker_id`.
    #[must_use]
    pub const fn with_config(worker_id: usize, config: ScavengeConfig) -> Self {
        Self {
            worker_id,
            failed_to_evac: false,
            forced_promotion: false,
            config,
            stats: ScavengeStats::new(),
        }
    }

    /// Id of the owning worker.
    #[must_use]
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The worker's configuration.
    #[must_use]
    pub const fn config(&self) -> &ScavengeConfig {
        &self.config
    }

    /// Whether an evacuation since the last check left a reference behind.
    #[must_use]
    pub const fn failed_to_evac(&self) -> bool {
        self.failed_to_evac
    }

    /// Record that the object being traced must stay on the mutable list.
    pub const fn set_failed_to_evac(&mut self) {
        self.failed_to_evac = true;
    }

    /// Overwrite the failed-to-evacuate flag.
    pub const fn set_failed_to_evac_to(&mut self, failed: bool) {
        self.failed_to_evac = failed;
    }

    /// Read and clear the failed-to-evacuate flag.
    pub const fn take_failed_to_evac(&mut self) -> bool {
        std::mem::replace(&mut self.failed_to_evac, false)
    }

    /// Whether evacuation must target the non-moving generation.
    #[must_use]
    pub const fn forced_promotion(&self) -> bool {
        self.forced_promotion
    }

    /// Set forced promotion, returning the previous value.
    pub const fn replace_forced_promotion(&mut self, forced: bool) -> bool {
        std::mem::replace(&mut self.forced_promotion, forced)
    }

    /// Turn on forced promotion until the returned guard drops.
    ///
    /// The guard restores the previous value on every exit path, unwinding
    /// included, and derefs to the context.
    pub fn force_promotion(&mut self) -> ForcedPromotion<'_> {
        let saved = self.replace_forced_promotion(true);
        ForcedPromotion { ctx: self, saved }
    }

    /// Statistics accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> &ScavengeStats {
        &self.stats
    }

    /// Take the accumulated statistics, leaving zeros behind.
    pub fn take_stats(&mut self) -> ScavengeStats {
        std::mem::take(&mut self.stats)
    }

    /// Update statistics if collection is enabled.
    #[inline]
    pub(crate) fn record(&mut self, update: impl FnOnce(&mut ScavengeStats)) {
        if self.config.collect_stats {
            update(&mut self.stats);
        }
    }
}

/// RAII guard holding forced promotion on; see
/// [`ScanContext::force_promotion`].
#[derive(Debug)]
pub struct ForcedPromotion<'a> {
    ctx: &'a mut ScanContext,
    saved: bool,
}

impl Deref for ForcedPromotion<'_> {
    type Target = ScanContext;

    fn deref(&self) -> &ScanContext {
        self.ctx
    }
}

impl DerefMut for ForcedPromotion<'_> {
    fn deref_mut(&mut self) -> &mut ScanContext {
        self.ctx
    }
}

impl Drop for ForcedPromotion<'_> {
    fn drop(&mut self) {
        self.ctx.forced_promotion = self.saved;
    }
}
