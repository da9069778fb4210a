//! Scavenger configuration.

/// Configuration for one scavenging worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScavengeConfig {
    /// Check internal consistency while scanning and abort on violation.
    ///
    /// When disabled, a violated invariant is not reported and the object is
    /// simply remembered on the mutable list.
    pub invariant_checks: bool,
    /// Accumulate [`ScavengeStats`](crate::ScavengeStats) in the worker's
    /// context.
    pub collect_stats: bool,
}

impl Default for ScavengeConfig {
    fn default() -> Self {
        Self {
            invariant_checks: cfg!(debug_assertions) || cfg!(feature = "paranoid-scavenge"),
            collect_stats: true,
        }
    }
}

impl ScavengeConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable invariant checks.
    #[must_use]
    pub const fn with_invariant_checks(mut self, enabled: bool) -> Self {
        self.invariant_checks = enabled;
        self
    }

    /// Enable or disable statistics collection.
    #[must_use]
    pub const fn with_stats(mut self, enabled: bool) -> Self {
        self.collect_stats = enabled;
        self
    }

    /// Enable or disable invariant checks in place.
    pub const fn set_invariant_checks(&mut self, enabled: bool) {
        self.invariant_checks = enabled;
    }

    /// Enable or disable statistics collection in place.
    pub const fn set_collect_stats(&mut self, enabled: bool) {
        self.collect_stats = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::ScavengeConfig;

    #[test]
    fn test_default_follows_build_profile() {
        let config = ScavengeConfig::default();
        assert_eq!(
            config.invariant_checks,
            cfg!(debug_assertions) || cfg!(feature = "paranoid-scavenge")
        );
        assert!(config.collect_stats);
    }

    #[test]
    fn test_builders() {
        let mut config = ScavengeConfig::new()
            .with_invariant_checks(false)
            .with_stats(false);
        assert!(!config.invariant_checks);
        assert!(!config.collect_stats);

        config.set_invariant_checks(true);
        config.set_collect_stats(true);
        assert!(config.invariant_checks);
        assert!(config.collect_stats);
    }
}
