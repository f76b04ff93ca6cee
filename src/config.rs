//! Tunables for the disk screen.

/// How the orchestrator may treat the proposed table while canonicalizing it.
#[derive(Debug, SmartDefault, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizePolicy {
    /// Partitions must be committed exactly as proposed.
    Strict,
    /// The orchestrator may round and re-offset partitions to fit the label.
    #[default]
    AllowResize,
}

/// Settings that the installer front end passes to `DiskScreen::new`.
#[derive(Debug, SmartDefault, Clone, PartialEq)]
pub struct ScreenConfig {
    /// Megabytes that the partition sums may exceed their region by before
    /// the layout is considered over-allocated.
    #[default = 100]
    pub overcommit_slop_mb:     u64,
    /// Reject layouts whose Solaris partition starts past cylinder 1023.
    #[default = true]
    pub enforce_cylinder_limit: bool,
    pub resize_policy:          ResizePolicy,
    /// Allow a growing partition to shrink a neighbouring Solaris2 partition
    /// once all free space next to it is used up.
    #[default = true]
    pub steal_from_solaris:     bool,
}

impl ScreenConfig {
    pub fn overcommit_slop_mb(mut self, slop: u64) -> Self {
        self.overcommit_slop_mb = slop;
        self
    }

    pub fn enforce_cylinder_limit(mut self, enforce: bool) -> Self {
        self.enforce_cylinder_limit = enforce;
        self
    }

    pub fn resize_policy(mut self, policy: ResizePolicy) -> Self {
        self.resize_policy = policy;
        self
    }

    pub fn steal_from_solaris(mut self, steal: bool) -> Self {
        self.steal_from_solaris = steal;
        self
    }
}
