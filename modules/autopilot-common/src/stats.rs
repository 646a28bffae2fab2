use std::fmt;

use crate::types::SkipReason;

/// Outcome of one recheck pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecheckSummary {
    pub completed: u64,
    pub failed: u64,
    /// Completed tasks where the business is now cited.
    pub cited: u64,
}

impl fmt::Display for RecheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recheck(completed={} failed={} cited={})",
            self.completed, self.failed, self.cited
        )
    }
}

/// Summary of a full autopilot sweep. Every sub-step reports here instead of failing the sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub tenants_processed: u64,
    pub tenants_gated: u64,
    pub tenants_failed: u64,
    pub triggers_received: u64,
    pub triggers_suppressed: u64,
    pub dedup_fail_open: u64,
    pub drafts_created: u64,
    pub skipped_duplicate: u64,
    pub skipped_cap: u64,
    pub skipped_other: u64,
    pub generation_failures: u64,
    /// Per-trigger store or location-lookup errors. The trigger is released for a later sweep.
    pub store_failures: u64,
    /// Admitted triggers handed back to the source for a later sweep.
    pub triggers_deferred: u64,
    pub drafts_archived: u64,
    pub recheck: RecheckSummary,
}

impl SweepStats {
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::DuplicateSource => self.skipped_duplicate += 1,
            SkipReason::PendingCapReached => self.skipped_cap += 1,
            SkipReason::TenantMismatch | SkipReason::UnknownLocation => self.skipped_other += 1,
        }
    }
}

impl fmt::Display for SweepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenants_processed={} tenants_gated={} tenants_failed={} triggers_received={} \
             triggers_suppressed={} dedup_fail_open={} drafts_created={} skipped_duplicate={} \
             skipped_cap={} skipped_other={} generation_failures={} store_failures={} \
             triggers_deferred={} drafts_archived={} {}",
            self.tenants_processed,
            self.tenants_gated,
            self.tenants_failed,
            self.triggers_received,
            self.triggers_suppressed,
            self.dedup_fail_open,
            self.drafts_created,
            self.skipped_duplicate,
            self.skipped_cap,
            self.skipped_other,
            self.generation_failures,
            self.store_failures,
            self.triggers_deferred,
            self.drafts_archived,
            self.recheck,
        )
    }
}
