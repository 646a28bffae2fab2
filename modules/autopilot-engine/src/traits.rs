// Trait boundaries for the autopilot's external collaborators.
//
// DraftStore: the only shared mutable resource; authoritative on uniqueness.
// TriggerSource: claimed per sweep, then consumed or released per trigger.
// LocationDirectory, TenantDirectory: read-only inputs.
// ContentGenerator, VisibilityChecker: paced outbound calls.
// PlanGate: plan-tier predicate consulted before a tenant is processed.
//
// Every component takes these as explicit dependencies so tests can run the
// whole sweep against in-memory mocks.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use autopilot_common::{
    ContentDraft, DraftStatus, DraftTrigger, Feature, LocationProfile, Plan, RecheckTask, Tenant,
    TriggerKind,
};

use crate::brief::GeneratedContent;

// ---------------------------------------------------------------------------
// DraftStore
// ---------------------------------------------------------------------------

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An active draft already holds the `(tenant, kind, source)` slot.
    Duplicate,
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Every active draft for the tenant, plus any draft created at or after `since`.
    async fn drafts_for_dedup(
        &self,
        tenant_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ContentDraft>>;

    async fn active_draft_exists(
        &self,
        tenant_id: Uuid,
        kind: TriggerKind,
        source_id: &str,
    ) -> Result<bool>;

    /// Number of `draft`-status rows for one location.
    async fn count_pending(&self, tenant_id: Uuid, location_id: Uuid) -> Result<u64>;

    /// Insert a new draft. Conflicts on the active-source uniqueness rule are
    /// reported as `Duplicate`, not as errors.
    async fn insert_draft(&self, draft: &ContentDraft) -> Result<InsertOutcome>;

    async fn get_draft(&self, draft_id: Uuid) -> Result<Option<ContentDraft>>;

    /// Compare-and-set status change. Returns false when the draft is no longer
    /// in `from`. Moving to `approved` sets `human_approved`; moving to
    /// `published` stamps `published_at = at`.
    async fn set_status(
        &self,
        draft_id: Uuid,
        from: DraftStatus,
        to: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Occasion drafts in one of `statuses` whose peak date is before `today`.
    async fn occasion_drafts_past_peak(
        &self,
        today: NaiveDate,
        statuses: &[DraftStatus],
    ) -> Result<Vec<ContentDraft>>;

    /// Queue a recheck. At most one pending task per draft.
    async fn enqueue_recheck(&self, task: &RecheckTask) -> Result<()>;

    /// Oldest pending recheck tasks first.
    async fn pending_rechecks(&self, limit: i64) -> Result<Vec<RecheckTask>>;

    async fn complete_recheck(&self, task_id: Uuid, cited: bool, at: DateTime<Utc>) -> Result<()>;

    /// Bump the attempt counter and keep the task pending for a later sweep.
    async fn record_recheck_failure(&self, task_id: Uuid, error: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Triggers are claimed by `triggers_for` and stay pending until the sweep
/// settles them. Consumed triggers are never returned again; released ones
/// come back on a later sweep.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Claim the tenant's pending triggers. Claimed triggers are hidden from
    /// other sweeps until consumed or released.
    async fn triggers_for(&self, tenant_id: Uuid) -> Result<Vec<DraftTrigger>>;

    /// The triggers were acted on (drafted, or found redundant).
    async fn consume(&self, trigger_ids: &[Uuid]) -> Result<()>;

    /// Hand the triggers back for a later sweep.
    async fn release(&self, trigger_ids: &[Uuid]) -> Result<()>;
}

#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn profile(&self, location_id: Uuid) -> Result<Option<LocationProfile>>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Tenants enrolled in the autopilot, in processing order.
    async fn tenants(&self) -> Result<Vec<Tenant>>;
}

pub trait PlanGate: Send + Sync {
    fn allows(&self, plan: Plan, feature: Feature) -> bool;
}

// ---------------------------------------------------------------------------
// Outbound calls
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// One generation call. Malformed-but-present output comes back as
    /// `GeneratedContent::Raw`; transport failures are errors.
    async fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedContent>;
}

#[async_trait]
pub trait VisibilityChecker: Send + Sync {
    /// Whether an answer engine cites the location's business for `query`.
    async fn cited_for(&self, query: &str, location_id: Uuid) -> Result<bool>;
}
