// Test mocks for the autopilot engine.
//
// - MemoryStore (DraftStore, TriggerSource, LocationDirectory, TenantDirectory):
//   stateful in-memory store that emulates the active-source unique index,
//   with switches for injecting read and write failures
// - ScriptedGenerator (ContentGenerator): queue of canned results
// - ScriptedChecker (VisibilityChecker): HashMap-based query→cited
//
// Plus helpers for building profiles, tenants, triggers and drafts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use autopilot_common::{
    BriefOrigin, ContentDraft, DraftBrief, DraftStatus, DraftTrigger, LocationProfile, Plan,
    RecheckStatus, RecheckTask, Tenant, TriggerContext, TriggerKind,
};

use crate::brief::{GeneratedBrief, GeneratedContent};
use crate::content_type;
use crate::traits::{
    ContentGenerator, DraftStore, InsertOutcome, LocationDirectory, TenantDirectory,
    TriggerSource, VisibilityChecker,
};

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn profile(business_name: &str, city: &str, state: &str) -> LocationProfile {
    LocationProfile {
        location_id: Uuid::new_v4(),
        business_name: business_name.to_string(),
        city: city.to_string(),
        state: state.to_string(),
        categories: vec!["hookah lounge".to_string()],
    }
}

pub fn tenant(name: &str, plan: Plan) -> Tenant {
    Tenant {
        id: Uuid::new_v4(),
        name: name.to_string(),
        plan,
    }
}

pub fn competitor_trigger(tenant_id: Uuid, location_id: Uuid, query: &str) -> DraftTrigger {
    DraftTrigger::new(
        tenant_id,
        location_id,
        TriggerContext::CompetitorGap {
            target_query: query.to_string(),
            competitor_name: "Cloud Nine Lounge".to_string(),
            winning_factor: "more recent reviews".to_string(),
        },
    )
}

pub fn review_trigger(tenant_id: Uuid, location_id: Uuid) -> DraftTrigger {
    DraftTrigger::new(
        tenant_id,
        location_id,
        TriggerContext::ReviewGap {
            review_count: 41,
            average_rating: Some(4.6),
            keyword_gaps: vec!["live music".to_string()],
        },
    )
}

/// Occasion trigger with `days_until_peak` counted from today.
pub fn occasion_trigger(
    tenant_id: Uuid,
    location_id: Uuid,
    occasion_name: &str,
    peak_date: NaiveDate,
) -> DraftTrigger {
    let days_until_peak = (peak_date - Utc::now().date_naive()).num_days();
    DraftTrigger::new(
        tenant_id,
        location_id,
        TriggerContext::Occasion {
            occasion_name: occasion_name.to_string(),
            peak_date,
            days_until_peak,
        },
    )
}

/// A pending draft as the materializer would have written it for `trigger`.
pub fn draft_for(trigger: &DraftTrigger, created_at: DateTime<Utc>) -> ContentDraft {
    let brief = DraftBrief {
        title: format!("Draft: {}", trigger.context.target_prompt()),
        body: "Q: Test question?\nA: Test answer.".to_string(),
        target_keywords: vec!["test".to_string()],
        estimated_score: 50,
        origin: BriefOrigin::Offline,
    };
    let content_type = content_type::resolve(&trigger.context);
    ContentDraft::from_brief(trigger, content_type, brief, created_at)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    drafts: Vec<ContentDraft>,
    tasks: Vec<RecheckTask>,
    profiles: HashMap<Uuid, LocationProfile>,
    tenants: Vec<Tenant>,
    triggers: Vec<DraftTrigger>,
    claimed: HashSet<Uuid>,
    failing_updates: HashSet<Uuid>,
    failing_trigger_tenants: HashSet<Uuid>,
}

/// In-memory store. Triggers behave like the Postgres inbox: claimed by
/// `triggers_for`, gone once consumed, pending again once released.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_reads: AtomicBool,
    failing_inserts: AtomicU64,
    conflict_next_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: LocationProfile) -> Self {
        self.lock().profiles.insert(profile.location_id, profile);
        self
    }

    pub fn with_tenant(self, tenant: Tenant) -> Self {
        self.lock().tenants.push(tenant);
        self
    }

    pub fn with_triggers(self, triggers: Vec<DraftTrigger>) -> Self {
        self.lock().triggers.extend(triggers);
        self
    }

    pub fn seed_draft(&self, draft: ContentDraft) {
        self.lock().drafts.push(draft);
    }

    pub fn seed_recheck(&self, task: RecheckTask) {
        self.lock().tasks.push(task);
    }

    pub fn push_trigger(&self, trigger: DraftTrigger) {
        self.lock().triggers.push(trigger);
    }

    pub fn draft(&self, id: Uuid) -> Option<ContentDraft> {
        self.lock().drafts.iter().find(|d| d.id == id).cloned()
    }

    pub fn drafts(&self) -> Vec<ContentDraft> {
        self.lock().drafts.clone()
    }

    pub fn tasks(&self) -> Vec<RecheckTask> {
        self.lock().tasks.clone()
    }

    pub fn recheck(&self, id: Uuid) -> Option<RecheckTask> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Triggers not yet consumed, claimed or not.
    pub fn pending_triggers(&self) -> Vec<DraftTrigger> {
        self.lock().triggers.clone()
    }

    /// Triggers currently claimed by a sweep that has not settled them.
    pub fn claimed_triggers(&self) -> usize {
        self.lock().claimed.len()
    }

    /// Make every read (dedup listing, existence checks, counts) fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` inserts fail with a store error.
    pub fn fail_next_inserts(&self, count: u64) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Report the next insert as a uniqueness conflict, as if a concurrent
    /// writer got there first.
    pub fn conflict_next_insert(&self) {
        self.conflict_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn fail_updates_for(&self, draft_id: Uuid) {
        self.lock().failing_updates.insert(draft_id);
    }

    pub fn fail_triggers_for(&self, tenant_id: Uuid) {
        self.lock().failing_trigger_tenants.insert(tenant_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("simulated read failure");
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for MemoryStore {
    async fn drafts_for_dedup(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ContentDraft>> {
        self.check_reads()?;
        Ok(self
            .lock()
            .drafts
            .iter()
            .filter(|d| d.tenant_id == tenant_id && (d.is_active() || d.created_at >= since))
            .cloned()
            .collect())
    }

    async fn active_draft_exists(&self, tenant_id: Uuid, kind: TriggerKind, source_id: &str) -> Result<bool> {
        self.check_reads()?;
        Ok(self.lock().drafts.iter().any(|d| {
            d.tenant_id == tenant_id
                && d.trigger_kind == kind
                && d.source_id.as_deref() == Some(source_id)
                && d.is_active()
        }))
    }

    async fn count_pending(&self, tenant_id: Uuid, location_id: Uuid) -> Result<u64> {
        self.check_reads()?;
        Ok(self
            .lock()
            .drafts
            .iter()
            .filter(|d| {
                d.tenant_id == tenant_id
                    && d.location_id == location_id
                    && d.status == DraftStatus::Draft
            })
            .count() as u64)
    }

    async fn insert_draft(&self, draft: &ContentDraft) -> Result<InsertOutcome> {
        let failing = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            bail!("simulated insert failure");
        }
        if self.conflict_next_insert.swap(false, Ordering::SeqCst) {
            return Ok(InsertOutcome::Duplicate);
        }

        let mut state = self.lock();
        // Partial unique index on (tenant_id, trigger_kind, source_id) over active rows.
        let conflict = draft.source_id.is_some()
            && state.drafts.iter().any(|d| {
                d.tenant_id == draft.tenant_id
                    && d.trigger_kind == draft.trigger_kind
                    && d.source_id == draft.source_id
                    && d.is_active()
            });
        if conflict {
            return Ok(InsertOutcome::Duplicate);
        }
        state.drafts.push(draft.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_draft(&self, draft_id: Uuid) -> Result<Option<ContentDraft>> {
        self.check_reads()?;
        Ok(self.draft(draft_id))
    }

    async fn set_status(
        &self,
        draft_id: Uuid,
        from: DraftStatus,
        to: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.lock();
        if state.failing_updates.contains(&draft_id) {
            bail!("simulated update failure for draft {draft_id}");
        }
        let Some(draft) = state.drafts.iter_mut().find(|d| d.id == draft_id) else {
            return Ok(false);
        };
        if draft.status != from {
            return Ok(false);
        }
        draft.status = to;
        match to {
            DraftStatus::Approved => draft.human_approved = true,
            DraftStatus::Published => draft.published_at = Some(at),
            _ => {}
        }
        Ok(true)
    }

    async fn occasion_drafts_past_peak(
        &self,
        today: NaiveDate,
        statuses: &[DraftStatus],
    ) -> Result<Vec<ContentDraft>> {
        self.check_reads()?;
        Ok(self
            .lock()
            .drafts
            .iter()
            .filter(|d| {
                d.trigger_kind == TriggerKind::Occasion
                    && statuses.contains(&d.status)
                    && d.occasion_peak_date.is_some_and(|peak| peak < today)
            })
            .cloned()
            .collect())
    }

    async fn enqueue_recheck(&self, task: &RecheckTask) -> Result<()> {
        let mut state = self.lock();
        let already_pending = state
            .tasks
            .iter()
            .any(|t| t.draft_id == task.draft_id && t.status == RecheckStatus::Pending);
        if !already_pending {
            state.tasks.push(task.clone());
        }
        Ok(())
    }

    async fn pending_rechecks(&self, limit: i64) -> Result<Vec<RecheckTask>> {
        self.check_reads()?;
        let mut pending: Vec<RecheckTask> = self
            .lock()
            .tasks
            .iter()
            .filter(|t| t.status == RecheckStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn complete_recheck(&self, task_id: Uuid, cited: bool, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("recheck task {task_id} not found"))?;
        task.status = RecheckStatus::Completed;
        task.cited = Some(cited);
        task.completed_at = Some(at);
        Ok(())
    }

    async fn record_recheck_failure(&self, task_id: Uuid, error: &str) -> Result<()> {
        let mut state = self.lock();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| anyhow!("recheck task {task_id} not found"))?;
        task.attempts += 1;
        task.last_error = Some(error.to_string());
        Ok(())
    }
}

#[async_trait]
impl TriggerSource for MemoryStore {
    async fn triggers_for(&self, tenant_id: Uuid) -> Result<Vec<DraftTrigger>> {
        let mut state = self.lock();
        if state.failing_trigger_tenants.contains(&tenant_id) {
            bail!("simulated trigger source failure for tenant {tenant_id}");
        }
        let batch: Vec<DraftTrigger> = state
            .triggers
            .iter()
            .filter(|t| t.tenant_id == tenant_id && !state.claimed.contains(&t.id))
            .cloned()
            .collect();
        state.claimed.extend(batch.iter().map(|t| t.id));
        Ok(batch)
    }

    async fn consume(&self, trigger_ids: &[Uuid]) -> Result<()> {
        let mut state = self.lock();
        state.triggers.retain(|t| !trigger_ids.contains(&t.id));
        for id in trigger_ids {
            state.claimed.remove(id);
        }
        Ok(())
    }

    async fn release(&self, trigger_ids: &[Uuid]) -> Result<()> {
        let mut state = self.lock();
        for id in trigger_ids {
            state.claimed.remove(id);
        }
        Ok(())
    }
}

#[async_trait]
impl LocationDirectory for MemoryStore {
    async fn profile(&self, location_id: Uuid) -> Result<Option<LocationProfile>> {
        Ok(self.lock().profiles.get(&location_id).cloned())
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.lock().tenants.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

enum Scripted {
    Content(GeneratedContent),
    Fail(String),
}

/// Returns queued results in order, then a well-formed brief once the queue
/// is empty.
#[derive(Default)]
pub struct ScriptedGenerator {
    queue: Mutex<VecDeque<Scripted>>,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_structured(self, brief: GeneratedBrief) -> Self {
        self.push(Scripted::Content(GeneratedContent::Structured(brief)))
    }

    pub fn then_raw(self, text: &str) -> Self {
        self.push(Scripted::Content(GeneratedContent::Raw(text.to_string())))
    }

    pub fn then_fail(self, error: &str) -> Self {
        self.push(Scripted::Fail(error.to_string()))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn push(self, item: Scripted) -> Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self
    }

    fn default_brief() -> GeneratedBrief {
        GeneratedBrief {
            title: "Generated FAQ".to_string(),
            content: "Q: Are you open late?\nA: Yes, until 2am on weekends.".to_string(),
            estimated_score: 78.0,
            target_keywords: vec!["hookah lounge".to_string(), "open late".to_string()],
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Scripted::Content(content)) => Ok(content),
            Some(Scripted::Fail(error)) => Err(anyhow!(error)),
            None => Ok(GeneratedContent::Structured(Self::default_brief())),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedChecker
// ---------------------------------------------------------------------------

/// Answers by query. Unregistered queries are not cited.
#[derive(Default)]
pub struct ScriptedChecker {
    answers: HashMap<String, std::result::Result<bool, String>>,
    latency: Option<Duration>,
    calls: AtomicU64,
}

impl ScriptedChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cited(mut self, query: &str, cited: bool) -> Self {
        self.answers.insert(query.to_string(), Ok(cited));
        self
    }

    pub fn failing(mut self, query: &str, error: &str) -> Self {
        self.answers.insert(query.to_string(), Err(error.to_string()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisibilityChecker for ScriptedChecker {
    async fn cited_for(&self, query: &str, _location_id: Uuid) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.answers.get(query) {
            Some(Ok(cited)) => Ok(*cited),
            Some(Err(error)) => Err(anyhow!("{error}")),
            None => Ok(false),
        }
    }
}
