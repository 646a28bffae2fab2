use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use autopilot_common::{Feature, MaterializeOutcome, RecheckSummary, SweepStats, Tenant};

use crate::brief::BriefWriter;
use crate::dedup::Deduplicator;
use crate::deps::AutopilotDeps;
use crate::lifecycle::{archive_expired_occasion_drafts, ArchivalPolicy};
use crate::materializer::{MaterializeError, Materializer};
use crate::recheck::RecheckScheduler;

/// The autopilot sweep: turns each tenant's pending triggers into drafts, then
/// runs the archival and recheck passes over existing drafts.
pub struct Autopilot {
    deps: AutopilotDeps,
    dedup: Deduplicator,
    materializer: Materializer,
    rechecks: Option<RecheckScheduler>,
}

impl Autopilot {
    pub fn new(deps: AutopilotDeps) -> Self {
        let config = &deps.config;
        let dedup = Deduplicator::new(config.dedup_lookback());
        let writer = BriefWriter::new(
            deps.generation.clone(),
            deps.pacer.clone(),
            config.generation_timeout,
        );
        let materializer = Materializer::new(
            deps.store.clone(),
            deps.locations.clone(),
            writer,
            config.pending_cap,
        );
        let rechecks = deps.visibility.clone().map(|checker| {
            RecheckScheduler::new(
                deps.store.clone(),
                checker,
                deps.pacer.clone(),
                config.recheck_timeout,
                config.recheck_batch_size,
            )
        });

        Self {
            deps,
            dedup,
            materializer,
            rechecks,
        }
    }

    /// Full sweep. Never fails: every sub-step reports into the returned stats.
    pub async fn run(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        let generation = if self.deps.generation.is_available() {
            "available"
        } else {
            "offline"
        };
        info!(
            generation,
            pending_cap = self.materializer.pending_cap(),
            "Autopilot sweep starting"
        );

        self.run_drafts(&mut stats).await;
        stats.drafts_archived = self.archive_expired().await;
        stats.recheck = self.run_rechecks().await;

        info!("Autopilot sweep complete. {stats}");
        stats
    }

    /// Trigger-to-draft pass over every enrolled tenant, sequentially.
    pub async fn run_drafts(&self, stats: &mut SweepStats) {
        let tenants = match self.deps.tenants.tenants().await {
            Ok(tenants) => tenants,
            Err(e) => {
                warn!(error = %e, "Failed to list tenants, skipping draft pass");
                return;
            }
        };

        for tenant in tenants {
            if !self
                .deps
                .plan_gate
                .allows(tenant.plan, Feature::ContentAutopilot)
            {
                info!(tenant_id = %tenant.id, plan = %tenant.plan, "Plan does not include autopilot, skipping");
                stats.tenants_gated += 1;
                continue;
            }

            match self.process_tenant(&tenant, stats).await {
                Ok(()) => stats.tenants_processed += 1,
                Err(e) => {
                    warn!(tenant_id = %tenant.id, error = %e, "Tenant sweep failed, continuing with next tenant");
                    stats.tenants_failed += 1;
                }
            }
        }
    }

    /// Archive occasion drafts whose occasion has passed.
    pub async fn archive_expired(&self) -> u64 {
        let policy = ArchivalPolicy {
            include_published: self.deps.config.include_published_in_archival,
        };
        archive_expired_occasion_drafts(self.deps.store.as_ref(), Utc::now().date_naive(), policy)
            .await
    }

    /// Recheck pass. A no-op when no visibility checker is configured.
    pub async fn run_rechecks(&self) -> RecheckSummary {
        match &self.rechecks {
            Some(scheduler) => scheduler.run_recheck_sweep().await,
            None => {
                info!("No visibility checker configured, skipping rechecks");
                RecheckSummary::default()
            }
        }
    }

    /// One tenant's batch. Only the trigger read can fail the tenant; every
    /// per-trigger failure is counted and the trigger handed back for a later sweep.
    async fn process_tenant(&self, tenant: &Tenant, stats: &mut SweepStats) -> Result<()> {
        let triggers = self.deps.triggers.triggers_for(tenant.id).await?;
        if triggers.is_empty() {
            return Ok(());
        }
        stats.triggers_received += triggers.len() as u64;
        let claimed: Vec<Uuid> = triggers.iter().map(|t| t.id).collect();

        let outcome = self
            .dedup
            .deduplicate(self.deps.store.as_ref(), triggers, tenant.id, Utc::now())
            .await;
        stats.triggers_suppressed += outcome.suppressed as u64;
        if outcome.failed_open {
            stats.dedup_fail_open += 1;
        }

        info!(
            tenant_id = %tenant.id,
            tenant = tenant.name.as_str(),
            admitted = outcome.admitted.len(),
            suppressed = outcome.suppressed,
            "Triggers deduplicated"
        );

        let mut deferred: Vec<Uuid> = Vec::new();
        for trigger in &outcome.admitted {
            match self.materializer.materialize(trigger, tenant.id).await {
                Ok(MaterializeOutcome::Created(_)) => stats.drafts_created += 1,
                Ok(MaterializeOutcome::Skipped(reason)) => {
                    stats.record_skip(reason);
                    if reason.is_retryable() {
                        deferred.push(trigger.id);
                    }
                }
                Err(MaterializeError::Generation(e)) => {
                    stats.generation_failures += 1;
                    deferred.push(trigger.id);
                    warn!(
                        tenant_id = %tenant.id,
                        location_id = %trigger.location_id,
                        kind = %trigger.kind(),
                        error = %e,
                        "Brief generation failed, trigger deferred to the next sweep"
                    );
                }
                Err(e) => {
                    stats.store_failures += 1;
                    deferred.push(trigger.id);
                    warn!(
                        tenant_id = %tenant.id,
                        location_id = %trigger.location_id,
                        kind = %trigger.kind(),
                        error = %e,
                        "Draft store failed for trigger, continuing with the batch"
                    );
                }
            }
        }

        stats.triggers_deferred += deferred.len() as u64;
        self.settle(tenant, &claimed, &deferred).await;
        Ok(())
    }

    /// Consume every claimed trigger except the deferred ones, which go back
    /// to the source. A failure here only delays the triggers: unsettled
    /// claims lapse and dedup suppresses anything already drafted.
    async fn settle(&self, tenant: &Tenant, claimed: &[Uuid], deferred: &[Uuid]) {
        let consumed: Vec<Uuid> = claimed
            .iter()
            .copied()
            .filter(|id| !deferred.contains(id))
            .collect();

        if !consumed.is_empty() {
            if let Err(e) = self.deps.triggers.consume(&consumed).await {
                warn!(tenant_id = %tenant.id, count = consumed.len(), error = %e, "Failed to mark triggers consumed");
            }
        }
        if !deferred.is_empty() {
            if let Err(e) = self.deps.triggers.release(deferred).await {
                warn!(tenant_id = %tenant.id, count = deferred.len(), error = %e, "Failed to release deferred triggers");
            }
        }
    }
}
