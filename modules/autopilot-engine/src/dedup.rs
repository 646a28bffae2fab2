//! Trigger deduplication against existing drafts and within a batch.
//!
//! Pure decision functions plus a thin async wrapper that reads the tenant's
//! drafts. A failed read admits the whole batch: the materializer's insert-time
//! checks and the store's unique index still stop true duplicates.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use autopilot_common::{ContentDraft, DraftTrigger, TriggerKind};

use crate::traits::DraftStore;

/// Normalize a target query for cooldown comparison: trim, lowercase, collapse whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Why a trigger was admitted or suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupVerdict {
    Admit,
    /// An active draft already exists for the same `(kind, source_id)`.
    ExactMatch,
    /// Same kind, location and normalized query within the kind's cooldown.
    Cooldown,
    /// Query-less kind already drafted for this location within the cooldown.
    LocationRateLimited,
    /// An earlier trigger in the same batch covers this one.
    BatchDuplicate,
}

fn within_cooldown(draft: &ContentDraft, kind: TriggerKind, now: DateTime<Utc>) -> bool {
    match kind.cooldown() {
        Some(window) => now - draft.created_at < window,
        None => false,
    }
}

/// Decide one trigger against the tenant's existing drafts.
pub fn verdict(trigger: &DraftTrigger, existing: &[ContentDraft], now: DateTime<Utc>) -> DedupVerdict {
    let kind = trigger.kind();

    if let Some(source_id) = trigger.source_id.as_deref() {
        let exact = existing.iter().any(|d| {
            d.is_active() && d.trigger_kind == kind && d.source_id.as_deref() == Some(source_id)
        });
        if exact {
            return DedupVerdict::ExactMatch;
        }
    }

    let same_kind_here = || {
        existing
            .iter()
            .filter(move |d| d.trigger_kind == kind && d.location_id == trigger.location_id)
    };

    if let Some(query) = trigger.target_query() {
        let normalized = normalize_query(query);
        if !normalized.is_empty()
            && same_kind_here().any(|d| {
                within_cooldown(d, kind, now) && normalize_query(&d.target_prompt) == normalized
            })
        {
            return DedupVerdict::Cooldown;
        }
    }

    if kind.is_location_rate_limited() && same_kind_here().any(|d| within_cooldown(d, kind, now)) {
        return DedupVerdict::LocationRateLimited;
    }

    DedupVerdict::Admit
}

/// Filter a batch against existing drafts and against earlier triggers in the
/// same batch, keeping input order.
pub fn filter_triggers(
    triggers: Vec<DraftTrigger>,
    existing: &[ContentDraft],
    now: DateTime<Utc>,
) -> Vec<DraftTrigger> {
    let mut seen_sources: HashSet<(TriggerKind, String)> = HashSet::new();
    let mut seen_queries: HashSet<(TriggerKind, Uuid, String)> = HashSet::new();
    let mut seen_locations: HashSet<(TriggerKind, Uuid)> = HashSet::new();

    triggers
        .into_iter()
        .filter(|trigger| {
            let mut decision = verdict(trigger, existing, now);

            if decision == DedupVerdict::Admit {
                let kind = trigger.kind();
                let source_key = trigger.source_id.clone().map(|s| (kind, s));
                let query_key = trigger
                    .target_query()
                    .map(normalize_query)
                    .filter(|q| !q.is_empty() && kind.cooldown().is_some())
                    .map(|q| (kind, trigger.location_id, q));
                let location_key = kind
                    .is_location_rate_limited()
                    .then_some((kind, trigger.location_id));

                let seen = source_key.as_ref().is_some_and(|k| seen_sources.contains(k))
                    || query_key.as_ref().is_some_and(|k| seen_queries.contains(k))
                    || location_key.as_ref().is_some_and(|k| seen_locations.contains(k));

                if seen {
                    decision = DedupVerdict::BatchDuplicate;
                } else {
                    seen_sources.extend(source_key);
                    seen_queries.extend(query_key);
                    seen_locations.extend(location_key);
                }
            }

            if decision != DedupVerdict::Admit {
                debug!(
                    kind = %trigger.kind(),
                    source_id = trigger.source_id.as_deref().unwrap_or("-"),
                    verdict = ?decision,
                    "Trigger suppressed"
                );
            }
            decision == DedupVerdict::Admit
        })
        .collect()
}

/// Result of deduplicating one tenant's batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub admitted: Vec<DraftTrigger>,
    pub suppressed: usize,
    /// The draft read failed and the batch was returned unfiltered.
    pub failed_open: bool,
}

/// Reads recent drafts and filters a tenant's trigger batch.
pub struct Deduplicator {
    lookback: Duration,
}

impl Deduplicator {
    /// `lookback` bounds the read; it should cover the longest cooldown.
    pub fn new(lookback: Duration) -> Self {
        Self { lookback }
    }

    pub async fn deduplicate(
        &self,
        store: &dyn DraftStore,
        triggers: Vec<DraftTrigger>,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> DedupOutcome {
        if triggers.is_empty() {
            return DedupOutcome {
                admitted: triggers,
                suppressed: 0,
                failed_open: false,
            };
        }

        let existing = match store.drafts_for_dedup(tenant_id, now - self.lookback).await {
            Ok(drafts) => drafts,
            Err(e) => {
                warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    triggers = triggers.len(),
                    "Draft read failed during dedup, admitting batch unfiltered"
                );
                return DedupOutcome {
                    admitted: triggers,
                    suppressed: 0,
                    failed_open: true,
                };
            }
        };

        let total = triggers.len();
        let admitted = filter_triggers(triggers, &existing, now);
        DedupOutcome {
            suppressed: total - admitted.len(),
            admitted,
            failed_open: false,
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(Duration::days(90))
    }
}
