use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use autopilot_common::{ContentDraft, DraftTrigger, MaterializeOutcome, SkipReason};

use crate::brief::{BriefWriter, GenerationError};
use crate::content_type;
use crate::traits::{DraftStore, InsertOutcome, LocationDirectory};

/// Default maximum number of unreviewed drafts per location.
pub const DEFAULT_PENDING_CAP: u32 = 5;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("draft store error: {0}")]
    Store(anyhow::Error),

    #[error("location lookup failed: {0}")]
    Location(anyhow::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Turns admitted triggers into pending drafts. The only writer of new drafts.
pub struct Materializer {
    store: Arc<dyn DraftStore>,
    locations: Arc<dyn LocationDirectory>,
    writer: BriefWriter,
    pending_cap: u32,
}

impl Materializer {
    pub fn new(
        store: Arc<dyn DraftStore>,
        locations: Arc<dyn LocationDirectory>,
        writer: BriefWriter,
        pending_cap: u32,
    ) -> Self {
        Self {
            store,
            locations,
            writer,
            pending_cap,
        }
    }

    pub fn pending_cap(&self) -> u32 {
        self.pending_cap
    }

    /// Create at most one draft for `trigger`. Nothing is written unless a
    /// brief was produced.
    pub async fn materialize(
        &self,
        trigger: &DraftTrigger,
        tenant_id: Uuid,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        if trigger.tenant_id != tenant_id {
            return Ok(self.skip(trigger, SkipReason::TenantMismatch));
        }

        // Re-check idempotency: the dedup read was a point-in-time snapshot.
        if let Some(source_id) = trigger.source_id.as_deref() {
            let exists = self
                .store
                .active_draft_exists(tenant_id, trigger.kind(), source_id)
                .await
                .map_err(MaterializeError::Store)?;
            if exists {
                return Ok(self.skip(trigger, SkipReason::DuplicateSource));
            }
        }

        let pending = self
            .store
            .count_pending(tenant_id, trigger.location_id)
            .await
            .map_err(MaterializeError::Store)?;
        if pending >= u64::from(self.pending_cap) {
            return Ok(self.skip(trigger, SkipReason::PendingCapReached));
        }

        let content_type = content_type::resolve(&trigger.context);

        let Some(profile) = self
            .locations
            .profile(trigger.location_id)
            .await
            .map_err(MaterializeError::Location)?
        else {
            return Ok(self.skip(trigger, SkipReason::UnknownLocation));
        };

        let brief = self.writer.write(trigger, &profile, content_type).await?;
        let draft = ContentDraft::from_brief(trigger, content_type, brief, Utc::now());

        match self
            .store
            .insert_draft(&draft)
            .await
            .map_err(MaterializeError::Store)?
        {
            InsertOutcome::Inserted => {
                info!(
                    tenant_id = %tenant_id,
                    location_id = %draft.location_id,
                    draft_id = %draft.id,
                    kind = %draft.trigger_kind,
                    content_type = %draft.content_type,
                    origin = %draft.brief_origin,
                    "Draft created"
                );
                Ok(MaterializeOutcome::Created(draft.id))
            }
            // Lost the race to a concurrent insert; the store's unique index decided.
            InsertOutcome::Duplicate => Ok(self.skip(trigger, SkipReason::DuplicateSource)),
        }
    }

    fn skip(&self, trigger: &DraftTrigger, reason: SkipReason) -> MaterializeOutcome {
        debug!(
            tenant_id = %trigger.tenant_id,
            location_id = %trigger.location_id,
            kind = %trigger.kind(),
            source_id = trigger.source_id.as_deref().unwrap_or("-"),
            reason = %reason,
            "Trigger skipped"
        );
        MaterializeOutcome::Skipped(reason)
    }
}
