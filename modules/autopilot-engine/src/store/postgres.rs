// Postgres implementation of the autopilot's store and directory traits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use autopilot_common::{
    ContentDraft, DraftStatus, DraftTrigger, LocationProfile, RecheckTask, Tenant, TriggerKind,
};

use super::rows::{drafts_from_rows, DraftRow, InboxRow, RecheckRow, TenantRow};
use crate::traits::{
    DraftStore, InsertOutcome, LocationDirectory, TenantDirectory, TriggerSource,
};

const DRAFT_COLUMNS: &str = "id, tenant_id, location_id, trigger_kind, source_id, title, body, \
    target_prompt, content_type, estimated_score, target_keywords, brief_origin, \
    occasion_peak_date, status, human_approved, created_at, published_at";

const ACTIVE_STATUSES: &str = "('draft', 'approved', 'published')";

/// How long a sweep may hold inbox rows before another sweep takes them over.
const INBOX_CLAIM_LEASE: std::time::Duration = std::time::Duration::from_secs(30 * 60);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run autopilot migrations")?;
        Ok(())
    }
}

#[async_trait]
impl DraftStore for PgStore {
    async fn drafts_for_dedup(&self, tenant_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ContentDraft>> {
        let rows = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM content_drafts
             WHERE tenant_id = $1
               AND (status IN {ACTIVE_STATUSES} OR created_at >= $2)"
        ))
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        drafts_from_rows(rows)
    }

    async fn active_draft_exists(&self, tenant_id: Uuid, kind: TriggerKind, source_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(
                SELECT 1 FROM content_drafts
                WHERE tenant_id = $1 AND trigger_kind = $2 AND source_id = $3
                  AND status IN {ACTIVE_STATUSES}
            )"
        ))
        .bind(tenant_id)
        .bind(kind.as_str())
        .bind(source_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count_pending(&self, tenant_id: Uuid, location_id: Uuid) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM content_drafts
             WHERE tenant_id = $1 AND location_id = $2 AND status = 'draft'",
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn insert_draft(&self, draft: &ContentDraft) -> Result<InsertOutcome> {
        // DO NOTHING without a target also covers the partial unique index.
        let inserted = sqlx::query_scalar::<_, Uuid>(&format!(
            "INSERT INTO content_drafts ({DRAFT_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             ON CONFLICT DO NOTHING
             RETURNING id"
        ))
        .bind(draft.id)
        .bind(draft.tenant_id)
        .bind(draft.location_id)
        .bind(draft.trigger_kind.as_str())
        .bind(&draft.source_id)
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(&draft.target_prompt)
        .bind(draft.content_type.as_str())
        .bind(i16::from(draft.estimated_score))
        .bind(&draft.target_keywords)
        .bind(draft.brief_origin.as_str())
        .bind(draft.occasion_peak_date)
        .bind(draft.status.as_str())
        .bind(draft.human_approved)
        .bind(draft.created_at)
        .bind(draft.published_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(_) => InsertOutcome::Inserted,
            None => InsertOutcome::Duplicate,
        })
    }

    async fn get_draft(&self, draft_id: Uuid) -> Result<Option<ContentDraft>> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM content_drafts WHERE id = $1"
        ))
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContentDraft::try_from).transpose()
    }

    async fn set_status(
        &self,
        draft_id: Uuid,
        from: DraftStatus,
        to: DraftStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE content_drafts
             SET status = $3,
                 human_approved = human_approved OR $3 = 'approved',
                 published_at = CASE WHEN $3 = 'published' THEN $4 ELSE published_at END
             WHERE id = $1 AND status = $2",
        )
        .bind(draft_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn occasion_drafts_past_peak(
        &self,
        today: NaiveDate,
        statuses: &[DraftStatus],
    ) -> Result<Vec<ContentDraft>> {
        let statuses: Vec<&str> = statuses.iter().map(DraftStatus::as_str).collect();
        let rows = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM content_drafts
             WHERE trigger_kind = 'occasion'
               AND occasion_peak_date < $1
               AND status = ANY($2)
             ORDER BY occasion_peak_date"
        ))
        .bind(today)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;

        drafts_from_rows(rows)
    }

    async fn enqueue_recheck(&self, task: &RecheckTask) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO recheck_tasks
                (id, draft_id, tenant_id, location_id, target_query, status, attempts, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT DO NOTHING",
        )
        .bind(task.id)
        .bind(task.draft_id)
        .bind(task.tenant_id)
        .bind(task.location_id)
        .bind(&task.target_query)
        .bind(task.status.as_str())
        .bind(task.attempts)
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            info!(draft_id = %task.draft_id, "Recheck already pending for draft");
        }
        Ok(())
    }

    async fn pending_rechecks(&self, limit: i64) -> Result<Vec<RecheckTask>> {
        let rows = sqlx::query_as::<_, RecheckRow>(
            "SELECT id, draft_id, tenant_id, location_id, target_query, status, attempts,
                    last_error, cited, created_at, completed_at
             FROM recheck_tasks
             WHERE status = 'pending'
             ORDER BY created_at
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RecheckTask::try_from).collect()
    }

    async fn complete_recheck(&self, task_id: Uuid, cited: bool, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE recheck_tasks
             SET status = 'completed', cited = $2, completed_at = $3
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(cited)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_recheck_failure(&self, task_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE recheck_tasks
             SET attempts = attempts + 1, last_error = $2
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TriggerSource for PgStore {
    /// Claim every pending inbox row for the tenant. Rows locked by a
    /// concurrent sweep are skipped, and a claim older than the lease is
    /// taken over. Rows with an unreadable context are consumed and dropped
    /// with a warning.
    async fn triggers_for(&self, tenant_id: Uuid) -> Result<Vec<DraftTrigger>> {
        let mut rows = sqlx::query_as::<_, InboxRow>(
            "WITH claimable AS (
                SELECT id FROM draft_trigger_inbox
                WHERE tenant_id = $1
                  AND consumed_at IS NULL
                  AND (claimed_at IS NULL OR claimed_at < now() - make_interval(secs => $2))
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
             )
             UPDATE draft_trigger_inbox i
             SET claimed_at = now()
             FROM claimable
             WHERE i.id = claimable.id
             RETURNING i.id, i.tenant_id, i.location_id, i.source_id, i.context, i.created_at",
        )
        .bind(tenant_id)
        .bind(INBOX_CLAIM_LEASE.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        rows.sort_by_key(|r| r.created_at);

        let mut triggers = Vec::with_capacity(rows.len());
        let mut unreadable = Vec::new();
        for row in rows {
            let id = row.id;
            match DraftTrigger::try_from(row) {
                Ok(trigger) => triggers.push(trigger),
                Err(e) => {
                    warn!(inbox_id = %id, error = %e, "Dropping unreadable trigger");
                    unreadable.push(id);
                }
            }
        }
        if !unreadable.is_empty() {
            self.consume(&unreadable).await?;
        }
        Ok(triggers)
    }

    async fn consume(&self, trigger_ids: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE draft_trigger_inbox
             SET consumed_at = now(), claimed_at = NULL
             WHERE id = ANY($1) AND consumed_at IS NULL",
        )
        .bind(trigger_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, trigger_ids: &[Uuid]) -> Result<()> {
        sqlx::query(
            "UPDATE draft_trigger_inbox
             SET claimed_at = NULL
             WHERE id = ANY($1) AND consumed_at IS NULL",
        )
        .bind(trigger_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LocationDirectory for PgStore {
    async fn profile(&self, location_id: Uuid) -> Result<Option<LocationProfile>> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, Vec<String>)>(
            "SELECT id, business_name, city, state, categories FROM locations WHERE id = $1",
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(location_id, business_name, city, state, categories)| LocationProfile {
                location_id,
                business_name,
                city,
                state,
                categories,
            },
        ))
    }
}

#[async_trait]
impl TenantDirectory for PgStore {
    async fn tenants(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, plan FROM tenants
             WHERE autopilot_enabled
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Tenant::try_from(row) {
                Ok(tenant) => tenants.push(tenant),
                Err(e) => warn!(tenant_id = %id, error = %e, "Skipping tenant with unreadable plan"),
            }
        }
        Ok(tenants)
    }
}
