// Row types for the autopilot tables and their conversion into domain types.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use autopilot_common::{ContentDraft, DraftTrigger, RecheckTask, Tenant, TriggerContext};

/// A row from the `content_drafts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DraftRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub trigger_kind: String,
    pub source_id: Option<String>,
    pub title: String,
    pub body: String,
    pub target_prompt: String,
    pub content_type: String,
    pub estimated_score: i16,
    pub target_keywords: Vec<String>,
    pub brief_origin: String,
    pub occasion_peak_date: Option<NaiveDate>,
    pub status: String,
    pub human_approved: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl TryFrom<DraftRow> for ContentDraft {
    type Error = anyhow::Error;

    fn try_from(row: DraftRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            location_id: row.location_id,
            trigger_kind: row.trigger_kind.parse()?,
            source_id: row.source_id,
            title: row.title,
            body: row.body,
            target_prompt: row.target_prompt,
            content_type: row.content_type.parse()?,
            estimated_score: row.estimated_score.clamp(0, 100) as u8,
            target_keywords: row.target_keywords,
            brief_origin: row.brief_origin.parse()?,
            occasion_peak_date: row.occasion_peak_date,
            status: row.status.parse()?,
            human_approved: row.human_approved,
            created_at: row.created_at,
            published_at: row.published_at,
        })
    }
}

pub(crate) fn drafts_from_rows(rows: Vec<DraftRow>) -> Result<Vec<ContentDraft>> {
    rows.into_iter().map(ContentDraft::try_from).collect()
}

/// A row from the `recheck_tasks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RecheckRow {
    pub id: Uuid,
    pub draft_id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub target_query: String,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub cited: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RecheckRow> for RecheckTask {
    type Error = anyhow::Error;

    fn try_from(row: RecheckRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            draft_id: row.draft_id,
            tenant_id: row.tenant_id,
            location_id: row.location_id,
            target_query: row.target_query,
            status: row.status.parse()?,
            attempts: row.attempts,
            last_error: row.last_error,
            cited: row.cited,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row from the `draft_trigger_inbox` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct InboxRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub source_id: Option<String>,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<InboxRow> for DraftTrigger {
    type Error = anyhow::Error;

    fn try_from(row: InboxRow) -> Result<Self> {
        let context: TriggerContext = serde_json::from_value(row.context)
            .with_context(|| format!("inbox row {} has an invalid trigger context", row.id))?;
        Ok(Self {
            id: row.id,
            source_id: row.source_id,
            tenant_id: row.tenant_id,
            location_id: row.location_id,
            context,
        })
    }
}

/// A row from the `tenants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub plan: String,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = anyhow::Error;

    fn try_from(row: TenantRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            plan: row.plan.parse()?,
        })
    }
}
