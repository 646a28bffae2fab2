use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AutopilotError;

// ---------------------------------------------------------------------------
// Trigger kinds and the cooldown policy table
// ---------------------------------------------------------------------------

/// The upstream signal family a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    CompetitorGap,
    Occasion,
    PromptMissing,
    FirstMover,
    ReviewGap,
    SchemaGap,
    Manual,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 7] = [
        TriggerKind::CompetitorGap,
        TriggerKind::Occasion,
        TriggerKind::PromptMissing,
        TriggerKind::FirstMover,
        TriggerKind::ReviewGap,
        TriggerKind::SchemaGap,
        TriggerKind::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompetitorGap => "competitor_gap",
            Self::Occasion => "occasion",
            Self::PromptMissing => "prompt_missing",
            Self::FirstMover => "first_mover",
            Self::ReviewGap => "review_gap",
            Self::SchemaGap => "schema_gap",
            Self::Manual => "manual",
        }
    }

    /// How soon the same semantic trigger may fire again for one location.
    /// Fixed policy, not tenant-configurable. Manual triggers never cool down.
    ///
    /// The occasion window is nominal: occasion triggers carry no query and
    /// are not location rate-limited, so only the exact source match applies
    /// to them.
    pub fn cooldown(&self) -> Option<Duration> {
        match self {
            Self::CompetitorGap => Some(Duration::days(14)),
            Self::PromptMissing | Self::FirstMover | Self::Occasion => Some(Duration::days(30)),
            Self::SchemaGap => Some(Duration::days(30)),
            Self::ReviewGap => Some(Duration::days(60)),
            Self::Manual => None,
        }
    }

    /// The widest cooldown in the table. Dedup reads must look back at least this far.
    pub fn longest_cooldown() -> Duration {
        Self::ALL
            .iter()
            .filter_map(TriggerKind::cooldown)
            .max()
            .unwrap_or_else(Duration::zero)
    }

    /// Kinds with no natural query string, limited to one draft per location per window.
    pub fn is_location_rate_limited(&self) -> bool {
        matches!(self, Self::ReviewGap | Self::SchemaGap)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| AutopilotError::Validation(format!("unknown trigger kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    FaqPage,
    OccasionPage,
    BlogPost,
    LandingPage,
    GbpPost,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::FaqPage,
        ContentType::OccasionPage,
        ContentType::BlogPost,
        ContentType::LandingPage,
        ContentType::GbpPost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FaqPage => "faq_page",
            Self::OccasionPage => "occasion_page",
            Self::BlogPost => "blog_post",
            Self::LandingPage => "landing_page",
            Self::GbpPost => "gbp_post",
        }
    }

    /// Human label used in prompts and fallback titles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FaqPage => "FAQ page",
            Self::OccasionPage => "occasion page",
            Self::BlogPost => "blog post",
            Self::LandingPage => "landing page",
            Self::GbpPost => "Google Business Profile post",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AutopilotError::Validation(format!("unknown content type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Draft status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Approved,
    Published,
    Archived,
    Rejected,
}

impl DraftStatus {
    /// Statuses that hold the `(tenant, kind, source)` idempotency slot.
    pub const ACTIVE: [DraftStatus; 3] = [
        DraftStatus::Draft,
        DraftStatus::Approved,
        DraftStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Archived => "archived",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Statuses only move forward; archived and rejected are terminal.
    pub fn can_transition_to(&self, next: DraftStatus) -> bool {
        use DraftStatus::*;
        matches!(
            (self, next),
            (Draft, Approved)
                | (Draft, Rejected)
                | (Approved, Published)
                | (Approved, Rejected)
                | (Draft, Archived)
                | (Approved, Archived)
                | (Published, Archived)
        )
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStatus {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "approved" => Ok(Self::Approved),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            "rejected" => Ok(Self::Rejected),
            other => Err(AutopilotError::Validation(format!(
                "unknown draft status '{other}'"
            ))),
        }
    }
}

/// Where a draft's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefOrigin {
    /// Structured generation succeeded.
    Generated,
    /// Generation answered but broke the output contract; raw text kept.
    RawFallback,
    /// No generation credential; deterministic template.
    Offline,
}

impl BriefOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::RawFallback => "raw_fallback",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for BriefOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BriefOrigin {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generated" => Ok(Self::Generated),
            "raw_fallback" => Ok(Self::RawFallback),
            "offline" => Ok(Self::Offline),
            other => Err(AutopilotError::Validation(format!(
                "unknown brief origin '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DraftTrigger
// ---------------------------------------------------------------------------

/// Kind-specific payload of a trigger. The variant determines the trigger kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerContext {
    CompetitorGap {
        target_query: String,
        competitor_name: String,
        winning_factor: String,
    },
    Occasion {
        occasion_name: String,
        peak_date: NaiveDate,
        days_until_peak: i64,
    },
    PromptMissing {
        target_query: String,
        #[serde(default)]
        category: Option<String>,
    },
    FirstMover {
        target_query: String,
    },
    ReviewGap {
        review_count: u32,
        #[serde(default)]
        average_rating: Option<f32>,
        #[serde(default)]
        keyword_gaps: Vec<String>,
    },
    SchemaGap {
        missing_schema_types: Vec<String>,
        #[serde(default)]
        page_url: Option<String>,
    },
    Manual {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        target_query: Option<String>,
        #[serde(default)]
        content_type: Option<ContentType>,
    },
}

impl TriggerContext {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::CompetitorGap { .. } => TriggerKind::CompetitorGap,
            Self::Occasion { .. } => TriggerKind::Occasion,
            Self::PromptMissing { .. } => TriggerKind::PromptMissing,
            Self::FirstMover { .. } => TriggerKind::FirstMover,
            Self::ReviewGap { .. } => TriggerKind::ReviewGap,
            Self::SchemaGap { .. } => TriggerKind::SchemaGap,
            Self::Manual { .. } => TriggerKind::Manual,
        }
    }

    /// The answer-engine query this trigger is about, when it has one.
    pub fn target_query(&self) -> Option<&str> {
        match self {
            Self::CompetitorGap { target_query, .. }
            | Self::PromptMissing { target_query, .. }
            | Self::FirstMover { target_query } => Some(target_query.as_str()),
            Self::Manual { target_query, .. } => target_query.as_deref(),
            Self::Occasion { .. } | Self::ReviewGap { .. } | Self::SchemaGap { .. } => None,
        }
    }

    /// Text stored as the draft's `target_prompt`.
    pub fn target_prompt(&self) -> String {
        match self {
            Self::Occasion { occasion_name, .. } => occasion_name.clone(),
            Self::ReviewGap { keyword_gaps, .. } if !keyword_gaps.is_empty() => {
                format!("reviews mentioning {}", keyword_gaps.join(", "))
            }
            Self::ReviewGap { .. } => "review coverage".to_string(),
            Self::SchemaGap {
                missing_schema_types,
                ..
            } => format!("structured data: {}", missing_schema_types.join(", ")),
            Self::Manual {
                target_query: None,
                title: Some(title),
                ..
            } => title.clone(),
            other => other.target_query().unwrap_or_default().to_string(),
        }
    }

    /// Peak date of an occasion trigger; drafts built from it expire after this day.
    pub fn occasion_peak_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Occasion { peak_date, .. } => Some(*peak_date),
            _ => None,
        }
    }
}

/// A signal that a content draft may be worth generating. Never persisted as a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTrigger {
    /// Handle the trigger source uses to consume or release this trigger.
    pub id: Uuid,
    /// Opaque id of the originating signal. None for ad hoc manual triggers.
    pub source_id: Option<String>,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub context: TriggerContext,
}

impl DraftTrigger {
    pub fn new(tenant_id: Uuid, location_id: Uuid, context: TriggerContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: None,
            tenant_id,
            location_id,
            context,
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn kind(&self) -> TriggerKind {
        self.context.kind()
    }

    pub fn target_query(&self) -> Option<&str> {
        self.context.target_query()
    }
}

// ---------------------------------------------------------------------------
// Briefs and drafts
// ---------------------------------------------------------------------------

/// Generated (or templated) content for one trigger, before it becomes a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftBrief {
    pub title: String,
    pub body: String,
    pub target_keywords: Vec<String>,
    /// 0–100.
    pub estimated_score: u8,
    pub origin: BriefOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDraft {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub trigger_kind: TriggerKind,
    pub source_id: Option<String>,
    pub title: String,
    pub body: String,
    pub target_prompt: String,
    pub content_type: ContentType,
    pub estimated_score: u8,
    pub target_keywords: Vec<String>,
    pub brief_origin: BriefOrigin,
    pub occasion_peak_date: Option<NaiveDate>,
    pub status: DraftStatus,
    pub human_approved: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl ContentDraft {
    /// A fresh pending draft for `trigger`, awaiting human review.
    pub fn from_brief(
        trigger: &DraftTrigger,
        content_type: ContentType,
        brief: DraftBrief,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: trigger.tenant_id,
            location_id: trigger.location_id,
            trigger_kind: trigger.kind(),
            source_id: trigger.source_id.clone(),
            title: brief.title,
            body: brief.body,
            target_prompt: trigger.context.target_prompt(),
            content_type,
            estimated_score: brief.estimated_score.min(100),
            target_keywords: brief.target_keywords,
            brief_origin: brief.origin,
            occasion_peak_date: trigger.context.occasion_peak_date(),
            status: DraftStatus::Draft,
            human_approved: false,
            created_at: now,
            published_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ---------------------------------------------------------------------------
// Recheck tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecheckStatus {
    Pending,
    Completed,
}

impl RecheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for RecheckStatus {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(AutopilotError::Validation(format!(
                "unknown recheck status '{other}'"
            ))),
        }
    }
}

/// Post-publication visibility re-measurement for one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecheckTask {
    pub id: Uuid,
    pub draft_id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Uuid,
    pub target_query: String,
    pub status: RecheckStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub cited: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecheckTask {
    /// None when the draft has nothing to re-query.
    pub fn for_published(draft: &ContentDraft, now: DateTime<Utc>) -> Option<Self> {
        let query = draft.target_prompt.trim();
        if query.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            draft_id: draft.id,
            tenant_id: draft.tenant_id,
            location_id: draft.location_id,
            target_query: query.to_string(),
            status: RecheckStatus::Pending,
            attempts: 0,
            last_error: None,
            cited: None,
            created_at: now,
            completed_at: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tenants and locations
// ---------------------------------------------------------------------------

/// Business profile used to ground generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationProfile {
    pub location_id: Uuid,
    pub business_name: String,
    pub city: String,
    pub state: String,
    pub categories: Vec<String>,
}

impl LocationProfile {
    /// "Alpharetta, GA", or just the city when no state is known.
    pub fn city_state(&self) -> String {
        if self.state.trim().is_empty() {
            self.city.clone()
        } else {
            format!("{}, {}", self.city, self.state)
        }
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Trial,
    Starter,
    Growth,
    Agency,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Agency => "agency",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = AutopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "agency" => Ok(Self::Agency),
            other => Err(AutopilotError::Validation(format!("unknown plan '{other}'"))),
        }
    }
}

/// Plan-gated capabilities the sweep asks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    ContentAutopilot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub plan: Plan,
}

// ---------------------------------------------------------------------------
// Materialization outcomes
// ---------------------------------------------------------------------------

/// Why a trigger was not turned into a draft. Normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    TenantMismatch,
    DuplicateSource,
    PendingCapReached,
    UnknownLocation,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TenantMismatch => "tenant_mismatch",
            Self::DuplicateSource => "duplicate_source",
            Self::PendingCapReached => "pending_cap_reached",
            Self::UnknownLocation => "unknown_location",
        }
    }

    /// Skips that may resolve on their own: the cap frees up once drafts are
    /// reviewed, and a missing profile may be created later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PendingCapReached | Self::UnknownLocation)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created(Uuid),
    Skipped(SkipReason),
}
