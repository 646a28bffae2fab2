pub mod claude;
pub mod context;
pub mod offline;

use std::sync::Arc;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use autopilot_common::{BriefOrigin, ContentType, DraftBrief, DraftTrigger, LocationProfile};

use crate::pacer::CallPacer;
use crate::traits::ContentGenerator;

pub use context::context_block;
pub use offline::offline_brief;

/// Score given to drafts whose generation broke the output contract.
pub const RAW_FALLBACK_SCORE: u8 = 70;

// =============================================================================
// Structured output contract
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedBrief {
    /// Page or post title, under 70 characters
    pub title: String,
    /// Full draft body in markdown
    pub content: String,
    /// Estimated answer-engine visibility score for the draft, 0 to 100
    pub estimated_score: f64,
    /// 3 to 8 search phrases the draft targets
    pub target_keywords: Vec<String>,
}

/// What one generation call returned.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedContent {
    Structured(GeneratedBrief),
    /// Output that did not satisfy the contract.
    Raw(String),
}

// =============================================================================
// Capability
// =============================================================================

/// Whether outbound generation can be attempted at all. Checked before every
/// brief; `Unavailable` selects the offline writer.
#[derive(Clone)]
pub enum GenerationCapability {
    Available(Arc<dyn ContentGenerator>),
    Unavailable,
}

impl GenerationCapability {
    /// Claude-backed generation when a key is configured.
    pub fn from_api_key(api_key: Option<&str>, model: &str, timeout: Duration) -> Self {
        match api_key {
            Some(key) if !key.trim().is_empty() => Self::Available(Arc::new(
                ai_client::Claude::new(key, model).with_timeout(timeout),
            )),
            _ => Self::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation call failed: {0}")]
    Failed(anyhow::Error),

    #[error("generation returned no content")]
    Empty,
}

// =============================================================================
// BriefWriter
// =============================================================================

const SYSTEM_PROMPT: &str = "You write content for local businesses so that AI answer engines \
    (ChatGPT, Perplexity, Google AI Overviews) cite them. Be specific and factual, use the \
    business name and city naturally, and never invent prices, awards, or reviews.";

/// Produces a brief for one admitted trigger.
pub struct BriefWriter {
    capability: GenerationCapability,
    pacer: Arc<CallPacer>,
    timeout: Duration,
}

impl BriefWriter {
    pub fn new(capability: GenerationCapability, pacer: Arc<CallPacer>, timeout: Duration) -> Self {
        Self {
            capability,
            pacer,
            timeout,
        }
    }

    /// Generate, or template when generation is unavailable. Transport failures
    /// and timeouts are returned to the caller unretried.
    pub async fn write(
        &self,
        trigger: &DraftTrigger,
        profile: &LocationProfile,
        content_type: ContentType,
    ) -> Result<DraftBrief, GenerationError> {
        let generator = match &self.capability {
            GenerationCapability::Available(generator) => generator,
            GenerationCapability::Unavailable => {
                return Ok(offline_brief(trigger, profile, content_type));
            }
        };

        let prompt = build_prompt(trigger, profile, content_type);

        self.pacer.pace().await;
        let generated = tokio::time::timeout(self.timeout, generator.generate(SYSTEM_PROMPT, &prompt))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))?
            .map_err(GenerationError::Failed)?;

        match generated {
            GeneratedContent::Structured(brief) if !brief.content.trim().is_empty() => {
                Ok(from_structured(brief, trigger, profile, content_type))
            }
            GeneratedContent::Structured(_) => Err(GenerationError::Empty),
            GeneratedContent::Raw(text) if !text.trim().is_empty() => {
                warn!(
                    kind = %trigger.kind(),
                    "Generation output did not match contract, keeping raw text"
                );
                Ok(from_raw(text, trigger, profile, content_type))
            }
            GeneratedContent::Raw(_) => Err(GenerationError::Empty),
        }
    }
}

fn build_prompt(trigger: &DraftTrigger, profile: &LocationProfile, content_type: ContentType) -> String {
    let categories = if profile.categories.is_empty() {
        "unspecified".to_string()
    } else {
        profile.categories.join(", ")
    };
    let format_hint = match content_type {
        ContentType::FaqPage => {
            "Format the content as 4 to 6 question and answer pairs, each question on a line \
             starting with \"Q:\" and each answer starting with \"A:\"."
        }
        ContentType::OccasionPage => {
            "Format the content as a short landing section for the occasion: a headline, two \
             paragraphs, and a call to action."
        }
        ContentType::GbpPost => "Keep the content under 1500 characters with one call to action.",
        ContentType::LandingPage | ContentType::BlogPost => {
            "Use markdown headings that separate the main sections."
        }
    };

    format!(
        "{context}\n\nBusiness: {name}\nLocation: {place}\nCategories: {categories}\n\n\
         Write a {label}. {format_hint}",
        context = context_block(trigger, profile),
        name = profile.business_name,
        place = profile.city_state(),
        label = content_type.label(),
    )
}

fn from_structured(
    brief: GeneratedBrief,
    trigger: &DraftTrigger,
    profile: &LocationProfile,
    content_type: ContentType,
) -> DraftBrief {
    let title = match brief.title.trim() {
        "" => offline::fallback_title(trigger, profile, content_type),
        t => t.to_string(),
    };
    let mut keywords: Vec<String> = brief
        .target_keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        keywords = offline::derive_keywords(trigger, profile);
    }

    info!(kind = %trigger.kind(), title = title.as_str(), "Brief generated");

    DraftBrief {
        title,
        body: brief.content.trim().to_string(),
        target_keywords: keywords,
        estimated_score: clamp_score(brief.estimated_score),
        origin: BriefOrigin::Generated,
    }
}

fn from_raw(
    text: String,
    trigger: &DraftTrigger,
    profile: &LocationProfile,
    content_type: ContentType,
) -> DraftBrief {
    DraftBrief {
        title: offline::fallback_title(trigger, profile, content_type),
        body: raw_body(&text),
        target_keywords: offline::derive_keywords(trigger, profile),
        estimated_score: RAW_FALLBACK_SCORE,
        origin: BriefOrigin::RawFallback,
    }
}

/// Body text from raw output. Partially valid JSON keeps its `content` field.
fn raw_body(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("content").and_then(|c| c.as_str()).map(str::to_string))
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| text.to_string())
        .trim()
        .to_string()
}

/// Clamp a model-supplied score into 0..=100. NaN becomes 0.
pub fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{competitor_trigger, profile, ScriptedGenerator};
    use uuid::Uuid;

    fn writer(generator: ScriptedGenerator) -> BriefWriter {
        BriefWriter::new(
            GenerationCapability::Available(Arc::new(generator)),
            Arc::new(CallPacer::unpaced()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn scores_are_clamped() {
        assert_eq!(clamp_score(-12.0), 0);
        assert_eq!(clamp_score(87.6), 88);
        assert_eq!(clamp_score(340.0), 100);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn missing_key_means_unavailable() {
        let t = Duration::from_secs(1);
        assert!(!GenerationCapability::from_api_key(None, "m", t).is_available());
        assert!(!GenerationCapability::from_api_key(Some("  "), "m", t).is_available());
        assert!(GenerationCapability::from_api_key(Some("sk-ant"), "m", t).is_available());
    }

    #[test]
    fn prompt_carries_context_and_format() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let prompt = build_prompt(&trigger, &p, ContentType::FaqPage);
        assert!(prompt.contains("Competitor Gap Alert"));
        assert!(prompt.contains("\"Q:\""));
        assert!(prompt.contains("Categories: hookah lounge"));
    }

    #[tokio::test]
    async fn unavailable_capability_uses_offline_writer() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let writer = BriefWriter::new(
            GenerationCapability::Unavailable,
            Arc::new(CallPacer::unpaced()),
            Duration::from_secs(5),
        );
        let brief = writer.write(&trigger, &p, ContentType::FaqPage).await.unwrap();
        assert_eq!(brief.origin, BriefOrigin::Offline);
        assert_eq!(brief, offline_brief(&trigger, &p, ContentType::FaqPage));
    }

    #[tokio::test]
    async fn structured_output_is_sanitized() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let generator = ScriptedGenerator::new().then_structured(GeneratedBrief {
            title: "  ".into(),
            content: "Q: Is it open late?\nA: Yes.".into(),
            estimated_score: 130.0,
            target_keywords: vec![" ".into()],
        });
        let brief = writer(generator).write(&trigger, &p, ContentType::FaqPage).await.unwrap();

        assert_eq!(brief.origin, BriefOrigin::Generated);
        assert_eq!(brief.estimated_score, 100);
        assert!(!brief.title.is_empty());
        assert!(!brief.target_keywords.is_empty());
    }

    #[tokio::test]
    async fn malformed_output_degrades_to_raw_fallback() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let generator = ScriptedGenerator::new().then_raw("Charcoal N Chill is open until 2am.");
        let brief = writer(generator).write(&trigger, &p, ContentType::FaqPage).await.unwrap();

        assert_eq!(brief.origin, BriefOrigin::RawFallback);
        assert_eq!(brief.estimated_score, RAW_FALLBACK_SCORE);
        assert_eq!(brief.body, "Charcoal N Chill is open until 2am.");
    }

    #[test]
    fn raw_json_keeps_content_field() {
        assert_eq!(
            raw_body(r#"{"title": "T", "content": "Body text", "estimatedScore": "high"}"#),
            "Body text"
        );
        assert_eq!(raw_body("  just prose  "), "just prose");
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let generator = ScriptedGenerator::new().then_fail("connection reset");
        let err = writer(generator)
            .write(&trigger, &p, ContentType::FaqPage)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Failed(_)));
    }

    #[tokio::test]
    async fn slow_generation_times_out() {
        let p = profile("Charcoal N Chill", "Alpharetta", "GA");
        let trigger = competitor_trigger(Uuid::new_v4(), p.location_id, "hookah near me");
        let writer = BriefWriter::new(
            GenerationCapability::Available(Arc::new(
                ScriptedGenerator::new().with_latency(Duration::from_millis(200)),
            )),
            Arc::new(CallPacer::unpaced()),
            Duration::from_millis(20),
        );
        let err = writer
            .write(&trigger, &p, ContentType::FaqPage)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }
}
