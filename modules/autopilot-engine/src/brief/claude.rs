use anyhow::Result;
use async_trait::async_trait;

use ai_client::{Claude, Extraction};

use super::{GeneratedBrief, GeneratedContent};
use crate::traits::ContentGenerator;

#[async_trait]
impl ContentGenerator for Claude {
    async fn generate(&self, system: &str, prompt: &str) -> Result<GeneratedContent> {
        let extraction = self.extract_or_text::<GeneratedBrief>(system, prompt).await?;
        Ok(match extraction {
            Extraction::Structured(brief) => GeneratedContent::Structured(brief),
            Extraction::Unstructured(raw) => GeneratedContent::Raw(raw),
        })
    }
}
