use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use ai_client::{truncate_to_char_boundary, Claude};

use crate::traits::{LocationDirectory, VisibilityChecker};

const SYSTEM_PROMPT: &str = "You are a local search assistant. Answer the user's question the way \
    an AI answer engine would, recommending specific businesses by name.";

/// Asks Claude the original query for the location's city and looks for the
/// business name in the answer.
pub struct AnswerEngineChecker {
    claude: Claude,
    locations: Arc<dyn LocationDirectory>,
}

impl AnswerEngineChecker {
    pub fn new(claude: Claude, locations: Arc<dyn LocationDirectory>) -> Self {
        Self { claude, locations }
    }
}

#[async_trait]
impl VisibilityChecker for AnswerEngineChecker {
    async fn cited_for(&self, query: &str, location_id: Uuid) -> Result<bool> {
        let profile = self
            .locations
            .profile(location_id)
            .await?
            .ok_or_else(|| anyhow!("location {location_id} has no profile"))?;

        let prompt = format!("{query} (near {})", profile.city_state());
        let answer = self.claude.chat_completion(SYSTEM_PROMPT, prompt).await?;

        let cited = mentions_business(&answer, &profile.business_name);
        debug!(
            location_id = %location_id,
            query,
            cited,
            answer = truncate_to_char_boundary(&answer, 200),
            "Visibility check answered"
        );
        Ok(cited)
    }
}

/// Case- and punctuation-insensitive whole-word match of `business_name` in `answer`.
pub fn mentions_business(answer: &str, business_name: &str) -> bool {
    let name = words(business_name);
    if name.is_empty() {
        return false;
    }
    words(answer).windows(name.len()).any(|w| w == name.as_slice())
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
