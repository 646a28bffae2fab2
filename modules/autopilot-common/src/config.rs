use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::AutopilotError;
use crate::types::TriggerKind;

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Sweep configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // AI / LLM. No key means generation and visibility checks are unavailable.
    pub anthropic_api_key: Option<String>,
    pub generation_model: String,

    // Draft policy
    pub pending_cap: u32,
    pub dedup_lookback_days: i64,
    pub include_published_in_archival: bool,

    // Outbound call pacing and timeouts
    pub call_delay: Duration,
    pub generation_timeout: Duration,
    pub recheck_timeout: Duration,
    pub recheck_batch_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            anthropic_api_key: None,
            generation_model: DEFAULT_MODEL.to_string(),
            pending_cap: 5,
            dedup_lookback_days: 90,
            include_published_in_archival: false,
            call_delay: Duration::from_millis(500),
            generation_timeout: Duration::from_secs(60),
            recheck_timeout: Duration::from_secs(30),
            recheck_batch_size: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AutopilotError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AutopilotError::Config("DATABASE_URL is required".into()))?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            generation_model: env::var("AUTOPILOT_MODEL").unwrap_or(defaults.generation_model),
            pending_cap: parse_env("AUTOPILOT_PENDING_CAP", defaults.pending_cap)?,
            dedup_lookback_days: parse_env(
                "AUTOPILOT_DEDUP_LOOKBACK_DAYS",
                defaults.dedup_lookback_days,
            )?,
            include_published_in_archival: parse_env(
                "AUTOPILOT_INCLUDE_PUBLISHED_ARCHIVAL",
                defaults.include_published_in_archival,
            )?,
            call_delay: Duration::from_millis(parse_env("AUTOPILOT_CALL_DELAY_MS", 500u64)?),
            generation_timeout: Duration::from_secs(parse_env(
                "AUTOPILOT_GENERATION_TIMEOUT_SECS",
                60u64,
            )?),
            recheck_timeout: Duration::from_secs(parse_env(
                "AUTOPILOT_RECHECK_TIMEOUT_SECS",
                30u64,
            )?),
            recheck_batch_size: parse_env(
                "AUTOPILOT_RECHECK_BATCH_SIZE",
                defaults.recheck_batch_size,
            )?,
        })
    }

    /// How far back dedup reads drafts. Never shorter than the longest
    /// cooldown, whatever `dedup_lookback_days` says.
    pub fn dedup_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.dedup_lookback_days).max(TriggerKind::longest_cooldown())
    }

    pub fn generation_available(&self) -> bool {
        self.anthropic_api_key.is_some()
    }

    /// Log the effective configuration without secrets.
    pub fn log_redacted(&self) {
        let lookback_floor = TriggerKind::longest_cooldown().num_days();
        if self.dedup_lookback_days < lookback_floor {
            warn!(
                configured = self.dedup_lookback_days,
                effective = lookback_floor,
                "Dedup lookback is shorter than the longest cooldown, raising it"
            );
        }

        let database = redact_url(&self.database_url);
        let generation = if self.generation_available() {
            "available"
        } else {
            "offline"
        };
        info!(
            database = database.as_str(),
            generation,
            model = self.generation_model.as_str(),
            pending_cap = self.pending_cap,
            dedup_lookback_days = self.dedup_lookback_days,
            include_published_in_archival = self.include_published_in_archival,
            call_delay_ms = self.call_delay.as_millis() as u64,
            generation_timeout_secs = self.generation_timeout.as_secs(),
            recheck_timeout_secs = self.recheck_timeout.as_secs(),
            recheck_batch_size = self.recheck_batch_size,
            "Autopilot config"
        );
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AutopilotError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AutopilotError::Config(format!("{key} has an invalid value '{raw}'"))),
        _ => Ok(default),
    }
}

/// Drop the userinfo part of a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = Config::default();
        assert_eq!(config.pending_cap, 5);
        assert_eq!(config.call_delay, Duration::from_millis(500));
        assert!(!config.generation_available());
        assert!(!config.include_published_in_archival);
    }

    #[test]
    fn credentials_are_redacted() {
        assert_eq!(
            redact_url("postgres://autopilot:hunter2@db:5432/autopilot"),
            "postgres://***@db:5432/autopilot"
        );
        assert_eq!(redact_url("postgres://db/autopilot"), "postgres://db/autopilot");
    }

    #[test]
    fn dedup_lookback_never_undercuts_longest_cooldown() {
        let mut config = Config::default();
        assert_eq!(config.dedup_lookback(), chrono::Duration::days(90));

        config.dedup_lookback_days = 7;
        assert_eq!(config.dedup_lookback(), chrono::Duration::days(60));
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let cap: u32 = parse_env("AUTOPILOT_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(cap, 7);
    }
}
