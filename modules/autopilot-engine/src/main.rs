use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::Claude;
use autopilot_common::Config;
use autopilot_engine::plan_gate::TierPlanGate;
use autopilot_engine::visibility::AnswerEngineChecker;
use autopilot_engine::{
    Autopilot, AutopilotDeps, GenerationCapability, PgStore, VisibilityChecker,
};

#[derive(Parser)]
#[command(name = "autopilot", about = "Content autopilot: turns visibility signals into draft content")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Full sweep: drafts for every tenant, then archival and rechecks (default)
    Sweep,
    /// Archive occasion drafts whose occasion has passed
    Archive,
    /// Re-run visibility checks for published drafts
    Recheck,
    /// Apply database migrations and exit
    Migrate,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("autopilot=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Sweep);

    info!("Content autopilot starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(pool));

    // Idempotent
    store.migrate().await?;
    if matches!(command, Command::Migrate) {
        info!("Migrations complete");
        return Ok(());
    }

    let generation = GenerationCapability::from_api_key(
        config.anthropic_api_key.as_deref(),
        &config.generation_model,
        config.generation_timeout,
    );
    let visibility: Option<Arc<dyn VisibilityChecker>> =
        config.anthropic_api_key.as_deref().map(|key| {
            let claude = Claude::new(key, config.generation_model.as_str())
                .with_timeout(config.recheck_timeout);
            Arc::new(AnswerEngineChecker::new(claude, store.clone())) as Arc<dyn VisibilityChecker>
        });
    if visibility.is_none() {
        info!("No ANTHROPIC_API_KEY set, drafts will use the offline writer and rechecks are disabled");
    }

    let deps = AutopilotDeps::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(TierPlanGate),
        generation,
        visibility,
        config,
    );
    let autopilot = Autopilot::new(deps);

    match command {
        // Logs its own summary.
        Command::Sweep => {
            autopilot.run().await;
        }
        Command::Archive => {
            let archived = autopilot.archive_expired().await;
            info!(archived, "Archival complete");
        }
        Command::Recheck => {
            let summary = autopilot.run_rechecks().await;
            info!("Recheck complete. {summary}");
        }
        Command::Migrate => {}
    }

    Ok(())
}
