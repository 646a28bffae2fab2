use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{info, warn};

use autopilot_common::{RecheckSummary, RecheckTask};

use crate::pacer::CallPacer;
use crate::traits::{DraftStore, VisibilityChecker};

/// Re-runs the originating visibility query for published drafts.
pub struct RecheckScheduler {
    store: Arc<dyn DraftStore>,
    checker: Arc<dyn VisibilityChecker>,
    pacer: Arc<CallPacer>,
    timeout: Duration,
    batch_size: i64,
}

impl RecheckScheduler {
    pub fn new(
        store: Arc<dyn DraftStore>,
        checker: Arc<dyn VisibilityChecker>,
        pacer: Arc<CallPacer>,
        timeout: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            checker,
            pacer,
            timeout,
            batch_size,
        }
    }

    /// Work through one batch of pending tasks. A failed task is recorded and
    /// left pending for a later sweep; it never blocks the rest of the batch.
    pub async fn run_recheck_sweep(&self) -> RecheckSummary {
        let mut summary = RecheckSummary::default();

        let tasks = match self.store.pending_rechecks(self.batch_size).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "Failed to load pending recheck tasks");
                return summary;
            }
        };

        for task in tasks {
            match self.recheck(&task).await {
                Ok(cited) => {
                    summary.completed += 1;
                    if cited {
                        summary.cited += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        task_id = %task.id,
                        draft_id = %task.draft_id,
                        attempts = task.attempts + 1,
                        error = %e,
                        "Recheck failed, leaving task for a later sweep"
                    );
                    if let Err(record_err) = self
                        .store
                        .record_recheck_failure(task.id, &e.to_string())
                        .await
                    {
                        warn!(task_id = %task.id, error = %record_err, "Failed to record recheck failure");
                    }
                }
            }
        }

        info!("Recheck sweep complete. {summary}");
        summary
    }

    async fn recheck(&self, task: &RecheckTask) -> anyhow::Result<bool> {
        self.pacer.pace().await;
        let cited = tokio::time::timeout(
            self.timeout,
            self.checker.cited_for(&task.target_query, task.location_id),
        )
        .await
        .map_err(|_| anyhow!("visibility check timed out after {:?}", self.timeout))??;

        self.store.complete_recheck(task.id, cited, Utc::now()).await?;

        info!(
            draft_id = %task.draft_id,
            location_id = %task.location_id,
            query = task.target_query.as_str(),
            cited,
            "Recheck complete"
        );
        Ok(cited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{competitor_trigger, draft_for, MemoryStore, ScriptedChecker};
    use autopilot_common::{DraftStatus, RecheckStatus};
    use uuid::Uuid;

    fn published_task(store: &MemoryStore, query: &str) -> Uuid {
        let trigger = competitor_trigger(Uuid::new_v4(), Uuid::new_v4(), query);
        let mut draft = draft_for(&trigger, Utc::now());
        draft.status = DraftStatus::Published;
        let task = RecheckTask::for_published(&draft, Utc::now()).unwrap();
        let id = task.id;
        store.seed_draft(draft);
        store.seed_recheck(task);
        id
    }

    fn scheduler(store: &Arc<MemoryStore>, checker: ScriptedChecker) -> RecheckScheduler {
        RecheckScheduler::new(
            store.clone(),
            Arc::new(checker),
            Arc::new(CallPacer::unpaced()),
            Duration::from_secs(5),
            50,
        )
    }

    #[tokio::test]
    async fn one_failing_task_does_not_block_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let first = published_task(&store, "hookah near me");
        let broken = published_task(&store, "broken query");
        let last = published_task(&store, "late night lounge");

        let checker = ScriptedChecker::new()
            .cited("hookah near me", true)
            .failing("broken query", "answer engine unavailable")
            .cited("late night lounge", false);
        let summary = scheduler(&store, checker).run_recheck_sweep().await;

        assert_eq!(
            summary,
            RecheckSummary {
                completed: 2,
                failed: 1,
                cited: 1
            }
        );
        assert_eq!(store.recheck(first).unwrap().status, RecheckStatus::Completed);
        assert_eq!(store.recheck(first).unwrap().cited, Some(true));
        assert_eq!(store.recheck(last).unwrap().cited, Some(false));

        let failed = store.recheck(broken).unwrap();
        assert_eq!(failed.status, RecheckStatus::Pending);
        assert_eq!(failed.attempts, 1);
        assert!(failed.last_error.unwrap().contains("answer engine unavailable"));
    }

    #[tokio::test]
    async fn failed_task_is_not_retried_in_the_same_pass() {
        let store = Arc::new(MemoryStore::new());
        published_task(&store, "broken query");
        let checker = Arc::new(ScriptedChecker::new().failing("broken query", "boom"));
        let scheduler = RecheckScheduler::new(
            store.clone(),
            checker.clone(),
            Arc::new(CallPacer::unpaced()),
            Duration::from_secs(5),
            50,
        );

        let summary = scheduler.run_recheck_sweep().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(checker.calls(), 1);
    }

    #[tokio::test]
    async fn completed_tasks_are_consumed_once() {
        let store = Arc::new(MemoryStore::new());
        published_task(&store, "hookah near me");
        let scheduler = scheduler(&store, ScriptedChecker::new().cited("hookah near me", true));

        assert_eq!(scheduler.run_recheck_sweep().await.completed, 1);
        assert_eq!(scheduler.run_recheck_sweep().await, RecheckSummary::default());
    }

    #[tokio::test]
    async fn slow_checks_time_out_as_failures() {
        let store = Arc::new(MemoryStore::new());
        let id = published_task(&store, "hookah near me");
        let checker = ScriptedChecker::new()
            .cited("hookah near me", true)
            .with_latency(Duration::from_millis(200));
        let scheduler = RecheckScheduler::new(
            store.clone(),
            Arc::new(checker),
            Arc::new(CallPacer::unpaced()),
            Duration::from_millis(20),
            50,
        );

        let summary = scheduler.run_recheck_sweep().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(store.recheck(id).unwrap().status, RecheckStatus::Pending);
    }
}
