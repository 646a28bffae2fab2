use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use autopilot_common::DraftStatus;

use crate::traits::DraftStore;

/// Which statuses the archival pass may touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchivalPolicy {
    /// Also archive published occasion drafts once the occasion has passed.
    pub include_published: bool,
}

impl ArchivalPolicy {
    pub fn statuses(&self) -> Vec<DraftStatus> {
        let mut statuses = vec![DraftStatus::Draft, DraftStatus::Approved];
        if self.include_published {
            statuses.push(DraftStatus::Published);
        }
        statuses
    }
}

/// Archive occasion drafts whose peak date is before `today`. Returns how many
/// were archived. Never fails: a failed listing archives nothing, a failed row
/// is logged and skipped.
pub async fn archive_expired_occasion_drafts(
    store: &dyn DraftStore,
    today: NaiveDate,
    policy: ArchivalPolicy,
) -> u64 {
    let candidates = match store
        .occasion_drafts_past_peak(today, &policy.statuses())
        .await
    {
        Ok(drafts) => drafts,
        Err(e) => {
            warn!(error = %e, "Failed to list expired occasion drafts");
            return 0;
        }
    };

    let now = Utc::now();
    let mut archived = 0u64;
    for draft in candidates {
        match store
            .set_status(draft.id, draft.status, DraftStatus::Archived, now)
            .await
        {
            Ok(true) => archived += 1,
            Ok(false) => {
                debug!(draft_id = %draft.id, "Draft changed status before archival, skipping");
            }
            Err(e) => {
                warn!(draft_id = %draft.id, error = %e, "Failed to archive occasion draft");
            }
        }
    }

    if archived > 0 {
        info!(archived, "Archived expired occasion drafts");
    }
    archived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draft_for, occasion_trigger, MemoryStore};
    use chrono::Duration;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn occasion_draft(store: &MemoryStore, peak: NaiveDate, status: DraftStatus) -> Uuid {
        let trigger = occasion_trigger(Uuid::new_v4(), Uuid::new_v4(), "Halloween", peak);
        let mut draft = draft_for(&trigger, Utc::now() - Duration::days(40));
        draft.status = status;
        let id = draft.id;
        store.seed_draft(draft);
        id
    }

    #[tokio::test]
    async fn past_occasion_drafts_are_archived() {
        let store = MemoryStore::new();
        let past = today() - Duration::days(1);
        let pending = occasion_draft(&store, past, DraftStatus::Draft);
        let approved = occasion_draft(&store, past, DraftStatus::Approved);
        let upcoming = occasion_draft(&store, today() + Duration::days(13), DraftStatus::Draft);
        let on_peak_day = occasion_draft(&store, today(), DraftStatus::Draft);

        let archived = archive_expired_occasion_drafts(&store, today(), ArchivalPolicy::default()).await;

        assert_eq!(archived, 2);
        assert_eq!(store.draft(pending).unwrap().status, DraftStatus::Archived);
        assert_eq!(store.draft(approved).unwrap().status, DraftStatus::Archived);
        assert_eq!(store.draft(upcoming).unwrap().status, DraftStatus::Draft);
        assert_eq!(store.draft(on_peak_day).unwrap().status, DraftStatus::Draft);
    }

    #[tokio::test]
    async fn published_drafts_need_explicit_inclusion() {
        let store = MemoryStore::new();
        let published = occasion_draft(&store, today() - Duration::days(3), DraftStatus::Published);

        assert_eq!(
            archive_expired_occasion_drafts(&store, today(), ArchivalPolicy::default()).await,
            0
        );
        assert_eq!(store.draft(published).unwrap().status, DraftStatus::Published);

        let policy = ArchivalPolicy {
            include_published: true,
        };
        assert_eq!(archive_expired_occasion_drafts(&store, today(), policy).await, 1);
        assert_eq!(store.draft(published).unwrap().status, DraftStatus::Archived);
    }

    #[tokio::test]
    async fn listing_failure_archives_nothing() {
        let store = MemoryStore::new();
        occasion_draft(&store, today() - Duration::days(1), DraftStatus::Draft);
        store.fail_reads(true);
        assert_eq!(
            archive_expired_occasion_drafts(&store, today(), ArchivalPolicy::default()).await,
            0
        );
    }

    #[tokio::test]
    async fn row_failures_do_not_stop_the_pass() {
        let store = MemoryStore::new();
        let broken = occasion_draft(&store, today() - Duration::days(2), DraftStatus::Draft);
        let fine = occasion_draft(&store, today() - Duration::days(2), DraftStatus::Draft);
        store.fail_updates_for(broken);

        let archived = archive_expired_occasion_drafts(&store, today(), ArchivalPolicy::default()).await;

        assert_eq!(archived, 1);
        assert_eq!(store.draft(broken).unwrap().status, DraftStatus::Draft);
        assert_eq!(store.draft(fine).unwrap().status, DraftStatus::Archived);
    }
}
