//! Human review actions on pending drafts.
//!
//! The autopilot never approves or publishes on its own. These are the only
//! paths that move a draft past `draft`, and each one is a compare-and-set so
//! a concurrent reviewer cannot regress a status.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use autopilot_common::{AutopilotError, ContentDraft, DraftStatus, RecheckTask};

use crate::traits::DraftStore;

type Result<T> = std::result::Result<T, AutopilotError>;

pub async fn approve(store: &dyn DraftStore, draft_id: Uuid, now: DateTime<Utc>) -> Result<ContentDraft> {
    transition(store, draft_id, DraftStatus::Approved, now).await
}

pub async fn reject(store: &dyn DraftStore, draft_id: Uuid, now: DateTime<Utc>) -> Result<ContentDraft> {
    transition(store, draft_id, DraftStatus::Rejected, now).await
}

pub async fn archive(store: &dyn DraftStore, draft_id: Uuid, now: DateTime<Utc>) -> Result<ContentDraft> {
    transition(store, draft_id, DraftStatus::Archived, now).await
}

/// Publish an approved draft and queue its visibility recheck.
pub async fn publish(store: &dyn DraftStore, draft_id: Uuid, now: DateTime<Utc>) -> Result<ContentDraft> {
    let draft = transition(store, draft_id, DraftStatus::Published, now).await?;

    match RecheckTask::for_published(&draft, now) {
        Some(task) => store.enqueue_recheck(&task).await?,
        None => warn!(draft_id = %draft.id, "Published draft has no target prompt, no recheck queued"),
    }
    Ok(draft)
}

async fn transition(
    store: &dyn DraftStore,
    draft_id: Uuid,
    to: DraftStatus,
    now: DateTime<Utc>,
) -> Result<ContentDraft> {
    let draft = store
        .get_draft(draft_id)
        .await?
        .ok_or(AutopilotError::DraftNotFound(draft_id))?;

    let from = draft.status;
    if !from.can_transition_to(to) {
        return Err(AutopilotError::InvalidTransition { draft_id, from, to });
    }

    if !store.set_status(draft_id, from, to, now).await? {
        // Someone else moved it between our read and write.
        let current = store
            .get_draft(draft_id)
            .await?
            .map(|d| d.status)
            .unwrap_or(from);
        return Err(AutopilotError::InvalidTransition {
            draft_id,
            from: current,
            to,
        });
    }

    info!(draft_id = %draft_id, from = %from, to = %to, "Draft status changed");

    store
        .get_draft(draft_id)
        .await?
        .ok_or(AutopilotError::DraftNotFound(draft_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{competitor_trigger, draft_for, MemoryStore};

    fn pending(store: &MemoryStore) -> Uuid {
        let trigger = competitor_trigger(Uuid::new_v4(), Uuid::new_v4(), "hookah near me").with_source("q-1");
        let draft = draft_for(&trigger, Utc::now());
        let id = draft.id;
        store.seed_draft(draft);
        id
    }

    #[tokio::test]
    async fn approve_then_publish_queues_a_recheck() {
        let store = MemoryStore::new();
        let id = pending(&store);

        let approved = approve(&store, id, Utc::now()).await.unwrap();
        assert_eq!(approved.status, DraftStatus::Approved);
        assert!(approved.human_approved);
        assert!(store.tasks().is_empty());

        let published = publish(&store, id, Utc::now()).await.unwrap();
        assert_eq!(published.status, DraftStatus::Published);
        assert!(published.published_at.is_some());

        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].draft_id, id);
        assert_eq!(tasks[0].target_query, "hookah near me");
    }

    #[tokio::test]
    async fn unapproved_drafts_cannot_be_published() {
        let store = MemoryStore::new();
        let id = pending(&store);

        let err = publish(&store, id, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            AutopilotError::InvalidTransition {
                from: DraftStatus::Draft,
                to: DraftStatus::Published,
                ..
            }
        ));
        assert_eq!(store.draft(id).unwrap().status, DraftStatus::Draft);
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn rejected_is_terminal() {
        let store = MemoryStore::new();
        let id = pending(&store);

        reject(&store, id, Utc::now()).await.unwrap();
        assert!(approve(&store, id, Utc::now()).await.is_err());
        assert!(archive(&store, id, Utc::now()).await.is_err());
        assert_eq!(store.draft(id).unwrap().status, DraftStatus::Rejected);
    }

    #[tokio::test]
    async fn unknown_draft_is_not_found() {
        let store = MemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            approve(&store, missing, Utc::now()).await.unwrap_err(),
            AutopilotError::DraftNotFound(id) if id == missing
        ));
    }
}
