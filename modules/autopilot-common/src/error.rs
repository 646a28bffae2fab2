use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutopilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid status transition for draft {draft_id}: {from} -> {to}")]
    InvalidTransition {
        draft_id: uuid::Uuid,
        from: crate::types::DraftStatus,
        to: crate::types::DraftStatus,
    },

    #[error("Draft not found: {0}")]
    DraftNotFound(uuid::Uuid),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
