pub mod brief;
pub mod content_type;
pub mod dedup;
pub mod deps;
pub mod lifecycle;
pub mod materializer;
pub mod pacer;
pub mod plan_gate;
pub mod recheck;
pub mod review;
pub mod store;
pub mod sweep;
pub mod traits;
pub mod visibility;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use brief::{BriefWriter, GenerationCapability, GenerationError};
pub use dedup::{DedupOutcome, Deduplicator};
pub use deps::AutopilotDeps;
pub use lifecycle::{archive_expired_occasion_drafts, ArchivalPolicy};
pub use materializer::{MaterializeError, Materializer};
pub use pacer::CallPacer;
pub use recheck::RecheckScheduler;
pub use store::PgStore;
pub use sweep::Autopilot;
pub use traits::*;
