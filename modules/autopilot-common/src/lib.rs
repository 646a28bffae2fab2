pub mod config;
pub mod error;
pub mod stats;
pub mod types;

pub use config::Config;
pub use error::AutopilotError;
pub use stats::{RecheckSummary, SweepStats};
pub use types::*;
