pub mod engine;
pub mod order;

pub use engine::{DraftEngine, DraftReadiness, DraftStatusView, DraftSummary, PickOutcome};
