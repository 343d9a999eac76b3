pub mod board;
pub mod detector;
pub mod executor;
pub mod rules;
pub mod types;

pub use board::ActionBoard;
pub use detector::Detector;
pub use executor::AutoActionExecutor;
pub use rules::{default_rules, DetectionRule};
pub use types::{
    clamp_confidence, ActionPayload, ActionPriority, ActionType, AutoAction, MutationSummary,
};
