pub mod builder;
pub mod dispatcher;
pub mod engine;
pub mod events;
pub mod graph;
pub mod handle;
pub mod trace;
pub mod types;

pub use builder::{WorkflowLimits, WorkflowRequest, WorkflowRequestBuilder};
pub use dispatcher::{DispatchTurn, DispatchedCall, Dispatcher};
pub use engine::WorkflowEngine;
pub use events::WorkflowEvent;
pub use graph::{task_signature, StepTree};
pub use handle::WorkflowHandle;
pub use trace::{WorkflowSummary, WorkflowTrace};
pub use types::*;
