//! Agent 层：封闭的 Agent 集合、行为抽象、注册表与脚本化实现

pub mod registry;
pub mod scripted;
pub mod traits;
pub mod types;

pub use registry::{AgentRegistry, RegisteredAgent};
pub use scripted::{FnAgent, ScriptedAgent};
pub use traits::{AgentBehavior, AgentTask, AgentTurn, StepConclusion, ToolCallRequest, TurnOutcome};
pub use types::{AgentDescriptor, AgentKind};
