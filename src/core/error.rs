//! 核心错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 CoreError 决定 Retry / Record / Abort。
//! ErrorCode 是可序列化的错误码，写入 ToolCall / Step 的错误负载，供可视化端展示。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 编排核心运行过程中可能出现的错误（委派守卫、超时、取消、工具、存储等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Delegation depth exceeded: depth {attempted} > max {max}")]
    DelegationDepthExceeded { attempted: usize, max: usize },

    #[error("Step count exceeded: workflow already has {current} steps (max {max})")]
    StepCountExceeded { current: usize, max: usize },

    #[error("Delegation cycle detected: {agent} is already working on \"{task}\"")]
    DelegationCycleDetected { agent: String, task: String },

    #[error("Step timed out after {0}ms")]
    StepTimeout(u64),

    #[error("Cancelled")]
    Cancelled,

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// Agent 自身声明失败，或行为提供方在重试后仍报错
    #[error("Agent failed: {0}")]
    AgentFailed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// 可序列化错误码（与 CoreError 变体一一对应，不含字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    UnknownAgent,
    UnknownTool,
    DelegationDepthExceeded,
    StepCountExceeded,
    DelegationCycleDetected,
    StepTimeout,
    Cancelled,
    UnsupportedAction,
    ToolExecutionFailed,
    AgentFailed,
    InvalidArguments,
    InvalidRequest,
    WorkflowNotFound,
    Store,
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::UnknownAgent(_) => ErrorCode::UnknownAgent,
            CoreError::UnknownTool(_) => ErrorCode::UnknownTool,
            CoreError::DelegationDepthExceeded { .. } => ErrorCode::DelegationDepthExceeded,
            CoreError::StepCountExceeded { .. } => ErrorCode::StepCountExceeded,
            CoreError::DelegationCycleDetected { .. } => ErrorCode::DelegationCycleDetected,
            CoreError::StepTimeout(_) => ErrorCode::StepTimeout,
            CoreError::Cancelled => ErrorCode::Cancelled,
            CoreError::UnsupportedAction(_) => ErrorCode::UnsupportedAction,
            CoreError::ToolExecutionFailed(_) => ErrorCode::ToolExecutionFailed,
            CoreError::AgentFailed(_) => ErrorCode::AgentFailed,
            CoreError::InvalidArguments(_) => ErrorCode::InvalidArguments,
            CoreError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            CoreError::WorkflowNotFound(_) => ErrorCode::WorkflowNotFound,
            CoreError::Store(_) => ErrorCode::Store,
        }
    }

    /// 委派守卫（深度 / 步数 / 环）触发的错误，永不重试
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            CoreError::DelegationDepthExceeded { .. }
                | CoreError::StepCountExceeded { .. }
                | CoreError::DelegationCycleDetected { .. }
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 等待 backoff 后重试同一调用（瞬时失败）
    Retry { backoff_ms: u64 },
    /// 记录为失败结果，交给上层（Agent 下一轮或父 Step）处理
    Record,
    /// 立即终止，不重试（守卫、取消）
    Abort,
}
