//! 工作流过程事件：用于流式展示 Step 树的生长、工具调用与最终状态

use serde::Serialize;

use crate::agents::AgentKind;
use crate::workflow::types::{ErrorPayload, StepId, StepStatus, ToolResult, WorkflowId, WorkflowStatus};

/// 引擎广播的过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// 工作流开始运行
    WorkflowStarted {
        workflow_id: WorkflowId,
        agent: AgentKind,
        request: String,
    },
    /// Step 进入 running
    StepStarted {
        workflow_id: WorkflowId,
        step_id: StepId,
        agent: AgentKind,
        parent_step_id: Option<StepId>,
        depth: usize,
    },
    /// 一次工具调用已记录（含被拒绝的委派）
    ToolCallRecorded {
        workflow_id: WorkflowId,
        step_id: StepId,
        tool: String,
        result: ToolResult,
    },
    /// Step 结束
    StepFinished {
        workflow_id: WorkflowId,
        step_id: StepId,
        status: StepStatus,
        error: Option<ErrorPayload>,
    },
    /// 工作流结束
    WorkflowFinished {
        workflow_id: WorkflowId,
        status: WorkflowStatus,
    },
}

impl WorkflowEvent {
    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::WorkflowStarted { workflow_id, .. }
            | WorkflowEvent::StepStarted { workflow_id, .. }
            | WorkflowEvent::ToolCallRecorded { workflow_id, .. }
            | WorkflowEvent::StepFinished { workflow_id, .. }
            | WorkflowEvent::WorkflowFinished { workflow_id, .. } => workflow_id,
        }
    }
}
