//! 可视化投影：工作流快照 + 委派日志 + 工具使用汇总

use serde::Serialize;

use crate::workflow::types::{AgentCall, ToolUsage, Workflow, WorkflowId, WorkflowStatus};

/// 供可视化端直接消费的只读视图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTrace {
    pub workflow: Workflow,
    pub agent_calls: Vec<AgentCall>,
    pub tools_used: Vec<ToolUsage>,
}

impl From<Workflow> for WorkflowTrace {
    fn from(workflow: Workflow) -> Self {
        let agent_calls = workflow.agent_calls.clone();
        let tools_used = workflow.tools_used();
        Self {
            workflow,
            agent_calls,
            tools_used,
        }
    }
}

/// list() 返回的摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub user_id: String,
    pub course_id: String,
    pub request: String,
    pub status: WorkflowStatus,
    pub step_count: usize,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(wf: &Workflow) -> Self {
        Self {
            id: wf.id.clone(),
            user_id: wf.user_id.clone(),
            course_id: wf.course_id.clone(),
            request: wf.request.clone(),
            status: wf.status,
            step_count: wf.steps.len(),
            started_at: wf.started_at,
            completed_at: wf.completed_at,
        }
    }
}
