//! 工作流类型定义
//!
//! Workflow 独占其全部 Step（按插入顺序 = 执行顺序存放的扁平 arena，用 parent_step_id 组成树），
//! Step 独占其 ToolCall。AgentCall 是委派边的扁平日志，供可视化直接消费。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::AgentKind;
use crate::core::{CoreError, ErrorCode};

pub type WorkflowId = String;
pub type StepId = String;

/// 工作流状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Error)
    }
}

/// Step 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error | StepStatus::Skipped)
    }
}

/// 错误负载：`{"code": "DelegationDepthExceeded", "message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&CoreError> for ErrorPayload {
    fn from(err: &CoreError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// 工具调用结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Ok { output: Value },
    Error { error: ErrorPayload },
}

impl ToolResult {
    pub fn error(err: &CoreError) -> Self {
        ToolResult::Error { error: err.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error { .. })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            ToolResult::Error { error } => Some(error.code),
            ToolResult::Ok { .. } => None,
        }
    }
}

/// Step 内的一次工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub tool: String,
    pub arguments: Value,
    pub result: ToolResult,
    pub started_at: i64,
    pub completed_at: i64,
    /// call_agent 成功创建的子 Step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_step_id: Option<StepId>,
}

impl ToolCall {
    /// 调用在执行前即被拒绝（未知工具、参数不合法、目标 Agent 未注册、委派守卫）
    pub fn was_rejected(&self) -> bool {
        matches!(
            self.result.error_code(),
            Some(
                ErrorCode::UnknownTool
                    | ErrorCode::UnknownAgent
                    | ErrorCode::InvalidArguments
                    | ErrorCode::DelegationDepthExceeded
                    | ErrorCode::StepCountExceeded
                    | ErrorCode::DelegationCycleDetected
            )
        )
    }
}

/// 一个 Agent 在工作流中的一轮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    pub agent: AgentKind,
    /// Agent 被要求做的事
    pub action: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_step_id: Option<StepId>,
    /// 委派深度，根 Step 为 0
    pub depth: usize,
    /// Agent 结论输出（即父 call_agent 的结果）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Step {
    pub fn new(agent: AgentKind, action: impl Into<String>, parent: Option<&Step>) -> Self {
        Self {
            id: format!("step_{}", uuid::Uuid::new_v4()),
            agent,
            action: action.into(),
            status: StepStatus::Pending,
            reasoning: None,
            tool_calls: Vec::new(),
            started_at: now_millis(),
            completed_at: None,
            parent_step_id: parent.map(|p| p.id.clone()),
            depth: parent.map_or(0, |p| p.depth + 1),
            output: None,
            error: None,
        }
    }
}

/// 委派边：谁把什么交给了谁，结果如何
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCall {
    pub from: AgentKind,
    pub to: AgentKind,
    pub purpose: String,
    pub result: ToolResult,
    pub parent_step_id: StepId,
    pub child_step_id: StepId,
}

/// 实际发生的 agent × tool 组合（按首次出现顺序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub agent: AgentKind,
    pub tool: String,
    pub count: usize,
}

/// 一次编排运行
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub user_id: String,
    pub course_id: String,
    pub request: String,
    pub status: WorkflowStatus,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub steps: Vec<Step>,
    pub agent_calls: Vec<AgentCall>,
    #[serde(skip)]
    index: HashMap<StepId, usize>,
}

impl Workflow {
    pub fn new(user_id: impl Into<String>, course_id: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            id: format!("wf_{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            course_id: course_id.into(),
            request: request.into(),
            status: WorkflowStatus::Pending,
            started_at: now_millis(),
            completed_at: None,
            steps: Vec::new(),
            agent_calls: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// 追加 Step（插入顺序即执行顺序）
    pub fn push_step(&mut self, step: Step) -> StepId {
        let id = step.id.clone();
        self.index.insert(id.clone(), self.steps.len());
        self.steps.push(step);
        id
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).and_then(|&i| self.steps.get(i))
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        match self.index.get(id) {
            Some(&i) => self.steps.get_mut(i),
            None => None,
        }
    }

    pub fn root(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn children(&self, id: &str) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.parent_step_id.as_deref() == Some(id))
            .collect()
    }

    /// 从各 Step 的 tool_calls 派生 agent × tool 使用汇总；执行前被拒绝的调用不计入
    pub fn tools_used(&self) -> Vec<ToolUsage> {
        let mut usage: Vec<ToolUsage> = Vec::new();
        for step in &self.steps {
            let invoked = step
                .tool_calls
                .iter()
                .filter(|c| !c.was_rejected());
            for call in invoked {
                match usage
                    .iter_mut()
                    .find(|u| u.agent == step.agent && u.tool == call.tool)
                {
                    Some(u) => u.count += 1,
                    None => usage.push(ToolUsage {
                        agent: step.agent,
                        tool: call.tool.clone(),
                        count: 1,
                    }),
                }
            }
        }
        usage
    }

    /// 反序列化后重建 id 索引
    pub fn reindex(&mut self) {
        self.index = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
    }
}

impl PartialEq for Workflow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.user_id == other.user_id
            && self.course_id == other.course_id
            && self.request == other.request
            && self.status == other.status
            && self.started_at == other.started_at
            && self.completed_at == other.completed_at
            && self.steps == other.steps
            && self.agent_calls == other.agent_calls
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
