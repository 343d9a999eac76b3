//! Agent 行为抽象
//!
//! 每个 Agent 的"推理"是可插拔的黑盒（可能走网络、可能很慢、可能失败）：
//! invoke 产出推理文本与工具调用请求；工具全部执行完后 conclude 看到所有结果并给出最终结论。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::academic::CourseContext;
use crate::agents::AgentKind;
use crate::workflow::ToolCall;

/// 交给 Agent 的一次任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub workflow_id: String,
    pub step_id: String,
    pub agent: AgentKind,
    /// 用户原始请求
    pub user_request: String,
    /// 本 Step 要做的事（根 Step 即用户请求，委派 Step 为 call_agent 的 task）
    pub task: String,
    /// 委派深度，根 Step 为 0
    pub depth: usize,
    /// 委派来源 Agent
    pub delegated_by: Option<AgentKind>,
}

/// Agent 请求的一次工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    /// 构造 call_agent 请求
    pub fn delegate(agent: AgentKind, task: impl Into<String>) -> Self {
        Self::new(
            crate::tools::CALL_AGENT,
            serde_json::json!({ "agent": agent.as_str(), "task": task.into() }),
        )
    }
}

/// Agent 自身的完成状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Error { reason: String },
}

/// 一轮推理的产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTurn {
    pub reasoning: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    pub outcome: TurnOutcome,
}

impl AgentTurn {
    pub fn completed(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            tool_calls: Vec::new(),
            outcome: TurnOutcome::Completed,
        }
    }

    pub fn failed(reasoning: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            tool_calls: Vec::new(),
            outcome: TurnOutcome::Error {
                reason: reason.into(),
            },
        }
    }

    pub fn with_call(mut self, request: ToolCallRequest) -> Self {
        self.tool_calls.push(request);
        self
    }
}

/// 工具执行完毕后的最终结论：决定 Step 状态，output 作为 Step 输出（即父 call_agent 的结果）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConclusion {
    pub outcome: TurnOutcome,
    pub output: Value,
}

/// Agent 行为提供方
#[async_trait]
pub trait AgentBehavior: Send + Sync {
    /// 执行一轮推理；Err 表示提供方自身出错（网络、限流等），可被有界重试
    async fn invoke(&self, task: &AgentTask, context: &CourseContext) -> Result<AgentTurn, String>;

    /// 看到全部工具结果后给出结论；默认沿用 invoke 的状态，输出推理与工具结果
    async fn conclude(
        &self,
        task: &AgentTask,
        turn: &AgentTurn,
        results: &[ToolCall],
        _context: &CourseContext,
    ) -> Result<StepConclusion, String> {
        let results: Vec<Value> = results
            .iter()
            .map(|call| serde_json::json!({ "tool": call.tool, "result": call.result }))
            .collect();
        Ok(StepConclusion {
            outcome: turn.outcome.clone(),
            output: serde_json::json!({
                "agent": task.agent,
                "reasoning": turn.reasoning,
                "results": results,
            }),
        })
    }
}
