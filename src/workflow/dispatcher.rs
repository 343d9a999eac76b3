//! Dispatcher：执行一个 Agent 的一轮
//!
//! 查找 Agent 描述、调用其可插拔行为、按 ToolRegistry 校验返回的工具调用请求。
//! 不执行工具，也不做业务逻辑；工具与委派由引擎按序执行。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::academic::CourseContext;
use crate::agents::{AgentKind, AgentRegistry, AgentTask, AgentTurn, StepConclusion, ToolCallRequest};
use crate::core::{CoreError, RecoveryAction, RecoveryEngine};
use crate::tools::ToolRegistry;
use crate::workflow::types::ToolCall;

/// 校验后的工具调用请求
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchedCall {
    Accepted(ToolCallRequest),
    /// 形状不合法的请求：记录为错误 ToolCall，不抛出
    Rejected {
        request: ToolCallRequest,
        error: CoreError,
    },
}

impl DispatchedCall {
    pub fn request(&self) -> &ToolCallRequest {
        match self {
            DispatchedCall::Accepted(request) => request,
            DispatchedCall::Rejected { request, .. } => request,
        }
    }
}

/// 一轮的调度结果
#[derive(Debug, Clone)]
pub struct DispatchTurn {
    pub turn: AgentTurn,
    pub calls: Vec<DispatchedCall>,
}

pub struct Dispatcher {
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    recovery: RecoveryEngine,
}

impl Dispatcher {
    pub fn new(agents: Arc<AgentRegistry>, tools: Arc<ToolRegistry>, recovery: RecoveryEngine) -> Self {
        Self {
            agents,
            tools,
            recovery,
        }
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// 运行 Agent 的推理轮并校验其工具调用请求
    pub async fn run(
        &self,
        agent: AgentKind,
        task: &AgentTask,
        context: &CourseContext,
    ) -> Result<DispatchTurn, CoreError> {
        let registered = self
            .agents
            .get(agent)
            .ok_or_else(|| CoreError::UnknownAgent(agent.to_string()))?;
        let behavior = registered.behavior.clone();

        let turn = self
            .with_retries(agent, "invoke", || behavior.invoke(task, context))
            .await?;

        let calls = turn
            .tool_calls
            .iter()
            .cloned()
            .map(|request| {
                if !self.tools.contains(&request.tool) {
                    let error = CoreError::UnknownTool(request.tool.clone());
                    DispatchedCall::Rejected { request, error }
                } else if !registered.descriptor.allows(&request.tool) {
                    let error = CoreError::UnknownTool(format!(
                        "{} is not available to agent {}",
                        request.tool, agent
                    ));
                    DispatchedCall::Rejected { request, error }
                } else {
                    DispatchedCall::Accepted(request)
                }
            })
            .collect::<Vec<_>>();

        let rejected = calls
            .iter()
            .filter(|c| matches!(c, DispatchedCall::Rejected { .. }))
            .count();
        if rejected > 0 {
            tracing::debug!(agent = %agent, rejected, "Rejected tool call requests");
        }

        Ok(DispatchTurn { turn, calls })
    }

    /// 工具结果齐备后，让 Agent 给出结论
    pub async fn conclude(
        &self,
        agent: AgentKind,
        task: &AgentTask,
        turn: &AgentTurn,
        results: &[ToolCall],
        context: &CourseContext,
    ) -> Result<StepConclusion, CoreError> {
        let behavior = self
            .agents
            .get(agent)
            .map(|a| a.behavior.clone())
            .ok_or_else(|| CoreError::UnknownAgent(agent.to_string()))?;
        self.with_retries(agent, "conclude", || behavior.conclude(task, turn, results, context))
            .await
    }

    async fn with_retries<T, F, Fut>(&self, agent: AgentKind, phase: &str, mut call: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(reason) => CoreError::AgentFailed(reason),
            };
            attempt += 1;
            match self.recovery.handle(&err, attempt) {
                RecoveryAction::Retry { backoff_ms } => {
                    tracing::warn!(agent = %agent, phase, attempt, error = %err, "Agent provider failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                RecoveryAction::Record | RecoveryAction::Abort => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentDescriptor, ScriptedAgent};
    use crate::tools::builtin_registry;

    fn dispatcher(agents: AgentRegistry, retries: u32) -> Dispatcher {
        Dispatcher::new(
            Arc::new(agents),
            Arc::new(builtin_registry()),
            RecoveryEngine::new(retries, 0),
        )
    }

    fn task(agent: AgentKind) -> AgentTask {
        AgentTask {
            workflow_id: "wf".to_string(),
            step_id: "step".to_string(),
            agent,
            user_request: "help".to_string(),
            task: "help".to_string(),
            depth: 0,
            delegated_by: None,
        }
    }

    #[tokio::test]
    async fn test_unknown_agent_rejected() {
        let d = dispatcher(AgentRegistry::new(), 0);
        let ctx = CourseContext::empty("u1", "c1");
        let err = d.run(AgentKind::Campus, &task(AgentKind::Campus), &ctx).await.unwrap_err();
        assert_eq!(err, CoreError::UnknownAgent("campus".to_string()));
    }

    #[tokio::test]
    async fn test_validates_tool_names_against_registry_and_descriptor() {
        let turn = AgentTurn::completed("looking around")
            .with_call(ToolCallRequest::new("teleport", serde_json::json!({})))
            .with_call(ToolCallRequest::new("find_materials", serde_json::json!({"query": "x"})))
            .with_call(ToolCallRequest::new("course_overview", serde_json::json!({})));
        let mut descriptor = AgentDescriptor::builtin(AgentKind::Course);
        descriptor.allowed_tools = vec!["course_overview".to_string()];
        let mut agents = AgentRegistry::new();
        agents.register(descriptor, ScriptedAgent::new(turn));

        let d = dispatcher(agents, 0);
        let ctx = CourseContext::empty("u1", "c1");
        let out = d.run(AgentKind::Course, &task(AgentKind::Course), &ctx).await.unwrap();

        assert_eq!(out.calls.len(), 3);
        match &out.calls[0] {
            DispatchedCall::Rejected { error, .. } => {
                assert_eq!(*error, CoreError::UnknownTool("teleport".to_string()))
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        match &out.calls[1] {
            DispatchedCall::Rejected { error, .. } => {
                assert!(error.to_string().contains("not available to agent course"))
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(matches!(out.calls[2], DispatchedCall::Accepted(_)));
    }

    #[tokio::test]
    async fn test_retries_provider_failure() {
        let agent = Arc::new(ScriptedAgent::completed("ok").failing_first(1));
        let mut agents = AgentRegistry::new();
        agents.register_arc(AgentDescriptor::builtin(AgentKind::Notes), agent.clone());

        let d = dispatcher(agents, 1);
        let ctx = CourseContext::empty("u1", "c1");
        let out = d.run(AgentKind::Notes, &task(AgentKind::Notes), &ctx).await.unwrap();
        assert_eq!(out.turn.reasoning, "ok");
        assert_eq!(agent.invocations(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_agent_failed() {
        let agent = Arc::new(ScriptedAgent::completed("ok").failing_first(5));
        let mut agents = AgentRegistry::new();
        agents.register_arc(AgentDescriptor::builtin(AgentKind::Notes), agent.clone());

        let d = dispatcher(agents, 2);
        let ctx = CourseContext::empty("u1", "c1");
        let err = d.run(AgentKind::Notes, &task(AgentKind::Notes), &ctx).await.unwrap_err();
        assert_eq!(err.code(), crate::core::ErrorCode::AgentFailed);
        assert_eq!(agent.invocations(), 3);
    }
}
