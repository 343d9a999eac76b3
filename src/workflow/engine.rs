//! 工作流引擎
//!
//! 核心执行引擎，管理工作流生命周期与 Step 的递归执行。
//!
//! - 每次 start() 在独立的 tokio 任务中运行；工作流之间只共享引擎表的短暂查找锁
//! - 单个工作流内 Step 深度优先、严格按 Agent 发出工具调用的顺序执行
//! - call_agent 在引擎内完成：参数 → Agent 已注册 → 深度 → 步数 → 环 守卫通过后创建子 Step 并递归
//! - 取消令牌沿递归链传递，在 Step 开始前与工具调用之间检查；进行中的工具调用不被打断

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::{broadcast, watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::academic::{AcademicStore, CourseContext};
use crate::agents::{AgentKind, AgentTask, ToolCallRequest, TurnOutcome};
use crate::core::{CoreError, WorkflowSupervisor};
use crate::tools::{CallAgentArgs, ToolContext, ToolExecutor, CALL_AGENT};
use crate::workflow::builder::{WorkflowLimits, WorkflowRequest};
use crate::workflow::dispatcher::{DispatchedCall, Dispatcher};
use crate::workflow::events::WorkflowEvent;
use crate::workflow::graph::StepTree;
use crate::workflow::handle::WorkflowHandle;
use crate::workflow::trace::{WorkflowSummary, WorkflowTrace};
use crate::workflow::types::*;

const PANICKED: &str = "agent panicked";

/// 单个工作流的运行单元：独立的锁、取消令牌与状态通道
pub(crate) struct WorkflowCell {
    pub(crate) workflow: RwLock<Workflow>,
    pub(crate) token: CancellationToken,
    pub(crate) status_tx: watch::Sender<WorkflowStatus>,
}

impl WorkflowCell {
    pub(crate) async fn snapshot(&self) -> Workflow {
        self.workflow.read().await.clone()
    }
}

/// 一次运行期间不变的上下文
struct RunContext {
    cell: Arc<WorkflowCell>,
    workflow_id: WorkflowId,
    user_id: String,
    course_id: String,
    user_request: String,
    snapshot: Arc<CourseContext>,
    limits: WorkflowLimits,
}

struct EngineInner {
    dispatcher: Dispatcher,
    executor: ToolExecutor,
    store: Arc<dyn AcademicStore>,
    supervisor: WorkflowSupervisor,
    limits: WorkflowLimits,
    workflows: RwLock<HashMap<WorkflowId, Arc<WorkflowCell>>>,
    events: broadcast::Sender<WorkflowEvent>,
}

/// 工作流引擎（可廉价克隆，内部共享）
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    /// 创建新的工作流引擎
    pub fn new(
        dispatcher: Dispatcher,
        executor: ToolExecutor,
        store: Arc<dyn AcademicStore>,
        limits: WorkflowLimits,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            inner: Arc::new(EngineInner {
                dispatcher,
                executor,
                store,
                supervisor: WorkflowSupervisor::new(),
                limits,
                workflows: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn limits(&self) -> WorkflowLimits {
        self.inner.limits
    }

    /// 启动工作流：创建 running 状态的 Workflow 与根 Step，在独立任务中执行，立即返回句柄
    pub async fn start(&self, request: WorkflowRequest) -> Result<WorkflowHandle, CoreError> {
        let limits = request.limits(self.inner.limits);
        let snapshot = match request.context {
            Some(ctx) => ctx,
            None => {
                self.inner
                    .store
                    .course_context(&request.user_id, &request.course_id)
                    .await?
            }
        };

        let mut workflow = Workflow::new(&request.user_id, &request.course_id, &request.request);
        workflow.status = WorkflowStatus::Running;
        let root_id = workflow.push_step(Step::new(request.initial_agent, &request.request, None));
        let workflow_id = workflow.id.clone();

        let (status_tx, status_rx) = watch::channel(WorkflowStatus::Running);
        let cell = Arc::new(WorkflowCell {
            workflow: RwLock::new(workflow),
            token: self.inner.supervisor.register(&workflow_id),
            status_tx,
        });
        self.inner
            .workflows
            .write()
            .await
            .insert(workflow_id.clone(), Arc::clone(&cell));

        tracing::info!(
            workflow_id = %workflow_id,
            agent = %request.initial_agent,
            user_id = %request.user_id,
            course_id = %request.course_id,
            "Workflow started"
        );
        self.inner.emit(WorkflowEvent::WorkflowStarted {
            workflow_id: workflow_id.clone(),
            agent: request.initial_agent,
            request: request.request.clone(),
        });

        let run = RunContext {
            cell: Arc::clone(&cell),
            workflow_id: workflow_id.clone(),
            user_id: request.user_id,
            course_id: request.course_id,
            user_request: request.request,
            snapshot: Arc::new(snapshot),
            limits,
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(inner.execute_step(&run, root_id.clone()))
                .catch_unwind()
                .await;
            let interrupted = match outcome {
                Ok(_) => CoreError::Cancelled,
                Err(_) => {
                    tracing::error!(workflow_id = %run.workflow_id, "Workflow task panicked");
                    CoreError::AgentFailed(PANICKED.to_string())
                }
            };
            inner.finalize(&run, &root_id, interrupted).await;
        });

        Ok(WorkflowHandle::new(workflow_id, status_rx, cell))
    }

    /// 工作流快照（不可变副本）
    pub async fn get_state(&self, workflow_id: &str) -> Result<Workflow, CoreError> {
        Ok(self.inner.cell(workflow_id).await?.snapshot().await)
    }

    /// 请求协作式取消；已结束的工作流不受影响
    pub async fn cancel(&self, workflow_id: &str) -> Result<(), CoreError> {
        let cell = self.inner.cell(workflow_id).await?;
        if !cell.workflow.read().await.status.is_terminal() {
            tracing::info!(workflow_id = %workflow_id, "Workflow cancellation requested");
            cell.token.cancel();
        }
        Ok(())
    }

    /// 快照 + AgentCall 日志 + 工具使用汇总
    pub async fn trace(&self, workflow_id: &str) -> Result<WorkflowTrace, CoreError> {
        self.get_state(workflow_id).await.map(WorkflowTrace::from)
    }

    /// 所有工作流摘要（按开始时间）
    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let cells: Vec<Arc<WorkflowCell>> = self.inner.workflows.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(cells.len());
        for cell in cells {
            summaries.push(WorkflowSummary::from(&*cell.workflow.read().await));
        }
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// 丢弃已结束的工作流及其整棵 Step 树
    pub async fn discard(&self, workflow_id: &str) -> Result<(), CoreError> {
        let cell = self.inner.cell(workflow_id).await?;
        if !cell.workflow.read().await.status.is_terminal() {
            return Err(CoreError::InvalidRequest(format!(
                "workflow {workflow_id} is still running"
            )));
        }
        self.inner.workflows.write().await.remove(workflow_id);
        tracing::debug!(workflow_id = %workflow_id, "Workflow discarded");
        Ok(())
    }

    /// 订阅过程事件
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    /// 取消所有运行中的工作流
    pub fn shutdown(&self) {
        self.inner.supervisor.shutdown();
    }
}

impl EngineInner {
    async fn cell(&self, workflow_id: &str) -> Result<Arc<WorkflowCell>, CoreError> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| CoreError::WorkflowNotFound(workflow_id.to_string()))
    }

    fn emit(&self, event: WorkflowEvent) {
        // 没有订阅者时 send 返回错误，忽略
        let _ = self.events.send(event);
    }

    /// 递归执行一个 Step，返回其输出（或终止它的错误）
    fn execute_step<'a>(&'a self, run: &'a RunContext, step_id: StepId) -> BoxFuture<'a, Result<Value, CoreError>> {
        async move {
            if run.cell.token.is_cancelled() {
                return self.finish_step(run, &step_id, Err(CoreError::Cancelled), None).await;
            }

            let task = {
                let mut wf = run.cell.workflow.write().await;
                let delegated_by = wf
                    .step(&step_id)
                    .and_then(|s| s.parent_step_id.clone())
                    .and_then(|p| wf.step(&p).map(|parent| parent.agent));
                let Some(step) = wf.step_mut(&step_id) else {
                    return Err(CoreError::InvalidRequest(format!("unknown step {step_id}")));
                };
                step.status = StepStatus::Running;
                step.started_at = now_millis();
                AgentTask {
                    workflow_id: run.workflow_id.clone(),
                    step_id: step_id.clone(),
                    agent: step.agent,
                    user_request: run.user_request.clone(),
                    task: step.action.clone(),
                    depth: step.depth,
                    delegated_by,
                }
            };
            let agent = task.agent;
            let parent_step_id = run
                .cell
                .workflow
                .read()
                .await
                .step(&step_id)
                .and_then(|s| s.parent_step_id.clone());
            tracing::debug!(workflow_id = %run.workflow_id, step_id = %step_id, agent = %agent, depth = task.depth, "Step started");
            self.emit(WorkflowEvent::StepStarted {
                workflow_id: run.workflow_id.clone(),
                step_id: step_id.clone(),
                agent,
                parent_step_id,
                depth: task.depth,
            });

            let dispatched = self
                .guarded(run, self.dispatcher.run(agent, &task, &run.snapshot))
                .await;
            let dispatched = match dispatched {
                Ok(d) => d,
                Err(e) => return self.finish_step(run, &step_id, Err(e), None).await,
            };
            if let Some(step) = run.cell.workflow.write().await.step_mut(&step_id) {
                step.reasoning = Some(dispatched.turn.reasoning.clone());
            }

            let mut results: Vec<ToolCall> = Vec::with_capacity(dispatched.calls.len());
            for call in dispatched.calls.iter().cloned() {
                if run.cell.token.is_cancelled() {
                    return self.finish_step(run, &step_id, Err(CoreError::Cancelled), None).await;
                }
                let record = match call {
                    DispatchedCall::Rejected { request, error } => rejected_call(request, &error, now_millis()),
                    DispatchedCall::Accepted(request) if request.tool == CALL_AGENT => {
                        self.delegate(run, &step_id, agent, request).await
                    }
                    DispatchedCall::Accepted(request) => self.invoke_tool(run, agent, request).await,
                };
                if let Some(step) = run.cell.workflow.write().await.step_mut(&step_id) {
                    step.tool_calls.push(record.clone());
                }
                self.emit(WorkflowEvent::ToolCallRecorded {
                    workflow_id: run.workflow_id.clone(),
                    step_id: step_id.clone(),
                    tool: record.tool.clone(),
                    result: record.result.clone(),
                });
                results.push(record);
            }

            if run.cell.token.is_cancelled() {
                return self.finish_step(run, &step_id, Err(CoreError::Cancelled), None).await;
            }
            let conclusion = self
                .guarded(
                    run,
                    self.dispatcher
                        .conclude(agent, &task, &dispatched.turn, &results, &run.snapshot),
                )
                .await;
            match conclusion {
                Ok(c) => match c.outcome {
                    TurnOutcome::Completed => self.finish_step(run, &step_id, Ok(c.output.clone()), Some(c.output)).await,
                    TurnOutcome::Error { reason } => {
                        self.finish_step(run, &step_id, Err(CoreError::AgentFailed(reason)), Some(c.output))
                            .await
                    }
                },
                Err(e) => self.finish_step(run, &step_id, Err(e), None).await,
            }
        }
        .boxed()
    }

    /// 对一次 Dispatcher 调用施加单步超时，并在取消时放弃等待；Agent 行为 panic 记为 AgentFailed
    async fn guarded<T, F>(&self, run: &RunContext, call: F) -> Result<T, CoreError>
    where
        F: std::future::Future<Output = Result<T, CoreError>>,
    {
        let limit = run.limits.step_timeout;
        tokio::select! {
            _ = run.cell.token.cancelled() => Err(CoreError::Cancelled),
            result = tokio::time::timeout(limit, AssertUnwindSafe(call).catch_unwind()) => match result {
                Ok(Ok(inner)) => inner,
                Ok(Err(_)) => {
                    tracing::error!(workflow_id = %run.workflow_id, "Agent behavior panicked");
                    Err(CoreError::AgentFailed(PANICKED.to_string()))
                }
                Err(_) => Err(CoreError::StepTimeout(limit.as_millis() as u64)),
            },
        }
    }

    /// 普通工具调用：失败只记录在该 ToolCall 上
    async fn invoke_tool(&self, run: &RunContext, agent: AgentKind, request: ToolCallRequest) -> ToolCall {
        let started_at = now_millis();
        let ctx = ToolContext {
            user_id: run.user_id.clone(),
            course_id: run.course_id.clone(),
            agent,
            snapshot: Arc::clone(&run.snapshot),
            store: Arc::clone(&self.store),
        };
        let result = match self
            .executor
            .execute(&request.tool, request.arguments.clone(), &ctx)
            .await
        {
            Ok(output) => ToolResult::Ok { output },
            Err(e) => {
                tracing::warn!(workflow_id = %run.workflow_id, agent = %agent, tool = %request.tool, error = %e, "Tool call failed");
                ToolResult::error(&e)
            }
        };
        ToolCall {
            tool: request.tool,
            arguments: request.arguments,
            result,
            started_at,
            completed_at: now_millis().max(started_at),
            child_step_id: None,
        }
    }

    /// call_agent：守卫通过则创建子 Step 并递归，子 Step 的结果即本 ToolCall 的结果
    async fn delegate(
        &self,
        run: &RunContext,
        parent_step_id: &str,
        from: AgentKind,
        request: ToolCallRequest,
    ) -> ToolCall {
        let started_at = now_millis();
        let args = match CallAgentArgs::parse(&request.arguments) {
            Ok(args) => args,
            Err(e) => return rejected_call(request, &e, started_at),
        };
        let target = match args.agent.parse::<AgentKind>() {
            Ok(kind) if self.dispatcher.agents().contains(kind) => kind,
            _ => return rejected_call(request, &CoreError::UnknownAgent(args.agent.clone()), started_at),
        };

        let admitted = {
            let mut wf = run.cell.workflow.write().await;
            self.admit_child(&mut wf, &run.limits, parent_step_id, target, &args.task)
        };
        let child_id = match admitted {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    workflow_id = %run.workflow_id,
                    step_id = %parent_step_id,
                    from = %from,
                    to = %target,
                    error = %e,
                    "Delegation rejected"
                );
                return rejected_call(request, &e, started_at);
            }
        };

        let result = match self.execute_step(run, child_id.clone()).await {
            Ok(output) => ToolResult::Ok { output },
            Err(e) => ToolResult::error(&e),
        };
        run.cell.workflow.write().await.agent_calls.push(AgentCall {
            from,
            to: target,
            purpose: args.task,
            result: result.clone(),
            parent_step_id: parent_step_id.to_string(),
            child_step_id: child_id.clone(),
        });

        ToolCall {
            tool: request.tool,
            arguments: request.arguments,
            result,
            started_at,
            completed_at: now_millis().max(started_at),
            child_step_id: Some(child_id),
        }
    }

    /// 深度 → 步数 → 环；全部通过才在同一把锁内追加子 Step
    fn admit_child(
        &self,
        wf: &mut Workflow,
        limits: &WorkflowLimits,
        parent_step_id: &str,
        target: AgentKind,
        task: &str,
    ) -> Result<StepId, CoreError> {
        let parent = wf
            .step(parent_step_id)
            .ok_or_else(|| CoreError::InvalidRequest(format!("unknown step {parent_step_id}")))?;
        let attempted = parent.depth + 1;
        if attempted > limits.max_depth {
            return Err(CoreError::DelegationDepthExceeded {
                attempted,
                max: limits.max_depth,
            });
        }
        if wf.steps.len() + 1 > limits.max_steps {
            return Err(CoreError::StepCountExceeded {
                current: wf.steps.len(),
                max: limits.max_steps,
            });
        }
        if StepTree::new(wf).has_active_duplicate(parent_step_id, target, task) {
            return Err(CoreError::DelegationCycleDetected {
                agent: target.to_string(),
                task: task.to_string(),
            });
        }
        let child = Step::new(target, task, Some(parent));
        Ok(wf.push_step(child))
    }

    /// 写入 Step 终态并广播
    async fn finish_step(
        &self,
        run: &RunContext,
        step_id: &str,
        result: Result<Value, CoreError>,
        output: Option<Value>,
    ) -> Result<Value, CoreError> {
        let (status, error) = match &result {
            Ok(_) => (StepStatus::Completed, None),
            Err(e) => (StepStatus::Error, Some(ErrorPayload::from(e))),
        };
        if let Some(step) = run.cell.workflow.write().await.step_mut(step_id) {
            step.status = status;
            step.error = error.clone();
            step.output = output;
            step.completed_at = Some(now_millis().max(step.started_at));
        }
        match &result {
            Ok(_) => tracing::debug!(workflow_id = %run.workflow_id, step_id = %step_id, "Step completed"),
            Err(e) => tracing::info!(workflow_id = %run.workflow_id, step_id = %step_id, error = %e, "Step failed"),
        }
        self.emit(WorkflowEvent::StepFinished {
            workflow_id: run.workflow_id.clone(),
            step_id: step_id.to_string(),
            status,
            error,
        });
        result
    }

    /// 根 Step 结束后收尾：以 interrupted 清扫未结束的 Step，由根 Step 决定工作流状态
    async fn finalize(&self, run: &RunContext, root_id: &str, interrupted: CoreError) {
        let status = {
            let mut wf = run.cell.workflow.write().await;
            let now = now_millis();
            let payload = ErrorPayload::from(&interrupted);
            for step in wf.steps.iter_mut().filter(|s| !s.status.is_terminal()) {
                step.status = StepStatus::Error;
                step.error = Some(payload.clone());
                step.completed_at = Some(now.max(step.started_at));
            }
            let (root_status, root_completed) = wf
                .step(root_id)
                .map(|root| (root.status, root.completed_at))
                .unwrap_or((StepStatus::Error, None));
            wf.status = if root_status == StepStatus::Completed {
                WorkflowStatus::Completed
            } else {
                WorkflowStatus::Error
            };
            wf.completed_at = Some(root_completed.unwrap_or(now).max(wf.started_at));
            wf.status
        };

        self.supervisor.release(&run.workflow_id);
        tracing::info!(workflow_id = %run.workflow_id, status = ?status, "Workflow finished");
        self.emit(WorkflowEvent::WorkflowFinished {
            workflow_id: run.workflow_id.clone(),
            status,
        });
        run.cell.status_tx.send_replace(status);
    }
}

/// 未执行即被拒绝的工具调用
fn rejected_call(request: ToolCallRequest, error: &CoreError, started_at: i64) -> ToolCall {
    ToolCall {
        tool: request.tool,
        arguments: request.arguments,
        result: ToolResult::error(error),
        started_at,
        completed_at: now_millis().max(started_at),
        child_step_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::InMemoryAcademicStore;
    use crate::agents::{AgentDescriptor, AgentRegistry, AgentTurn, FnAgent, ScriptedAgent};
    use crate::core::RecoveryEngine;
    use crate::tools::builtin_registry;
    use std::time::Duration;

    fn engine(agents: AgentRegistry, limits: WorkflowLimits) -> WorkflowEngine {
        let tools = Arc::new(builtin_registry());
        let dispatcher = Dispatcher::new(Arc::new(agents), Arc::clone(&tools), RecoveryEngine::new(0, 0));
        let executor = ToolExecutor::new(tools, 5);
        WorkflowEngine::new(dispatcher, executor, Arc::new(InMemoryAcademicStore::new()), limits, 16)
    }

    fn request(agent: AgentKind, text: &str) -> WorkflowRequest {
        WorkflowRequest::builder(text)
            .user_id("u1")
            .course_id("c1")
            .agent(agent)
            .context(CourseContext::empty("u1", "c1"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_step_without_tool_calls() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(AgentKind::Planner, ScriptedAgent::completed("nothing to do"));
        let engine = engine(agents, WorkflowLimits::default());

        let handle = engine.start(request(AgentKind::Planner, "hi")).await.unwrap();
        let wf = handle.wait().await;

        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert_eq!(wf.steps.len(), 1);
        assert!(wf.steps[0].tool_calls.is_empty());
        assert_eq!(wf.steps[0].reasoning.as_deref(), Some("nothing to do"));
        assert_eq!(handle.status(), WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn test_self_delegation_with_same_task_is_a_cycle() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Research,
            FnAgent::new(|task, _| {
                Ok(AgentTurn::completed("again").with_call(ToolCallRequest::delegate(AgentKind::Research, &task.task)))
            }),
        );
        let engine = engine(agents, WorkflowLimits::default());

        let wf = engine
            .start(request(AgentKind::Research, "Find Sources"))
            .await
            .unwrap()
            .wait()
            .await;

        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(
            wf.steps[0].tool_calls[0].result.error_code(),
            Some(crate::core::ErrorCode::DelegationCycleDetected)
        );
        assert!(wf.agent_calls.is_empty());
    }

    #[tokio::test]
    async fn test_step_count_guard() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Planner,
            ScriptedAgent::new(
                AgentTurn::completed("fan out")
                    .with_call(ToolCallRequest::delegate(AgentKind::Course, "a"))
                    .with_call(ToolCallRequest::delegate(AgentKind::Course, "b"))
                    .with_call(ToolCallRequest::delegate(AgentKind::Course, "c")),
            ),
        );
        agents.register_builtin(AgentKind::Course, ScriptedAgent::completed("done"));
        let limits = WorkflowLimits {
            max_steps: 3,
            ..WorkflowLimits::default()
        };
        let engine = engine(agents, limits);

        let wf = engine.start(request(AgentKind::Planner, "plan")).await.unwrap().wait().await;

        assert_eq!(wf.steps.len(), 3);
        let codes: Vec<_> = wf.steps[0].tool_calls.iter().map(|c| c.result.error_code()).collect();
        assert_eq!(codes, vec![None, None, Some(crate::core::ErrorCode::StepCountExceeded)]);
        assert_eq!(wf.agent_calls.len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_target_agent() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Planner,
            ScriptedAgent::new(
                AgentTurn::completed("ask campus").with_call(ToolCallRequest::delegate(AgentKind::Campus, "opening hours")),
            ),
        );
        let engine = engine(agents, WorkflowLimits::default());

        let wf = engine.start(request(AgentKind::Planner, "plan")).await.unwrap().wait().await;
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(
            wf.steps[0].tool_calls[0].result.error_code(),
            Some(crate::core::ErrorCode::UnknownAgent)
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_only_the_slow_step() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Planner,
            ScriptedAgent::new(
                AgentTurn::completed("delegate").with_call(ToolCallRequest::delegate(AgentKind::Research, "slow")),
            ),
        );
        agents.register(
            AgentDescriptor::builtin(AgentKind::Research),
            ScriptedAgent::completed("late").with_delay(Duration::from_millis(500)),
        );
        let limits = WorkflowLimits {
            step_timeout: Duration::from_millis(50),
            ..WorkflowLimits::default()
        };
        let engine = engine(agents, limits);

        let wf = engine.start(request(AgentKind::Planner, "plan")).await.unwrap().wait().await;

        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert_eq!(wf.steps[1].status, StepStatus::Error);
        assert_eq!(
            wf.steps[1].error.as_ref().map(|e| e.code),
            Some(crate::core::ErrorCode::StepTimeout)
        );
        assert!(wf.steps[0].tool_calls[0].result.is_error());
    }

    #[tokio::test]
    async fn test_unknown_workflow_and_discard() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(AgentKind::Notes, ScriptedAgent::completed("ok"));
        let engine = engine(agents, WorkflowLimits::default());

        assert!(matches!(
            engine.get_state("wf_missing").await,
            Err(CoreError::WorkflowNotFound(_))
        ));

        let handle = engine.start(request(AgentKind::Notes, "summarise")).await.unwrap();
        handle.wait().await;
        assert_eq!(engine.list().await.len(), 1);
        engine.discard(handle.id()).await.unwrap();
        assert!(engine.list().await.is_empty());
        assert!(engine.trace(handle.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_events_stream_in_order() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Assignment,
            ScriptedAgent::new(
                AgentTurn::completed("ask course").with_call(ToolCallRequest::delegate(AgentKind::Course, "syllabus")),
            ),
        );
        agents.register_builtin(AgentKind::Course, ScriptedAgent::completed("here"));
        let engine = engine(agents, WorkflowLimits::default());
        let mut rx = engine.subscribe();

        engine
            .start(request(AgentKind::Assignment, "essay help"))
            .await
            .unwrap()
            .wait()
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            let json = serde_json::to_value(&event).unwrap();
            kinds.push(json["type"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "workflow_started",
                "step_started",
                "step_started",
                "step_finished",
                "tool_call_recorded",
                "step_finished",
                "workflow_finished",
            ]
        );
    }

    #[tokio::test]
    async fn test_panicking_root_agent_still_terminates() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(AgentKind::Planner, FnAgent::new(|_, _| panic!("provider bug")));
        let engine = engine(agents, WorkflowLimits::default());

        let handle = engine.start(request(AgentKind::Planner, "plan")).await.unwrap();
        let wf = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .expect("panicking agent must not hang the workflow");

        assert_eq!(wf.status, WorkflowStatus::Error);
        assert_eq!(handle.status(), WorkflowStatus::Error);
        let root = wf.root().unwrap();
        assert_eq!(root.status, StepStatus::Error);
        assert_eq!(
            root.error.as_ref().map(|e| e.code),
            Some(crate::core::ErrorCode::AgentFailed)
        );
        assert!(wf.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_panicking_child_fails_only_its_step() {
        let mut agents = AgentRegistry::new();
        agents.register_builtin(
            AgentKind::Assignment,
            ScriptedAgent::new(
                AgentTurn::completed("ask course").with_call(ToolCallRequest::delegate(AgentKind::Course, "syllabus")),
            ),
        );
        agents.register_builtin(AgentKind::Course, FnAgent::new(|_, _| panic!("provider bug")));
        let engine = engine(agents, WorkflowLimits::default());

        let wf = tokio::time::timeout(
            Duration::from_secs(2),
            async { engine.start(request(AgentKind::Assignment, "essay help")).await.unwrap().wait().await },
        )
        .await
        .expect("workflow must terminate");

        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert_eq!(wf.steps[1].status, StepStatus::Error);
        assert_eq!(
            wf.steps[0].tool_calls[0].result.error_code(),
            Some(crate::core::ErrorCode::AgentFailed)
        );
    }
}
