//! 脚本化 Agent（用于测试与演示，无需接入模型）
//!
//! ScriptedAgent 每次返回同一轮预设结果，可附加延迟或前 N 次失败；
//! FnAgent 用闭包根据任务动态生成一轮结果。

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::academic::CourseContext;
use crate::agents::{AgentBehavior, AgentTask, AgentTurn};

/// 固定返回预设结果的 Agent
#[derive(Debug)]
pub struct ScriptedAgent {
    turn: AgentTurn,
    delay: Option<Duration>,
    /// 前 N 次 invoke 返回提供方错误
    failures_before_success: u32,
    calls: AtomicU32,
}

impl ScriptedAgent {
    pub fn new(turn: AgentTurn) -> Self {
        Self {
            turn,
            delay: None,
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// 不调用工具、直接完成
    pub fn completed(reasoning: impl Into<String>) -> Self {
        Self::new(AgentTurn::completed(reasoning))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_first(mut self, failures: u32) -> Self {
        self.failures_before_success = failures;
        self
    }

    /// invoke 被调用的次数（含失败）
    pub fn invocations(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentBehavior for ScriptedAgent {
    async fn invoke(&self, _task: &AgentTask, _context: &CourseContext) -> Result<AgentTurn, String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if n < self.failures_before_success {
            return Err(format!("scripted provider failure #{}", n + 1));
        }
        Ok(self.turn.clone())
    }
}

/// 闭包驱动的 Agent
pub struct FnAgent<F>
where
    F: Fn(&AgentTask, &CourseContext) -> Result<AgentTurn, String> + Send + Sync,
{
    f: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&AgentTask, &CourseContext) -> Result<AgentTurn, String> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> AgentBehavior for FnAgent<F>
where
    F: Fn(&AgentTask, &CourseContext) -> Result<AgentTurn, String> + Send + Sync,
{
    async fn invoke(&self, task: &AgentTask, context: &CourseContext) -> Result<AgentTurn, String> {
        (self.f)(task, context)
    }
}
