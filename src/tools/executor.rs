//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args, ctx) 在超时内调用 registry.execute，
//! 超时或失败时转为 CoreError::ToolExecutionFailed；每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::CoreError;
use crate::tools::{Tool, ToolContext, ToolRegistry};

/// 工具执行器：对每次调用施加超时，并将结果映射为 CoreError
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；工具返回 Err、panic 或超时均转为 ToolExecutionFailed；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: Value, ctx: &ToolContext) -> Result<Value, CoreError> {
        if !self.registry.contains(tool_name) {
            return Err(CoreError::UnknownTool(tool_name.to_string()));
        }
        let start = Instant::now();
        let args_preview = args_preview(&args);
        // 工具 panic 视为一次失败的调用
        let call = AssertUnwindSafe(self.registry.execute(tool_name, args, ctx))
            .catch_unwind()
            .map(|r| r.unwrap_or_else(|_| Err(format!("{tool_name} panicked"))));
        let result = timeout(self.timeout, call).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "agent": ctx.agent,
            "course_id": ctx.course_id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CoreError::ToolExecutionFailed(e)),
            Err(_) => Err(CoreError::ToolExecutionFailed(format!(
                "{tool_name} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::{CourseContext, InMemoryAcademicStore};
    use crate::agents::AgentKind;
    use async_trait::async_trait;

    struct ExplodingTool;

    #[async_trait]
    impl Tool for ExplodingTool {
        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, String> {
            panic!("tool bug");
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            agent: AgentKind::Course,
            snapshot: Arc::new(CourseContext::empty("u1", "c1")),
            store: Arc::new(InMemoryAcademicStore::new()),
        }
    }

    #[tokio::test]
    async fn test_panicking_tool_becomes_execution_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(ExplodingTool);
        let executor = ToolExecutor::new(Arc::new(registry), 5);

        let err = executor
            .execute("explode", serde_json::json!({}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::ToolExecutionFailed("explode panicked".to_string()));
    }

    #[tokio::test]
    async fn test_unregistered_tool_is_unknown() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), 5);
        let err = executor
            .execute("missing", serde_json::json!({}), &ctx())
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownTool("missing".to_string()));
    }
}
