//! call_agent 工具：委派子任务给另一个 Agent
//!
//! 只在注册表中登记描述与 schema；实际执行由 WorkflowEngine 拦截（创建子 Step 并递归）。

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{call_agent_schema, Tool, ToolContext};

pub const CALL_AGENT: &str = "call_agent";

pub struct CallAgentTool;

#[async_trait]
impl Tool for CallAgentTool {
    fn name(&self) -> &str {
        CALL_AGENT
    }

    fn description(&self) -> &str {
        "Delegate a sub-task to another specialised agent. Args: {\"agent\": \"course\", \"task\": \"...\"}. Returns the delegated agent's final output."
    }

    fn parameters_schema(&self) -> Value {
        call_agent_schema()
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, String> {
        Err("call_agent must be routed through the workflow engine".to_string())
    }
}
