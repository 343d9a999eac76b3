//! call_agent 参数格式与 JSON Schema 生成（schemars 自动生成）
//!
//! Schema 同时用于告诉 Agent 提供方如何发起委派，以及引擎侧解析参数。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::CoreError;

/// call_agent 参数：`{"agent": "course", "task": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CallAgentArgs {
    /// 目标 Agent 标识：planner / course / assignment / exam / notes / research / campus
    pub agent: String,
    /// 交给目标 Agent 的任务描述
    pub task: String,
}

impl CallAgentArgs {
    /// 解析并校验参数；task 不可为空
    pub fn parse(args: &Value) -> Result<Self, CoreError> {
        let parsed: CallAgentArgs = serde_json::from_value(args.clone())
            .map_err(|e| CoreError::InvalidArguments(format!("call_agent expects {{agent, task}}: {e}")))?;
        if parsed.task.trim().is_empty() {
            return Err(CoreError::InvalidArguments("call_agent task is empty".to_string()));
        }
        Ok(parsed)
    }
}

/// call_agent 参数的 JSON Schema
pub fn call_agent_schema() -> Value {
    let schema = schema_for!(CallAgentArgs);
    serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}
