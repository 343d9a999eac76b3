//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时加超时并统一转 CoreError。call_agent 只在此登记 schema，由工作流引擎拦截执行。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::academic::{AcademicStore, CourseContext};
use crate::agents::AgentKind;

/// 工具执行上下文：调用者身份、不可变课程快照与存储句柄
#[derive(Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub course_id: String,
    pub agent: AgentKind,
    pub snapshot: Arc<CourseContext>,
    pub store: Arc<dyn AcademicStore>,
}

/// 工具 trait：名称、描述（供 Agent 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（ToolCall 中的 "tool" 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认为无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn execute(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let tool = self.tools.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        tool.execute(args, ctx).await
    }

    /// 已注册工具名（排序，便于稳定输出）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表，供 Agent 提供方拼接 prompt
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                self.tools
                    .get(&name)
                    .map(|tool| (name.clone(), tool.description().to_string()))
            })
            .collect()
    }

    /// 指定工具子集的 schema JSON（通常传入某个 Agent 的 allowed_tools）
    pub fn to_schema_json(&self, only: Option<&[String]>) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .into_iter()
            .filter(|name| only.map_or(true, |allowed| allowed.contains(name)))
            .filter_map(|name| {
                self.tools.get(&name).map(|tool| {
                    serde_json::json!({
                        "name": name,
                        "description": tool.description(),
                        "parameters": tool.parameters_schema()
                    })
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
