//! 运行时构建器：统一的编排核心初始化逻辑
//!
//! 从 AppConfig 装配 Agent 注册表（含配置覆盖）、工具注册表与执行器、工作流引擎、
//! 自动建议检测器与执行器，测试、演示程序与上层接入共用同一套装配。

use std::sync::Arc;

use crate::academic::{AcademicStore, InMemoryAcademicStore};
use crate::agents::{AgentBehavior, AgentDescriptor, AgentKind, AgentRegistry};
use crate::auto_action::{AutoAction, AutoActionExecutor, Detector, MutationSummary};
use crate::config::AppConfig;
use crate::core::{CoreError, RecoveryEngine};
use crate::tools::{builtin_registry, Tool, ToolExecutor, ToolRegistry};
use crate::workflow::{Dispatcher, WorkflowEngine, WorkflowHandle, WorkflowLimits, WorkflowRequest};

/// 运行时构建器
pub struct RuntimeBuilder {
    config: AppConfig,
    store: Option<Arc<dyn AcademicStore>>,
    agents: AgentRegistry,
    tools: ToolRegistry,
}

impl RuntimeBuilder {
    /// 创建新的构建器（内置工具已注册，Agent 需自行注册行为）
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            agents: AgentRegistry::new(),
            tools: builtin_registry(),
        }
    }

    /// 设置学业存储；默认使用空的内存存储
    pub fn with_store(mut self, store: Arc<dyn AcademicStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 以内置描述注册 Agent 行为
    pub fn with_agent(mut self, kind: AgentKind, behavior: impl AgentBehavior + 'static) -> Self {
        self.agents.register_builtin(kind, behavior);
        self
    }

    /// 以自定义描述注册 Agent 行为
    pub fn with_agent_descriptor(
        mut self,
        descriptor: AgentDescriptor,
        behavior: Arc<dyn AgentBehavior>,
    ) -> Self {
        self.agents.register_arc(descriptor, behavior);
        self
    }

    /// 追加工具
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.register(tool);
        self
    }

    /// 构建 Agent 注册表（应用配置覆盖）
    pub fn build_agent_registry(&self) -> AgentRegistry {
        let mut agents = self.agents.clone();
        agents.apply_overrides(&self.config.agents);
        agents
    }

    /// 构建完整的运行时
    pub fn build(self) -> CoreRuntime {
        let agents = Arc::new(self.build_agent_registry());
        let tools = Arc::new(self.tools);
        let store: Arc<dyn AcademicStore> = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryAcademicStore::new()));
        let wf = &self.config.workflow;

        let dispatcher = Dispatcher::new(
            Arc::clone(&agents),
            Arc::clone(&tools),
            RecoveryEngine::new(wf.dispatch_retries, wf.retry_backoff_ms),
        );
        let executor = ToolExecutor::new(Arc::clone(&tools), self.config.tools.tool_timeout_secs);
        let engine = WorkflowEngine::new(
            dispatcher,
            executor,
            Arc::clone(&store),
            WorkflowLimits::from_config(wf),
            wf.event_buffer,
        );
        let detector = Detector::new(Arc::clone(&store), self.config.auto_action.clone());
        let actions =
            AutoActionExecutor::with_ledger_capacity(Arc::clone(&store), self.config.auto_action.ledger_capacity);

        tracing::info!(
            agents = agents.kinds().len(),
            tools = tools.tool_names().len(),
            max_depth = wf.max_depth,
            max_steps = wf.max_steps,
            "Runtime ready"
        );

        CoreRuntime {
            config: self.config,
            store,
            agents,
            tools,
            engine,
            detector: Arc::new(detector),
            actions: Arc::new(actions),
        }
    }
}

/// 装配完成的编排核心
#[derive(Clone)]
pub struct CoreRuntime {
    pub config: AppConfig,
    pub store: Arc<dyn AcademicStore>,
    pub agents: Arc<AgentRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub engine: WorkflowEngine,
    pub detector: Arc<Detector>,
    pub actions: Arc<AutoActionExecutor>,
}

impl CoreRuntime {
    pub fn builder(config: AppConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// 启动一次编排
    pub async fn start(&self, request: WorkflowRequest) -> Result<WorkflowHandle, CoreError> {
        self.engine.start(request).await
    }

    /// 检测课程的自动建议（完整排序列表）
    pub async fn detect(&self, user_id: &str, course_id: &str) -> Result<Vec<AutoAction>, CoreError> {
        self.detector.detect(user_id, course_id).await
    }

    /// 执行一条自动建议
    pub async fn execute_action(
        &self,
        action: &AutoAction,
        user_id: &str,
        course_id: &str,
    ) -> Result<MutationSummary, CoreError> {
        self.actions.execute(action, user_id, course_id).await
    }

    /// Agent 的完整系统提示词（包含其可用工具的 schema），供网络型行为提供方使用
    pub fn agent_prompt(&self, kind: AgentKind) -> Result<String, CoreError> {
        let agent = self
            .agents
            .get(kind)
            .ok_or_else(|| CoreError::UnknownAgent(kind.to_string()))?;
        let tool_schema = self.tools.to_schema_json(Some(agent.descriptor.allowed_tools.as_slice()));
        if tool_schema.is_empty() || tool_schema == "[]" {
            Ok(agent.descriptor.system_prompt.clone())
        } else {
            Ok(format!(
                "{}\n\n## Tool call JSON Schema (you must output valid JSON matching this)\n```json\n{}\n```",
                agent.descriptor.system_prompt, tool_schema
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ScriptedAgent;
    use crate::config::AgentOverride;

    #[test]
    fn test_overrides_applied_at_build() {
        let mut config = AppConfig::default();
        config.agents.insert(
            "course".to_string(),
            AgentOverride {
                label: Some("Course Guide".to_string()),
                allowed_tools: Some(vec!["course_overview".to_string()]),
                system_prompt: None,
            },
        );
        let runtime = RuntimeBuilder::new(config)
            .with_agent(AgentKind::Course, ScriptedAgent::completed("ok"))
            .build();

        let course = runtime.agents.get(AgentKind::Course).unwrap();
        assert_eq!(course.descriptor.label, "Course Guide");
        assert_eq!(course.descriptor.allowed_tools, vec!["course_overview".to_string()]);

        let prompt = runtime.agent_prompt(AgentKind::Course).unwrap();
        assert!(prompt.contains("course_overview"));
        assert!(!prompt.contains("create_study_block"));
        assert!(runtime.agent_prompt(AgentKind::Campus).is_err());
    }
}
