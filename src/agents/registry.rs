//! Agent 注册表
//!
//! 按 AgentKind 存储能力描述与行为实现，只做查找，不含业务逻辑。

use std::collections::HashMap;
use std::sync::Arc;

use crate::agents::{AgentBehavior, AgentDescriptor, AgentKind};
use crate::config::AgentOverride;
use crate::core::CoreError;

/// 已注册的 Agent：描述 + 行为
#[derive(Clone)]
pub struct RegisteredAgent {
    pub descriptor: AgentDescriptor,
    pub behavior: Arc<dyn AgentBehavior>,
}

#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, RegisteredAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: AgentDescriptor, behavior: impl AgentBehavior + 'static) {
        self.register_arc(descriptor, Arc::new(behavior));
    }

    pub fn register_arc(&mut self, descriptor: AgentDescriptor, behavior: Arc<dyn AgentBehavior>) {
        self.agents.insert(
            descriptor.kind,
            RegisteredAgent {
                descriptor,
                behavior,
            },
        );
    }

    /// 以内置描述注册
    pub fn register_builtin(&mut self, kind: AgentKind, behavior: impl AgentBehavior + 'static) {
        self.register(AgentDescriptor::builtin(kind), behavior);
    }

    pub fn get(&self, kind: AgentKind) -> Option<&RegisteredAgent> {
        self.agents.get(&kind)
    }

    /// 按标识字符串解析；未知或未注册均返回 UnknownAgent
    pub fn resolve(&self, name: &str) -> Result<&RegisteredAgent, CoreError> {
        let kind: AgentKind = name.parse()?;
        self.get(kind)
            .ok_or_else(|| CoreError::UnknownAgent(name.to_string()))
    }

    pub fn contains(&self, kind: AgentKind) -> bool {
        self.agents.contains_key(&kind)
    }

    /// 已注册的 Agent（按固定顺序）
    pub fn kinds(&self) -> Vec<AgentKind> {
        let mut kinds: Vec<AgentKind> = self.agents.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.kinds()
            .into_iter()
            .filter_map(|k| self.agents.get(&k).map(|a| a.descriptor.clone()))
            .collect()
    }

    /// 应用配置中的 [agents.<kind>] 覆盖；未知 key 或未注册的 Agent 会被跳过并告警
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, AgentOverride>) {
        for (name, o) in overrides {
            let kind = match name.parse::<AgentKind>() {
                Ok(k) => k,
                Err(_) => {
                    tracing::warn!(agent = %name, "Ignoring override for unknown agent");
                    continue;
                }
            };
            let Some(agent) = self.agents.get_mut(&kind) else {
                tracing::warn!(agent = %name, "Ignoring override for unregistered agent");
                continue;
            };
            if let Some(label) = &o.label {
                agent.descriptor.label = label.clone();
            }
            if let Some(tools) = &o.allowed_tools {
                agent.descriptor.allowed_tools = tools.clone();
            }
            if let Some(prompt) = &o.system_prompt {
                agent.descriptor.system_prompt = prompt.clone();
            }
        }
    }
}
