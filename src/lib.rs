//! Scholar - 学业助手的多 Agent 编排核心
//!
//! 模块划分：
//! - **academic**: 学业状态数据模型与存储抽象（作业、考试、资料、笔记、学习时段）
//! - **agents**: Agent 封闭集合、能力描述、可插拔行为与注册表
//! - **auto_action**: 自动建议的规则检测、排序与幂等执行
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复策略、取消监管、运行时装配
//! - **observability**: 日志初始化
//! - **tools**: 工具注册表、执行器与内置课程工具（含 call_agent）
//! - **workflow**: 工作流引擎、Dispatcher、Step 委派树与可视化投影

pub mod academic;
pub mod agents;
pub mod auto_action;
pub mod config;
pub mod core;
pub mod observability;
pub mod tools;
pub mod workflow;

pub use crate::core::{CoreError, CoreRuntime, RuntimeBuilder};
pub use workflow::{WorkflowEngine, WorkflowHandle, WorkflowRequest};
