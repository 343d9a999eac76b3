//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCHOLAR__*` 覆盖（双下划线表示嵌套，如 `SCHOLAR__WORKFLOW__MAX_DEPTH=3`）。

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub workflow: WorkflowSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub auto_action: AutoActionSection,
    /// [agents.<kind>] 段：覆盖内置 Agent 描述（key 为 planner / course / ...）
    #[serde(default)]
    pub agents: HashMap<String, AgentOverride>,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [workflow] 段：委派深度、步数上限、单步超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// 单次 Dispatcher 调用的超时（秒）
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// Agent 提供方瞬时失败的重试次数
    #[serde(default = "default_dispatch_retries")]
    pub dispatch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// 工作流事件广播缓冲区大小
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_depth() -> usize {
    5
}

fn default_max_steps() -> usize {
    50
}

fn default_step_timeout_secs() -> u64 {
    30
}

fn default_dispatch_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_event_buffer() -> usize {
    64
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_steps: default_max_steps(),
            step_timeout_secs: default_step_timeout_secs(),
            dispatch_retries: default_dispatch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl WorkflowSection {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_tool_timeout_secs() -> u64 {
    20
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

/// [auto_action] 段：检测规则的时间窗口与展示上限
#[derive(Debug, Clone, Deserialize)]
pub struct AutoActionSection {
    /// 展示层最多显示几条（检测器本身返回完整列表）
    #[serde(default = "default_display_cap")]
    pub display_cap: usize,
    #[serde(default = "default_deadline_window_hours")]
    pub deadline_window_hours: i64,
    #[serde(default = "default_exam_window_days")]
    pub exam_window_days: i64,
    /// 自动创建学习时段的默认时长（分钟）
    #[serde(default = "default_study_block_minutes")]
    pub study_block_minutes: u32,
    /// 执行器台账最多保留的 action 记录数
    #[serde(default = "default_ledger_capacity")]
    pub ledger_capacity: usize,
}

fn default_display_cap() -> usize {
    5
}

fn default_deadline_window_hours() -> i64 {
    48
}

fn default_exam_window_days() -> i64 {
    7
}

fn default_study_block_minutes() -> u32 {
    90
}

fn default_ledger_capacity() -> usize {
    1024
}

impl Default for AutoActionSection {
    fn default() -> Self {
        Self {
            display_cap: default_display_cap(),
            deadline_window_hours: default_deadline_window_hours(),
            exam_window_days: default_exam_window_days(),
            study_block_minutes: default_study_block_minutes(),
            ledger_capacity: default_ledger_capacity(),
        }
    }
}

/// [agents.<kind>] 段：所有字段可选，未设置的沿用内置描述
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentOverride {
    pub label: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub system_prompt: Option<String>,
}

/// 从 config 目录加载配置，环境变量 SCHOLAR__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCHOLAR__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCHOLAR")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workflow.max_depth, 5);
        assert_eq!(cfg.workflow.max_steps, 50);
        assert_eq!(cfg.workflow.step_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.auto_action.display_cap, 5);
        assert_eq!(cfg.auto_action.deadline_window_hours, 48);
        assert_eq!(cfg.auto_action.ledger_capacity, 1024);
        assert!(cfg.agents.is_empty());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[workflow]
max_depth = 3
step_timeout_secs = 5

[agents.planner]
label = "Study Planner"
allowed_tools = ["call_agent"]
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.workflow.max_depth, 3);
        assert_eq!(cfg.workflow.max_steps, 50);
        assert_eq!(cfg.workflow.step_timeout_secs, 5);
        let planner = cfg.agents.get("planner").unwrap();
        assert_eq!(planner.label.as_deref(), Some("Study Planner"));
        assert_eq!(planner.allowed_tools.as_ref().unwrap().len(), 1);
    }
}
