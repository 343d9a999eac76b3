//! Agent 类型：封闭的 Agent 集合与能力描述

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::CoreError;

/// 专职 Agent（封闭集合，按标识解析，不做反射式查找）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// 学习计划统筹
    Planner,
    /// 课程内容
    Course,
    /// 作业
    Assignment,
    /// 考试
    Exam,
    /// 笔记
    Notes,
    /// 资料检索
    Research,
    /// 校园事务
    Campus,
}

impl AgentKind {
    pub const ALL: [AgentKind; 7] = [
        AgentKind::Planner,
        AgentKind::Course,
        AgentKind::Assignment,
        AgentKind::Exam,
        AgentKind::Notes,
        AgentKind::Research,
        AgentKind::Campus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Planner => "planner",
            AgentKind::Course => "course",
            AgentKind::Assignment => "assignment",
            AgentKind::Exam => "exam",
            AgentKind::Notes => "notes",
            AgentKind::Research => "research",
            AgentKind::Campus => "campus",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownAgent(s.to_string()))
    }
}

/// Agent 能力描述：显示名、可用工具、系统行为提示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub kind: AgentKind,
    pub label: String,
    pub allowed_tools: Vec<String>,
    pub system_prompt: String,
}

impl AgentDescriptor {
    /// 内置描述
    pub fn builtin(kind: AgentKind) -> Self {
        let (label, tools, prompt): (&str, &[&str], &str) = match kind {
            AgentKind::Planner => (
                "Study Planner",
                &["call_agent", "course_overview", "list_deadlines", "create_study_block"],
                "You coordinate the student's study plan and delegate specialised questions to other agents.",
            ),
            AgentKind::Course => (
                "Course Expert",
                &["course_overview", "find_materials", "call_agent"],
                "You explain course content using the course's materials and notes.",
            ),
            AgentKind::Assignment => (
                "Assignment Helper",
                &["list_deadlines", "find_materials", "create_study_block", "call_agent"],
                "You help the student plan and complete assignments before their deadlines.",
            ),
            AgentKind::Exam => (
                "Exam Coach",
                &["list_deadlines", "find_materials", "create_study_block", "call_agent"],
                "You prepare the student for upcoming exams with practice and review plans.",
            ),
            AgentKind::Notes => (
                "Notes Assistant",
                &["find_materials", "course_overview", "call_agent"],
                "You organise and summarise the student's notes.",
            ),
            AgentKind::Research => (
                "Research Assistant",
                &["find_materials", "call_agent"],
                "You locate relevant readings and sources for a topic.",
            ),
            AgentKind::Campus => (
                "Campus Guide",
                &["course_overview", "call_agent"],
                "You answer questions about campus services, schedules and administration.",
            ),
        };
        Self {
            kind,
            label: label.to_string(),
            allowed_tools: tools.iter().map(|t| t.to_string()).collect(),
            system_prompt: prompt.to_string(),
        }
    }

    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_agent_kind() {
        assert_eq!("Planner".parse::<AgentKind>().unwrap(), AgentKind::Planner);
        assert_eq!(" notes ".parse::<AgentKind>().unwrap(), AgentKind::Notes);
        let err = "librarian".parse::<AgentKind>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownAgent(name) if name == "librarian"));
    }

    #[test]
    fn test_every_builtin_can_delegate() {
        for kind in AgentKind::ALL {
            let descriptor = AgentDescriptor::builtin(kind);
            assert!(descriptor.allows("call_agent"), "{kind} cannot delegate");
            assert!(!descriptor.label.is_empty());
        }
    }
}
