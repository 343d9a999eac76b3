//! 自动建议类型
//!
//! AutoAction 由一次检测产生，创建后不可变；执行或忽略只是把它从调用方的工作集中移除。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;

/// 建议类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Warning,
    Opportunity,
    Suggestion,
    Reminder,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Warning => write!(f, "warning"),
            ActionType::Opportunity => write!(f, "opportunity"),
            ActionType::Suggestion => write!(f, "suggestion"),
            ActionType::Reminder => write!(f, "reminder"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Urgent,
    High,
    Medium,
    Low,
}

impl ActionPriority {
    /// 排序用的等级，越大越靠前
    pub fn rank(&self) -> u8 {
        match self {
            ActionPriority::Urgent => 4,
            ActionPriority::High => 3,
            ActionPriority::Medium => 2,
            ActionPriority::Low => 1,
        }
    }
}

impl std::fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionPriority::Urgent => write!(f, "urgent"),
            ActionPriority::High => write!(f, "high"),
            ActionPriority::Medium => write!(f, "medium"),
            ActionPriority::Low => write!(f, "low"),
        }
    }
}

/// 建议的效果：`{"type": "analyze" | <修改类>, ...参数}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    /// 只读分析，不修改任何数据
    Analyze {
        #[serde(default)]
        target_id: Option<String>,
        focus: String,
    },
    CreateStudyBlock {
        key: String,
        title: String,
        starts_at: DateTime<Utc>,
        duration_minutes: u32,
        #[serde(default)]
        assignment_id: Option<String>,
        #[serde(default)]
        exam_id: Option<String>,
    },
    LinkMaterial {
        key: String,
        material_id: String,
        target_id: String,
    },
    GenerateFlashcards {
        key: String,
        title: String,
        note_ids: Vec<String>,
    },
    /// 无法识别的类型（例如来自更新版本的客户端）
    #[serde(other)]
    Unknown,
}

impl ActionPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionPayload::Analyze { .. } => "analyze",
            ActionPayload::CreateStudyBlock { .. } => "create_study_block",
            ActionPayload::LinkMaterial { .. } => "link_material",
            ActionPayload::GenerateFlashcards { .. } => "generate_flashcards",
            ActionPayload::Unknown => "unknown",
        }
    }

    /// 修改类效果的派生键
    pub fn derived_key(&self) -> Option<&str> {
        match self {
            ActionPayload::CreateStudyBlock { key, .. }
            | ActionPayload::LinkMaterial { key, .. }
            | ActionPayload::GenerateFlashcards { key, .. } => Some(key),
            ActionPayload::Analyze { .. } | ActionPayload::Unknown => None,
        }
    }

    pub fn is_mutating(&self) -> bool {
        self.derived_key().is_some()
    }
}

/// 一条主动建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub priority: ActionPriority,
    pub title: String,
    pub description: String,
    /// 负责此类洞察的 Agent
    pub agent: AgentKind,
    /// [0, 1]
    pub confidence: f64,
    pub action: ActionPayload,
    /// 产生该建议的规则名
    pub rule: String,
}

impl AutoAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule: &str,
        action_type: ActionType,
        priority: ActionPriority,
        agent: AgentKind,
        title: impl Into<String>,
        description: impl Into<String>,
        confidence: f64,
        action: ActionPayload,
    ) -> Self {
        Self {
            id: format!("aa_{}", uuid::Uuid::new_v4()),
            action_type,
            priority,
            title: title.into(),
            description: description.into(),
            agent,
            confidence: clamp_confidence(confidence),
            action,
            rule: rule.to_string(),
        }
    }
}

/// 限制到 [0, 1]；NaN 视为 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 一次执行的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationSummary {
    pub action_id: String,
    pub kind: String,
    /// 本次是否真正修改了数据
    pub applied: bool,
    #[serde(default)]
    pub resource_id: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_payload_type_deserializes() {
        let payload: ActionPayload =
            serde_json::from_value(serde_json::json!({"type": "send_email", "to": "prof"})).unwrap();
        assert_eq!(payload, ActionPayload::Unknown);
        assert!(!payload.is_mutating());
    }

    #[test]
    fn test_payload_tag_and_key() {
        let payload = ActionPayload::LinkMaterial {
            key: "link:m1:a1".to_string(),
            material_id: "m1".to_string(),
            target_id: "a1".to_string(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "link_material");
        assert_eq!(payload.derived_key(), Some("link:m1:a1"));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(clamp_confidence(1.7), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert!(ActionPriority::Urgent.rank() > ActionPriority::High.rank());
    }
}
