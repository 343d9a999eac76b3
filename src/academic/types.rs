//! 学业数据类型
//!
//! 课程上下文快照（作业、考试、资料、笔记、学习时段），由学业存储提供，
//! 作为不可变快照传入每个 Step 与检测器。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
}

/// 考试
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
}

/// 资料类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Lecture,
    Reading,
    Slides,
    PracticeQuestions,
    Flashcards,
    Other,
}

/// 课程资料（讲义、阅读、练习题、闪卡等）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub title: String,
    pub kind: MaterialKind,
    /// 关联的作业或考试 ID
    #[serde(default)]
    pub linked_to: Vec<String>,
    /// 幂等创建用的派生键（手动上传的资料为 None）
    #[serde(default)]
    pub key: Option<String>,
}

/// 笔记
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// 学习时段（日历中的一段复习时间，可关联作业或考试）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyBlock {
    pub id: String,
    /// 幂等创建用的派生键
    pub key: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub exam_id: Option<String>,
}

/// 新建学习时段的请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudyBlock {
    pub key: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub exam_id: Option<String>,
}

/// 新建资料的请求（如自动生成的闪卡）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub key: String,
    pub title: String,
    pub kind: MaterialKind,
    #[serde(default)]
    pub linked_to: Vec<String>,
}

/// 带键创建的结果：created = false 表示同键资源已存在，未做任何修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcome {
    pub resource_id: String,
    pub created: bool,
}

/// 课程上下文快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseContext {
    pub user_id: String,
    pub course_id: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub exams: Vec<Exam>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub study_blocks: Vec<StudyBlock>,
}

impl CourseContext {
    pub fn empty(user_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            course_id: course_id.into(),
            captured_at: Utc::now(),
            assignments: Vec::new(),
            exams: Vec::new(),
            materials: Vec::new(),
            notes: Vec::new(),
            study_blocks: Vec::new(),
        }
    }

    /// 未完成的作业
    pub fn pending_assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| !a.completed)
    }

    pub fn has_study_block_for(&self, target_id: &str) -> bool {
        self.study_blocks.iter().any(|b| {
            b.assignment_id.as_deref() == Some(target_id) || b.exam_id.as_deref() == Some(target_id)
        })
    }

    pub fn materials_of_kind(&self, kind: MaterialKind) -> impl Iterator<Item = &Material> {
        self.materials.iter().filter(move |m| m.kind == kind)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.study_blocks.iter().any(|b| b.key == key)
            || self.materials.iter().any(|m| m.key.as_deref() == Some(key))
    }
}
