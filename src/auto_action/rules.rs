//! 检测规则
//!
//! 每条规则独立地对课程快照求值，置信度随前提成立的强度变化（如离截止越近越高），而非固定常数。
//! 规则集可插拔：Detector 按注册顺序求值，顺序也用于同分时的稳定排序。

use chrono::{DateTime, Duration, Utc};

use crate::academic::{keys, CourseContext, MaterialKind};
use crate::agents::AgentKind;
use crate::auto_action::types::{ActionPayload, ActionPriority, ActionType, AutoAction};
use crate::config::AutoActionSection;

/// 一条检测规则：纯函数，不产生副作用
pub trait DetectionRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, settings: &AutoActionSection) -> Vec<AutoAction>;
}

/// 内置规则集（按此顺序求值）
pub fn default_rules() -> Vec<Box<dyn DetectionRule>> {
    vec![
        Box::new(DeadlineWithoutStudyBlock),
        Box::new(OverdueAssignment),
        Box::new(ExamWithoutPractice),
        Box::new(NotesWithoutFlashcards),
        Box::new(UnlinkedMaterials),
        Box::new(ExamReview),
    ]
}

/// 建议的学习时段开始时间：一小时后（取整点），但不晚于 deadline 前留出的时长
fn suggested_start(now: DateTime<Utc>, deadline: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    let next_hour = now + Duration::hours(1);
    let latest = deadline - Duration::minutes(i64::from(minutes));
    next_hour.min(latest).max(now)
}

fn days_until(now: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - now).num_minutes() as f64 / (60.0 * 24.0)
}

/// 48 小时内截止、没有学习时段的作业
pub struct DeadlineWithoutStudyBlock;

impl DetectionRule for DeadlineWithoutStudyBlock {
    fn name(&self) -> &'static str {
        "deadline_without_study_block"
    }

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, settings: &AutoActionSection) -> Vec<AutoAction> {
        let window_hours = settings.deadline_window_hours.max(1) as f64;
        ctx.pending_assignments()
            .filter(|a| a.due_at > now && !ctx.has_study_block_for(&a.id))
            .filter_map(|a| {
                let hours_left = (a.due_at - now).num_minutes() as f64 / 60.0;
                if hours_left > window_hours {
                    return None;
                }
                let confidence = 1.0 - 0.5 * (hours_left / window_hours);
                Some(AutoAction::new(
                    self.name(),
                    ActionType::Warning,
                    ActionPriority::Urgent,
                    AgentKind::Assignment,
                    format!("Schedule time for {}", a.title),
                    format!(
                        "{} is due in {:.0} hours and has no study block yet.",
                        a.title, hours_left
                    ),
                    confidence,
                    ActionPayload::CreateStudyBlock {
                        key: keys::study_block_for_assignment(&a.id),
                        title: format!("Work on {}", a.title),
                        starts_at: suggested_start(now, a.due_at, settings.study_block_minutes),
                        duration_minutes: settings.study_block_minutes,
                        assignment_id: Some(a.id.clone()),
                        exam_id: None,
                    },
                ))
            })
            .collect()
    }
}

/// 已过截止仍未完成的作业
pub struct OverdueAssignment;

impl DetectionRule for OverdueAssignment {
    fn name(&self) -> &'static str {
        "overdue_assignment"
    }

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, _settings: &AutoActionSection) -> Vec<AutoAction> {
        ctx.pending_assignments()
            .filter(|a| a.due_at <= now)
            .map(|a| {
                let days_over = -days_until(now, a.due_at);
                let confidence = 0.6 + 0.4 * (days_over / 7.0).min(1.0);
                AutoAction::new(
                    self.name(),
                    ActionType::Reminder,
                    ActionPriority::High,
                    AgentKind::Assignment,
                    format!("{} is overdue", a.title),
                    format!("{} passed its deadline {:.1} days ago.", a.title, days_over),
                    confidence,
                    ActionPayload::Analyze {
                        target_id: Some(a.id.clone()),
                        focus: "overdue_assignment".to_string(),
                    },
                )
            })
            .collect()
    }
}

/// 临近考试却没有练习题资料
pub struct ExamWithoutPractice;

impl DetectionRule for ExamWithoutPractice {
    fn name(&self) -> &'static str {
        "exam_without_practice"
    }

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, settings: &AutoActionSection) -> Vec<AutoAction> {
        if ctx.materials_of_kind(MaterialKind::PracticeQuestions).next().is_some() {
            return Vec::new();
        }
        let window = settings.exam_window_days.max(1) as f64;
        ctx.exams
            .iter()
            .filter(|e| e.date > now && !ctx.has_study_block_for(&e.id))
            .filter_map(|e| {
                let days_left = days_until(now, e.date);
                if days_left > window {
                    return None;
                }
                let confidence = 1.0 - 0.6 * (days_left / window);
                Some(AutoAction::new(
                    self.name(),
                    ActionType::Suggestion,
                    ActionPriority::High,
                    AgentKind::Exam,
                    format!("Practise for {}", e.title),
                    format!(
                        "{} is in {:.1} days and the course has no practice questions.",
                        e.title, days_left
                    ),
                    confidence,
                    ActionPayload::CreateStudyBlock {
                        key: keys::study_block_for_exam(&e.id),
                        title: format!("Practice session: {}", e.title),
                        starts_at: suggested_start(now, e.date, settings.study_block_minutes),
                        duration_minutes: settings.study_block_minutes,
                        assignment_id: None,
                        exam_id: Some(e.id.clone()),
                    },
                ))
            })
            .collect()
    }
}

/// 有笔记但没有闪卡
pub struct NotesWithoutFlashcards;

impl DetectionRule for NotesWithoutFlashcards {
    fn name(&self) -> &'static str {
        "notes_without_flashcards"
    }

    fn evaluate(&self, ctx: &CourseContext, _now: DateTime<Utc>, _settings: &AutoActionSection) -> Vec<AutoAction> {
        if ctx.notes.is_empty() || ctx.materials_of_kind(MaterialKind::Flashcards).next().is_some() {
            return Vec::new();
        }
        let count = ctx.notes.len();
        let confidence = (0.5 + 0.1 * count as f64).min(0.95);
        vec![AutoAction::new(
            self.name(),
            ActionType::Opportunity,
            ActionPriority::Medium,
            AgentKind::Notes,
            "Turn your notes into flashcards",
            format!("You have {count} notes in this course but no flashcards."),
            confidence,
            ActionPayload::GenerateFlashcards {
                key: keys::flashcards_for_notes(&ctx.course_id),
                title: format!("Flashcards from {count} notes"),
                note_ids: ctx.notes.iter().map(|n| n.id.clone()).collect(),
            },
        )]
    }
}

/// 未关联到任何作业 / 考试的资料，且存在即将到来的目标
pub struct UnlinkedMaterials;

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// 标题词重叠比例
fn overlap(a: &str, b: &str) -> f64 {
    let left = words(a);
    let right = words(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let shared = left.iter().filter(|w| right.contains(w)).count();
    shared as f64 / left.len().min(right.len()) as f64
}

impl DetectionRule for UnlinkedMaterials {
    fn name(&self) -> &'static str {
        "unlinked_materials"
    }

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, _settings: &AutoActionSection) -> Vec<AutoAction> {
        let mut targets: Vec<(&str, &str, DateTime<Utc>)> = ctx
            .pending_assignments()
            .filter(|a| a.due_at > now)
            .map(|a| (a.id.as_str(), a.title.as_str(), a.due_at))
            .chain(
                ctx.exams
                    .iter()
                    .filter(|e| e.date > now)
                    .map(|e| (e.id.as_str(), e.title.as_str(), e.date)),
            )
            .collect();
        if targets.is_empty() {
            return Vec::new();
        }
        targets.sort_by_key(|(_, _, at)| *at);

        ctx.materials
            .iter()
            .filter(|m| m.linked_to.is_empty() && m.kind != MaterialKind::Flashcards)
            .map(|m| {
                // 最相关的目标；同分取最近的
                let (target_id, target_title, score) = targets
                    .iter()
                    .map(|(id, title, _)| (*id, *title, overlap(&m.title, title)))
                    .fold(None::<(&str, &str, f64)>, |best, cand| match best {
                        Some(b) if b.2 >= cand.2 => Some(b),
                        _ => Some(cand),
                    })
                    .unwrap_or((targets[0].0, targets[0].1, 0.0));
                AutoAction::new(
                    self.name(),
                    ActionType::Suggestion,
                    ActionPriority::Low,
                    AgentKind::Course,
                    format!("Link {} to {}", m.title, target_title),
                    format!("{} is not linked to any assignment or exam.", m.title),
                    0.3 + 0.6 * score,
                    ActionPayload::LinkMaterial {
                        key: keys::material_link(&m.id, target_id),
                        material_id: m.id.clone(),
                        target_id: target_id.to_string(),
                    },
                )
            })
            .collect()
    }
}

/// 临近考试且已有练习资料：提醒复习
pub struct ExamReview;

impl DetectionRule for ExamReview {
    fn name(&self) -> &'static str {
        "exam_review"
    }

    fn evaluate(&self, ctx: &CourseContext, now: DateTime<Utc>, settings: &AutoActionSection) -> Vec<AutoAction> {
        let practice = ctx.materials_of_kind(MaterialKind::PracticeQuestions).count();
        if practice == 0 {
            return Vec::new();
        }
        let window = settings.exam_window_days.max(1) as f64;
        ctx.exams
            .iter()
            .filter(|e| e.date > now)
            .filter_map(|e| {
                let days_left = days_until(now, e.date);
                if days_left > window {
                    return None;
                }
                Some(AutoAction::new(
                    self.name(),
                    ActionType::Reminder,
                    ActionPriority::Medium,
                    AgentKind::Exam,
                    format!("Review for {}", e.title),
                    format!(
                        "{} is in {:.1} days; {practice} practice sets are available.",
                        e.title, days_left
                    ),
                    1.0 - 0.5 * (days_left / window),
                    ActionPayload::Analyze {
                        target_id: Some(e.id.clone()),
                        focus: "exam_readiness".to_string(),
                    },
                ))
            })
            .collect()
    }
}
