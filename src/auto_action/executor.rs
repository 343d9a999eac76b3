//! 自动建议执行器
//!
//! analyze 只读；修改类效果在课程级锁内先查执行台账、再查存储中的派生键，最后做一次带键创建。
//! 同一 AutoAction（同一 id）重复执行只会产生一次修改；未知类型直接拒绝，不做任何修改。
//!
//! 台账按容量淘汰最早的记录，被淘汰的 action 再次执行时由存储的派生键检查兜底；
//! 课程锁在无人持有时回收。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex;

use crate::academic::{AcademicStore, CourseContext, CreateOutcome, MaterialKind, NewMaterial, NewStudyBlock};
use crate::auto_action::types::{ActionPayload, AutoAction, MutationSummary};
use crate::core::CoreError;

type CourseKey = (String, String);

/// 台账默认容量
pub const DEFAULT_LEDGER_CAPACITY: usize = 1024;

/// action id → 首次执行结果，超过容量时淘汰最早写入的记录
struct Ledger {
    entries: HashMap<String, MutationSummary>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Ledger {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, action_id: &str) -> Option<&MutationSummary> {
        self.entries.get(action_id)
    }

    fn insert(&mut self, summary: MutationSummary) {
        let id = summary.action_id.clone();
        if self.entries.insert(id.clone(), summary).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct AutoActionExecutor {
    store: Arc<dyn AcademicStore>,
    ledger: StdMutex<Ledger>,
    /// 每门课程一把锁，不存在全局写锁
    course_locks: StdMutex<HashMap<CourseKey, Arc<Mutex<()>>>>,
}

impl AutoActionExecutor {
    pub fn new(store: Arc<dyn AcademicStore>) -> Self {
        Self::with_ledger_capacity(store, DEFAULT_LEDGER_CAPACITY)
    }

    pub fn with_ledger_capacity(store: Arc<dyn AcademicStore>, capacity: usize) -> Self {
        Self {
            store,
            ledger: StdMutex::new(Ledger::new(capacity)),
            course_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// 执行一条建议
    pub async fn execute(
        &self,
        action: &AutoAction,
        user_id: &str,
        course_id: &str,
    ) -> Result<MutationSummary, CoreError> {
        let key = match &action.action {
            ActionPayload::Unknown => {
                tracing::warn!(action_id = %action.id, "Rejecting auto action with unsupported type");
                return Err(CoreError::UnsupportedAction(format!(
                    "action {} has an unsupported type",
                    action.id
                )));
            }
            ActionPayload::Analyze { target_id, focus } => {
                let ctx = self.store.course_context(user_id, course_id).await?;
                return Ok(MutationSummary {
                    action_id: action.id.clone(),
                    kind: action.action.kind().to_string(),
                    applied: false,
                    resource_id: target_id.clone(),
                    message: analyze(&ctx, action, target_id.as_deref(), focus),
                });
            }
            other => other.derived_key().unwrap_or_default().to_string(),
        };

        let lock = self.course_lock(user_id, course_id);
        let _guard = lock.lock().await;

        if let Some(previous) = self.recorded(&action.id) {
            return Ok(MutationSummary {
                applied: false,
                message: format!("Action {} was already executed", action.id),
                ..previous
            });
        }

        let outcome = self.apply(action, user_id, course_id, &key).await?;
        let summary = MutationSummary {
            action_id: action.id.clone(),
            kind: action.action.kind().to_string(),
            applied: outcome.created,
            message: if outcome.created {
                format!("{}: done", action.title)
            } else {
                format!("{}: already in place", action.title)
            },
            resource_id: Some(outcome.resource_id),
        };

        tracing::info!(
            action_id = %action.id,
            kind = %summary.kind,
            applied = summary.applied,
            course_id = %course_id,
            "Auto action executed"
        );
        self.ledger
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(summary.clone());
        Ok(summary)
    }

    /// 台账中仍保留的记录数
    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// 是否已执行过（仅限仍在台账中的记录）
    pub fn has_executed(&self, action_id: &str) -> bool {
        self.recorded(action_id).is_some()
    }

    fn recorded(&self, action_id: &str) -> Option<MutationSummary> {
        self.ledger
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(action_id)
            .cloned()
    }

    fn course_lock(&self, user_id: &str, course_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.course_locks.lock().unwrap_or_else(|p| p.into_inner());
        // 只剩表内引用的锁无人持有或等待，可以回收
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry((user_id.to_string(), course_id.to_string()))
                .or_default(),
        )
    }

    /// 单次带键修改；派生键已存在时不调用创建
    async fn apply(
        &self,
        action: &AutoAction,
        user_id: &str,
        course_id: &str,
        key: &str,
    ) -> Result<CreateOutcome, CoreError> {
        let outcome = match &action.action {
            ActionPayload::CreateStudyBlock {
                title,
                starts_at,
                duration_minutes,
                assignment_id,
                exam_id,
                ..
            } => {
                if let Some(existing) = self.store.find_by_key(user_id, course_id, key).await? {
                    return Ok(CreateOutcome {
                        resource_id: existing,
                        created: false,
                    });
                }
                self.store
                    .create_study_block(
                        user_id,
                        course_id,
                        NewStudyBlock {
                            key: key.to_string(),
                            title: title.clone(),
                            starts_at: *starts_at,
                            duration_minutes: *duration_minutes,
                            assignment_id: assignment_id.clone(),
                            exam_id: exam_id.clone(),
                        },
                    )
                    .await?
            }
            ActionPayload::GenerateFlashcards { title, .. } => {
                if let Some(existing) = self.store.find_by_key(user_id, course_id, key).await? {
                    return Ok(CreateOutcome {
                        resource_id: existing,
                        created: false,
                    });
                }
                self.store
                    .create_material(
                        user_id,
                        course_id,
                        NewMaterial {
                            key: key.to_string(),
                            title: title.clone(),
                            kind: MaterialKind::Flashcards,
                            linked_to: Vec::new(),
                        },
                    )
                    .await?
            }
            // 关联本身是幂等的：已关联时 created = false
            ActionPayload::LinkMaterial {
                material_id,
                target_id,
                ..
            } => {
                self.store
                    .link_material(user_id, course_id, material_id, target_id)
                    .await?
            }
            ActionPayload::Analyze { .. } | ActionPayload::Unknown => {
                return Err(CoreError::UnsupportedAction(format!(
                    "{} is not a mutating action",
                    action.action.kind()
                )))
            }
        };
        Ok(outcome)
    }
}

/// analyze：基于当前状态生成可读摘要
fn analyze(ctx: &CourseContext, action: &AutoAction, target_id: Option<&str>, focus: &str) -> String {
    let now = ctx.captured_at;
    let detail = target_id.and_then(|id| {
        if let Some(a) = ctx.assignments.iter().find(|a| a.id == id) {
            let hours = (a.due_at - now).num_hours();
            let linked = ctx.materials.iter().filter(|m| m.linked_to.iter().any(|t| t == id)).count();
            let timing = if hours < 0 {
                format!("{} hours overdue", -hours)
            } else {
                format!("due in {hours} hours")
            };
            return Some(format!(
                "{} is {timing}, {} with {linked} linked materials and {} study blocks.",
                a.title,
                if a.completed { "completed" } else { "not completed" },
                ctx.study_blocks.iter().filter(|b| b.assignment_id.as_deref() == Some(id)).count()
            ));
        }
        ctx.exams.iter().find(|e| e.id == id).map(|e| {
            let days = (e.date - now).num_days();
            format!(
                "{} is in {days} days; {} practice sets, {} flashcard decks and {} notes are available.",
                e.title,
                ctx.materials_of_kind(MaterialKind::PracticeQuestions).count(),
                ctx.materials_of_kind(MaterialKind::Flashcards).count(),
                ctx.notes.len()
            )
        })
    });
    match detail {
        Some(detail) => format!("[{focus}] {detail}"),
        None => format!("[{focus}] {}", action.description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::{Assignment, InMemoryAcademicStore};
    use crate::agents::AgentKind;
    use crate::auto_action::types::{ActionPriority, ActionType};
    use chrono::{Duration, Utc};

    async fn seeded() -> Arc<InMemoryAcademicStore> {
        let store = Arc::new(InMemoryAcademicStore::new());
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(Assignment {
            id: "a1".to_string(),
            title: "Essay".to_string(),
            due_at: Utc::now() + Duration::hours(20),
            completed: false,
        });
        store.seed(ctx).await;
        store
    }

    fn study_block_action() -> AutoAction {
        AutoAction::new(
            "deadline_without_study_block",
            ActionType::Warning,
            ActionPriority::Urgent,
            AgentKind::Assignment,
            "Schedule time for Essay",
            "",
            0.9,
            ActionPayload::CreateStudyBlock {
                key: "study_block:assignment:a1".to_string(),
                title: "Work on Essay".to_string(),
                starts_at: Utc::now() + Duration::hours(1),
                duration_minutes: 90,
                assignment_id: Some("a1".to_string()),
                exam_id: None,
            },
        )
    }

    #[tokio::test]
    async fn test_same_action_applies_once() {
        let store = seeded().await;
        let executor = AutoActionExecutor::new(store.clone());
        let action = study_block_action();

        let first = executor.execute(&action, "u1", "c1").await.unwrap();
        let second = executor.execute(&action, "u1", "c1").await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(first.resource_id, second.resource_id);
        assert_eq!(store.mutation_count(), 1);
        assert!(executor.has_executed(&action.id));
    }

    #[tokio::test]
    async fn test_new_detection_of_same_target_is_a_noop() {
        let store = seeded().await;
        let executor = AutoActionExecutor::new(store.clone());

        executor.execute(&study_block_action(), "u1", "c1").await.unwrap();
        let again = executor.execute(&study_block_action(), "u1", "c1").await.unwrap();

        assert!(!again.applied);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let store = seeded().await;
        let executor = AutoActionExecutor::new(store.clone());
        let mut action = study_block_action();
        action.action = ActionPayload::Unknown;

        let err = executor.execute(&action, "u1", "c1").await.unwrap_err();
        assert_eq!(err.code(), crate::core::ErrorCode::UnsupportedAction);
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_ledger_is_bounded_and_store_key_covers_evicted_actions() {
        let store = seeded().await;
        let executor = AutoActionExecutor::with_ledger_capacity(store.clone(), 1);
        let first = study_block_action();
        let mut second = study_block_action();
        second.action = ActionPayload::GenerateFlashcards {
            key: "flashcards:notes:c1".to_string(),
            title: "Essay flashcards".to_string(),
            note_ids: Vec::new(),
        };

        assert!(executor.execute(&first, "u1", "c1").await.unwrap().applied);
        assert!(executor.execute(&second, "u1", "c1").await.unwrap().applied);
        assert_eq!(executor.ledger_len(), 1);
        assert!(!executor.has_executed(&first.id));
        assert!(executor.has_executed(&second.id));

        let again = executor.execute(&first, "u1", "c1").await.unwrap();
        assert!(!again.applied);
        assert_eq!(store.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_idle_course_locks_are_released() {
        let store = seeded().await;
        let mut other = CourseContext::empty("u1", "c2");
        other.assignments.push(Assignment {
            id: "a1".to_string(),
            title: "Lab".to_string(),
            due_at: Utc::now() + Duration::hours(20),
            completed: false,
        });
        store.seed(other).await;
        let executor = AutoActionExecutor::new(store.clone());

        executor.execute(&study_block_action(), "u1", "c1").await.unwrap();
        executor.execute(&study_block_action(), "u1", "c2").await.unwrap();

        let locks = executor.course_locks.lock().unwrap();
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&("u1".to_string(), "c2".to_string())));
    }

    #[tokio::test]
    async fn test_store_failure_is_typed_and_not_recorded() {
        let store = seeded().await;
        let executor = AutoActionExecutor::new(store.clone());
        let action = study_block_action();

        let err = executor.execute(&action, "u1", "nope").await.unwrap_err();
        assert_eq!(err.code(), crate::core::ErrorCode::Store);
        assert!(!executor.has_executed(&action.id));
    }
}
