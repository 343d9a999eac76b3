//! 自动建议集成测试：检测、排序与幂等执行

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use scholar::academic::{
        AcademicStore, Assignment, CourseContext, Exam, InMemoryAcademicStore, Material, MaterialKind, Note,
    };
    use scholar::auto_action::{ActionPayload, ActionPriority, ActionType};
    use scholar::config::AppConfig;
    use scholar::CoreRuntime;

    async fn runtime_with(ctx: CourseContext) -> (CoreRuntime, Arc<InMemoryAcademicStore>) {
        let store = Arc::new(InMemoryAcademicStore::new());
        store.seed(ctx).await;
        let runtime = CoreRuntime::builder(AppConfig::default())
            .with_store(store.clone())
            .build();
        (runtime, store)
    }

    fn assignment(id: &str, title: &str, due_in: Duration) -> Assignment {
        Assignment {
            id: id.to_string(),
            title: title.to_string(),
            due_at: Utc::now() + due_in,
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_deadline_in_24h_without_study_block_is_urgent_warning() {
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("a1", "Essay draft", Duration::hours(24)));
        let (runtime, _) = runtime_with(ctx).await;

        let actions = runtime.detect("u1", "c1").await.unwrap();

        assert_eq!(actions.len(), 1);
        let action = &actions[0];
        assert_eq!(action.action_type, ActionType::Warning);
        assert_eq!(action.priority, ActionPriority::Urgent);
        assert!(matches!(action.action, ActionPayload::CreateStudyBlock { .. }));

        let json = serde_json::to_value(action).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["priority"], "urgent");
        assert_eq!(json["action"]["type"], "create_study_block");
    }

    #[tokio::test]
    async fn test_executing_twice_mutates_once() {
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("a1", "Essay draft", Duration::hours(24)));
        let (runtime, store) = runtime_with(ctx).await;

        let action = runtime.detect("u1", "c1").await.unwrap().remove(0);
        let first = runtime.execute_action(&action, "u1", "c1").await.unwrap();
        let second = runtime.execute_action(&action, "u1", "c1").await.unwrap();

        assert!(first.applied);
        assert!(!second.applied);
        assert_eq!(first.resource_id, second.resource_id);
        assert_eq!(store.mutation_count(), 1);
        assert_eq!(store.course_context("u1", "c1").await.unwrap().study_blocks.len(), 1);

        // 已有学习时段后不再产生同一条警告
        let again = runtime.detect("u1", "c1").await.unwrap();
        assert!(again.iter().all(|a| a.action_type != ActionType::Warning));
    }

    #[tokio::test]
    async fn test_concurrent_executions_of_same_target_create_one_block() {
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("a1", "Essay draft", Duration::hours(10)));
        let (runtime, store) = runtime_with(ctx).await;

        // 两次独立检测得到不同 id、相同派生键
        let a = runtime.detect("u1", "c1").await.unwrap().remove(0);
        let b = runtime.detect("u1", "c1").await.unwrap().remove(0);
        assert_ne!(a.id, b.id);

        let (ra, rb) = tokio::join!(
            runtime.execute_action(&a, "u1", "c1"),
            runtime.execute_action(&b, "u1", "c1")
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(ra.applied as u8 + rb.applied as u8, 1);
        assert_eq!(ra.resource_id, rb.resource_id);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_analyze_action_leaves_store_untouched() {
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("late", "Lab report", -Duration::days(2)));
        let (runtime, store) = runtime_with(ctx).await;

        let actions = runtime.detect("u1", "c1").await.unwrap();
        let analyze = actions
            .iter()
            .find(|a| matches!(a.action, ActionPayload::Analyze { .. }))
            .expect("overdue assignment should produce an analyze action");
        assert_eq!(analyze.action_type, ActionType::Reminder);

        let mut before = store.course_context("u1", "c1").await.unwrap();
        let summary = runtime.execute_action(analyze, "u1", "c1").await.unwrap();
        let after = store.course_context("u1", "c1").await.unwrap();
        before.captured_at = after.captured_at;

        assert!(!summary.applied);
        assert!(!summary.message.is_empty());
        assert_eq!(before, after);
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_detection_output_is_sorted_with_unique_ids() {
        let now = Utc::now();
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("a1", "Graph search", Duration::hours(30)));
        ctx.assignments.push(assignment("a0", "Warmup", -Duration::days(1)));
        ctx.exams.push(Exam {
            id: "e1".to_string(),
            title: "Graphs midterm".to_string(),
            date: now + Duration::days(4),
        });
        ctx.materials.push(Material {
            id: "m1".to_string(),
            title: "Graph search slides".to_string(),
            kind: MaterialKind::Slides,
            linked_to: Vec::new(),
            key: None,
        });
        for i in 0..3 {
            ctx.notes.push(Note {
                id: format!("n{i}"),
                title: format!("Lecture {i}"),
                content: "BFS and DFS".to_string(),
                created_at: now - Duration::days(i),
            });
        }
        let (runtime, _) = runtime_with(ctx).await;

        let actions = runtime.detect("u1", "c1").await.unwrap();

        assert!(actions.len() >= 4);
        for pair in actions.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.priority.rank() > b.priority.rank()
                    || (a.priority == b.priority && a.confidence >= b.confidence),
                "{} before {}",
                a.title,
                b.title
            );
        }
        for action in &actions {
            assert!((0.0..=1.0).contains(&action.confidence));
        }
        let mut ids: Vec<_> = actions.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), actions.len());
        assert_eq!(actions[0].priority, ActionPriority::Urgent);
    }

    #[tokio::test]
    async fn test_unknown_action_type_is_rejected_without_mutation() {
        let mut ctx = CourseContext::empty("u1", "c1");
        ctx.assignments.push(assignment("a1", "Essay draft", Duration::hours(24)));
        let (runtime, store) = runtime_with(ctx).await;

        let mut json = serde_json::to_value(runtime.detect("u1", "c1").await.unwrap().remove(0)).unwrap();
        json["action"] = serde_json::json!({ "type": "delete_course" });
        let action = serde_json::from_value(json).unwrap();

        let err = runtime.execute_action(&action, "u1", "c1").await.unwrap_err();
        assert_eq!(err.code(), scholar::core::ErrorCode::UnsupportedAction);
        assert_eq!(store.mutation_count(), 0);
    }
}
