//! create_study_block 工具：在课程日历中创建学习时段
//!
//! 经存储按派生键创建，同一作业 / 考试重复调用不会产生第二个时段。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::academic::{keys, NewStudyBlock};
use crate::tools::{Tool, ToolContext};

#[derive(Debug, Deserialize)]
struct CreateStudyBlockArgs {
    title: String,
    starts_at: DateTime<Utc>,
    #[serde(default = "default_duration")]
    duration_minutes: u32,
    #[serde(default)]
    assignment_id: Option<String>,
    #[serde(default)]
    exam_id: Option<String>,
}

fn default_duration() -> u32 {
    60
}

pub struct CreateStudyBlockTool;

#[async_trait]
impl Tool for CreateStudyBlockTool {
    fn name(&self) -> &str {
        "create_study_block"
    }

    fn description(&self) -> &str {
        "Create a study block in the student's calendar, optionally linked to an assignment or exam. Args: {\"title\": \"...\", \"starts_at\": \"RFC3339\", \"duration_minutes\": 60, \"assignment_id\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "starts_at": { "type": "string", "format": "date-time" },
                "duration_minutes": { "type": "integer", "minimum": 1 },
                "assignment_id": { "type": "string" },
                "exam_id": { "type": "string" }
            },
            "required": ["title", "starts_at"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let args: CreateStudyBlockArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {e}"))?;
        if args.duration_minutes == 0 {
            return Err("duration_minutes must be positive".to_string());
        }
        let key = match (&args.assignment_id, &args.exam_id) {
            (Some(a), _) => keys::study_block_for_assignment(a),
            (None, Some(e)) => keys::study_block_for_exam(e),
            (None, None) => keys::study_block_adhoc(&args.title, &args.starts_at),
        };
        let outcome = ctx
            .store
            .create_study_block(
                &ctx.user_id,
                &ctx.course_id,
                NewStudyBlock {
                    key: key.clone(),
                    title: args.title,
                    starts_at: args.starts_at,
                    duration_minutes: args.duration_minutes,
                    assignment_id: args.assignment_id,
                    exam_id: args.exam_id,
                },
            )
            .await
            .map_err(|e| e.to_string())?;
        Ok(serde_json::json!({
            "study_block_id": outcome.resource_id,
            "created": outcome.created,
            "key": key,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::{AcademicStore, CourseContext, InMemoryAcademicStore};
    use crate::agents::AgentKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_twice_for_same_assignment() {
        let store = Arc::new(InMemoryAcademicStore::new());
        store.seed(CourseContext::empty("u1", "c1")).await;
        let shared: Arc<dyn AcademicStore> = store.clone();
        let ctx = ToolContext {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            agent: AgentKind::Assignment,
            snapshot: Arc::new(CourseContext::empty("u1", "c1")),
            store: shared,
        };
        let args = serde_json::json!({
            "title": "Essay draft",
            "starts_at": "2026-05-01T09:00:00Z",
            "assignment_id": "a1"
        });

        let first = CreateStudyBlockTool.execute(args.clone(), &ctx).await.unwrap();
        let second = CreateStudyBlockTool.execute(args, &ctx).await.unwrap();

        assert_eq!(first["created"], true);
        assert_eq!(second["created"], false);
        assert_eq!(first["study_block_id"], second["study_block_id"]);
        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_bad_arguments() {
        let store: Arc<dyn AcademicStore> = Arc::new(InMemoryAcademicStore::new());
        let ctx = ToolContext {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            agent: AgentKind::Planner,
            snapshot: Arc::new(CourseContext::empty("u1", "c1")),
            store,
        };
        let err = CreateStudyBlockTool
            .execute(serde_json::json!({"title": "x"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.contains("Invalid arguments"));
    }
}
