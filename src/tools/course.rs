//! 课程只读工具：course_overview / list_deadlines / find_materials
//!
//! 只读取 ToolContext 中的不可变快照，不访问存储。

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;

use crate::tools::{Tool, ToolContext};

/// course_overview：课程概况（各类数据的数量与最近截止）
pub struct CourseOverviewTool;

#[async_trait]
impl Tool for CourseOverviewTool {
    fn name(&self) -> &str {
        "course_overview"
    }

    fn description(&self) -> &str {
        "Summarise the current course: counts of assignments, exams, materials, notes and study blocks, plus the next deadline."
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let snap = &ctx.snapshot;
        let next_deadline = snap
            .pending_assignments()
            .filter(|a| a.due_at >= snap.captured_at)
            .min_by_key(|a| a.due_at)
            .map(|a| serde_json::json!({ "id": a.id, "title": a.title, "due_at": a.due_at }));
        Ok(serde_json::json!({
            "course_id": snap.course_id,
            "assignments": snap.assignments.len(),
            "pending_assignments": snap.pending_assignments().count(),
            "exams": snap.exams.len(),
            "materials": snap.materials.len(),
            "notes": snap.notes.len(),
            "study_blocks": snap.study_blocks.len(),
            "next_deadline": next_deadline,
        }))
    }
}

/// list_deadlines：未来 N 天内的作业截止与考试（按时间排序）
pub struct ListDeadlinesTool;

#[async_trait]
impl Tool for ListDeadlinesTool {
    fn name(&self) -> &str {
        "list_deadlines"
    }

    fn description(&self) -> &str {
        "List pending assignment deadlines and exams in the next N days. Args: {\"within_days\": 14}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "within_days": { "type": "integer", "minimum": 1 }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let within_days = args.get("within_days").and_then(|v| v.as_i64()).unwrap_or(14);
        if within_days < 1 {
            return Err(format!("within_days must be positive, got {within_days}"));
        }
        let snap = &ctx.snapshot;
        let now = snap.captured_at;
        let horizon = now + Duration::days(within_days);

        let mut items: Vec<(chrono::DateTime<chrono::Utc>, Value)> = Vec::new();
        for a in snap.pending_assignments().filter(|a| a.due_at >= now && a.due_at <= horizon) {
            items.push((
                a.due_at,
                serde_json::json!({ "kind": "assignment", "id": a.id, "title": a.title, "at": a.due_at }),
            ));
        }
        for e in snap.exams.iter().filter(|e| e.date >= now && e.date <= horizon) {
            items.push((
                e.date,
                serde_json::json!({ "kind": "exam", "id": e.id, "title": e.title, "at": e.date }),
            ));
        }
        items.sort_by_key(|(at, _)| *at);
        Ok(Value::Array(items.into_iter().map(|(_, v)| v).collect()))
    }
}

/// find_materials：按关键词（标题）与可选类型检索课程资料
pub struct FindMaterialsTool;

#[async_trait]
impl Tool for FindMaterialsTool {
    fn name(&self) -> &str {
        "find_materials"
    }

    fn description(&self) -> &str {
        "Search course materials by title keyword, optionally filtered by kind. Args: {\"query\": \"recursion\", \"kind\": \"practice_questions\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "kind": { "type": "string" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing query".to_string())?
            .to_lowercase();
        let kind = match args.get("kind") {
            Some(k) if !k.is_null() => Some(
                serde_json::from_value::<crate::academic::MaterialKind>(k.clone())
                    .map_err(|e| format!("Invalid kind: {e}"))?,
            ),
            _ => None,
        };
        let hits: Vec<Value> = ctx
            .snapshot
            .materials
            .iter()
            .filter(|m| kind.map_or(true, |k| m.kind == k))
            .filter(|m| query.is_empty() || m.title.to_lowercase().contains(&query))
            .map(|m| serde_json::json!({ "id": m.id, "title": m.title, "kind": m.kind }))
            .collect();
        Ok(Value::Array(hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::academic::{
        AcademicStore, Assignment, CourseContext, Exam, InMemoryAcademicStore, Material, MaterialKind,
    };
    use crate::agents::AgentKind;
    use std::sync::Arc;

    fn ctx() -> ToolContext {
        let mut snap = CourseContext::empty("u1", "c1");
        let now = snap.captured_at;
        snap.assignments.push(Assignment {
            id: "a_late".to_string(),
            title: "Late essay".to_string(),
            due_at: now + Duration::days(20),
            completed: false,
        });
        snap.assignments.push(Assignment {
            id: "a_soon".to_string(),
            title: "Problem set".to_string(),
            due_at: now + Duration::days(2),
            completed: false,
        });
        snap.exams.push(Exam {
            id: "e1".to_string(),
            title: "Midterm".to_string(),
            date: now + Duration::days(1),
        });
        snap.materials.push(Material {
            id: "m1".to_string(),
            title: "Recursion practice".to_string(),
            kind: MaterialKind::PracticeQuestions,
            linked_to: vec![],
            key: None,
        });
        snap.materials.push(Material {
            id: "m2".to_string(),
            title: "Recursion lecture".to_string(),
            kind: MaterialKind::Lecture,
            linked_to: vec![],
            key: None,
        });
        let store: Arc<dyn AcademicStore> = Arc::new(InMemoryAcademicStore::new());
        ToolContext {
            user_id: "u1".to_string(),
            course_id: "c1".to_string(),
            agent: AgentKind::Course,
            snapshot: Arc::new(snap),
            store,
        }
    }

    #[tokio::test]
    async fn test_list_deadlines_sorted_within_window() {
        let out = ListDeadlinesTool
            .execute(serde_json::json!({"within_days": 7}), &ctx())
            .await
            .unwrap();
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "e1");
        assert_eq!(items[1]["id"], "a_soon");
    }

    #[tokio::test]
    async fn test_find_materials_by_kind() {
        let out = FindMaterialsTool
            .execute(
                serde_json::json!({"query": "recursion", "kind": "practice_questions"}),
                &ctx(),
            )
            .await
            .unwrap();
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "m1");

        let err = FindMaterialsTool.execute(serde_json::json!({}), &ctx()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_overview_reports_next_deadline() {
        let out = CourseOverviewTool.execute(Value::Null, &ctx()).await.unwrap();
        assert_eq!(out["pending_assignments"], 2);
        assert_eq!(out["next_deadline"]["id"], "a_soon");
    }
}
