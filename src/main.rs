//! Scholar 演示程序
//!
//! 入口：初始化日志、加载配置、准备一门内存课程，用脚本化 Agent 跑一次
//! assignment → course 的委派，打印轨迹 JSON，然后检测并执行排在最前的自动建议。

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use scholar::academic::{Assignment, CourseContext, Exam, InMemoryAcademicStore, Material, MaterialKind, Note};
use scholar::agents::{AgentKind, AgentTurn, ScriptedAgent, ToolCallRequest};
use scholar::auto_action::ActionBoard;
use scholar::config::{load_config, AppConfig};
use scholar::workflow::{StepTree, WorkflowRequest, WorkflowTrace};
use scholar::{observability, CoreRuntime};

const USER: &str = "demo-user";
const COURSE: &str = "cs101";

fn demo_course() -> CourseContext {
    let now = Utc::now();
    let mut ctx = CourseContext::empty(USER, COURSE);
    ctx.assignments.push(Assignment {
        id: "hw3".to_string(),
        title: "Recursion problem set".to_string(),
        due_at: now + Duration::hours(24),
        completed: false,
    });
    ctx.exams.push(Exam {
        id: "midterm".to_string(),
        title: "Midterm: recursion and lists".to_string(),
        date: now + Duration::days(5),
    });
    ctx.materials.push(Material {
        id: "lec4".to_string(),
        title: "Lecture 4 recursion".to_string(),
        kind: MaterialKind::Lecture,
        linked_to: Vec::new(),
        key: None,
    });
    ctx.notes.push(Note {
        id: "n1".to_string(),
        title: "Base cases".to_string(),
        content: "Every recursive function needs a base case.".to_string(),
        created_at: now - Duration::days(2),
    });
    ctx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {}", e);
        AppConfig::default()
    });

    let store = Arc::new(InMemoryAcademicStore::new());
    store.seed(demo_course()).await;

    let assignment_turn = AgentTurn::completed("HW3 needs the recursion material, asking the course agent")
        .with_call(ToolCallRequest::delegate(
            AgentKind::Course,
            "Explain the recursion concepts needed for HW3",
        ));
    let runtime = CoreRuntime::builder(config)
        .with_store(store.clone())
        .with_agent(AgentKind::Assignment, ScriptedAgent::new(assignment_turn))
        .with_agent(
            AgentKind::Course,
            ScriptedAgent::completed("Lecture 4 covers base cases and the recursive step"),
        )
        .build();

    let request = WorkflowRequest::builder("Help me get started on HW3")
        .user_id(USER)
        .course_id(COURSE)
        .agent(AgentKind::Assignment)
        .build()
        .context("Invalid workflow request")?;
    let handle = runtime.start(request).await.context("Failed to start workflow")?;
    let workflow = handle.wait().await;

    println!("{}", StepTree::new(&workflow).outline());
    let trace = WorkflowTrace::from(workflow);
    println!(
        "{}",
        serde_json::to_string_pretty(&trace).context("Failed to serialize trace")?
    );

    let actions = runtime
        .detect(USER, COURSE)
        .await
        .context("Auto-action detection failed")?;
    let mut board = ActionBoard::new(actions);
    for action in board.visible(runtime.config.auto_action.display_cap) {
        println!(
            "[{}/{}] {} ({:.2}) - {}",
            action.action_type, action.priority, action.title, action.confidence, action.description
        );
    }

    let top_id = board.visible(1).first().map(|a| a.id.clone());
    if let Some(action) = top_id.and_then(|id| board.take(&id)) {
        let summary = runtime
            .execute_action(&action, USER, COURSE)
            .await
            .context("Auto-action execution failed")?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    runtime.engine.shutdown();
    Ok(())
}
