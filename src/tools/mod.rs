pub mod call_agent;
pub mod course;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod study_block;

pub use call_agent::{CallAgentTool, CALL_AGENT};
pub use course::{CourseOverviewTool, FindMaterialsTool, ListDeadlinesTool};
pub use executor::ToolExecutor;
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use schema::{call_agent_schema, CallAgentArgs};
pub use study_block::CreateStudyBlockTool;

/// 内置工具注册表：call_agent 与课程工具
pub fn builtin_registry() -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CallAgentTool);
    tools.register(CourseOverviewTool);
    tools.register(ListDeadlinesTool);
    tools.register(FindMaterialsTool);
    tools.register(CreateStudyBlockTool);
    tools
}
