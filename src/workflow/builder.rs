//! 工作流请求构建器
//!
//! 提供流畅的API来构建一次编排请求

use std::time::Duration;

use crate::academic::CourseContext;
use crate::agents::AgentKind;
use crate::config::WorkflowSection;
use crate::core::CoreError;

/// 委派与超时限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowLimits {
    pub max_depth: usize,
    pub max_steps: usize,
    pub step_timeout: Duration,
}

impl WorkflowLimits {
    pub fn from_config(cfg: &WorkflowSection) -> Self {
        Self {
            max_depth: cfg.max_depth,
            max_steps: cfg.max_steps,
            step_timeout: cfg.step_timeout(),
        }
    }
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self::from_config(&WorkflowSection::default())
    }
}

/// 一次编排请求
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub user_id: String,
    pub course_id: String,
    pub request: String,
    pub initial_agent: AgentKind,
    pub max_depth: Option<usize>,
    pub max_steps: Option<usize>,
    pub step_timeout: Option<Duration>,
    /// 调用方预先组装的快照；为空时由引擎从存储读取
    pub context: Option<CourseContext>,
}

impl WorkflowRequest {
    pub fn builder(request: impl Into<String>) -> WorkflowRequestBuilder {
        WorkflowRequestBuilder::new(request)
    }

    /// 以引擎默认限制为基础套用本请求的覆盖
    pub fn limits(&self, defaults: WorkflowLimits) -> WorkflowLimits {
        WorkflowLimits {
            max_depth: self.max_depth.unwrap_or(defaults.max_depth),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
            step_timeout: self.step_timeout.unwrap_or(defaults.step_timeout),
        }
    }
}

/// 请求构建器
pub struct WorkflowRequestBuilder {
    user_id: String,
    course_id: String,
    request: String,
    initial_agent: AgentKind,
    max_depth: Option<usize>,
    max_steps: Option<usize>,
    step_timeout: Option<Duration>,
    context: Option<CourseContext>,
}

impl WorkflowRequestBuilder {
    /// 创建构建器，默认交给 planner
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            user_id: String::new(),
            course_id: String::new(),
            request: request.into(),
            initial_agent: AgentKind::Planner,
            max_depth: None,
            max_steps: None,
            step_timeout: None,
            context: None,
        }
    }

    /// 设置用户ID
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// 设置课程ID
    pub fn course_id(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = course_id.into();
        self
    }

    /// 设置根 Step 的 Agent
    pub fn agent(mut self, agent: AgentKind) -> Self {
        self.initial_agent = agent;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// 直接提供课程快照
    pub fn context(mut self, context: CourseContext) -> Self {
        self.context = Some(context);
        self
    }

    /// 构建请求
    pub fn build(self) -> Result<WorkflowRequest, CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::InvalidRequest("user_id is required".to_string()));
        }
        if self.course_id.trim().is_empty() {
            return Err(CoreError::InvalidRequest("course_id is required".to_string()));
        }
        if self.request.trim().is_empty() {
            return Err(CoreError::InvalidRequest("request text is empty".to_string()));
        }
        if let Some(ctx) = &self.context {
            if ctx.user_id != self.user_id || ctx.course_id != self.course_id {
                return Err(CoreError::InvalidRequest(format!(
                    "context belongs to {}/{}, not {}/{}",
                    ctx.user_id, ctx.course_id, self.user_id, self.course_id
                )));
            }
        }

        Ok(WorkflowRequest {
            user_id: self.user_id,
            course_id: self.course_id,
            request: self.request,
            initial_agent: self.initial_agent,
            max_depth: self.max_depth,
            max_steps: self.max_steps,
            step_timeout: self.step_timeout,
            context: self.context,
        })
    }
}
