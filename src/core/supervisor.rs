//! 工作流监管：取消令牌管理
//!
//! 引擎级根 token（关闭时整体取消）派生出每个工作流的子 token；
//! 子 token 沿递归 call_agent 调用链传递，实现协作式取消。

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 每个工作流一个取消令牌；锁只在注册 / 查找 / 移除时短暂持有
#[derive(Debug)]
pub struct WorkflowSupervisor {
    root: CancellationToken,
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl WorkflowSupervisor {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// 为工作流创建子 token（根 token 取消时一并取消）
    pub fn register(&self, workflow_id: &str) -> CancellationToken {
        let token = self.root.child_token();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(workflow_id.to_string(), token.clone());
        }
        token
    }

    /// 请求取消指定工作流；返回该工作流是否仍在监管中
    pub fn cancel(&self, workflow_id: &str) -> bool {
        let token = self
            .tokens
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(workflow_id).cloned());
        match token {
            Some(t) => {
                t.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self, workflow_id: &str) -> bool {
        self.tokens
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(workflow_id).map(|t| t.is_cancelled()))
            .unwrap_or(false)
    }

    /// 工作流结束后释放 token
    pub fn release(&self, workflow_id: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(workflow_id);
        }
    }

    /// 取消所有工作流（进程关闭）
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

impl Default for WorkflowSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_only_targets_one_workflow() {
        let supervisor = WorkflowSupervisor::new();
        let a = supervisor.register("wf_a");
        let b = supervisor.register("wf_b");

        assert!(supervisor.cancel("wf_a"));
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(supervisor.is_cancelled("wf_a"));
    }

    #[test]
    fn test_shutdown_cancels_children_and_release_forgets() {
        let supervisor = WorkflowSupervisor::new();
        let a = supervisor.register("wf_a");
        supervisor.shutdown();
        assert!(a.is_cancelled());

        supervisor.release("wf_a");
        assert!(!supervisor.cancel("wf_a"));
    }
}
