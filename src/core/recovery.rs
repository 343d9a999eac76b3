//! 错误恢复引擎
//!
//! 根据 CoreError 类型与已尝试次数返回 RecoveryAction，供 Dispatcher 决定是重试、记录失败还是终止。
//! 守卫类错误（深度 / 步数 / 环）与取消永不重试。

use crate::core::{CoreError, RecoveryAction};

/// 有界重试策略：瞬时失败（Agent 提供方报错、工具失败）最多重试 max_retries 次，线性退避
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_retries: u32,
    backoff_ms: u64,
}

impl RecoveryEngine {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
        }
    }

    /// attempt 从 1 开始计数（第一次失败后为 1）
    pub fn handle(&self, err: &CoreError, attempt: u32) -> RecoveryAction {
        if err.is_guard_violation() {
            return RecoveryAction::Abort;
        }
        match err {
            CoreError::Cancelled | CoreError::StepTimeout(_) => RecoveryAction::Abort,
            CoreError::AgentFailed(_) | CoreError::ToolExecutionFailed(_) => {
                if attempt <= self.max_retries {
                    RecoveryAction::Retry {
                        backoff_ms: self.backoff_ms * u64::from(attempt),
                    }
                } else {
                    RecoveryAction::Record
                }
            }
            _ => RecoveryAction::Record,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(1, 200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_retries_agent_failure_then_records() {
        let engine = RecoveryEngine::new(2, 100);
        let err = CoreError::AgentFailed("provider 503".to_string());
        assert_eq!(engine.handle(&err, 1), RecoveryAction::Retry { backoff_ms: 100 });
        assert_eq!(engine.handle(&err, 2), RecoveryAction::Retry { backoff_ms: 200 });
        assert_eq!(engine.handle(&err, 3), RecoveryAction::Record);
    }

    #[test]
    fn test_recovery_never_retries_guards() {
        let engine = RecoveryEngine::new(5, 10);
        let err = CoreError::StepCountExceeded { current: 50, max: 50 };
        assert_eq!(engine.handle(&err, 1), RecoveryAction::Abort);
        let err = CoreError::DelegationCycleDetected {
            agent: "course".to_string(),
            task: "summarize".to_string(),
        };
        assert_eq!(engine.handle(&err, 1), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::default();
        assert_eq!(engine.handle(&CoreError::Cancelled, 1), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_unknown_agent_is_recorded() {
        let engine = RecoveryEngine::default();
        let err = CoreError::UnknownAgent("librarian".to_string());
        assert_eq!(engine.handle(&err, 1), RecoveryAction::Record);
    }
}
