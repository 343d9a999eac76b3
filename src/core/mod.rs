//! 核心层：错误与恢复、工作流取消监管、运行时装配

pub mod builder;
pub mod error;
pub mod recovery;
pub mod supervisor;

pub use builder::{CoreRuntime, RuntimeBuilder};
pub use error::{CoreError, ErrorCode, RecoveryAction};
pub use recovery::RecoveryEngine;
pub use supervisor::WorkflowSupervisor;
