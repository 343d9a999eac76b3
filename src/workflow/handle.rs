//! 工作流句柄：轮询状态、等待结束、请求取消

use std::sync::Arc;

use tokio::sync::watch;

use crate::workflow::engine::WorkflowCell;
use crate::workflow::types::{Workflow, WorkflowId, WorkflowStatus};

/// start() 立即返回的句柄；被丢弃不会影响工作流继续执行
pub struct WorkflowHandle {
    id: WorkflowId,
    status_rx: watch::Receiver<WorkflowStatus>,
    cell: Arc<WorkflowCell>,
}

impl WorkflowHandle {
    pub(crate) fn new(id: WorkflowId, status_rx: watch::Receiver<WorkflowStatus>, cell: Arc<WorkflowCell>) -> Self {
        Self { id, status_rx, cell }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 当前状态（不阻塞）
    pub fn status(&self) -> WorkflowStatus {
        *self.status_rx.borrow()
    }

    /// 等待工作流结束，返回终态快照（含失败时的部分 Step 树）
    pub async fn wait(&self) -> Workflow {
        let mut rx = self.status_rx.clone();
        loop {
            if rx.borrow_and_update().is_terminal() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.cell.snapshot().await
    }

    /// 请求协作式取消
    pub fn cancel(&self) {
        if !self.status().is_terminal() {
            self.cell.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cell.token.is_cancelled()
    }
}

impl std::fmt::Debug for WorkflowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
