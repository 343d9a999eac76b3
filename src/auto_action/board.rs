//! 调用方持有的建议工作集
//!
//! 保存一次检测的结果；展示时截取前 N 条，执行或忽略后从集合中移除，不会再次提供。

use crate::auto_action::types::AutoAction;

#[derive(Debug, Clone, Default)]
pub struct ActionBoard {
    actions: Vec<AutoAction>,
}

impl ActionBoard {
    /// 以一次检测结果（已排序）替换当前集合
    pub fn new(actions: Vec<AutoAction>) -> Self {
        Self { actions }
    }

    pub fn replace(&mut self, actions: Vec<AutoAction>) {
        self.actions = actions;
    }

    /// 前 cap 条
    pub fn visible(&self, cap: usize) -> &[AutoAction] {
        &self.actions[..cap.min(self.actions.len())]
    }

    pub fn get(&self, id: &str) -> Option<&AutoAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// 用户忽略
    pub fn dismiss(&mut self, id: &str) -> bool {
        self.take(id).is_some()
    }

    /// 取出以执行
    pub fn take(&mut self, id: &str) -> Option<AutoAction> {
        let pos = self.actions.iter().position(|a| a.id == id)?;
        Some(self.actions.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
