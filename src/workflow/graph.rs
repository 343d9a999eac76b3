//! Step 委派树
//!
//! Step 以扁平 arena 存放，parent_step_id 构成树。这里提供祖先链、环检测与任务签名，
//! 供引擎在 call_agent 前做深度 / 环守卫，也供测试校验树的结构不变式。

use std::collections::HashSet;

use crate::agents::AgentKind;
use crate::workflow::types::*;

/// 任务签名：目标 Agent + 归一化任务文本（小写、折叠空白）
pub fn task_signature(agent: AgentKind, task: &str) -> String {
    let normalized = task
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{agent}::{normalized}")
}

/// 工作流 Step 树的只读视图
pub struct StepTree<'a> {
    workflow: &'a Workflow,
}

impl<'a> StepTree<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        Self { workflow }
    }

    /// 从 step 自身开始向上直到根的链（含自身）；遇到断链或环时停止
    pub fn lineage(&self, step_id: &str) -> Vec<&'a Step> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.workflow.step(step_id);
        while let Some(step) = current {
            if !seen.insert(step.id.as_str()) {
                break;
            }
            chain.push(step);
            current = step
                .parent_step_id
                .as_deref()
                .and_then(|p| self.workflow.step(p));
        }
        chain
    }

    /// 链上是否已有未结束的 Step 在以相同签名处理同一任务
    pub fn has_active_duplicate(&self, from_step: &str, agent: AgentKind, task: &str) -> bool {
        let signature = task_signature(agent, task);
        self.lineage(from_step).into_iter().any(|s| {
            !s.status.is_terminal() && s.agent == agent && task_signature(s.agent, &s.action) == signature
        })
    }

    /// 最大委派深度
    pub fn max_depth(&self) -> usize {
        self.workflow.steps.iter().map(|s| s.depth).max().unwrap_or(0)
    }

    /// 校验结构：父 Step 存在且排在子 Step 之前、深度 = 父深度 + 1、无环
    pub fn is_well_formed(&self) -> bool {
        let mut positions = std::collections::HashMap::new();
        for (i, step) in self.workflow.steps.iter().enumerate() {
            positions.insert(step.id.as_str(), i);
        }
        for (i, step) in self.workflow.steps.iter().enumerate() {
            match step.parent_step_id.as_deref() {
                None => {
                    if i != 0 || step.depth != 0 {
                        return false;
                    }
                }
                Some(parent_id) => {
                    let Some(&pi) = positions.get(parent_id) else {
                        return false;
                    };
                    let parent = &self.workflow.steps[pi];
                    if pi >= i || step.depth != parent.depth + 1 || parent.started_at > step.started_at {
                        return false;
                    }
                }
            }
            if self.lineage(&step.id).len() != step.depth + 1 {
                return false;
            }
        }
        true
    }

    /// 缩进文本大纲，供日志与终端展示
    pub fn outline(&self) -> String {
        self.workflow
            .steps
            .iter()
            .map(|s| {
                format!(
                    "{}- [{:?}] {}: {}",
                    "  ".repeat(s.depth),
                    s.status,
                    s.agent,
                    s.action
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> (Workflow, Vec<StepId>) {
        let mut wf = Workflow::new("u1", "c1", "plan");
        let root = Step::new(AgentKind::Planner, "plan", None);
        let mid = Step::new(AgentKind::Exam, "Prepare  Midterm", Some(&root));
        let leaf = Step::new(AgentKind::Research, "find sources", Some(&mid));
        let ids = vec![wf.push_step(root), wf.push_step(mid), wf.push_step(leaf)];
        (wf, ids)
    }

    #[test]
    fn test_signature_normalizes_whitespace_and_case() {
        assert_eq!(
            task_signature(AgentKind::Exam, "Prepare  Midterm "),
            task_signature(AgentKind::Exam, "prepare midterm")
        );
        assert_ne!(
            task_signature(AgentKind::Exam, "prepare midterm"),
            task_signature(AgentKind::Course, "prepare midterm")
        );
    }

    #[test]
    fn test_lineage_and_depth() {
        let (wf, ids) = chain();
        let tree = StepTree::new(&wf);
        let lineage = tree.lineage(&ids[2]);
        assert_eq!(lineage.len(), 3);
        assert_eq!(lineage[2].id, ids[0]);
        assert_eq!(tree.max_depth(), 2);
        assert!(tree.is_well_formed());
    }

    #[test]
    fn test_active_duplicate_only_counts_unterminated_ancestors() {
        let (mut wf, ids) = chain();
        {
            let tree = StepTree::new(&wf);
            assert!(tree.has_active_duplicate(&ids[2], AgentKind::Exam, "prepare midterm"));
            assert!(!tree.has_active_duplicate(&ids[2], AgentKind::Exam, "prepare final"));
        }
        wf.step_mut(&ids[1]).unwrap().status = StepStatus::Completed;
        let tree = StepTree::new(&wf);
        assert!(!tree.has_active_duplicate(&ids[2], AgentKind::Exam, "prepare midterm"));
    }

    #[test]
    fn test_detects_malformed_parent_pointer() {
        let (mut wf, ids) = chain();
        wf.step_mut(&ids[0]).unwrap().parent_step_id = Some(ids[2].clone());
        assert!(!StepTree::new(&wf).is_well_formed());
    }
}
