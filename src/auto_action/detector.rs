//! 自动建议检测器
//!
//! 读取课程快照、依次运行规则、合并并排序。只读，不持有任何建议。
//! 返回完整排序列表；展示条数由调用方决定（见 ActionBoard）。

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::academic::{AcademicStore, CourseContext};
use crate::auto_action::rules::{default_rules, DetectionRule};
use crate::auto_action::types::AutoAction;
use crate::config::AutoActionSection;
use crate::core::CoreError;

pub struct Detector {
    store: Arc<dyn AcademicStore>,
    rules: Vec<Box<dyn DetectionRule>>,
    settings: AutoActionSection,
}

impl Detector {
    /// 使用内置规则集
    pub fn new(store: Arc<dyn AcademicStore>, settings: AutoActionSection) -> Self {
        Self::with_rules(store, settings, default_rules())
    }

    pub fn with_rules(
        store: Arc<dyn AcademicStore>,
        settings: AutoActionSection,
        rules: Vec<Box<dyn DetectionRule>>,
    ) -> Self {
        Self { store, rules, settings }
    }

    /// 追加规则（排在已有规则之后）
    pub fn add_rule(&mut self, rule: Box<dyn DetectionRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// 对 (user, course) 的当前状态运行检测
    pub async fn detect(&self, user_id: &str, course_id: &str) -> Result<Vec<AutoAction>, CoreError> {
        let ctx = self.store.course_context(user_id, course_id).await?;
        let actions = self.detect_at(&ctx, Utc::now());
        tracing::debug!(user_id = %user_id, course_id = %course_id, count = actions.len(), "Auto actions detected");
        Ok(actions)
    }

    /// 对给定快照与时间点求值（纯函数）
    pub fn detect_at(&self, ctx: &CourseContext, now: DateTime<Utc>) -> Vec<AutoAction> {
        let mut ranked: Vec<(usize, AutoAction)> = self
            .rules
            .iter()
            .enumerate()
            .flat_map(|(order, rule)| {
                rule.evaluate(ctx, now, &self.settings)
                    .into_iter()
                    .map(move |action| (order, action))
            })
            .collect();

        ranked.sort_by(|(oa, a), (ob, b)| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
                .then_with(|| oa.cmp(ob))
                .then_with(|| a.title.cmp(&b.title))
        });
        ranked.into_iter().map(|(_, action)| action).collect()
    }
}
