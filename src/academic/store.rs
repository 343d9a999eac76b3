//! 学业存储抽象
//!
//! 编排核心只通过这个窄接口读写学业状态：读取课程快照、按派生键查找、带键创建资源。
//! 本地存储 / 云端持久化适配器在核心之外实现此 trait。

use async_trait::async_trait;

use crate::academic::{CourseContext, CreateOutcome, NewMaterial, NewStudyBlock};
use crate::core::CoreError;

#[async_trait]
pub trait AcademicStore: Send + Sync {
    /// 读取课程当前状态的快照
    async fn course_context(&self, user_id: &str, course_id: &str) -> Result<CourseContext, CoreError>;

    /// 按派生键查找已存在的资源 ID
    async fn find_by_key(
        &self,
        user_id: &str,
        course_id: &str,
        key: &str,
    ) -> Result<Option<String>, CoreError>;

    /// 创建学习时段；同键已存在时不修改，返回已有 ID 与 created = false
    async fn create_study_block(
        &self,
        user_id: &str,
        course_id: &str,
        block: NewStudyBlock,
    ) -> Result<CreateOutcome, CoreError>;

    /// 创建资料；同键已存在时不修改
    async fn create_material(
        &self,
        user_id: &str,
        course_id: &str,
        material: NewMaterial,
    ) -> Result<CreateOutcome, CoreError>;

    /// 将资料关联到作业或考试；已关联时 created = false
    async fn link_material(
        &self,
        user_id: &str,
        course_id: &str,
        material_id: &str,
        target_id: &str,
    ) -> Result<CreateOutcome, CoreError>;
}
