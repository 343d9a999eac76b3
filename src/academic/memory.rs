//! 内存版学业存储（测试与演示用，无需外部数据库）
//!
//! 每门课程一把锁；外层 RwLock 只在查找 / 插入课程时短暂持有，不会串行化无关课程。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::academic::{
    AcademicStore, CourseContext, CreateOutcome, Material, NewMaterial, NewStudyBlock, StudyBlock,
};
use crate::core::CoreError;

type CourseKey = (String, String);

#[derive(Default)]
pub struct InMemoryAcademicStore {
    courses: RwLock<HashMap<CourseKey, Arc<Mutex<CourseContext>>>>,
    mutations: AtomicU64,
}

impl InMemoryAcademicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入（或替换）一门课程的完整状态
    pub async fn seed(&self, context: CourseContext) {
        let key = (context.user_id.clone(), context.course_id.clone());
        self.courses
            .write()
            .await
            .insert(key, Arc::new(Mutex::new(context)));
    }

    /// 累计成功修改次数（created = true 的创建 / 关联）
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    async fn course(&self, user_id: &str, course_id: &str) -> Result<Arc<Mutex<CourseContext>>, CoreError> {
        self.courses
            .read()
            .await
            .get(&(user_id.to_string(), course_id.to_string()))
            .cloned()
            .ok_or_else(|| CoreError::Store(format!("course {course_id} not found for user {user_id}")))
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

fn existing_id(ctx: &CourseContext, key: &str) -> Option<String> {
    ctx.study_blocks
        .iter()
        .find(|b| b.key == key)
        .map(|b| b.id.clone())
        .or_else(|| {
            ctx.materials
                .iter()
                .find(|m| m.key.as_deref() == Some(key))
                .map(|m| m.id.clone())
        })
}

#[async_trait]
impl AcademicStore for InMemoryAcademicStore {
    async fn course_context(&self, user_id: &str, course_id: &str) -> Result<CourseContext, CoreError> {
        let course = self.course(user_id, course_id).await?;
        let mut snapshot = course.lock().await.clone();
        snapshot.captured_at = Utc::now();
        Ok(snapshot)
    }

    async fn find_by_key(
        &self,
        user_id: &str,
        course_id: &str,
        key: &str,
    ) -> Result<Option<String>, CoreError> {
        let course = self.course(user_id, course_id).await?;
        let ctx = course.lock().await;
        Ok(existing_id(&ctx, key))
    }

    async fn create_study_block(
        &self,
        user_id: &str,
        course_id: &str,
        block: NewStudyBlock,
    ) -> Result<CreateOutcome, CoreError> {
        let course = self.course(user_id, course_id).await?;
        let mut ctx = course.lock().await;
        if let Some(id) = existing_id(&ctx, &block.key) {
            return Ok(CreateOutcome {
                resource_id: id,
                created: false,
            });
        }
        let id = format!("sb_{}", uuid::Uuid::new_v4());
        ctx.study_blocks.push(StudyBlock {
            id: id.clone(),
            key: block.key,
            title: block.title,
            starts_at: block.starts_at,
            duration_minutes: block.duration_minutes,
            assignment_id: block.assignment_id,
            exam_id: block.exam_id,
        });
        self.record_mutation();
        Ok(CreateOutcome {
            resource_id: id,
            created: true,
        })
    }

    async fn create_material(
        &self,
        user_id: &str,
        course_id: &str,
        material: NewMaterial,
    ) -> Result<CreateOutcome, CoreError> {
        let course = self.course(user_id, course_id).await?;
        let mut ctx = course.lock().await;
        if let Some(id) = existing_id(&ctx, &material.key) {
            return Ok(CreateOutcome {
                resource_id: id,
                created: false,
            });
        }
        let id = format!("mat_{}", uuid::Uuid::new_v4());
        ctx.materials.push(Material {
            id: id.clone(),
            title: material.title,
            kind: material.kind,
            linked_to: material.linked_to,
            key: Some(material.key),
        });
        self.record_mutation();
        Ok(CreateOutcome {
            resource_id: id,
            created: true,
        })
    }

    async fn link_material(
        &self,
        user_id: &str,
        course_id: &str,
        material_id: &str,
        target_id: &str,
    ) -> Result<CreateOutcome, CoreError> {
        let course = self.course(user_id, course_id).await?;
        let mut ctx = course.lock().await;
        let target_exists = ctx.assignments.iter().any(|a| a.id == target_id)
            || ctx.exams.iter().any(|e| e.id == target_id);
        if !target_exists {
            return Err(CoreError::Store(format!("link target {target_id} not found")));
        }
        let material = ctx
            .materials
            .iter_mut()
            .find(|m| m.id == material_id)
            .ok_or_else(|| CoreError::Store(format!("material {material_id} not found")))?;
        if material.linked_to.iter().any(|t| t == target_id) {
            return Ok(CreateOutcome {
                resource_id: material_id.to_string(),
                created: false,
            });
        }
        material.linked_to.push(target_id.to_string());
        self.record_mutation();
        Ok(CreateOutcome {
            resource_id: material_id.to_string(),
            created: true,
        })
    }
}
