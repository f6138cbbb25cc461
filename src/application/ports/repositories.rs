//! Repository Ports - 出站端口
//!
//! 定义项目持久化的抽象接口
//! 具体实现在 infrastructure 层（如 SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::project::{
    NovelName, Progress, Project, ProjectError, ProjectId, ProjectStatus,
};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 更新被领域规则拒绝，未写入
    #[error("Update rejected: {0}")]
    Rejected(#[from] ProjectError),
}

/// 项目摘要（列表视图）
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub novel_name: String,
    pub folder_path: String,
    pub status: ProjectStatus,
    pub status_reason: Option<String>,
    pub start_chapter: u32,
    pub end_chapter: u32,
    pub batch_size: u32,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ProjectSummary {
    pub fn from_project(project: &Project) -> Self {
        Self {
            project_id: *project.id(),
            novel_name: project.novel_name().to_string(),
            folder_path: project.folder_path().to_string(),
            status: project.status(),
            status_reason: project.status_reason().map(str::to_string),
            start_chapter: project.chapter_range().start(),
            end_chapter: project.chapter_range().end(),
            batch_size: project.batch_size().get(),
            progress: project.progress(),
            created_at: project.created_at(),
            last_updated: project.updated_at(),
        }
    }
}

/// 对项目的原子修改
pub type ProjectMutator = Box<dyn FnOnce(&mut Project) -> Result<(), ProjectError> + Send>;

/// 把闭包包装为 ProjectMutator
pub fn mutation<F>(f: F) -> ProjectMutator
where
    F: FnOnce(&mut Project) -> Result<(), ProjectError> + Send + 'static,
{
    Box::new(f)
}

/// Project Repository Port
#[async_trait]
pub trait ProjectRepositoryPort: Send + Sync {
    /// 创建项目（novel_name 重复时返回 Duplicate）
    async fn create(&self, project: &Project) -> Result<(), RepositoryError>;

    /// 根据 ID 查找项目
    async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError>;

    /// 根据小说名称查找项目（用于冲突检测）
    async fn find_by_novel_name(&self, name: &NovelName) -> Result<Option<Project>, RepositoryError>;

    /// 所有项目摘要，按最后更新时间倒序
    async fn list(&self) -> Result<Vec<ProjectSummary>, RepositoryError>;

    /// 加载 → 修改 → 保存，同一项目的更新串行执行
    ///
    /// mutator 返回错误时不写入任何数据
    async fn update(&self, id: ProjectId, mutator: ProjectMutator) -> Result<Project, RepositoryError>;

    /// 把 starting/processing 的项目转为 paused，返回受影响的项目 ID
    async fn recover_interrupted(&self) -> Result<Vec<ProjectId>, RepositoryError>;
}
