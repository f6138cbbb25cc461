//! Project Query Handlers

use std::sync::Arc;

use serde::Serialize;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ArtifactStoragePort, ControlSignal, CurrentChapter, ProcessControlPort, ProjectRepositoryPort,
    ProjectSummary,
};
use crate::application::queries::{CheckFolder, GetProcessStatus, GetProject, ListProjects};
use crate::domain::project::{NovelName, Project, ProjectId, ProjectStatus};

// ============================================================================
// Response DTOs
// ============================================================================

/// 处理状态快照
#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatusResponse {
    /// idle / pausing / stopping 或项目状态
    pub state: String,
    /// 是否有流水线正在持有该项目
    pub active: bool,
    pub control: Option<ControlSignal>,
    pub project: Option<ProjectSummary>,
    pub current_chapter: Option<CurrentChapter>,
}

impl ProcessStatusResponse {
    fn idle() -> Self {
        Self {
            state: "idle".to_string(),
            active: false,
            control: None,
            project: None,
            current_chapter: None,
        }
    }
}

/// 文件夹检查结果
#[derive(Debug, Clone, Serialize)]
pub struct CheckFolderResponse {
    pub exists: bool,
    pub novel_name: String,
    pub folder_path: String,
    pub project: Option<ProjectSummary>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetProcessStatus Handler
///
/// 读取最近一次持久化的项目快照，叠加内存中的控制信号和当前章节
pub struct GetProcessStatusHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    control: Arc<dyn ProcessControlPort>,
}

impl GetProcessStatusHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        control: Arc<dyn ProcessControlPort>,
    ) -> Self {
        Self {
            project_repo,
            control,
        }
    }

    pub async fn handle(&self, _query: GetProcessStatus) -> Result<ProcessStatusResponse, ApplicationError> {
        let active = self.control.active_project();
        let Some(project_id) = active.or_else(|| self.control.last_project()) else {
            return Ok(ProcessStatusResponse::idle());
        };
        let Some(project) = self.project_repo.find_by_id(project_id).await? else {
            return Ok(ProcessStatusResponse::idle());
        };

        let control = if active.is_some() {
            self.control.signal()
        } else {
            None
        };
        let state = match (control, project.status()) {
            (Some(ControlSignal::Pause), ProjectStatus::Starting | ProjectStatus::Processing) => {
                "pausing".to_string()
            }
            (Some(ControlSignal::Stop), status) if !status.is_terminal() => "stopping".to_string(),
            (_, status) => status.as_str().to_string(),
        };

        Ok(ProcessStatusResponse {
            state,
            active: active.is_some(),
            control,
            project: Some(ProjectSummary::from_project(&project)),
            current_chapter: active.and_then(|_| self.control.current_chapter()),
        })
    }
}

/// ListProjects Handler
pub struct ListProjectsHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl ListProjectsHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, _query: ListProjects) -> Result<Vec<ProjectSummary>, ApplicationError> {
        Ok(self.project_repo.list().await?)
    }
}

/// CheckFolder Handler
pub struct CheckFolderHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl CheckFolderHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            project_repo,
            storage,
        }
    }

    pub async fn handle(&self, query: CheckFolder) -> Result<CheckFolderResponse, ApplicationError> {
        let novel_name = NovelName::from_url(&query.start_url)?;
        let project = self.project_repo.find_by_novel_name(&novel_name).await?;
        let folder_path = match &project {
            Some(p) => p.folder_path().to_string(),
            None => self
                .storage
                .project_folder(&novel_name)
                .to_string_lossy()
                .to_string(),
        };
        let exists = project.is_some() || self.storage.folder_exists(&folder_path).await;

        Ok(CheckFolderResponse {
            exists,
            novel_name: novel_name.to_string(),
            folder_path,
            project: project.as_ref().map(ProjectSummary::from_project),
        })
    }
}

/// GetProject Handler
pub struct GetProjectHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
}

impl GetProjectHandler {
    pub fn new(project_repo: Arc<dyn ProjectRepositoryPort>) -> Self {
        Self { project_repo }
    }

    pub async fn handle(&self, query: GetProject) -> Result<Project, ApplicationError> {
        find_project(&*self.project_repo, query.project_id).await
    }
}

pub(crate) async fn find_project(
    project_repo: &dyn ProjectRepositoryPort,
    project_id: ProjectId,
) -> Result<Project, ApplicationError> {
    project_repo
        .find_by_id(project_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Project", project_id))
}
