//! Project HTTP Handlers - 项目列表 / 详情 / 文件夹检查 / 清理

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    CheckFolder, CleanTemporaryFiles, CleanupReport, CleanupTarget, GetProject, ListProjects,
};
use crate::domain::project::{Project, ProjectId};
use crate::infrastructure::http::dto::{
    ApiResponse, CheckFolderData, CheckFolderRequest, CleanupRequest, ProjectListData,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /api/list-projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ProjectListData>>, ApiError> {
    let projects = state.list_projects_handler.handle(ListProjects).await?;
    Ok(Json(ApiResponse::success(ProjectListData { projects })))
}

/// GET /api/projects/:project_id
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Project>>, ApiError> {
    let project = state
        .get_project_handler
        .handle(GetProject {
            project_id: ProjectId::from_uuid(project_id),
        })
        .await?;
    Ok(Json(ApiResponse::success(project)))
}

/// POST /api/check-folder
pub async fn check_folder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckFolderRequest>,
) -> Result<Json<ApiResponse<CheckFolderData>>, ApiError> {
    let resp = state
        .check_folder_handler
        .handle(CheckFolder {
            start_url: req.start_url,
        })
        .await?;
    Ok(Json(ApiResponse::success(resp.into())))
}

/// POST /api/clean-temporary-files
pub async fn clean_temporary_files(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<ApiResponse<CleanupReport>>, ApiError> {
    let target = match (req.project_id, req.novel_name) {
        (Some(id), _) => CleanupTarget::ProjectId(id),
        (None, Some(name)) => CleanupTarget::NovelName(name),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "project_id or novel_name is required".to_string(),
            ))
        }
    };

    let project_id = match &target {
        CleanupTarget::ProjectId(id) => Some(*id),
        CleanupTarget::NovelName(_) => None,
    };
    let report = state
        .cleanup_handler
        .handle(CleanTemporaryFiles { target })
        .await?;

    if let Some(id) = project_id {
        state
            .event_publisher
            .publish_cleanup_finished(id, report.files_deleted, report.space_freed);
    }

    Ok(Json(ApiResponse::success(report)))
}
