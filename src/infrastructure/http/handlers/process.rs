//! Process HTTP Handlers - 启动 / 状态 / 暂停 / 继续 / 停止 / 恢复项目

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::application::{
    ControlResponse, ControlSignal, GetProcessStatus, PauseProcessing, ProcessStatusResponse,
    ProjectSummary, ResumeProcessing, ResumeProject, StopProcessing,
};
use crate::domain::project::ProjectId;
use crate::infrastructure::http::dto::{
    ApiResponse, ResumeProjectRequest, StartProcessingData, StartProcessingRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 控制命令响应
#[derive(Debug, Serialize)]
pub struct ControlData {
    pub accepted: bool,
    pub project_id: Option<ProjectId>,
    pub signal: Option<ControlSignal>,
    /// 请求后的处理状态（idle / pausing / stopping / processing / paused ...）
    pub state: String,
}

impl ControlData {
    fn new(resp: ControlResponse, status: ProcessStatusResponse) -> Self {
        Self {
            accepted: resp.accepted,
            project_id: resp.project_id,
            signal: resp.signal,
            state: status.state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeProjectData {
    pub project_id: ProjectId,
    pub project: ProjectSummary,
}

/// POST /api/process-all-in-one
pub async fn start_processing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartProcessingRequest>,
) -> Result<Json<ApiResponse<StartProcessingData>>, ApiError> {
    let result = state.start_handler.handle(req.into()).await?;
    let project = result.project;

    Ok(Json(ApiResponse::success(StartProcessingData {
        project_id: project.project_id,
        novel_name: project.novel_name.clone(),
        folder_path: project.folder_path.clone(),
        resumed: result.resumed,
        project,
    })))
}

/// GET /api/process-status
pub async fn process_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ProcessStatusResponse>>, ApiError> {
    let status = state.status_handler.handle(GetProcessStatus).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /api/process-pause
pub async fn pause_processing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ControlData>>, ApiError> {
    let resp = state.pause_handler.handle(PauseProcessing);
    let status = state.status_handler.handle(GetProcessStatus).await?;
    Ok(Json(ApiResponse::success(ControlData::new(resp, status))))
}

/// POST /api/process-resume
pub async fn resume_processing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ControlData>>, ApiError> {
    let resp = state.resume_handler.handle(ResumeProcessing);
    let status = state.status_handler.handle(GetProcessStatus).await?;
    Ok(Json(ApiResponse::success(ControlData::new(resp, status))))
}

/// POST /api/process-stop
pub async fn stop_processing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<ControlData>>, ApiError> {
    let resp = state.stop_handler.handle(StopProcessing);
    let status = state.status_handler.handle(GetProcessStatus).await?;
    Ok(Json(ApiResponse::success(ControlData::new(resp, status))))
}

/// POST /api/resume-project
pub async fn resume_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResumeProjectRequest>,
) -> Result<Json<ApiResponse<ResumeProjectData>>, ApiError> {
    let result = state
        .resume_project_handler
        .handle(ResumeProject {
            project_id: req.project_id,
        })
        .await?;

    Ok(Json(ApiResponse::success(ResumeProjectData {
        project_id: result.project.project_id,
        project: result.project,
    })))
}
