//! Audio Handlers - 批次音频列表与下载

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::application::{GetAudioFile, ListAudioFiles};
use crate::domain::project::ProjectId;
use crate::infrastructure::http::dto::{ApiResponse, AudioFileDto, AudioFilesData};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /api/projects/:project_id/audio
pub async fn list_audio_files(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ApiResponse<AudioFilesData>>, ApiError> {
    let project_id = ProjectId::from_uuid(project_id);
    let files = state
        .list_audio_handler
        .handle(ListAudioFiles { project_id })
        .await?;

    Ok(Json(ApiResponse::success(AudioFilesData {
        project_id,
        files: files
            .into_iter()
            .map(|info| AudioFileDto::from_info(project_id, info))
            .collect(),
    })))
}

/// GET /api/download-audio/:project_id/:filename
///
/// 以流的方式返回文件，不把整个批次读入内存
pub async fn download_audio(
    State(state): State<Arc<AppState>>,
    Path((project_id, filename)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let resolved = state
        .get_audio_handler
        .handle(GetAudioFile {
            project_id: ProjectId::from_uuid(project_id),
            filename,
        })
        .await?;

    let file = tokio::fs::File::open(&resolved.path)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open {}: {}", resolved.filename, e)))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resolved.content_type)
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", resolved.filename),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
