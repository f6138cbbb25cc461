//! Voice HTTP Handlers - 音色列表与单段合成

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ListVoices;
use crate::infrastructure::http::dto::{ApiResponse, GenerateSpeechRequest, VoicesData, VoicesQuery};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /api/voices?locale=
pub async fn list_voices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoicesQuery>,
) -> Result<Json<ApiResponse<VoicesData>>, ApiError> {
    let voices = state
        .list_voices_handler
        .handle(ListVoices {
            locale: query.locale,
        })
        .await?;
    Ok(Json(ApiResponse::success(VoicesData { voices })))
}

/// POST /api/generate
///
/// 成功时直接返回音频字节，失败时仍是统一的 JSON 错误
pub async fn generate_speech(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateSpeechRequest>,
) -> Result<Response, ApiError> {
    let clip = state.generate_speech_handler.handle(req.into()).await?;
    let filename = format!("{}.{}", Uuid::new_v4(), clip.format.extension());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, clip.format.mime_type())
        .header(header::CONTENT_LENGTH, clip.data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(clip.data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
