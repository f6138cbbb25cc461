//! Scraper HTTP Handlers - 章节列表预览与单章抓取

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{GetChapterUrls, ScrapeChapter, ScrapedChapter};
use crate::infrastructure::http::dto::{
    ApiResponse, ChapterUrlsData, ChapterUrlsRequest, ScrapeSingleRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// POST /api/get-chapter-urls
pub async fn get_chapter_urls(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterUrlsRequest>,
) -> Result<Json<ApiResponse<ChapterUrlsData>>, ApiError> {
    let start_url = req
        .start_url
        .or(req.url)
        .ok_or_else(|| ApiError::BadRequest("url or start_url is required".to_string()))?;

    let resp = state
        .chapter_urls_handler
        .handle(GetChapterUrls {
            base_url: req.base_url,
            start_url,
        })
        .await?;
    Ok(Json(ApiResponse::success(resp.into())))
}

/// POST /api/scrape-single
pub async fn scrape_single(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScrapeSingleRequest>,
) -> Result<Json<ApiResponse<ScrapedChapter>>, ApiError> {
    let chapter = state
        .scrape_chapter_handler
        .handle(ScrapeChapter { url: req.url })
        .await?;
    Ok(Json(ApiResponse::success(chapter)))
}
