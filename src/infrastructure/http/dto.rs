//! Data Transfer Objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::{
    AudioFileInfo, ChapterUrlsResponse, CheckFolderResponse, GenerateSpeech, ProjectSummary,
    StartProcessing, VoiceInfo,
};
use crate::domain::project::{ChapterLink, ProjectId};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Process DTOs
// ============================================================================

/// 启动处理请求
#[derive(Debug, Deserialize)]
pub struct StartProcessingRequest {
    #[serde(default)]
    pub base_url: Option<String>,
    pub start_url: String,
    #[serde(default)]
    pub chapter_urls: Option<Vec<String>>,
    #[serde(default = "default_start_chapter")]
    pub start_chapter: u32,
    #[serde(default)]
    pub end_chapter: Option<u32>,
    #[serde(default)]
    pub num_chapters: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub rate: i32,
    #[serde(default)]
    pub pitch: i32,
    #[serde(default)]
    pub volume: i32,
    #[serde(default)]
    pub overwrite: bool,
}

fn default_start_chapter() -> u32 {
    1
}

impl From<StartProcessingRequest> for StartProcessing {
    fn from(req: StartProcessingRequest) -> Self {
        Self {
            base_url: req.base_url,
            start_url: req.start_url,
            chapter_urls: req.chapter_urls,
            start_chapter: req.start_chapter,
            end_chapter: req.end_chapter,
            num_chapters: req.num_chapters,
            batch_size: req.batch_size,
            voice: req.voice,
            rate: req.rate,
            pitch: req.pitch,
            volume: req.volume,
            overwrite: req.overwrite,
        }
    }
}

/// 启动处理响应
#[derive(Debug, Serialize)]
pub struct StartProcessingData {
    pub project_id: ProjectId,
    pub novel_name: String,
    pub folder_path: String,
    /// 覆盖模式下恢复了已有项目
    pub resumed: bool,
    pub project: ProjectSummary,
}

#[derive(Debug, Deserialize)]
pub struct ResumeProjectRequest {
    pub project_id: ProjectId,
}

// ============================================================================
// Project DTOs
// ============================================================================

/// 小说名称只由 start_url 推导，前端附带的 base_url 被忽略
#[derive(Debug, Deserialize)]
pub struct CheckFolderRequest {
    pub start_url: String,
}

#[derive(Debug, Serialize)]
pub struct CheckFolderData {
    pub exists: bool,
    pub novel_name: String,
    pub folder_path: String,
    pub project_id: Option<ProjectId>,
    pub project: Option<ProjectSummary>,
}

impl From<CheckFolderResponse> for CheckFolderData {
    fn from(resp: CheckFolderResponse) -> Self {
        Self {
            exists: resp.exists,
            novel_name: resp.novel_name,
            folder_path: resp.folder_path,
            project_id: resp.project.as_ref().map(|p| p.project_id),
            project: resp.project,
        }
    }
}

/// 清理请求，project_id 与 novel_name 二选一
#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub novel_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListData {
    pub projects: Vec<ProjectSummary>,
}

// ============================================================================
// Audio DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AudioFileDto {
    pub filename: String,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub download_url: String,
}

impl AudioFileDto {
    pub fn from_info(project_id: ProjectId, info: AudioFileInfo) -> Self {
        Self {
            download_url: format!("/api/download-audio/{}/{}", project_id, info.filename),
            filename: info.filename,
            size_bytes: info.size_bytes,
            modified_at: info.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AudioFilesData {
    pub project_id: ProjectId,
    pub files: Vec<AudioFileDto>,
}

// ============================================================================
// Voice / Speech DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VoicesQuery {
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoicesData {
    pub voices: Vec<VoiceInfo>,
}

/// 单段合成请求
#[derive(Debug, Deserialize)]
pub struct GenerateSpeechRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub rate: i32,
    #[serde(default)]
    pub pitch: i32,
    #[serde(default)]
    pub volume: i32,
}

impl From<GenerateSpeechRequest> for GenerateSpeech {
    fn from(req: GenerateSpeechRequest) -> Self {
        Self {
            text: req.text,
            voice: req.voice,
            rate: req.rate,
            pitch: req.pitch,
            volume: req.volume,
        }
    }
}

// ============================================================================
// Scraper DTOs
// ============================================================================

/// 章节列表预览请求，start_url 缺省时使用 url
#[derive(Debug, Deserialize)]
pub struct ChapterUrlsRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub start_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChapterUrlsData {
    pub novel_title: String,
    pub count: usize,
    pub chapter_urls: Vec<ChapterLink>,
}

impl From<ChapterUrlsResponse> for ChapterUrlsData {
    fn from(resp: ChapterUrlsResponse) -> Self {
        Self {
            novel_title: resp.novel_title,
            count: resp.chapters.len(),
            chapter_urls: resp.chapters,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScrapeSingleRequest {
    pub url: String,
}
