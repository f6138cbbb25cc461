//! Process Commands - 处理流水线相关命令

use serde::Serialize;

use crate::application::ports::{ControlSignal, ProjectSummary};
use crate::domain::project::ProjectId;

/// 启动处理命令
#[derive(Debug, Clone)]
pub struct StartProcessing {
    pub base_url: Option<String>,
    pub start_url: String,
    /// 导入的章节 URL 列表（可选）
    pub chapter_urls: Option<Vec<String>>,
    pub start_chapter: u32,
    pub end_chapter: Option<u32>,
    pub num_chapters: Option<u32>,
    /// 未指定时使用配置默认值
    pub batch_size: Option<u32>,
    /// 未指定时使用配置默认音色
    pub voice: Option<String>,
    pub rate: i32,
    pub pitch: i32,
    pub volume: i32,
    pub overwrite: bool,
}

/// 启动处理响应
#[derive(Debug, Clone)]
pub struct StartProcessingResponse {
    pub project: ProjectSummary,
    /// 是否为覆盖模式下恢复的已有项目
    pub resumed: bool,
}

/// 暂停命令
#[derive(Debug, Clone, Default)]
pub struct PauseProcessing;

/// 继续命令
#[derive(Debug, Clone, Default)]
pub struct ResumeProcessing;

/// 停止命令
#[derive(Debug, Clone, Default)]
pub struct StopProcessing;

/// 控制命令的结果
#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    /// 受影响的活动项目
    pub project_id: Option<ProjectId>,
    /// 请求是否改变了控制信号
    pub accepted: bool,
    /// 请求后的控制信号（无活动项目时为 None）
    pub signal: Option<ControlSignal>,
}

/// 恢复已有项目命令
#[derive(Debug, Clone)]
pub struct ResumeProject {
    pub project_id: ProjectId,
}

/// 恢复项目响应
#[derive(Debug, Clone)]
pub struct ResumeProjectResponse {
    pub project: ProjectSummary,
}
