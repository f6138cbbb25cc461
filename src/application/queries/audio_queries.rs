//! Audio Queries - 批次音频查询

use crate::domain::project::ProjectId;

/// 列出项目的批次音频文件
#[derive(Debug, Clone)]
pub struct ListAudioFiles {
    pub project_id: ProjectId,
}

/// 获取单个批次音频文件
#[derive(Debug, Clone)]
pub struct GetAudioFile {
    pub project_id: ProjectId,
    pub filename: String,
}
