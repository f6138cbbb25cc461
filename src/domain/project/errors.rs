//! Project Context - Errors

use thiserror::Error;

use super::ProjectStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("无效的章节范围: {0}")]
    InvalidRange(String),

    #[error("无效的批次大小: {0}")]
    InvalidBatchSize(u32),

    #[error("无效的音色: {0}")]
    InvalidVoice(String),

    #[error("语音参数越界: {name}={value}（允许范围 {min}..={max}）")]
    InvalidVoiceParam {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("无效的章节来源: {0}")]
    InvalidSource(String),

    #[error("章节不在项目范围内: {0}")]
    ChapterNotFound(u32),

    #[error("批次不存在: {0}")]
    BatchNotFound(u32),

    #[error("非法的状态迁移: {from} -> {to}")]
    InvalidTransition {
        from: ProjectStatus,
        to: ProjectStatus,
    },

    #[error("章节尚未抓取完成: {0}")]
    FetchNotDone(u32),

    #[error("批次尚未就绪: {0}")]
    BatchNotReady(u32),
}
