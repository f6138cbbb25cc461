//! Artifact Storage Port - 出站端口
//!
//! 管理项目文件夹中的章节中间产物（文本、音频）和批次合并音频

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

use super::AudioClip;
use crate::domain::project::NovelName;

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

/// 删除章节产物的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovedArtifacts {
    pub files: u64,
    pub bytes: u64,
}

/// 批次音频文件信息
#[derive(Debug, Clone)]
pub struct AudioFileInfo {
    pub filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Artifact Storage Port - 出站端口
///
/// folder 参数为项目文件夹路径（`project_folder` 的返回值）
#[async_trait]
pub trait ArtifactStoragePort: Send + Sync {
    /// 小说对应的项目文件夹
    fn project_folder(&self, novel_name: &NovelName) -> PathBuf;

    /// 项目文件夹是否已存在
    async fn folder_exists(&self, folder: &str) -> bool;

    /// 保存章节文本，返回路径
    async fn save_chapter_text(
        &self,
        folder: &str,
        number: u32,
        text: &str,
    ) -> Result<PathBuf, StorageError>;

    /// 读取章节文本，不存在时返回 None
    async fn read_chapter_text(
        &self,
        folder: &str,
        number: u32,
    ) -> Result<Option<String>, StorageError>;

    /// 保存章节音频，返回路径
    async fn save_chapter_audio(
        &self,
        folder: &str,
        number: u32,
        clip: &AudioClip,
    ) -> Result<PathBuf, StorageError>;

    /// 读取音频文件（格式由扩展名或文件头确定）
    async fn read_audio(&self, path: &str) -> Result<AudioClip, StorageError>;

    /// 保存批次合并音频，返回路径
    async fn save_batch_audio(
        &self,
        folder: &str,
        batch_index: u32,
        first_chapter: u32,
        last_chapter: u32,
        clip: &AudioClip,
    ) -> Result<PathBuf, StorageError>;

    /// 删除章节的全部中间产物（文本与音频），不存在的文件忽略
    async fn remove_chapter_artifacts(
        &self,
        folder: &str,
        number: u32,
    ) -> Result<RemovedArtifacts, StorageError>;

    /// 列出项目文件夹中的批次音频
    async fn list_batch_files(&self, folder: &str) -> Result<Vec<AudioFileInfo>, StorageError>;

    /// 定位批次音频文件（拒绝路径穿越）
    async fn batch_file_path(&self, folder: &str, filename: &str) -> Result<PathBuf, StorageError>;
}
