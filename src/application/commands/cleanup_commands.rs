//! Cleanup Commands - 中间产物清理命令

use serde::Serialize;

use crate::domain::project::ProjectId;

/// 清理目标
#[derive(Debug, Clone)]
pub enum CleanupTarget {
    ProjectId(ProjectId),
    NovelName(String),
}

/// 清理临时文件命令
#[derive(Debug, Clone)]
pub struct CleanTemporaryFiles {
    pub target: CleanupTarget,
}

/// 清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub files_deleted: u64,
    /// 释放的字节数
    pub space_freed: u64,
}
