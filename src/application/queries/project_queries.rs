//! Project Queries - 项目与处理状态查询

use crate::domain::project::ProjectId;

/// 获取当前处理状态
#[derive(Debug, Clone, Default)]
pub struct GetProcessStatus;

/// 列出所有项目
#[derive(Debug, Clone, Default)]
pub struct ListProjects;

/// 检查小说对应的项目文件夹是否已存在
#[derive(Debug, Clone)]
pub struct CheckFolder {
    pub start_url: String,
}

/// 获取项目详情
#[derive(Debug, Clone)]
pub struct GetProject {
    pub project_id: ProjectId,
}
