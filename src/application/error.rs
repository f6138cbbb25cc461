//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{
    ControlError, FetchError, ProjectSummary, RepositoryError, StorageError, SynthesisError,
};
use crate::domain::project::ProjectError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 请求参数错误（范围矛盾、语音参数越界等），在任何状态修改之前拒绝
    #[error("Config error: {0}")]
    Config(String),

    /// 冲突（项目已存在或已有活动项目）
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        existing_project: Option<Box<ProjectSummary>>,
    },

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 存储错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建参数错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// 创建冲突错误
    pub fn conflict(message: impl Into<String>, existing_project: Option<ProjectSummary>) -> Self {
        Self::Conflict {
            message: message.into(),
            existing_project: existing_project.map(Box::new),
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound {
                resource_type: "Project",
                id,
            },
            RepositoryError::Duplicate(name) => {
                Self::conflict(format!("project already exists: {}", name), None)
            }
            RepositoryError::Rejected(e) => Self::InvalidState(e.to_string()),
            other => Self::RepositoryError(other.to_string()),
        }
    }
}

impl From<StorageError> for ApplicationError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::FileNotFound(name) => Self::NotFound {
                resource_type: "File",
                id: name,
            },
            StorageError::InvalidFileName(name) => Self::Config(format!("invalid file name: {}", name)),
            other => Self::StorageError(other.to_string()),
        }
    }
}

impl From<ProjectError> for ApplicationError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::InvalidRange(_)
            | ProjectError::InvalidBatchSize(_)
            | ProjectError::InvalidVoice(_)
            | ProjectError::InvalidVoiceParam { .. }
            | ProjectError::InvalidSource(_) => Self::Config(err.to_string()),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<ControlError> for ApplicationError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::AlreadyActive(id) => Self::conflict(
                format!("project {} is already being processed", id),
                None,
            ),
            ControlError::NotActive(_) => Self::InvalidState(err.to_string()),
            ControlError::QueueClosed => Self::InternalError(err.to_string()),
        }
    }
}

impl From<FetchError> for ApplicationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(url) => Self::NotFound {
                resource_type: "Chapter",
                id: url,
            },
            FetchError::ParseError(msg) => {
                Self::Config(format!("could not extract chapter content: {}", msg))
            }
            other => Self::ExternalServiceError(other.to_string()),
        }
    }
}

impl From<SynthesisError> for ApplicationError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::EmptyText => Self::Config(err.to_string()),
            other => Self::ExternalServiceError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_project_is_conflict() {
        let err: ApplicationError = RepositoryError::Duplicate("Shadow Slave".to_string()).into();
        match err {
            ApplicationError::Conflict {
                message,
                existing_project,
            } => {
                assert!(message.contains("Shadow Slave"));
                assert!(existing_project.is_none());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_fetch_errors_split_by_cause() {
        let missing: ApplicationError = FetchError::NotFound("https://a.com/c-9".to_string()).into();
        assert!(matches!(missing, ApplicationError::NotFound { resource_type: "Chapter", .. }));

        let empty: ApplicationError = FetchError::ParseError("no content".to_string()).into();
        assert!(matches!(empty, ApplicationError::Config(_)));

        let upstream: ApplicationError = FetchError::HttpStatus(502).into();
        assert!(matches!(upstream, ApplicationError::ExternalServiceError(_)));
    }

    #[test]
    fn test_synthesis_errors() {
        assert!(matches!(
            ApplicationError::from(SynthesisError::EmptyText),
            ApplicationError::Config(_)
        ));
        assert!(matches!(
            ApplicationError::from(SynthesisError::Timeout),
            ApplicationError::ExternalServiceError(_)
        ));
    }
}
