//! Audio Query Handlers - 批次音频列表与下载

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStoragePort, AudioFileInfo, AudioFormat, ProjectRepositoryPort};
use crate::application::queries::handlers::project_handlers::find_project;
use crate::application::queries::{GetAudioFile, ListAudioFiles};

/// 音频文件定位结果
#[derive(Debug, Clone)]
pub struct AudioFileResponse {
    pub path: PathBuf,
    pub filename: String,
    pub content_type: &'static str,
}

/// ListAudioFiles Handler
pub struct ListAudioFilesHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl ListAudioFilesHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            project_repo,
            storage,
        }
    }

    pub async fn handle(&self, query: ListAudioFiles) -> Result<Vec<AudioFileInfo>, ApplicationError> {
        let project = find_project(&*self.project_repo, query.project_id).await?;
        Ok(self.storage.list_batch_files(project.folder_path()).await?)
    }
}

/// GetAudioFile Handler
pub struct GetAudioFileHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl GetAudioFileHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            project_repo,
            storage,
        }
    }

    pub async fn handle(&self, query: GetAudioFile) -> Result<AudioFileResponse, ApplicationError> {
        let project = find_project(&*self.project_repo, query.project_id).await?;
        let path = self
            .storage
            .batch_file_path(project.folder_path(), &query.filename)
            .await?;

        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .map(|format| format.mime_type())
            .unwrap_or("application/octet-stream");

        Ok(AudioFileResponse {
            path,
            filename: query.filename,
            content_type,
        })
    }
}
