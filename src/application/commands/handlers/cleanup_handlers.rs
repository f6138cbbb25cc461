//! Cleanup Command Handlers - 删除已合并批次的章节中间产物

use std::sync::Arc;

use crate::application::commands::cleanup_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{ArtifactStoragePort, ProjectRepositoryPort};
use crate::domain::project::{NovelName, Project};

/// CleanTemporaryFiles Handler
///
/// 只处理 done 批次覆盖的章节，批次音频不受影响；重复调用第二次删除数为 0
pub struct CleanTemporaryFilesHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
}

impl CleanTemporaryFilesHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
    ) -> Self {
        Self {
            project_repo,
            storage,
        }
    }

    pub async fn handle(&self, cmd: CleanTemporaryFiles) -> Result<CleanupReport, ApplicationError> {
        let project = match cmd.target {
            CleanupTarget::ProjectId(id) => self
                .project_repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| ApplicationError::not_found("Project", id))?,
            CleanupTarget::NovelName(name) => {
                let novel_name = NovelName::new(name.clone())?;
                self.project_repo
                    .find_by_novel_name(&novel_name)
                    .await?
                    .ok_or_else(|| ApplicationError::not_found("Project", name))?
            }
        };

        self.clean_project(&project).await
    }

    pub async fn clean_project(&self, project: &Project) -> Result<CleanupReport, ApplicationError> {
        let mut report = CleanupReport::default();

        for batch in project.batches().iter().filter(|b| b.state().is_done()) {
            for number in batch.first_chapter()..=batch.last_chapter() {
                let removed = self
                    .storage
                    .remove_chapter_artifacts(project.folder_path(), number)
                    .await?;
                report.files_deleted += removed.files;
                report.space_freed += removed.bytes;
            }
        }

        tracing::info!(
            project_id = %project.id(),
            files_deleted = report.files_deleted,
            space_freed = report.space_freed,
            "Temporary files cleaned"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{AudioClip, AudioFormat};
    use crate::domain::project::{
        BatchSize, ChapterRange, ChapterSource, ProjectId, VoiceParams,
    };
    use crate::infrastructure::adapters::FileArtifactStorage;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository,
    };
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<SqliteProjectRepository>, Arc<FileArtifactStorage>, Project) {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteProjectRepository::new(pool));
        let storage = Arc::new(FileArtifactStorage::new(dir.path().to_path_buf()));

        let name = NovelName::new("Clean Novel").unwrap();
        let folder = storage.project_folder(&name).to_string_lossy().to_string();
        let mut project = Project::new(
            name,
            folder.clone(),
            ChapterSource::new(None, "https://site.com/b/clean-novel", None).unwrap(),
            ChapterRange::resolve(1, Some(4), None).unwrap(),
            BatchSize::new(2).unwrap(),
            VoiceParams::new("v", 0, 0, 0).unwrap(),
        );

        let clip = AudioClip::new(AudioFormat::Wav, vec![0u8; 100]);
        for number in 1..=4 {
            storage.save_chapter_text(&folder, number, "text").await.unwrap();
            let path = storage.save_chapter_audio(&folder, number, &clip).await.unwrap();
            project.mark_fetched(number, None).unwrap();
            project
                .mark_synthesized(number, path.to_string_lossy().to_string())
                .unwrap();
        }
        let batch_path = storage.save_batch_audio(&folder, 1, 1, 2, &clip).await.unwrap();
        project
            .complete_batch(1, vec![1, 2], batch_path.to_string_lossy().to_string())
            .unwrap();
        repo.create(&project).await.unwrap();

        (dir, repo, storage, project)
    }

    #[tokio::test]
    async fn test_cleanup_only_done_batches_and_is_idempotent() {
        let (_dir, repo, storage, project) = setup().await;
        let handler = CleanTemporaryFilesHandler::new(repo, storage.clone());

        let first = handler
            .handle(CleanTemporaryFiles {
                target: CleanupTarget::ProjectId(*project.id()),
            })
            .await
            .unwrap();
        assert_eq!(first.files_deleted, 4);
        assert_eq!(first.space_freed, 2 * 100 + 2 * 4);

        // 未完成批次的章节与批次音频保留
        let folder = project.folder_path();
        assert!(storage.read_chapter_text(folder, 3).await.unwrap().is_some());
        assert!(storage.read_chapter_text(folder, 1).await.unwrap().is_none());
        assert_eq!(storage.list_batch_files(folder).await.unwrap().len(), 1);

        let second = handler
            .handle(CleanTemporaryFiles {
                target: CleanupTarget::NovelName("Clean Novel".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(second, CleanupReport::default());
    }

    #[tokio::test]
    async fn test_cleanup_unknown_project() {
        let (_dir, repo, storage, _project) = setup().await;
        let handler = CleanTemporaryFilesHandler::new(repo, storage);

        let err = handler
            .handle(CleanTemporaryFiles {
                target: CleanupTarget::ProjectId(ProjectId::new()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
