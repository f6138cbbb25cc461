//! Process Command Handlers - 启动 / 暂停 / 继续 / 停止 / 恢复项目

use std::sync::Arc;

use crate::application::commands::process_commands::*;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    mutation, ArtifactStoragePort, ProcessControlPort, ProjectRepositoryPort, ProjectSummary,
    RepositoryError,
};
use crate::domain::project::{
    BatchSize, ChapterRange, ChapterSource, NovelName, Project, ProjectId, VoiceParams,
};

/// 启动命令未指定时使用的默认值
#[derive(Debug, Clone)]
pub struct ProcessingDefaults {
    pub batch_size: u32,
    /// 单个项目的章节数上限
    pub max_chapters: u32,
    pub voice: String,
}

/// StartProcessing Handler - 创建（或覆盖模式下恢复）项目并交给流水线
pub struct StartProcessingHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    storage: Arc<dyn ArtifactStoragePort>,
    control: Arc<dyn ProcessControlPort>,
    defaults: ProcessingDefaults,
}

impl StartProcessingHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
        control: Arc<dyn ProcessControlPort>,
        defaults: ProcessingDefaults,
    ) -> Self {
        Self {
            project_repo,
            storage,
            control,
            defaults,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartProcessing,
    ) -> Result<StartProcessingResponse, ApplicationError> {
        // 参数校验先于任何状态修改
        let range = ChapterRange::resolve(cmd.start_chapter, cmd.end_chapter, cmd.num_chapters)?;
        if range.len() > self.defaults.max_chapters {
            return Err(ApplicationError::config(format!(
                "chapter range {}-{} covers {} chapters, limit is {}",
                range.start(),
                range.end(),
                range.len(),
                self.defaults.max_chapters
            )));
        }
        let batch_size = BatchSize::new(cmd.batch_size.unwrap_or(self.defaults.batch_size))?;
        let voice = VoiceParams::new(
            cmd.voice.clone().unwrap_or_else(|| self.defaults.voice.clone()),
            cmd.rate,
            cmd.pitch,
            cmd.volume,
        )?;
        let source = ChapterSource::new(
            cmd.base_url.clone(),
            cmd.start_url.clone(),
            cmd.chapter_urls.clone(),
        )?;
        let novel_name = NovelName::from_url(source.start_url())?;

        if let Some(active_id) = self.control.active_project() {
            let active = self.project_repo.find_by_id(active_id).await?;
            return Err(ApplicationError::conflict(
                format!("project {} is already being processed", active_id),
                active.as_ref().map(ProjectSummary::from_project),
            ));
        }

        if let Some(existing) = self.project_repo.find_by_novel_name(&novel_name).await? {
            if !cmd.overwrite {
                return Err(ApplicationError::conflict(
                    format!("project folder already exists for '{}'", novel_name),
                    Some(ProjectSummary::from_project(&existing)),
                ));
            }

            if existing.chapter_range() != range
                || existing.batch_size() != batch_size
                || existing.voice() != &voice
            {
                tracing::warn!(
                    project_id = %existing.id(),
                    novel_name = %novel_name,
                    "Overwrite requested with different parameters, keeping stored range/batch size/voice"
                );
            }

            let project = resume_existing(&*self.project_repo, &*self.control, *existing.id()).await?;
            tracing::info!(project_id = %project.id(), novel_name = %novel_name, "Existing project resumed");
            return Ok(StartProcessingResponse {
                project: ProjectSummary::from_project(&project),
                resumed: true,
            });
        }

        let folder = self.storage.project_folder(&novel_name);
        let folder = folder.to_string_lossy().to_string();
        if !cmd.overwrite && self.storage.folder_exists(&folder).await {
            return Err(ApplicationError::conflict(
                format!("folder already exists: {}", folder),
                None,
            ));
        }

        let project = Project::new(novel_name, folder, source, range, batch_size, voice);
        let project_id = *project.id();

        self.control.try_acquire(project_id)?;
        match self.project_repo.create(&project).await {
            Ok(()) => {}
            // 并发创建同名项目时，唯一约束兜底
            Err(RepositoryError::Duplicate(_)) => {
                self.control.release(project_id);
                let existing = self.project_repo.find_by_novel_name(project.novel_name()).await?;
                return Err(ApplicationError::conflict(
                    format!("project folder already exists for '{}'", project.novel_name()),
                    existing.as_ref().map(ProjectSummary::from_project),
                ));
            }
            Err(e) => {
                self.control.release(project_id);
                return Err(e.into());
            }
        }
        if let Err(e) = self.control.launch(project_id) {
            self.control.release(project_id);
            return Err(e.into());
        }

        tracing::info!(
            project_id = %project_id,
            novel_name = %project.novel_name(),
            start = range.start(),
            end = range.end(),
            batch_size = batch_size.get(),
            "Project created"
        );

        Ok(StartProcessingResponse {
            project: ProjectSummary::from_project(&project),
            resumed: false,
        })
    }
}

/// 占用槽位 → 重置失败单元 → 交给流水线，任一步失败都释放槽位
async fn resume_existing(
    project_repo: &dyn ProjectRepositoryPort,
    control: &dyn ProcessControlPort,
    project_id: ProjectId,
) -> Result<Project, ApplicationError> {
    control.try_acquire(project_id)?;

    let project = match project_repo
        .update(project_id, mutation(|project| project.prepare_resume()))
        .await
    {
        Ok(project) => project,
        Err(e) => {
            control.release(project_id);
            return Err(e.into());
        }
    };

    if let Err(e) = control.launch(project_id) {
        control.release(project_id);
        return Err(e.into());
    }

    Ok(project)
}

/// ResumeProject Handler - 恢复已有项目（暂停、出错或已完成）
pub struct ResumeProjectHandler {
    project_repo: Arc<dyn ProjectRepositoryPort>,
    control: Arc<dyn ProcessControlPort>,
}

impl ResumeProjectHandler {
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        control: Arc<dyn ProcessControlPort>,
    ) -> Self {
        Self {
            project_repo,
            control,
        }
    }

    pub async fn handle(&self, cmd: ResumeProject) -> Result<ResumeProjectResponse, ApplicationError> {
        let project = self
            .project_repo
            .find_by_id(cmd.project_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Project", cmd.project_id))?;

        if self.control.active_project() == Some(cmd.project_id) {
            return Err(ApplicationError::conflict(
                format!("project {} is already active", cmd.project_id),
                Some(ProjectSummary::from_project(&project)),
            ));
        }

        let project = resume_existing(&*self.project_repo, &*self.control, cmd.project_id).await?;

        tracing::info!(
            project_id = %cmd.project_id,
            status = %project.status(),
            "Project resume requested"
        );

        Ok(ResumeProjectResponse {
            project: ProjectSummary::from_project(&project),
        })
    }
}

/// PauseProcessing Handler
pub struct PauseProcessingHandler {
    control: Arc<dyn ProcessControlPort>,
}

impl PauseProcessingHandler {
    pub fn new(control: Arc<dyn ProcessControlPort>) -> Self {
        Self { control }
    }

    pub fn handle(&self, _cmd: PauseProcessing) -> ControlResponse {
        let affected = self.control.request_pause();
        if let Some(id) = affected {
            tracing::info!(project_id = %id, "Pause requested");
        }
        ControlResponse {
            project_id: affected.or_else(|| self.control.active_project()),
            accepted: affected.is_some(),
            signal: self.control.signal(),
        }
    }
}

/// ResumeProcessing Handler
pub struct ResumeProcessingHandler {
    control: Arc<dyn ProcessControlPort>,
}

impl ResumeProcessingHandler {
    pub fn new(control: Arc<dyn ProcessControlPort>) -> Self {
        Self { control }
    }

    pub fn handle(&self, _cmd: ResumeProcessing) -> ControlResponse {
        let affected = self.control.request_resume();
        if let Some(id) = affected {
            tracing::info!(project_id = %id, "Resume requested");
        }
        ControlResponse {
            project_id: affected.or_else(|| self.control.active_project()),
            accepted: affected.is_some(),
            signal: self.control.signal(),
        }
    }
}

/// StopProcessing Handler
pub struct StopProcessingHandler {
    control: Arc<dyn ProcessControlPort>,
}

impl StopProcessingHandler {
    pub fn new(control: Arc<dyn ProcessControlPort>) -> Self {
        Self { control }
    }

    pub fn handle(&self, _cmd: StopProcessing) -> ControlResponse {
        let affected = self.control.request_stop();
        if let Some(id) = affected {
            tracing::info!(project_id = %id, "Stop requested");
        }
        ControlResponse {
            project_id: affected.or_else(|| self.control.active_project()),
            accepted: affected.is_some(),
            signal: self.control.signal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ControlSignal, ProcessControlPort};
    use crate::domain::project::ProjectStatus;
    use crate::infrastructure::adapters::FileArtifactStorage;
    use crate::infrastructure::memory::InMemoryProcessControl;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository,
    };
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Fixture {
        _dir: TempDir,
        repo: Arc<SqliteProjectRepository>,
        control: Arc<InMemoryProcessControl>,
        queue: mpsc::Receiver<ProjectId>,
        handler: StartProcessingHandler,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteProjectRepository::new(pool));
        let storage = Arc::new(FileArtifactStorage::new(dir.path().join("audio")));
        let (tx, queue) = mpsc::channel(8);
        let control = Arc::new(InMemoryProcessControl::new(tx));

        let handler = StartProcessingHandler::new(
            repo.clone(),
            storage,
            control.clone(),
            ProcessingDefaults {
                batch_size: 10,
                max_chapters: 1000,
                voice: "en-US-AndrewNeural".to_string(),
            },
        );

        Fixture {
            _dir: dir,
            repo,
            control,
            queue,
            handler,
        }
    }

    fn start_cmd(end: u32) -> StartProcessing {
        StartProcessing {
            base_url: None,
            start_url: "https://site.com/b/shadow-slave".to_string(),
            chapter_urls: None,
            start_chapter: 1,
            end_chapter: Some(end),
            num_chapters: None,
            batch_size: Some(10),
            voice: None,
            rate: 0,
            pitch: 0,
            volume: 0,
            overwrite: false,
        }
    }

    #[tokio::test]
    async fn test_start_creates_and_enqueues() {
        let mut fx = fixture().await;

        let resp = fx.handler.handle(start_cmd(23)).await.unwrap();

        assert!(!resp.resumed);
        assert_eq!(resp.project.novel_name, "Shadow Slave");
        assert_eq!(resp.project.progress.total_chapters, 23);
        assert_eq!(resp.project.progress.total_batches, 3);
        assert_eq!(fx.queue.recv().await, Some(resp.project.project_id));
        assert_eq!(fx.control.active_project(), Some(resp.project.project_id));
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_without_state_change() {
        let fx = fixture().await;
        let mut cmd = start_cmd(10);
        cmd.num_chapters = Some(10);

        let err = fx.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Config(_)));
        assert!(fx.repo.list().await.unwrap().is_empty());
        assert_eq!(fx.control.active_project(), None);
    }

    #[tokio::test]
    async fn test_oversized_range_rejected_without_state_change() {
        let fx = fixture().await;
        let mut cmd = start_cmd(u32::MAX);
        cmd.batch_size = Some(1);

        let err = fx.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Config(ref msg) if msg.contains("limit is 1000")));
        assert!(fx.repo.list().await.unwrap().is_empty());
        assert_eq!(fx.control.active_project(), None);

        let mut cmd = start_cmd(1);
        cmd.end_chapter = None;
        cmd.num_chapters = Some(1000);
        assert!(fx.handler.handle(cmd).await.is_ok());
    }

    /// 名称查重时看不到对方刚写入的项目
    struct LaggingLookupRepo {
        inner: Arc<SqliteProjectRepository>,
        lookups: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ProjectRepositoryPort for LaggingLookupRepo {
        async fn create(&self, project: &Project) -> Result<(), RepositoryError> {
            self.inner.create(project).await
        }

        async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_novel_name(
            &self,
            name: &NovelName,
        ) -> Result<Option<Project>, RepositoryError> {
            if self.lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Ok(None);
            }
            self.inner.find_by_novel_name(name).await
        }

        async fn list(&self) -> Result<Vec<ProjectSummary>, RepositoryError> {
            self.inner.list().await
        }

        async fn update(
            &self,
            id: ProjectId,
            mutator: crate::application::ports::ProjectMutator,
        ) -> Result<Project, RepositoryError> {
            self.inner.update(id, mutator).await
        }

        async fn recover_interrupted(&self) -> Result<Vec<ProjectId>, RepositoryError> {
            self.inner.recover_interrupted().await
        }
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_create_is_conflict() {
        let fx = fixture().await;
        let winner = fx.handler.handle(start_cmd(5)).await.unwrap().project;
        fx.control.release(winner.project_id);

        let storage = Arc::new(FileArtifactStorage::new(fx._dir.path().join("other")));
        let lagging = StartProcessingHandler::new(
            Arc::new(LaggingLookupRepo {
                inner: fx.repo.clone(),
                lookups: std::sync::atomic::AtomicUsize::new(0),
            }),
            storage,
            fx.control.clone(),
            ProcessingDefaults {
                batch_size: 10,
                max_chapters: 1000,
                voice: "en-US-AndrewNeural".to_string(),
            },
        );

        let err = lagging.handle(start_cmd(5)).await.unwrap_err();

        match err {
            ApplicationError::Conflict {
                existing_project, ..
            } => assert_eq!(existing_project.unwrap().project_id, winner.project_id),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(fx.repo.list().await.unwrap().len(), 1);
        assert_eq!(fx.control.active_project(), None);
    }

    #[tokio::test]
    async fn test_voice_param_out_of_range_rejected() {
        let fx = fixture().await;
        let mut cmd = start_cmd(10);
        cmd.rate = 150;

        let err = fx.handler.handle(cmd).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Config(_)));
    }

    #[tokio::test]
    async fn test_existing_project_conflict_without_overwrite() {
        let fx = fixture().await;
        let created = fx.handler.handle(start_cmd(5)).await.unwrap().project;
        fx.control.release(created.project_id);
        let before = fx.repo.find_by_id(created.project_id).await.unwrap().unwrap();

        let err = fx.handler.handle(start_cmd(8)).await.unwrap_err();

        match err {
            ApplicationError::Conflict {
                existing_project, ..
            } => assert_eq!(existing_project.unwrap().project_id, created.project_id),
            other => panic!("unexpected error: {:?}", other),
        }
        let after = fx.repo.find_by_id(created.project_id).await.unwrap().unwrap();
        assert_eq!(after.updated_at(), before.updated_at());
        assert_eq!(after.chapter_range().end(), 5);
        assert_eq!(fx.repo.list().await.unwrap().len(), 1);
        assert_eq!(fx.control.active_project(), None);
    }

    #[tokio::test]
    async fn test_overwrite_resumes_existing_project() {
        let fx = fixture().await;
        let created = fx.handler.handle(start_cmd(5)).await.unwrap().project;
        fx.control.release(created.project_id);

        let mut cmd = start_cmd(5);
        cmd.overwrite = true;
        let resp = fx.handler.handle(cmd).await.unwrap();

        assert!(resp.resumed);
        assert_eq!(resp.project.project_id, created.project_id);
        assert_eq!(fx.repo.list().await.unwrap().len(), 1);
        assert_eq!(fx.control.active_project(), Some(created.project_id));
    }

    #[tokio::test]
    async fn test_start_while_active_is_conflict() {
        let fx = fixture().await;
        fx.handler.handle(start_cmd(5)).await.unwrap();

        let mut cmd = start_cmd(5);
        cmd.start_url = "https://site.com/b/another-novel".to_string();
        let err = fx.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Conflict { .. }));
        assert_eq!(fx.repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_project_rules() {
        let fx = fixture().await;
        let created = fx.handler.handle(start_cmd(3)).await.unwrap().project;
        let resume = ResumeProjectHandler::new(fx.repo.clone(), fx.control.clone());

        let err = resume
            .handle(ResumeProject {
                project_id: created.project_id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Conflict { .. }));

        fx.control.release(created.project_id);
        fx.repo
            .update(
                created.project_id,
                mutation(|p| p.set_status(ProjectStatus::Paused)),
            )
            .await
            .unwrap();

        let resp = resume
            .handle(ResumeProject {
                project_id: created.project_id,
            })
            .await
            .unwrap();
        assert_eq!(resp.project.status, ProjectStatus::Starting);

        let missing = resume
            .handle(ResumeProject {
                project_id: ProjectId::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(missing, ApplicationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_control_without_active_run_is_noop() {
        let fx = fixture().await;
        let pause = PauseProcessingHandler::new(fx.control.clone());
        let resume = ResumeProcessingHandler::new(fx.control.clone());
        let stop = StopProcessingHandler::new(fx.control.clone());

        for resp in [
            pause.handle(PauseProcessing),
            resume.handle(ResumeProcessing),
            stop.handle(StopProcessing),
        ] {
            assert!(!resp.accepted);
            assert_eq!(resp.project_id, None);
            assert_eq!(resp.signal, None);
        }

        fx.handler.handle(start_cmd(3)).await.unwrap();
        assert!(!resume.handle(ResumeProcessing).accepted);
        let resp = pause.handle(PauseProcessing);
        assert!(resp.accepted);
        assert_eq!(resp.signal, Some(ControlSignal::Pause));
        assert_eq!(resume.handle(ResumeProcessing).signal, Some(ControlSignal::Run));
    }
}
