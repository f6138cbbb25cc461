//! Pipeline Worker - 后台流水线：抓取 → 合成 → 批次合并
//!
//! 从队列逐个消费项目。同一时间只有一个活动项目，由 ProcessControlPort 的槽位保证。
//! 暂停 / 停止信号只在章节边界检查，进行中的抓取或合成不会被打断。

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::application::ports::{
    mutation, ArtifactStoragePort, AudioCombinerPort, ChapterFetcherPort, ChapterPhase,
    ControlSignal, CurrentChapter, ProcessControlPort, ProjectRepositoryPort, RepositoryError,
    SpeechSynthesizerPort, SynthesisRequest,
};
use crate::application::CleanTemporaryFilesHandler;
use crate::domain::links_from_urls;
use crate::domain::project::{ChapterLink, Project, ProjectError, ProjectId, ProjectStatus};
use crate::infrastructure::events::EventPublisher;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct PipelineWorkerConfig {
    /// 项目完成后自动删除章节中间产物
    pub auto_cleanup: bool,
}

impl Default for PipelineWorkerConfig {
    fn default() -> Self {
        Self { auto_cleanup: true }
    }
}

/// 章节边界检查结果
enum Flow {
    Continue,
    Stop,
}

type PipelineResult<T> = Result<T, RepositoryError>;

/// 流水线 Worker
pub struct PipelineWorker {
    config: PipelineWorkerConfig,
    queue_receiver: mpsc::Receiver<ProjectId>,
    project_repo: Arc<dyn ProjectRepositoryPort>,
    fetcher: Arc<dyn ChapterFetcherPort>,
    synthesizer: Arc<dyn SpeechSynthesizerPort>,
    combiner: Arc<dyn AudioCombinerPort>,
    storage: Arc<dyn ArtifactStoragePort>,
    control: Arc<dyn ProcessControlPort>,
    cleanup: CleanTemporaryFilesHandler,
    event_publisher: Arc<EventPublisher>,
}

impl PipelineWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PipelineWorkerConfig,
        queue_receiver: mpsc::Receiver<ProjectId>,
        project_repo: Arc<dyn ProjectRepositoryPort>,
        fetcher: Arc<dyn ChapterFetcherPort>,
        synthesizer: Arc<dyn SpeechSynthesizerPort>,
        combiner: Arc<dyn AudioCombinerPort>,
        storage: Arc<dyn ArtifactStoragePort>,
        control: Arc<dyn ProcessControlPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        let cleanup = CleanTemporaryFilesHandler::new(project_repo.clone(), storage.clone());
        Self {
            config,
            queue_receiver,
            project_repo,
            fetcher,
            synthesizer,
            combiner,
            storage,
            control,
            cleanup,
            event_publisher,
        }
    }

    /// 启动 Worker
    pub async fn run(mut self) {
        tracing::info!(auto_cleanup = self.config.auto_cleanup, "PipelineWorker started");

        while let Some(project_id) = self.queue_receiver.recv().await {
            self.process_project(project_id).await;
        }

        tracing::info!("PipelineWorker stopped");
    }

    /// 处理一个项目，结束时释放活动槽位
    async fn process_project(&self, project_id: ProjectId) {
        let Some(mut signal_rx) = self.control.subscribe(project_id) else {
            tracing::warn!(project_id = %project_id, "Project is not active, skipping");
            return;
        };

        match self.drive(project_id, &mut signal_rx).await {
            Ok(project) => {
                tracing::info!(
                    project_id = %project_id,
                    status = %project.status(),
                    "Pipeline run finished"
                );
            }
            Err(e) => {
                tracing::error!(project_id = %project_id, error = %e, "Pipeline run aborted");
                let reason = format!("pipeline failure: {}", e);
                match self
                    .project_repo
                    .update(
                        project_id,
                        mutation(move |project| {
                            project.mark_error(reason);
                            Ok(())
                        }),
                    )
                    .await
                {
                    Ok(project) => self.publish_status(&project),
                    Err(e) => {
                        tracing::error!(
                            project_id = %project_id,
                            error = %e,
                            "Failed to record pipeline failure"
                        );
                    }
                }
            }
        }

        self.control.release(project_id);
    }

    async fn update<F>(&self, project_id: ProjectId, f: F) -> PipelineResult<Project>
    where
        F: FnOnce(&mut Project) -> Result<(), ProjectError> + Send + 'static,
    {
        self.project_repo.update(project_id, mutation(f)).await
    }

    async fn drive(
        &self,
        project_id: ProjectId,
        signal_rx: &mut watch::Receiver<ControlSignal>,
    ) -> PipelineResult<Project> {
        let mut project = self
            .project_repo
            .find_by_id(project_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(project_id.to_string()))?;

        tracing::info!(
            project_id = %project_id,
            novel = %project.novel_name(),
            status = %project.status(),
            chapters = project.chapter_range().len(),
            "Pipeline run started"
        );

        if project.needs_resolution() {
            project = self.resolve_chapters(&project).await?;
        }
        if project.status() != ProjectStatus::Processing {
            project = self
                .update(project_id, |p| p.set_status(ProjectStatus::Processing))
                .await?;
            self.publish_status(&project);
        }

        let range = project.chapter_range();
        for number in range.numbers() {
            if let Flow::Stop = self.checkpoint(project_id, signal_rx).await? {
                return self.stop(project_id).await;
            }

            let pending = project
                .chapter(number)
                .map(|c| !c.is_terminal())
                .unwrap_or(false);
            if !pending {
                continue;
            }

            project = self.process_chapter(project, number).await?;
            project = self.combine_ready_batches(project).await?;
        }

        if let Flow::Stop = self.checkpoint(project_id, signal_rx).await? {
            return self.stop(project_id).await;
        }
        // 从 combining 中断恢复的批次
        project = self.combine_ready_batches(project).await?;

        self.control.set_current_chapter(project_id, None);
        let project = self
            .update(project_id, |p| {
                p.finalize();
                Ok(())
            })
            .await?;
        self.publish_status(&project);

        if project.status() == ProjectStatus::Completed && self.config.auto_cleanup {
            self.auto_cleanup(&project).await;
        }

        Ok(project)
    }

    /// 写入章节 URL：导入列表优先，其次目录发现，缺失的章节使用兜底 URL
    async fn resolve_chapters(&self, project: &Project) -> PipelineResult<Project> {
        let project_id = *project.id();
        let range = project.chapter_range();
        let source = project.source().clone();

        let links: Vec<ChapterLink> = match source.chapter_urls() {
            Some(urls) => links_from_urls(urls, range.start()),
            None => match self.fetcher.resolve_chapter_list(&source).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(
                        project_id = %project_id,
                        error = %e,
                        "Chapter discovery failed, using fallback URLs"
                    );
                    Vec::new()
                }
            },
        };
        let links: Vec<ChapterLink> = links
            .into_iter()
            .filter(|link| range.contains(link.number))
            .collect();

        self.update(project_id, move |p| {
            let fallbacks = p.apply_chapter_links(&links, |n| source.fallback_chapter_url(n));
            if fallbacks > 0 {
                tracing::warn!(
                    project_id = %project_id,
                    fallbacks,
                    "Chapters missing from listing use fallback URLs"
                );
            }
            Ok(())
        })
        .await
    }

    /// 章节边界：处理暂停 / 停止信号
    async fn checkpoint(
        &self,
        project_id: ProjectId,
        signal_rx: &mut watch::Receiver<ControlSignal>,
    ) -> PipelineResult<Flow> {
        let signal = *signal_rx.borrow_and_update();
        match signal {
            ControlSignal::Run => return Ok(Flow::Continue),
            ControlSignal::Stop => return Ok(Flow::Stop),
            ControlSignal::Pause => {}
        }

        self.control.set_current_chapter(project_id, None);
        let project = self
            .update(project_id, |p| p.set_status(ProjectStatus::Paused))
            .await?;
        self.publish_status(&project);
        tracing::info!(project_id = %project_id, "Pipeline paused");

        loop {
            if signal_rx.changed().await.is_err() {
                return Ok(Flow::Stop);
            }
            let signal = *signal_rx.borrow_and_update();
            match signal {
                ControlSignal::Pause => continue,
                ControlSignal::Stop => return Ok(Flow::Stop),
                ControlSignal::Run => {
                    let project = self
                        .update(project_id, |p| p.set_status(ProjectStatus::Processing))
                        .await?;
                    self.publish_status(&project);
                    tracing::info!(project_id = %project_id, "Pipeline resumed");
                    return Ok(Flow::Continue);
                }
            }
        }
    }

    async fn stop(&self, project_id: ProjectId) -> PipelineResult<Project> {
        self.control.set_current_chapter(project_id, None);
        let project = self
            .update(project_id, |p| {
                p.halt();
                Ok(())
            })
            .await?;
        self.publish_status(&project);
        tracing::info!(
            project_id = %project_id,
            status = %project.status(),
            "Pipeline stopped"
        );
        Ok(project)
    }

    /// 抓取（如需要）并合成一个章节，失败记录在章节上
    async fn process_chapter(&self, mut project: Project, number: u32) -> PipelineResult<Project> {
        let project_id = *project.id();
        let fetch_done = project
            .chapter(number)
            .map(|c| c.fetch_state().is_done())
            .unwrap_or(false);

        let mut text = None;
        if fetch_done {
            match self
                .storage
                .read_chapter_text(project.folder_path(), number)
                .await
            {
                Ok(Some(saved)) => text = Some(saved),
                Ok(None) | Err(_) => {
                    tracing::warn!(
                        project_id = %project_id,
                        chapter = number,
                        "Chapter text missing, fetching again"
                    );
                    project = self.update(project_id, move |p| p.reset_fetch(number)).await?;
                }
            }
        }

        let text = match text {
            Some(text) => text,
            None => {
                let (fetched_project, fetched) = self.fetch_step(project, number).await?;
                project = fetched_project;
                match fetched {
                    Some(text) => text,
                    None => return Ok(project),
                }
            }
        };

        self.synthesize_step(project, number, text).await
    }

    async fn fetch_step(
        &self,
        project: Project,
        number: u32,
    ) -> PipelineResult<(Project, Option<String>)> {
        let project_id = *project.id();
        let chapter = project.chapter(number);
        let url = chapter
            .and_then(|c| c.url().map(str::to_string))
            .unwrap_or_else(|| project.source().fallback_chapter_url(number));
        self.control.set_current_chapter(
            project_id,
            Some(CurrentChapter {
                number,
                title: chapter.and_then(|c| c.title().map(str::to_string)),
                phase: ChapterPhase::Fetching,
            }),
        );

        let result = match self.fetcher.fetch_chapter(&url).await {
            Ok(fetched) => match self
                .storage
                .save_chapter_text(project.folder_path(), number, &fetched.text)
                .await
            {
                Ok(_) => Ok(fetched),
                Err(e) => Err(format!("failed to save chapter text: {}", e)),
            },
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(fetched) => {
                let title = fetched.title;
                let project = self
                    .update(project_id, move |p| p.mark_fetched(number, title))
                    .await?;
                tracing::debug!(project_id = %project_id, chapter = number, "Chapter fetched");
                Ok((project, Some(fetched.text)))
            }
            Err(reason) => {
                tracing::warn!(
                    project_id = %project_id,
                    chapter = number,
                    url = %url,
                    error = %reason,
                    "Chapter fetch failed"
                );
                let recorded = reason.clone();
                let project = self
                    .update(project_id, move |p| p.mark_fetch_failed(number, recorded))
                    .await?;
                self.event_publisher
                    .publish_chapter_processed(project_id, number, Some(&reason));
                Ok((project, None))
            }
        }
    }

    async fn synthesize_step(
        &self,
        project: Project,
        number: u32,
        text: String,
    ) -> PipelineResult<Project> {
        let project_id = *project.id();
        self.control.set_current_chapter(
            project_id,
            Some(CurrentChapter {
                number,
                title: project
                    .chapter(number)
                    .and_then(|c| c.title().map(str::to_string)),
                phase: ChapterPhase::Synthesizing,
            }),
        );

        let request = SynthesisRequest {
            text,
            voice: project.voice().clone(),
        };
        let result = match self.synthesizer.synthesize(request).await {
            Ok(clip) => self
                .storage
                .save_chapter_audio(project.folder_path(), number, &clip)
                .await
                .map_err(|e| format!("failed to save chapter audio: {}", e)),
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(path) => {
                let path = path.to_string_lossy().to_string();
                let project = self
                    .update(project_id, move |p| p.mark_synthesized(number, path))
                    .await?;
                tracing::info!(project_id = %project_id, chapter = number, "Chapter synthesized");
                self.event_publisher
                    .publish_chapter_processed(project_id, number, None);
                Ok(project)
            }
            Err(reason) => {
                tracing::warn!(
                    project_id = %project_id,
                    chapter = number,
                    error = %reason,
                    "Chapter synthesis failed"
                );
                let recorded = reason.clone();
                let project = self
                    .update(project_id, move |p| p.mark_synth_failed(number, recorded))
                    .await?;
                self.event_publisher
                    .publish_chapter_processed(project_id, number, Some(&reason));
                Ok(project)
            }
        }
    }

    async fn combine_ready_batches(&self, mut project: Project) -> PipelineResult<Project> {
        for batch_index in project.ready_batches() {
            project = self.combine_batch(project, batch_index).await?;
        }
        Ok(project)
    }

    /// 合并一个批次中合成成功的章节
    async fn combine_batch(&self, project: Project, batch_index: u32) -> PipelineResult<Project> {
        let project_id = *project.id();
        let members = project.synthesized_members(batch_index)?;
        let Some(batch) = project.batch(batch_index) else {
            return Ok(project);
        };
        let (first, last) = (batch.first_chapter(), batch.last_chapter());

        if members.is_empty() {
            return self
                .fail_batch(project_id, batch_index, "no chapters were synthesized".to_string())
                .await;
        }

        let project = self
            .update(project_id, move |p| p.begin_combining(batch_index))
            .await?;

        match self
            .merge_members(project.folder_path(), batch_index, first, last, &members)
            .await
        {
            Ok(path) => {
                let numbers: Vec<u32> = members.iter().map(|(n, _)| *n).collect();
                let path = path.to_string_lossy().to_string();
                let (recorded_numbers, recorded_path) = (numbers.clone(), path.clone());
                let project = self
                    .update(project_id, move |p| {
                        p.complete_batch(batch_index, recorded_numbers, recorded_path)
                    })
                    .await?;

                tracing::info!(
                    project_id = %project_id,
                    batch = batch_index,
                    chapters = numbers.len(),
                    path = %path,
                    "Batch combined"
                );
                self.event_publisher
                    .publish_batch_completed(project_id, batch_index, numbers, &path);
                Ok(project)
            }
            Err(reason) => self.fail_batch(project_id, batch_index, reason).await,
        }
    }

    async fn merge_members(
        &self,
        folder: &str,
        batch_index: u32,
        first: u32,
        last: u32,
        members: &[(u32, String)],
    ) -> Result<PathBuf, String> {
        let mut clips = Vec::with_capacity(members.len());
        for (number, path) in members {
            let clip = self
                .storage
                .read_audio(path)
                .await
                .map_err(|e| format!("chapter {}: {}", number, e))?;
            clips.push(clip);
        }

        let combiner = self.combiner.clone();
        let combined = tokio::task::spawn_blocking(move || combiner.combine(&clips))
            .await
            .map_err(|e| format!("combine task failed: {}", e))?
            .map_err(|e| e.to_string())?;

        self.storage
            .save_batch_audio(folder, batch_index, first, last, &combined)
            .await
            .map_err(|e| format!("failed to save batch audio: {}", e))
    }

    async fn fail_batch(
        &self,
        project_id: ProjectId,
        batch_index: u32,
        reason: String,
    ) -> PipelineResult<Project> {
        tracing::warn!(
            project_id = %project_id,
            batch = batch_index,
            error = %reason,
            "Batch failed"
        );
        let recorded = reason.clone();
        let project = self
            .update(project_id, move |p| p.fail_batch(batch_index, recorded))
            .await?;
        self.event_publisher
            .publish_batch_failed(project_id, batch_index, &reason);
        Ok(project)
    }

    async fn auto_cleanup(&self, project: &Project) {
        match self.cleanup.clean_project(project).await {
            Ok(report) => {
                self.event_publisher.publish_cleanup_finished(
                    *project.id(),
                    report.files_deleted,
                    report.space_freed,
                );
            }
            Err(e) => {
                tracing::warn!(project_id = %project.id(), error = %e, "Automatic cleanup failed");
            }
        }
    }

    fn publish_status(&self, project: &Project) {
        self.event_publisher.publish_status_changed(
            *project.id(),
            project.status().as_str(),
            project.status_reason(),
        );
    }
}
