//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::{
    // Command handlers
    CleanTemporaryFilesHandler, GenerateSpeechHandler, PauseProcessingHandler,
    ProcessingDefaults, ResumeProcessingHandler, ResumeProjectHandler, StartProcessingHandler,
    StopProcessingHandler,
    // Query handlers
    CheckFolderHandler, GetAudioFileHandler, GetChapterUrlsHandler, GetProcessStatusHandler,
    GetProjectHandler, ListAudioFilesHandler, ListProjectsHandler, ListVoicesHandler,
    ScrapeChapterHandler,
    // Ports
    ArtifactStoragePort, ChapterFetcherPort, ProcessControlPort, ProjectRepositoryPort,
    SpeechSynthesizerPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub project_repo: Arc<dyn ProjectRepositoryPort>,
    pub storage: Arc<dyn ArtifactStoragePort>,
    pub control: Arc<dyn ProcessControlPort>,
    pub event_publisher: Arc<EventPublisher>,

    // ========== Command Handlers ==========
    pub start_handler: StartProcessingHandler,
    pub pause_handler: PauseProcessingHandler,
    pub resume_handler: ResumeProcessingHandler,
    pub stop_handler: StopProcessingHandler,
    pub resume_project_handler: ResumeProjectHandler,
    pub cleanup_handler: CleanTemporaryFilesHandler,
    pub generate_speech_handler: GenerateSpeechHandler,

    // ========== Query Handlers ==========
    pub status_handler: GetProcessStatusHandler,
    pub list_projects_handler: ListProjectsHandler,
    pub check_folder_handler: CheckFolderHandler,
    pub get_project_handler: GetProjectHandler,
    pub list_audio_handler: ListAudioFilesHandler,
    pub get_audio_handler: GetAudioFileHandler,
    pub list_voices_handler: ListVoicesHandler,
    pub chapter_urls_handler: GetChapterUrlsHandler,
    pub scrape_chapter_handler: ScrapeChapterHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        project_repo: Arc<dyn ProjectRepositoryPort>,
        storage: Arc<dyn ArtifactStoragePort>,
        control: Arc<dyn ProcessControlPort>,
        fetcher: Arc<dyn ChapterFetcherPort>,
        synthesizer: Arc<dyn SpeechSynthesizerPort>,
        event_publisher: Arc<EventPublisher>,
        defaults: ProcessingDefaults,
    ) -> Self {
        Self {
            generate_speech_handler: GenerateSpeechHandler::new(
                synthesizer.clone(),
                defaults.voice.clone(),
            ),
            // Command handlers
            start_handler: StartProcessingHandler::new(
                project_repo.clone(),
                storage.clone(),
                control.clone(),
                defaults,
            ),
            pause_handler: PauseProcessingHandler::new(control.clone()),
            resume_handler: ResumeProcessingHandler::new(control.clone()),
            stop_handler: StopProcessingHandler::new(control.clone()),
            resume_project_handler: ResumeProjectHandler::new(project_repo.clone(), control.clone()),
            cleanup_handler: CleanTemporaryFilesHandler::new(project_repo.clone(), storage.clone()),

            // Query handlers
            status_handler: GetProcessStatusHandler::new(project_repo.clone(), control.clone()),
            list_projects_handler: ListProjectsHandler::new(project_repo.clone()),
            check_folder_handler: CheckFolderHandler::new(project_repo.clone(), storage.clone()),
            get_project_handler: GetProjectHandler::new(project_repo.clone()),
            list_audio_handler: ListAudioFilesHandler::new(project_repo.clone(), storage.clone()),
            get_audio_handler: GetAudioFileHandler::new(project_repo.clone(), storage.clone()),
            list_voices_handler: ListVoicesHandler::new(synthesizer),
            chapter_urls_handler: GetChapterUrlsHandler::new(fetcher.clone()),
            scrape_chapter_handler: ScrapeChapterHandler::new(fetcher),

            // Ports
            project_repo,
            storage,
            control,
            event_publisher,
        }
    }
}
