//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（ChapterFetcher、SpeechSynthesizer、Repository、ProcessControl 等）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    // Process commands
    ControlResponse,
    PauseProcessing,
    ResumeProcessing,
    ResumeProject,
    ResumeProjectResponse,
    StartProcessing,
    StartProcessingResponse,
    StopProcessing,
    // Cleanup commands
    CleanTemporaryFiles,
    CleanupReport,
    CleanupTarget,
    // Speech commands
    GenerateSpeech,
    // Handlers
    handlers::{
        CleanTemporaryFilesHandler, GenerateSpeechHandler, PauseProcessingHandler, ProcessingDefaults,
        ResumeProcessingHandler, ResumeProjectHandler, StartProcessingHandler,
        StopProcessingHandler,
    },
};

pub use error::ApplicationError;

pub use ports::{
    // Artifact storage
    ArtifactStoragePort,
    AudioFileInfo,
    RemovedArtifacts,
    StorageError,
    // Audio combiner
    AudioClip,
    AudioCombinerPort,
    AudioFormat,
    CombineError,
    // Chapter fetcher
    ChapterFetcherPort,
    FetchError,
    FetchedChapter,
    // Process control
    ChapterPhase,
    ControlError,
    ControlSignal,
    CurrentChapter,
    ProcessControlPort,
    // Repositories
    ProjectMutator,
    ProjectRepositoryPort,
    ProjectSummary,
    RepositoryError,
    // Speech synthesizer
    SpeechSynthesizerPort,
    SynthesisError,
    SynthesisRequest,
    VoiceInfo,
};

pub use queries::{
    // Audio queries
    GetAudioFile,
    ListAudioFiles,
    // Project queries
    CheckFolder,
    GetProcessStatus,
    GetProject,
    ListProjects,
    // Scraper queries
    GetChapterUrls,
    ScrapeChapter,
    // Voice queries
    ListVoices,
    // Handlers
    handlers::{
        AudioFileResponse, ChapterUrlsResponse, CheckFolderHandler, CheckFolderResponse,
        GetAudioFileHandler, GetChapterUrlsHandler, GetProcessStatusHandler, GetProjectHandler,
        ListAudioFilesHandler, ListProjectsHandler, ListVoicesHandler, ProcessStatusResponse,
        ScrapeChapterHandler, ScrapedChapter,
    },
};
