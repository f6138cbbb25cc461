//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod artifact_storage;
mod audio_combiner;
mod chapter_fetcher;
mod process_control;
mod repositories;
mod speech_synthesizer;

pub use artifact_storage::{ArtifactStoragePort, AudioFileInfo, RemovedArtifacts, StorageError};
pub use audio_combiner::{AudioClip, AudioCombinerPort, AudioFormat, CombineError};
pub use chapter_fetcher::{ChapterFetcherPort, FetchError, FetchedChapter};
pub use process_control::{
    ChapterPhase, ControlError, ControlSignal, CurrentChapter, ProcessControlPort,
};
pub use repositories::{
    mutation, ProjectMutator, ProjectRepositoryPort, ProjectSummary, RepositoryError,
};
pub use speech_synthesizer::{SpeechSynthesizerPort, SynthesisError, SynthesisRequest, VoiceInfo};
