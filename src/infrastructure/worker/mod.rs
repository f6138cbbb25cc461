//! Worker Layer - Background Pipeline Processing
//!
//! 实现 PipelineWorker，依次执行章节抓取、语音合成与批次合并

mod pipeline_worker;

pub use pipeline_worker::{PipelineWorker, PipelineWorkerConfig};
