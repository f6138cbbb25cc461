//! Project Context - 处理项目限界上下文
//!
//! 职责:
//! - 项目聚合（章节范围、批次、状态机）
//! - 章节与批次记录
//! - 派生进度

mod aggregate;
mod entities;
mod errors;
mod value_objects;

pub use aggregate::{Project, ProjectParts};
pub use entities::{BatchRecord, ChapterLink, ChapterRecord};
pub use errors::ProjectError;
pub use value_objects::{
    BatchSize, BatchState, ChapterRange, ChapterSource, NovelName, Progress, ProjectId,
    ProjectStatus, UnitState, VoiceParams, PITCH_LIMITS, RATE_LIMITS, VOLUME_LIMITS,
};
