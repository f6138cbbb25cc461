//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Project Context: 有声书处理项目（章节范围、批次、状态机）

pub mod project;

// 共享的领域服务
mod batching;
mod chapter_text;

pub use batching::{plan_batches, BatchPlan};
pub use chapter_text::{clean_text, extract_chapter_number, links_from_urls};
