//! Chapter Fetcher Port - 章节抓取抽象
//!
//! 定义章节列表解析与章节正文抓取的接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::project::{ChapterLink, ChapterSource};

/// 抓取错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Chapter not found: {0}")]
    NotFound(String),
}

impl FetchError {
    /// 是否值得重试（超时、网络错误、5xx、429）
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NetworkError(_) | FetchError::Timeout => true,
            FetchError::HttpStatus(status) => *status >= 500 || *status == 429,
            FetchError::ParseError(_) | FetchError::NotFound(_) => false,
        }
    }
}

/// 抓取到的章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedChapter {
    pub title: Option<String>,
    /// 清洗后的正文
    pub text: String,
}

/// Chapter Fetcher Port
///
/// 重试与限速在实现内部完成，对调用方只表现为耗时
#[async_trait]
pub trait ChapterFetcherPort: Send + Sync {
    /// 解析章节列表（编号 + URL），按编号升序
    async fn resolve_chapter_list(
        &self,
        source: &ChapterSource,
    ) -> Result<Vec<ChapterLink>, FetchError>;

    /// 抓取单个章节正文
    async fn fetch_chapter(&self, url: &str) -> Result<FetchedChapter, FetchError>;
}
