//! HTTP Chapter Fetcher - 抓取网络小说站点
//!
//! 实现 ChapterFetcherPort trait：
//! - 目录页解析章节链接
//! - 逐章抓取正文，每次请求前固定等待，暂时性错误按退避重试

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::html_extractor::{discover_chapter_links, extract_chapter};
use crate::application::ports::{ChapterFetcherPort, FetchError, FetchedChapter};
use crate::domain::project::{ChapterLink, ChapterSource};
use crate::infrastructure::adapters::RetryPolicy;

/// HTTP 抓取器配置
#[derive(Debug, Clone)]
pub struct HttpChapterFetcherConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// 每次章节请求前的等待
    pub request_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpChapterFetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            request_delay_ms: 1500,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// HTTP 章节抓取器
pub struct HttpChapterFetcher {
    client: Client,
    config: HttpChapterFetcherConfig,
    retry: RetryPolicy,
}

impl HttpChapterFetcher {
    pub fn new(config: HttpChapterFetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_base_delay_ms);

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// 单次 GET，返回页面 HTML
    async fn get_once(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response.text().await.map_err(map_reqwest_error)
    }

    async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        self.retry
            .run("fetch", FetchError::is_transient, || self.get_once(url))
            .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl ChapterFetcherPort for HttpChapterFetcher {
    async fn resolve_chapter_list(
        &self,
        source: &ChapterSource,
    ) -> Result<Vec<ChapterLink>, FetchError> {
        let base_url = source.effective_base_url();
        tracing::info!(
            start_url = %source.start_url(),
            base_url = %base_url,
            "Discovering chapter list"
        );

        let html = self.get_page(source.start_url()).await?;
        let links = discover_chapter_links(&html, &base_url)?;

        tracing::info!(count = links.len(), "Chapter list discovered");
        Ok(links)
    }

    async fn fetch_chapter(&self, url: &str) -> Result<FetchedChapter, FetchError> {
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }

        let html = self.get_page(url).await?;
        let chapter = extract_chapter(&html, url)?;

        tracing::debug!(
            url,
            title = ?chapter.title,
            text_len = chapter.text.len(),
            "Chapter fetched"
        );
        Ok(chapter)
    }
}
