//! Scraper Query Handlers - 章节列表预览与单章抓取

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::ChapterFetcherPort;
use crate::application::queries::{GetChapterUrls, ScrapeChapter};
use crate::domain::project::{ChapterLink, ChapterSource, NovelName};

/// 章节列表预览结果
#[derive(Debug, Clone)]
pub struct ChapterUrlsResponse {
    pub novel_title: String,
    pub chapters: Vec<ChapterLink>,
}

/// 单章抓取结果
#[derive(Debug, Clone, Serialize)]
pub struct ScrapedChapter {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// GetChapterUrls Handler
pub struct GetChapterUrlsHandler {
    fetcher: Arc<dyn ChapterFetcherPort>,
}

impl GetChapterUrlsHandler {
    pub fn new(fetcher: Arc<dyn ChapterFetcherPort>) -> Self {
        Self { fetcher }
    }

    pub async fn handle(&self, query: GetChapterUrls) -> Result<ChapterUrlsResponse, ApplicationError> {
        let source = ChapterSource::new(query.base_url, query.start_url, None)?;
        let novel_title = NovelName::from_url(source.start_url())?;
        let chapters = self.fetcher.resolve_chapter_list(&source).await?;

        tracing::debug!(novel = %novel_title, count = chapters.len(), "Chapter list resolved");

        Ok(ChapterUrlsResponse {
            novel_title: novel_title.as_str().to_string(),
            chapters,
        })
    }
}

/// ScrapeChapter Handler
pub struct ScrapeChapterHandler {
    fetcher: Arc<dyn ChapterFetcherPort>,
}

impl ScrapeChapterHandler {
    pub fn new(fetcher: Arc<dyn ChapterFetcherPort>) -> Self {
        Self { fetcher }
    }

    pub async fn handle(&self, query: ScrapeChapter) -> Result<ScrapedChapter, ApplicationError> {
        let url = query.url.trim().to_string();
        if url.is_empty() {
            return Err(ApplicationError::config("url cannot be empty"));
        }

        let chapter = self.fetcher.fetch_chapter(&url).await?;
        if chapter.text.trim().is_empty() {
            return Err(ApplicationError::config("could not extract chapter content"));
        }

        Ok(ScrapedChapter {
            title: chapter.title.unwrap_or_else(|| "Chapter".to_string()),
            content: chapter.text,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeChapterFetcher;

    #[tokio::test]
    async fn test_chapter_urls_preview() {
        let fetcher = Arc::new(FakeChapterFetcher::with_chapters("https://site.com/b/lord-of-mysteries", 3));
        let handler = GetChapterUrlsHandler::new(fetcher.clone());

        let resp = handler
            .handle(GetChapterUrls {
                base_url: None,
                start_url: "https://site.com/b/lord-of-mysteries".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(resp.novel_title, "Lord Of Mysteries");
        assert_eq!(resp.chapters.len(), 3);
        assert_eq!(resp.chapters[2].url, fetcher.chapter_url(3));
    }

    #[tokio::test]
    async fn test_chapter_urls_discovery_failure_is_upstream_error() {
        let fetcher = Arc::new(FakeChapterFetcher::with_chapters("https://site.com/b/x", 1));
        fetcher.fail_discovery();
        let handler = GetChapterUrlsHandler::new(fetcher);

        let err = handler
            .handle(GetChapterUrls {
                base_url: None,
                start_url: "https://site.com/b/x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ExternalServiceError(_)));
    }

    #[tokio::test]
    async fn test_scrape_single_chapter() {
        let fetcher = Arc::new(FakeChapterFetcher::with_chapters("https://site.com/b/x", 2));
        let handler = ScrapeChapterHandler::new(fetcher.clone());

        let chapter = handler
            .handle(ScrapeChapter {
                url: fetcher.chapter_url(2),
            })
            .await
            .unwrap();
        assert_eq!(chapter.title, "Title 2");
        assert!(chapter.content.contains("chapter number 2"));

        fetcher.add_chapter(3, "Blank", "   ");
        let err = handler
            .handle(ScrapeChapter {
                url: fetcher.chapter_url(3),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Config(_)));

        let err = handler
            .handle(ScrapeChapter {
                url: fetcher.chapter_url(9),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::NotFound { .. }));
    }
}
