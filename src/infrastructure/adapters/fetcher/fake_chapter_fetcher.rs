//! Fake Chapter Fetcher - 内存中的模拟站点
//!
//! 用于测试：章节内容预先登记，可注入失败并统计调用次数

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::application::ports::{ChapterFetcherPort, FetchError, FetchedChapter};
use crate::domain::extract_chapter_number;
use crate::domain::project::{ChapterLink, ChapterSource};

#[derive(Default)]
struct SiteState {
    chapters: BTreeMap<u32, FetchedChapter>,
    failing: HashSet<u32>,
    discovery_fails: bool,
}

/// 模拟站点
pub struct FakeChapterFetcher {
    base_url: String,
    state: Mutex<SiteState>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl FakeChapterFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            state: Mutex::new(SiteState::default()),
            resolve_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// 登记 1..=count 章，正文为固定模板
    pub fn with_chapters(base_url: impl Into<String>, count: u32) -> Self {
        let fetcher = Self::new(base_url);
        for n in 1..=count {
            fetcher.add_chapter(
                n,
                format!("Title {}", n),
                format!("This is the body text of chapter number {}.", n),
            );
        }
        fetcher
    }

    fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_chapter(&self, number: u32, title: impl Into<String>, text: impl Into<String>) {
        self.state().chapters.insert(
            number,
            FetchedChapter {
                title: Some(title.into()),
                text: text.into(),
            },
        );
    }

    pub fn chapter_url(&self, number: u32) -> String {
        format!("{}/chapter-{}", self.base_url, number)
    }

    /// 让第 `number` 章抓取失败
    pub fn fail_chapter(&self, number: u32) {
        self.state().failing.insert(number);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.discovery_fails = false;
    }

    pub fn fail_discovery(&self) {
        self.state().discovery_fails = true;
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChapterFetcherPort for FakeChapterFetcher {
    async fn resolve_chapter_list(
        &self,
        _source: &ChapterSource,
    ) -> Result<Vec<ChapterLink>, FetchError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if state.discovery_fails {
            return Err(FetchError::HttpStatus(503));
        }

        Ok(state
            .chapters
            .iter()
            .map(|(number, chapter)| ChapterLink {
                number: *number,
                title: chapter.title.clone(),
                url: self.chapter_url(*number),
            })
            .collect())
    }

    async fn fetch_chapter(&self, url: &str) -> Result<FetchedChapter, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let number = extract_chapter_number(url)
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;

        let state = self.state();
        if state.failing.contains(&number) {
            return Err(FetchError::NetworkError(format!(
                "injected failure for chapter {}",
                number
            )));
        }
        state
            .chapters
            .get(&number)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_site() {
        let site = FakeChapterFetcher::with_chapters("https://fake.site/b/novel", 3);
        let source = ChapterSource::new(None, "https://fake.site/b/novel", None).unwrap();

        let links = site.resolve_chapter_list(&source).await.unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[2].url, "https://fake.site/b/novel/chapter-3");

        site.fail_chapter(2);
        assert!(site.fetch_chapter(&links[1].url).await.is_err());
        let chapter = site.fetch_chapter(&links[0].url).await.unwrap();
        assert_eq!(chapter.title.as_deref(), Some("Title 1"));
        assert!(matches!(
            site.fetch_chapter("https://fake.site/b/novel/chapter-9").await,
            Err(FetchError::NotFound(_))
        ));
        assert_eq!(site.fetch_calls(), 3);
        assert_eq!(site.resolve_calls(), 1);
    }
}
