//! Chapter Fetcher Adapters

mod fake_chapter_fetcher;
mod html_extractor;
mod http_chapter_fetcher;

pub use fake_chapter_fetcher::FakeChapterFetcher;
pub use html_extractor::{discover_chapter_links, extract_chapter};
pub use http_chapter_fetcher::{HttpChapterFetcher, HttpChapterFetcherConfig};
