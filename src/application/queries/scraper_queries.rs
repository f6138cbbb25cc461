//! Scraper Queries - 不创建项目的章节预览

/// 解析目录页的章节链接
#[derive(Debug, Clone)]
pub struct GetChapterUrls {
    pub base_url: Option<String>,
    pub start_url: String,
}

/// 抓取单个章节
#[derive(Debug, Clone)]
pub struct ScrapeChapter {
    pub url: String,
}
