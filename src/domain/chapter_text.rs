//! 章节文本处理
//!
//! - 抓取文本清洗（去除站点噪声）
//! - 从 URL 中识别章节编号

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::project::ChapterLink;

static CHAPTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)chapter[_-]?(\d+)").expect("valid regex"));

static CHAPTER_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bchapter \d+").expect("valid regex"));

static SITE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)next chapter|previous chapter|table of contents|advertisement|please enable javascript")
        .expect("valid regex")
});

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+").expect("valid regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// 清洗章节文本
///
/// 逐段处理并保留段落边界：
/// 1. 去除章节标题、导航文字、URL、邮箱
/// 2. 还原常见 HTML 实体
/// 3. 压缩空白，丢弃空段落
pub fn clean_text(text: &str) -> String {
    let paragraphs: Vec<String> = text
        .split("\n\n")
        .map(clean_paragraph)
        .filter(|p| !p.is_empty())
        .collect();

    paragraphs.join("\n\n")
}

fn clean_paragraph(paragraph: &str) -> String {
    let text = paragraph
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    let text = CHAPTER_HEADING.replace_all(&text, "");
    let text = SITE_NOISE.replace_all(&text, "");
    let text = URL.replace_all(&text, "");
    let text = EMAIL.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// 从 URL 中提取章节编号
pub fn extract_chapter_number(url: &str) -> Option<u32> {
    CHAPTER_NUMBER
        .captures(url)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 把导入的 URL 列表转换为章节链接
///
/// 能识别编号的 URL 按编号排序去重，无法识别编号的 URL 被丢弃；
/// 只有当列表中没有任何 URL 带编号时，才按原顺序从 start 开始依次编号
pub fn links_from_urls(urls: &[String], start: u32) -> Vec<ChapterLink> {
    let mut numbered: Vec<ChapterLink> = Vec::new();
    let mut unnumbered: Vec<&str> = Vec::new();

    for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        match extract_chapter_number(url) {
            Some(number) => numbered.push(ChapterLink {
                number,
                title: None,
                url: url.to_string(),
            }),
            None => unnumbered.push(url),
        }
    }

    if numbered.is_empty() {
        return unnumbered
            .into_iter()
            .zip(start..)
            .map(|(url, number)| ChapterLink {
                number,
                title: None,
                url: url.to_string(),
            })
            .collect();
    }

    numbered.sort_by_key(|link| link.number);
    numbered.dedup_by_key(|link| link.number);
    numbered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_removes_site_noise() {
        let raw = "Chapter 12 The Return\n\nHe walked   in.&nbsp;Visit https://spam.site now\n\nNext Chapter\n\nmail me@x.com please";
        let cleaned = clean_text(raw);
        assert_eq!(cleaned, "The Return\n\nHe walked in. Visit now\n\nmail please");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("\n\n  \n\n"), "");
    }

    #[test]
    fn test_extract_chapter_number() {
        assert_eq!(extract_chapter_number("https://a.com/b/x/chapter-12"), Some(12));
        assert_eq!(extract_chapter_number("https://a.com/b/x/Chapter_7-title"), Some(7));
        assert_eq!(extract_chapter_number("https://a.com/b/x/chapter3"), Some(3));
        assert_eq!(extract_chapter_number("https://a.com/b/x/prologue"), None);
    }

    #[test]
    fn test_links_sorted_by_number() {
        let urls = vec![
            "https://a.com/n/chapter-3".to_string(),
            "https://a.com/n/chapter-1".to_string(),
            "https://a.com/n/chapter-2".to_string(),
            "https://a.com/n/chapter-2".to_string(),
        ];
        let links = links_from_urls(&urls, 1);
        let numbers: Vec<u32> = links.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_links_without_numbers_follow_order() {
        let urls = vec!["https://a.com/x".to_string(), "https://a.com/y".to_string()];
        let links = links_from_urls(&urls, 5);
        assert_eq!(links[0].number, 5);
        assert_eq!(links[1].number, 6);
        assert_eq!(links[1].url, "https://a.com/y");
    }

    #[test]
    fn test_unnumbered_links_dropped_when_others_are_numbered() {
        let urls = vec![
            "https://a.com/n/chapter-2".to_string(),
            "https://a.com/n/afterword".to_string(),
            "https://a.com/n/chapter-1".to_string(),
        ];
        let links = links_from_urls(&urls, 7);
        let numbers: Vec<u32> = links.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert!(links.iter().all(|l| !l.url.ends_with("afterword")));
    }
}
