//! HTML 解析：章节列表发现与正文提取

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::application::ports::{FetchError, FetchedChapter};
use crate::domain::project::ChapterLink;
use crate::domain::{clean_text, extract_chapter_number};

static CHAPTER_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/chapter[_-]?\d+").expect("valid regex"));

static TITLE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^chapter\s+\d+[:\s\-]*").expect("valid regex"));

static TITLE_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)read online|table of contents|^home$|^menu$").expect("valid regex")
});

static TITLE_FROM_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)chapter[_-]\d+[_-]([^/?#]+)").expect("valid regex"));

static NAVIGATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)previous chapter|next chapter|table of contents|advertisement")
        .expect("valid regex")
});

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "h1.chapter-title",
        "h1#chapter-title",
        "h2.chapter-title",
        "div.chapter-title h1",
        "div.chapter-title h2",
        "h1.chr-title",
        "h1#chr-title",
        "a.chr-title",
        "h2.chapter-heading",
        "div.chr-title h1",
        "div.chapter-header h1",
        "div.chapter-header h2",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});

static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "div#chr-content",
        "div.chr-c",
        "div#chaptercontent",
        "div.chapter-content",
        "div#chapter-content",
        "div.chapter-body",
        "div#chapter-body",
        "div.text-content",
        "div.read-content",
        "div.chapter-text",
        "div.content",
        "div#content",
        "article",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("valid selector"))
    .collect()
});

/// 段落最短长度，更短的多为按钮或广告
const MIN_PARAGRAPH_CHARS: usize = 20;

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 把 href 解析为绝对 URL，并去掉 query 与 fragment
fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = base.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// 从目录页发现章节链接，按章节号升序，同号取首个
pub fn discover_chapter_links(html: &str, base_url: &str) -> Result<Vec<ChapterLink>, FetchError> {
    // 相对链接按目录处理
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };
    let base = Url::parse(&base)
        .map_err(|e| FetchError::ParseError(format!("invalid base url {}: {}", base_url, e)))?;

    let document = Html::parse_document(html);
    let mut links: Vec<ChapterLink> = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = resolve_href(&base, href) else {
            continue;
        };
        if !CHAPTER_HREF.is_match(&url) {
            continue;
        }
        let Some(number) = extract_chapter_number(&url) else {
            continue;
        };
        if links.iter().any(|l| l.number == number) {
            continue;
        }

        let text = element_text(anchor);
        links.push(ChapterLink {
            number,
            title: clean_title(&text),
            url,
        });
    }

    links.sort_by_key(|l| l.number);
    Ok(links)
}

/// 去掉 "Chapter N:" 前缀，过滤站点噪声
fn clean_title(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().count() >= 200 || TITLE_NOISE.is_match(raw) {
        return None;
    }
    let title = TITLE_PREFIX.replace(raw, "").trim().to_string();
    if title.chars().count() > 2 {
        Some(title)
    } else {
        None
    }
}

fn title_from_url(url: &str) -> Option<String> {
    let slug = TITLE_FROM_URL.captures(url)?.get(1)?.as_str();
    let slug = slug.trim_end_matches(".html");
    if slug.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let words: Vec<String> = slug
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    let title = words.join(" ");
    if title.len() > 3 {
        Some(title)
    } else {
        None
    }
}

/// 提取章节标题与正文
pub fn extract_chapter(html: &str, url: &str) -> Result<FetchedChapter, FetchError> {
    let document = Html::parse_document(html);

    let title = TITLE_SELECTORS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .find_map(|element| clean_title(&element_text(element)))
        .or_else(|| title_from_url(url));

    let container = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| document.select(&BODY).next())
        .ok_or_else(|| FetchError::ParseError(format!("no content container: {}", url)))?;

    let is_content = |text: &str| {
        text.chars().count() > MIN_PARAGRAPH_CHARS && !NAVIGATION.is_match(text)
    };

    let mut parts: Vec<String> = container
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|text| is_content(text))
        .collect();

    // 没有 <p> 的站点按行切分
    if parts.is_empty() {
        parts = container
            .text()
            .flat_map(|chunk| chunk.lines())
            .map(|line| line.trim().to_string())
            .filter(|line| is_content(line))
            .collect();
    }

    let text = clean_text(&parts.join("\n\n"));
    if text.is_empty() {
        return Err(FetchError::ParseError(format!("empty chapter content: {}", url)));
    }

    Ok(FetchedChapter { title, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r##"
        <html><body>
          <ul>
            <li><a href="/b/shadow-slave/chapter-2-the-dream">Chapter 2: The Dream</a></li>
            <li><a href="chapter-1?ref=list#top">Chapter 1 - Nightmare Begins</a></li>
            <li><a href="https://site.com/b/shadow-slave/chapter-2">dup</a></li>
            <li><a href="https://site.com/b/shadow-slave/chapter_10">Chapter 10</a></li>
            <li><a href="/about">About</a></li>
            <li><a href="#chapter-3">anchor</a></li>
          </ul>
        </body></html>"##;

    #[test]
    fn test_discover_sorted_and_resolved() {
        let links = discover_chapter_links(LISTING, "https://site.com/b/shadow-slave").unwrap();
        let numbers: Vec<u32> = links.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(links[0].url, "https://site.com/b/shadow-slave/chapter-1");
        assert_eq!(links[0].title.as_deref(), Some("Nightmare Begins"));
        assert_eq!(links[1].url, "https://site.com/b/shadow-slave/chapter-2-the-dream");
        assert_eq!(links[2].title, None);
    }

    #[test]
    fn test_extract_title_and_paragraphs() {
        let html = r#"
            <html><body>
              <h1 class="chapter-title">Chapter 7: Into the Dark</h1>
              <div id="chr-content">
                <p>The wind howled across the empty plain as Sunny walked on.</p>
                <p>Next Chapter</p>
                <p>short</p>
                <p>He did not look back, not even once, not even when it hurt.</p>
              </div>
            </body></html>"#;
        let chapter = extract_chapter(html, "https://site.com/b/x/chapter-7").unwrap();
        assert_eq!(chapter.title.as_deref(), Some("Into the Dark"));
        assert_eq!(
            chapter.text,
            "The wind howled across the empty plain as Sunny walked on.\n\n\
             He did not look back, not even once, not even when it hurt."
        );
    }

    #[test]
    fn test_title_from_url_fallback() {
        let html = "<html><body><article><p>A long enough paragraph of story text here.</p></article></body></html>";
        let chapter = extract_chapter(html, "https://site.com/b/x/chapter-3-the-long-night").unwrap();
        assert_eq!(chapter.title.as_deref(), Some("The Long Night"));
    }

    #[test]
    fn test_empty_content_is_parse_error() {
        let html = "<html><body><div class=\"chapter-content\"><p>Next Chapter</p></div></body></html>";
        assert!(matches!(
            extract_chapter(html, "https://site.com/chapter-1"),
            Err(FetchError::ParseError(_))
        ));
    }
}
