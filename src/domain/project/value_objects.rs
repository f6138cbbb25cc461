//! Project Context - Value Objects

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProjectError;

/// 项目唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static CHAPTER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(chapter|ch|episode)[_-]?\d+").expect("valid regex"));

/// 小说名称（项目身份，来源于 URL）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NovelName(String);

impl NovelName {
    pub fn new(name: impl Into<String>) -> Result<Self, ProjectError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ProjectError::InvalidSource(
                "novel name cannot be empty".to_string(),
            ));
        }
        if name.len() > 200 {
            return Err(ProjectError::InvalidSource(
                "novel name cannot exceed 200 characters".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// 从 URL 推导小说名称
    ///
    /// 规则:
    /// 1. 路径中含 `/b/<slug>` 时取 slug
    /// 2. 否则取最后一个非章节、非纯数字的路径段
    /// 3. 都没有时退回到主机名
    pub fn from_url(url: &str) -> Result<Self, ProjectError> {
        let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let without_query = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme);

        let mut parts = without_query.split('/').filter(|s| !s.is_empty());
        let host = parts.next().unwrap_or_default();
        let segments: Vec<&str> = parts.collect();

        let slug = segments
            .windows(2)
            .find(|pair| pair[0] == "b")
            .map(|pair| pair[1])
            .or_else(|| {
                segments.iter().rev().copied().find(|segment| {
                    !CHAPTER_SEGMENT.is_match(segment)
                        && !segment.chars().all(|c| c.is_ascii_digit())
                })
            })
            .unwrap_or(host);

        let slug = slug.trim_end_matches(".html").trim_end_matches(".htm");
        Self::new(humanize(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 文件夹名称（去除路径不安全字符）
    pub fn folder_name(&self) -> String {
        let cleaned: String = self
            .0
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
            .collect();
        let name = cleaned
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .trim_matches('.')
            .to_string();
        if name.is_empty() {
            "novel".to_string()
        } else {
            name
        }
    }
}

impl std::fmt::Display for NovelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn humanize(slug: &str) -> String {
    slug.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// 已解析的章节范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    start: u32,
    end: u32,
}

impl ChapterRange {
    /// 由 start + (end | count) 解析出具体范围
    ///
    /// end 与 count 必须且只能给出一个
    pub fn resolve(start: u32, end: Option<u32>, count: Option<u32>) -> Result<Self, ProjectError> {
        if start == 0 {
            return Err(ProjectError::InvalidRange(
                "start_chapter must be at least 1".to_string(),
            ));
        }

        match (end, count) {
            (Some(_), Some(_)) => Err(ProjectError::InvalidRange(
                "end_chapter and num_chapters cannot both be set".to_string(),
            )),
            (None, None) => Err(ProjectError::InvalidRange(
                "either end_chapter or num_chapters is required".to_string(),
            )),
            (Some(end), None) => {
                if end < start {
                    return Err(ProjectError::InvalidRange(format!(
                        "end_chapter ({}) is before start_chapter ({})",
                        end, start
                    )));
                }
                Ok(Self { start, end })
            }
            (None, Some(count)) => {
                if count == 0 {
                    return Err(ProjectError::InvalidRange(
                        "num_chapters must be at least 1".to_string(),
                    ));
                }
                let end = start.checked_add(count - 1).ok_or_else(|| {
                    ProjectError::InvalidRange("chapter range overflows".to_string())
                })?;
                Ok(Self { start, end })
            }
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, number: u32) -> bool {
        (self.start..=self.end).contains(&number)
    }

    pub fn numbers(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// 每个合并音频包含的章节数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSize(u32);

impl BatchSize {
    pub fn new(size: u32) -> Result<Self, ProjectError> {
        if size == 0 {
            return Err(ProjectError::InvalidBatchSize(size));
        }
        Ok(Self(size))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

pub const RATE_LIMITS: (i32, i32) = (-50, 100);
pub const PITCH_LIMITS: (i32, i32) = (-50, 50);
pub const VOLUME_LIMITS: (i32, i32) = (-50, 50);

/// 语音参数
///
/// rate / pitch / volume 均为相对基准的百分比偏移（0 = 不变）。
/// 超出范围的值直接拒绝，不做截断。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceParams {
    voice_id: String,
    rate: i32,
    pitch: i32,
    volume: i32,
}

impl VoiceParams {
    pub fn new(
        voice_id: impl Into<String>,
        rate: i32,
        pitch: i32,
        volume: i32,
    ) -> Result<Self, ProjectError> {
        let voice_id = voice_id.into();
        if voice_id.trim().is_empty() {
            return Err(ProjectError::InvalidVoice(
                "voice cannot be empty".to_string(),
            ));
        }
        check_limit("rate", rate, RATE_LIMITS)?;
        check_limit("pitch", pitch, PITCH_LIMITS)?;
        check_limit("volume", volume, VOLUME_LIMITS)?;

        Ok(Self {
            voice_id,
            rate,
            pitch,
            volume,
        })
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn rate(&self) -> i32 {
        self.rate
    }

    pub fn pitch(&self) -> i32 {
        self.pitch
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn is_neutral(&self) -> bool {
        self.rate == 0 && self.pitch == 0 && self.volume == 0
    }

    /// 生成合成输入：参数全为 0 时返回原文，否则包裹 SSML prosody
    pub fn to_ssml(&self, text: &str) -> String {
        if self.is_neutral() {
            return text.to_string();
        }

        let mut attrs = Vec::with_capacity(3);
        if self.rate != 0 {
            attrs.push(format!("rate=\"{:+}%\"", self.rate));
        }
        if self.pitch != 0 {
            attrs.push(format!("pitch=\"{:+}%\"", self.pitch));
        }
        if self.volume != 0 {
            attrs.push(format!("volume=\"{:+}%\"", self.volume));
        }

        format!(
            "<speak><prosody {}>{}</prosody></speak>",
            attrs.join(" "),
            escape_xml(text)
        )
    }
}

fn check_limit(name: &'static str, value: i32, (min, max): (i32, i32)) -> Result<(), ProjectError> {
    if value < min || value > max {
        return Err(ProjectError::InvalidVoiceParam {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// 章节来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSource {
    base_url: Option<String>,
    start_url: String,
    /// 用户导入的章节 URL 列表（存在时跳过目录发现）
    chapter_urls: Option<Vec<String>>,
}

impl ChapterSource {
    pub fn new(
        base_url: Option<String>,
        start_url: impl Into<String>,
        chapter_urls: Option<Vec<String>>,
    ) -> Result<Self, ProjectError> {
        let start_url = start_url.into().trim().to_string();
        if start_url.is_empty() {
            return Err(ProjectError::InvalidSource(
                "start_url cannot be empty".to_string(),
            ));
        }
        let base_url = base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        let chapter_urls = chapter_urls.filter(|urls| !urls.is_empty());

        Ok(Self {
            base_url,
            start_url,
            chapter_urls,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    pub fn chapter_urls(&self) -> Option<&[String]> {
        self.chapter_urls.as_deref()
    }

    /// 解析相对链接时使用的 base URL，未指定时取 start_url 去掉最后一段
    pub fn effective_base_url(&self) -> String {
        match &self.base_url {
            Some(base) => base.clone(),
            None => {
                let trimmed = self.start_url.trim_end_matches('/');
                match trimmed.rsplit_once('/') {
                    Some((head, _)) if !head.ends_with(':') && !head.ends_with('/') => {
                        head.to_string()
                    }
                    _ => trimmed.to_string(),
                }
            }
        }
    }

    /// 目录中找不到的章节使用的兜底 URL
    pub fn fallback_chapter_url(&self, number: u32) -> String {
        format!("{}/chapter-{}", self.start_url.trim_end_matches('/'), number)
    }
}

/// 项目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// 已创建，章节列表尚未解析
    Starting,
    /// 处理中
    Processing,
    /// 已暂停
    Paused,
    /// 全部批次完成
    Completed,
    /// 存在未解决的失败
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Starting => "starting",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(ProjectStatus::Starting),
            "processing" => Some(ProjectStatus::Processing),
            "paused" => Some(ProjectStatus::Paused),
            "completed" => Some(ProjectStatus::Completed),
            "error" => Some(ProjectStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Error)
    }

    /// 状态机合法迁移
    pub fn can_transition_to(&self, next: ProjectStatus) -> bool {
        use ProjectStatus::*;
        if *self == next {
            return true;
        }
        match self {
            Starting => matches!(next, Processing | Paused | Completed | Error),
            Processing => matches!(next, Paused | Completed | Error),
            Paused => matches!(next, Starting | Processing | Completed | Error),
            Completed => matches!(next, Starting | Processing),
            Error => matches!(next, Starting | Processing | Paused),
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 章节抓取 / 合成状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    Done,
    Failed(String),
}

impl UnitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitState::Pending => "pending",
            UnitState::Done => "done",
            UnitState::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            UnitState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// 从持久化的 (state, reason) 还原
    pub fn from_parts(state: &str, reason: Option<String>) -> Option<Self> {
        match state {
            "pending" => Some(UnitState::Pending),
            "done" => Some(UnitState::Done),
            "failed" => Some(UnitState::Failed(reason.unwrap_or_default())),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, UnitState::Done)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, UnitState::Failed(_))
    }
}

/// 批次状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum BatchState {
    Pending,
    Combining,
    Done,
    Failed(String),
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Pending => "pending",
            BatchState::Combining => "combining",
            BatchState::Done => "done",
            BatchState::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            BatchState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn from_parts(state: &str, reason: Option<String>) -> Option<Self> {
        match state {
            "pending" => Some(BatchState::Pending),
            "combining" => Some(BatchState::Combining),
            "done" => Some(BatchState::Done),
            "failed" => Some(BatchState::Failed(reason.unwrap_or_default())),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, BatchState::Done)
    }
}

/// 进度视图（只读派生，不单独存储）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Progress {
    /// 已合成完成的章节数
    pub completed_chapters: u32,
    /// 抓取或合成失败的章节数
    pub failed_chapters: u32,
    /// 已到达终态（完成或失败）的章节数
    pub processed_chapters: u32,
    pub total_chapters: u32,
    pub completed_batches: u32,
    pub total_batches: u32,
    /// 已处理章节占比（0-100，保留一位小数）
    pub percentage: f64,
}

impl Progress {
    pub fn from_counts(
        completed_chapters: u32,
        failed_chapters: u32,
        total_chapters: u32,
        completed_batches: u32,
        total_batches: u32,
    ) -> Self {
        let processed_chapters = completed_chapters + failed_chapters;
        let percentage = if total_chapters == 0 {
            0.0
        } else {
            (processed_chapters as f64 * 1000.0 / total_chapters as f64).round() / 10.0
        };

        Self {
            completed_chapters,
            failed_chapters,
            processed_chapters,
            total_chapters,
            completed_batches,
            total_batches,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_with_end() {
        let range = ChapterRange::resolve(5, Some(27), None).unwrap();
        assert_eq!(range.start(), 5);
        assert_eq!(range.end(), 27);
        assert_eq!(range.len(), 23);
    }

    #[test]
    fn test_range_with_count() {
        let range = ChapterRange::resolve(1, None, Some(23)).unwrap();
        assert_eq!(range.end(), 23);
        assert_eq!(range.numbers().count(), 23);
    }

    #[test]
    fn test_range_rejects_both_or_neither() {
        assert!(matches!(
            ChapterRange::resolve(1, Some(10), Some(10)),
            Err(ProjectError::InvalidRange(_))
        ));
        assert!(matches!(
            ChapterRange::resolve(1, None, None),
            Err(ProjectError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_range_rejects_end_before_start() {
        assert!(ChapterRange::resolve(10, Some(9), None).is_err());
        assert!(ChapterRange::resolve(10, Some(10), None).is_ok());
        assert!(ChapterRange::resolve(0, Some(3), None).is_err());
        assert!(ChapterRange::resolve(1, None, Some(0)).is_err());
    }

    #[test]
    fn test_novel_name_from_url() {
        let name = NovelName::from_url("https://novelbin.com/b/shadow-slave/chapter-12").unwrap();
        assert_eq!(name.as_str(), "Shadow Slave");

        let name = NovelName::from_url("https://example.com/novel/the_lord-of_mysteries/chapter_3?x=1").unwrap();
        assert_eq!(name.as_str(), "The Lord Of Mysteries");

        let name = NovelName::from_url("https://example.com/my-novel/").unwrap();
        assert_eq!(name.as_str(), "My Novel");

        let name = NovelName::from_url("https://example.com/").unwrap();
        assert_eq!(name.as_str(), "Example.com");
    }

    #[test]
    fn test_folder_name_is_path_safe() {
        let name = NovelName::new("Re: Zero / Part 2?").unwrap();
        assert_eq!(name.folder_name(), "Re_Zero_Part_2");
    }

    #[test]
    fn test_voice_params_limits() {
        assert!(VoiceParams::new("en-US-AndrewNeural", 100, 50, -50).is_ok());
        assert!(matches!(
            VoiceParams::new("en-US-AndrewNeural", 101, 0, 0),
            Err(ProjectError::InvalidVoiceParam { name: "rate", .. })
        ));
        assert!(VoiceParams::new("en-US-AndrewNeural", 0, -51, 0).is_err());
        assert!(VoiceParams::new("en-US-AndrewNeural", 0, 0, 51).is_err());
        assert!(matches!(
            VoiceParams::new("  ", 0, 0, 0),
            Err(ProjectError::InvalidVoice(_))
        ));
    }

    #[test]
    fn test_ssml_only_when_prosody_changes() {
        let neutral = VoiceParams::new("v", 0, 0, 0).unwrap();
        assert_eq!(neutral.to_ssml("Hi <there>"), "Hi <there>");

        let tuned = VoiceParams::new("v", 10, -5, 0).unwrap();
        assert_eq!(
            tuned.to_ssml("Tom & Jerry"),
            "<speak><prosody rate=\"+10%\" pitch=\"-5%\">Tom &amp; Jerry</prosody></speak>"
        );
    }

    #[test]
    fn test_effective_base_url() {
        let source = ChapterSource::new(None, "https://site.com/b/novel", None).unwrap();
        assert_eq!(source.effective_base_url(), "https://site.com/b");

        let source =
            ChapterSource::new(Some("https://site.com/".to_string()), "https://site.com/b/novel", None)
                .unwrap();
        assert_eq!(source.effective_base_url(), "https://site.com");
        assert_eq!(
            source.fallback_chapter_url(7),
            "https://site.com/b/novel/chapter-7"
        );
    }

    #[test]
    fn test_status_transitions() {
        assert!(ProjectStatus::Processing.can_transition_to(ProjectStatus::Paused));
        assert!(ProjectStatus::Paused.can_transition_to(ProjectStatus::Processing));
        assert!(ProjectStatus::Error.can_transition_to(ProjectStatus::Processing));
        assert!(!ProjectStatus::Completed.can_transition_to(ProjectStatus::Paused));
        assert!(!ProjectStatus::Processing.can_transition_to(ProjectStatus::Starting));
    }

    #[test]
    fn test_progress_percentage() {
        let progress = Progress::from_counts(2, 1, 6, 0, 1);
        assert_eq!(progress.processed_chapters, 3);
        assert_eq!(progress.percentage, 50.0);
        assert_eq!(Progress::from_counts(0, 0, 0, 0, 0).percentage, 0.0);
    }
}
