//! Project Context - Entities

use serde::{Deserialize, Serialize};

use super::{BatchState, UnitState};

/// 章节链接 - 章节列表解析的产物
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterLink {
    pub number: u32,
    pub title: Option<String>,
    pub url: String,
}

/// 章节记录
///
/// 不变量:
/// - number 在项目内唯一，且位于章节范围内
/// - synth_state 为 done 时 fetch_state 必为 done
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    number: u32,
    title: Option<String>,
    url: Option<String>,
    fetch_state: UnitState,
    synth_state: UnitState,
    /// 章节音频（中间产物）路径
    audio_path: Option<String>,
}

impl ChapterRecord {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            title: None,
            url: None,
            fetch_state: UnitState::Pending,
            synth_state: UnitState::Pending,
            audio_path: None,
        }
    }

    /// 从持久化数据还原
    pub fn restore(
        number: u32,
        title: Option<String>,
        url: Option<String>,
        fetch_state: UnitState,
        synth_state: UnitState,
        audio_path: Option<String>,
    ) -> Self {
        Self {
            number,
            title,
            url,
            fetch_state,
            synth_state,
            audio_path,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn fetch_state(&self) -> &UnitState {
        &self.fetch_state
    }

    pub fn synth_state(&self) -> &UnitState {
        &self.synth_state
    }

    pub fn audio_path(&self) -> Option<&str> {
        self.audio_path.as_deref()
    }

    /// 章节是否已到达终态（合成完成，或抓取/合成失败）
    pub fn is_terminal(&self) -> bool {
        self.synth_state.is_done() || self.fetch_state.is_failed() || self.synth_state.is_failed()
    }

    pub fn is_failed(&self) -> bool {
        self.fetch_state.is_failed() || self.synth_state.is_failed()
    }

    /// 失败原因（抓取优先）
    pub fn failure_reason(&self) -> Option<&str> {
        self.fetch_state.reason().or_else(|| self.synth_state.reason())
    }

    pub(super) fn set_link(&mut self, url: String, title: Option<String>) {
        self.url = Some(url);
        if title.is_some() {
            self.title = title;
        }
    }

    pub(super) fn set_title(&mut self, title: Option<String>) {
        if title.is_some() {
            self.title = title;
        }
    }

    pub(super) fn set_fetch_state(&mut self, state: UnitState) {
        self.fetch_state = state;
    }

    pub(super) fn set_synth_state(&mut self, state: UnitState) {
        self.synth_state = state;
    }

    pub(super) fn set_audio_path(&mut self, path: Option<String>) {
        self.audio_path = path;
    }
}

/// 批次记录
///
/// 不变量:
/// - batch_index 从 1 开始连续
/// - 批次覆盖 first_chapter..=last_chapter 的连续章节
/// - 完成后 chapter_numbers 仅包含实际合成成功的章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    batch_index: u32,
    first_chapter: u32,
    last_chapter: u32,
    chapter_numbers: Vec<u32>,
    audio_path: Option<String>,
    state: BatchState,
}

impl BatchRecord {
    pub fn new(batch_index: u32, first_chapter: u32, last_chapter: u32) -> Self {
        Self {
            batch_index,
            first_chapter,
            last_chapter,
            chapter_numbers: (first_chapter..=last_chapter).collect(),
            audio_path: None,
            state: BatchState::Pending,
        }
    }

    pub fn restore(
        batch_index: u32,
        first_chapter: u32,
        last_chapter: u32,
        chapter_numbers: Vec<u32>,
        audio_path: Option<String>,
        state: BatchState,
    ) -> Self {
        Self {
            batch_index,
            first_chapter,
            last_chapter,
            chapter_numbers,
            audio_path,
            state,
        }
    }

    pub fn batch_index(&self) -> u32 {
        self.batch_index
    }

    pub fn first_chapter(&self) -> u32 {
        self.first_chapter
    }

    pub fn last_chapter(&self) -> u32 {
        self.last_chapter
    }

    pub fn covers(&self, number: u32) -> bool {
        (self.first_chapter..=self.last_chapter).contains(&number)
    }

    pub fn chapter_numbers(&self) -> &[u32] {
        &self.chapter_numbers
    }

    pub fn audio_path(&self) -> Option<&str> {
        self.audio_path.as_deref()
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub(super) fn set_state(&mut self, state: BatchState) {
        self.state = state;
    }

    pub(super) fn complete(&mut self, members: Vec<u32>, audio_path: String) {
        self.chapter_numbers = members;
        self.audio_path = Some(audio_path);
        self.state = BatchState::Done;
    }

    /// 回到计划成员，用于重试
    pub(super) fn reset(&mut self) {
        self.chapter_numbers = (self.first_chapter..=self.last_chapter).collect();
        self.audio_path = None;
        self.state = BatchState::Pending;
    }
}
