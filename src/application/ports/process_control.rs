//! Process Control Port - 单实例处理流水线控制
//!
//! 维护唯一的活动项目槽位、暂停/停止信号和当前章节，具体实现在 infrastructure/memory 层

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::domain::project::ProjectId;

/// 控制错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("Another project is already active: {0}")]
    AlreadyActive(ProjectId),

    #[error("Project is not active: {0}")]
    NotActive(ProjectId),

    #[error("Worker queue closed")]
    QueueClosed,
}

/// 控制信号，流水线在章节边界检查
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    Run,
    Pause,
    Stop,
}

/// 当前章节所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterPhase {
    Fetching,
    Synthesizing,
}

/// 正在处理的章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentChapter {
    pub number: u32,
    pub title: Option<String>,
    pub phase: ChapterPhase,
}

/// Process Control Port
///
/// 所有方法都是非阻塞的，可以在请求处理与流水线之间并发调用
pub trait ProcessControlPort: Send + Sync {
    /// 占用活动槽位，已有其他活动项目时失败
    fn try_acquire(&self, id: ProjectId) -> Result<(), ControlError>;

    /// 把已占用槽位的项目交给流水线
    fn launch(&self, id: ProjectId) -> Result<(), ControlError>;

    /// 释放槽位（仅当 id 为当前活动项目）
    fn release(&self, id: ProjectId);

    /// 当前活动项目
    fn active_project(&self) -> Option<ProjectId>;

    /// 最近一次活动的项目（包括已结束的）
    fn last_project(&self) -> Option<ProjectId>;

    /// 当前控制信号（无活动项目时为 None）
    fn signal(&self) -> Option<ControlSignal>;

    /// 请求暂停，返回受影响的项目
    fn request_pause(&self) -> Option<ProjectId>;

    /// 取消暂停请求，仅当前信号为 Pause 时生效
    fn request_resume(&self) -> Option<ProjectId>;

    /// 请求停止，返回受影响的项目
    fn request_stop(&self) -> Option<ProjectId>;

    /// 订阅活动项目的控制信号
    fn subscribe(&self, id: ProjectId) -> Option<watch::Receiver<ControlSignal>>;

    fn set_current_chapter(&self, id: ProjectId, chapter: Option<CurrentChapter>);

    fn current_chapter(&self) -> Option<CurrentChapter>;
}
