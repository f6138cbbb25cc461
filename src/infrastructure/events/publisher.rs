//! Event Publisher Implementation
//!
//! 流水线事件推送（WebSocket 订阅）。事件仅作通知，项目状态以持久化记录为准

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::project::ProjectId;

const CHANNEL_CAPACITY: usize = 256;

/// WebSocket 事件类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WsEvent {
    /// 项目状态变更
    ProjectStatusChanged {
        project_id: Uuid,
        status: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// 单个章节到达终态
    ChapterProcessed {
        project_id: Uuid,
        chapter: u32,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// 批次合并完成
    BatchCompleted {
        project_id: Uuid,
        batch_index: u32,
        chapters: Vec<u32>,
        path: String,
    },
    /// 批次失败
    BatchFailed {
        project_id: Uuid,
        batch_index: u32,
        error: String,
    },
    /// 临时文件清理完成
    CleanupFinished {
        project_id: Uuid,
        files_deleted: u64,
        space_freed: u64,
    },
}

impl WsEvent {
    pub fn project_id(&self) -> Uuid {
        match self {
            WsEvent::ProjectStatusChanged { project_id, .. }
            | WsEvent::ChapterProcessed { project_id, .. }
            | WsEvent::BatchCompleted { project_id, .. }
            | WsEvent::BatchFailed { project_id, .. }
            | WsEvent::CleanupFinished { project_id, .. } => *project_id,
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<WsEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { channel: tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.channel.subscribe()
    }

    pub fn publish_status_changed(&self, project_id: ProjectId, status: &str, reason: Option<&str>) {
        self.publish(WsEvent::ProjectStatusChanged {
            project_id: *project_id.as_uuid(),
            status: status.to_string(),
            reason: reason.map(str::to_string),
        });
    }

    pub fn publish_chapter_processed(&self, project_id: ProjectId, chapter: u32, error: Option<&str>) {
        self.publish(WsEvent::ChapterProcessed {
            project_id: *project_id.as_uuid(),
            chapter,
            success: error.is_none(),
            error: error.map(str::to_string),
        });
    }

    pub fn publish_batch_completed(
        &self,
        project_id: ProjectId,
        batch_index: u32,
        chapters: Vec<u32>,
        path: &str,
    ) {
        self.publish(WsEvent::BatchCompleted {
            project_id: *project_id.as_uuid(),
            batch_index,
            chapters,
            path: path.to_string(),
        });
    }

    pub fn publish_batch_failed(&self, project_id: ProjectId, batch_index: u32, error: &str) {
        self.publish(WsEvent::BatchFailed {
            project_id: *project_id.as_uuid(),
            batch_index,
            error: error.to_string(),
        });
    }

    pub fn publish_cleanup_finished(&self, project_id: ProjectId, files_deleted: u64, space_freed: u64) {
        self.publish(WsEvent::CleanupFinished {
            project_id: *project_id.as_uuid(),
            files_deleted,
            space_freed,
        });
    }

    fn publish(&self, event: WsEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(
                project_id = %e.0.project_id(),
                "No event subscribers, event dropped"
            );
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
