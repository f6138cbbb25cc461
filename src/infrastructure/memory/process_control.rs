//! In-Memory Process Control Implementation

use std::sync::{Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};

use crate::application::ports::{
    ControlError, ControlSignal, CurrentChapter, ProcessControlPort,
};
use crate::domain::project::ProjectId;

/// 当前占用槽位的运行
struct ActiveRun {
    project_id: ProjectId,
    signal_tx: watch::Sender<ControlSignal>,
    current_chapter: Option<CurrentChapter>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
    last: Option<ProjectId>,
}

/// 内存流水线控制器
///
/// 单槽位：同一时间只允许一个活动项目
pub struct InMemoryProcessControl {
    slot: Mutex<Slot>,
    /// 流水线队列发送端
    queue_sender: mpsc::Sender<ProjectId>,
}

impl InMemoryProcessControl {
    pub fn new(queue_sender: mpsc::Sender<ProjectId>) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            queue_sender,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 在活动运行上修改信号，返回是否发生变化
    fn send_signal(&self, accept: impl Fn(ControlSignal) -> bool, next: ControlSignal) -> Option<ProjectId> {
        let slot = self.slot();
        let run = slot.active.as_ref()?;
        let current = *run.signal_tx.borrow();
        if !accept(current) {
            return None;
        }
        run.signal_tx.send_replace(next);
        tracing::debug!(project_id = %run.project_id, from = ?current, to = ?next, "Control signal changed");
        Some(run.project_id)
    }
}

impl ProcessControlPort for InMemoryProcessControl {
    fn try_acquire(&self, id: ProjectId) -> Result<(), ControlError> {
        let mut slot = self.slot();
        if let Some(run) = &slot.active {
            return Err(ControlError::AlreadyActive(run.project_id));
        }

        let (signal_tx, _) = watch::channel(ControlSignal::Run);
        slot.active = Some(ActiveRun {
            project_id: id,
            signal_tx,
            current_chapter: None,
        });
        slot.last = Some(id);
        tracing::debug!(project_id = %id, "Process slot acquired");
        Ok(())
    }

    fn launch(&self, id: ProjectId) -> Result<(), ControlError> {
        if self.active_project() != Some(id) {
            return Err(ControlError::NotActive(id));
        }
        self.queue_sender
            .try_send(id)
            .map_err(|_| ControlError::QueueClosed)?;
        tracing::debug!(project_id = %id, "Project enqueued");
        Ok(())
    }

    fn release(&self, id: ProjectId) {
        let mut slot = self.slot();
        if slot.active.as_ref().map(|r| r.project_id) == Some(id) {
            slot.active = None;
            tracing::debug!(project_id = %id, "Process slot released");
        }
    }

    fn active_project(&self) -> Option<ProjectId> {
        self.slot().active.as_ref().map(|r| r.project_id)
    }

    fn last_project(&self) -> Option<ProjectId> {
        self.slot().last
    }

    fn signal(&self) -> Option<ControlSignal> {
        self.slot().active.as_ref().map(|r| *r.signal_tx.borrow())
    }

    fn request_pause(&self) -> Option<ProjectId> {
        self.send_signal(|s| s == ControlSignal::Run, ControlSignal::Pause)
    }

    fn request_resume(&self) -> Option<ProjectId> {
        self.send_signal(|s| s == ControlSignal::Pause, ControlSignal::Run)
    }

    fn request_stop(&self) -> Option<ProjectId> {
        self.send_signal(|s| s != ControlSignal::Stop, ControlSignal::Stop)
    }

    fn subscribe(&self, id: ProjectId) -> Option<watch::Receiver<ControlSignal>> {
        self.slot()
            .active
            .as_ref()
            .filter(|r| r.project_id == id)
            .map(|r| r.signal_tx.subscribe())
    }

    fn set_current_chapter(&self, id: ProjectId, chapter: Option<CurrentChapter>) {
        let mut slot = self.slot();
        if let Some(run) = slot.active.as_mut().filter(|r| r.project_id == id) {
            run.current_chapter = chapter;
        }
    }

    fn current_chapter(&self) -> Option<CurrentChapter> {
        self.slot()
            .active
            .as_ref()
            .and_then(|r| r.current_chapter.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ChapterPhase;

    fn control() -> (InMemoryProcessControl, mpsc::Receiver<ProjectId>) {
        let (tx, rx) = mpsc::channel(4);
        (InMemoryProcessControl::new(tx), rx)
    }

    #[tokio::test]
    async fn test_single_active_slot() {
        let (control, mut rx) = control();
        let first = ProjectId::new();
        let second = ProjectId::new();

        control.try_acquire(first).unwrap();
        assert_eq!(
            control.try_acquire(second),
            Err(ControlError::AlreadyActive(first))
        );
        assert_eq!(control.launch(second), Err(ControlError::NotActive(second)));

        control.launch(first).unwrap();
        assert_eq!(rx.recv().await, Some(first));

        control.release(second);
        assert_eq!(control.active_project(), Some(first));
        control.release(first);
        assert_eq!(control.active_project(), None);
        assert_eq!(control.last_project(), Some(first));
        control.try_acquire(second).unwrap();
    }

    #[tokio::test]
    async fn test_signal_transitions() {
        let (control, _rx) = control();
        assert_eq!(control.request_pause(), None);

        let id = ProjectId::new();
        control.try_acquire(id).unwrap();
        let mut rx = control.subscribe(id).unwrap();
        assert!(control.subscribe(ProjectId::new()).is_none());

        assert_eq!(control.request_resume(), None);
        assert_eq!(control.request_pause(), Some(id));
        assert_eq!(control.request_pause(), None);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ControlSignal::Pause);

        assert_eq!(control.request_resume(), Some(id));
        assert_eq!(control.signal(), Some(ControlSignal::Run));

        assert_eq!(control.request_stop(), Some(id));
        assert_eq!(control.request_resume(), None);
        assert_eq!(control.request_pause(), None);
        assert_eq!(control.signal(), Some(ControlSignal::Stop));
    }

    #[test]
    fn test_current_chapter_tracks_active_run() {
        let (control, _rx) = control();
        let id = ProjectId::new();
        control.try_acquire(id).unwrap();

        let chapter = CurrentChapter {
            number: 3,
            title: None,
            phase: ChapterPhase::Fetching,
        };
        control.set_current_chapter(ProjectId::new(), Some(chapter.clone()));
        assert_eq!(control.current_chapter(), None);

        control.set_current_chapter(id, Some(chapter.clone()));
        assert_eq!(control.current_chapter(), Some(chapter));

        control.release(id);
        assert_eq!(control.current_chapter(), None);
    }
}
