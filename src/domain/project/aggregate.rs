//! Project Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BatchRecord, BatchSize, BatchState, ChapterLink, ChapterRange, ChapterRecord, ChapterSource,
    NovelName, Progress, ProjectError, ProjectId, ProjectStatus, UnitState, VoiceParams,
};
use crate::domain::batching::plan_batches;

/// Project 聚合根 - 一次 抓取 + 合成 + 合并 的持久化记录
///
/// 不变量:
/// - chapter_range 与 batch_size 创建后不可变
/// - chapters 与章节范围一一对应，按编号升序
/// - 章节 synth_state 为 done 之前 fetch_state 必为 done
/// - 批次只有在全部成员章节到达终态后才能合并
/// - status 为 completed 当且仅当所有批次为 done
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    id: ProjectId,
    novel_name: NovelName,
    folder_path: String,
    source: ChapterSource,
    chapter_range: ChapterRange,
    batch_size: BatchSize,
    voice: VoiceParams,
    status: ProjectStatus,
    /// 项目级失败原因（status 为 error 时存在）
    status_reason: Option<String>,
    chapters: Vec<ChapterRecord>,
    batches: Vec<BatchRecord>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 从持久化数据重建 Project 所需的全部字段
#[derive(Debug)]
pub struct ProjectParts {
    pub id: ProjectId,
    pub novel_name: NovelName,
    pub folder_path: String,
    pub source: ChapterSource,
    pub chapter_range: ChapterRange,
    pub batch_size: BatchSize,
    pub voice: VoiceParams,
    pub status: ProjectStatus,
    pub status_reason: Option<String>,
    pub chapters: Vec<ChapterRecord>,
    pub batches: Vec<BatchRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// 创建新项目，章节与批次全部为 pending
    pub fn new(
        novel_name: NovelName,
        folder_path: impl Into<String>,
        source: ChapterSource,
        chapter_range: ChapterRange,
        batch_size: BatchSize,
        voice: VoiceParams,
    ) -> Self {
        let now = Utc::now();
        let chapters = chapter_range.numbers().map(ChapterRecord::new).collect();
        let batches = plan_batches(chapter_range, batch_size)
            .into_iter()
            .map(|plan| BatchRecord::new(plan.batch_index, plan.first_chapter, plan.last_chapter))
            .collect();

        Self {
            id: ProjectId::new(),
            novel_name,
            folder_path: folder_path.into(),
            source,
            chapter_range,
            batch_size,
            voice,
            status: ProjectStatus::Starting,
            status_reason: None,
            chapters,
            batches,
            created_at: now,
            updated_at: now,
        }
    }

    /// 从持久化数据重建
    pub fn from_parts(parts: ProjectParts) -> Self {
        let mut chapters = parts.chapters;
        chapters.sort_by_key(|c| c.number());
        let mut batches = parts.batches;
        batches.sort_by_key(|b| b.batch_index());

        Self {
            id: parts.id,
            novel_name: parts.novel_name,
            folder_path: parts.folder_path,
            source: parts.source,
            chapter_range: parts.chapter_range,
            batch_size: parts.batch_size,
            voice: parts.voice,
            status: parts.status,
            status_reason: parts.status_reason,
            chapters,
            batches,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    // Getters
    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    pub fn novel_name(&self) -> &NovelName {
        &self.novel_name
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn source(&self) -> &ChapterSource {
        &self.source
    }

    pub fn chapter_range(&self) -> ChapterRange {
        self.chapter_range
    }

    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    pub fn voice(&self) -> &VoiceParams {
        &self.voice
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn chapters(&self) -> &[ChapterRecord] {
        &self.chapters
    }

    pub fn batches(&self) -> &[BatchRecord] {
        &self.batches
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn chapter(&self, number: u32) -> Option<&ChapterRecord> {
        self.index_of(number).map(|i| &self.chapters[i])
    }

    pub fn batch(&self, batch_index: u32) -> Option<&BatchRecord> {
        self.batches.iter().find(|b| b.batch_index() == batch_index)
    }

    /// 是否仍有待抓取且缺少 URL 的章节（需要解析章节列表）
    pub fn needs_resolution(&self) -> bool {
        self.chapters
            .iter()
            .any(|c| c.url().is_none() && matches!(c.fetch_state(), UnitState::Pending))
    }

    pub fn all_batches_done(&self) -> bool {
        self.batches.iter().all(|b| b.state().is_done())
    }

    /// 派生进度视图
    pub fn progress(&self) -> Progress {
        let completed = self.chapters.iter().filter(|c| c.synth_state().is_done()).count() as u32;
        let failed = self.chapters.iter().filter(|c| c.is_failed()).count() as u32;
        let completed_batches = self.batches.iter().filter(|b| b.state().is_done()).count() as u32;

        Progress::from_counts(
            completed,
            failed,
            self.chapters.len() as u32,
            completed_batches,
            self.batches.len() as u32,
        )
    }

    /// 写入章节链接，范围内未出现在链接中的章节使用兜底 URL
    ///
    /// 已有 URL 的章节保持不变。返回使用兜底 URL 的章节数
    pub fn apply_chapter_links(
        &mut self,
        links: &[ChapterLink],
        fallback: impl Fn(u32) -> String,
    ) -> u32 {
        let mut fallbacks = 0;
        for chapter in self.chapters.iter_mut().filter(|c| c.url().is_none()) {
            match links.iter().find(|l| l.number == chapter.number()) {
                Some(link) => chapter.set_link(link.url.clone(), link.title.clone()),
                None => {
                    chapter.set_link(fallback(chapter.number()), None);
                    fallbacks += 1;
                }
            }
        }
        self.touch();
        fallbacks
    }

    pub fn mark_fetched(&mut self, number: u32, title: Option<String>) -> Result<(), ProjectError> {
        let chapter = self.chapter_mut(number)?;
        chapter.set_title(title);
        chapter.set_fetch_state(UnitState::Done);
        self.touch();
        Ok(())
    }

    pub fn mark_fetch_failed(
        &mut self,
        number: u32,
        reason: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let chapter = self.chapter_mut(number)?;
        chapter.set_fetch_state(UnitState::Failed(reason.into()));
        self.touch();
        Ok(())
    }

    /// 抓取结果丢失（例如文本产物被删除）时回到 pending
    pub fn reset_fetch(&mut self, number: u32) -> Result<(), ProjectError> {
        let chapter = self.chapter_mut(number)?;
        chapter.set_fetch_state(UnitState::Pending);
        chapter.set_synth_state(UnitState::Pending);
        chapter.set_audio_path(None);
        self.touch();
        Ok(())
    }

    pub fn mark_synthesized(
        &mut self,
        number: u32,
        audio_path: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let chapter = self.chapter_mut(number)?;
        if !chapter.fetch_state().is_done() {
            return Err(ProjectError::FetchNotDone(number));
        }
        chapter.set_synth_state(UnitState::Done);
        chapter.set_audio_path(Some(audio_path.into()));
        self.touch();
        Ok(())
    }

    pub fn mark_synth_failed(
        &mut self,
        number: u32,
        reason: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let chapter = self.chapter_mut(number)?;
        chapter.set_synth_state(UnitState::Failed(reason.into()));
        chapter.set_audio_path(None);
        self.touch();
        Ok(())
    }

    /// 成员章节全部到达终态、尚未合并的批次
    pub fn ready_batches(&self) -> Vec<u32> {
        self.batches
            .iter()
            .filter(|b| matches!(b.state(), BatchState::Pending | BatchState::Combining))
            .filter(|b| self.batch_chapters(b).all(ChapterRecord::is_terminal))
            .map(BatchRecord::batch_index)
            .collect()
    }

    /// 批次中合成成功的章节 (编号, 音频路径)，按编号升序
    pub fn synthesized_members(&self, batch_index: u32) -> Result<Vec<(u32, String)>, ProjectError> {
        let batch = self
            .batch(batch_index)
            .ok_or(ProjectError::BatchNotFound(batch_index))?;

        Ok(self
            .batch_chapters(batch)
            .filter(|c| c.synth_state().is_done())
            .filter_map(|c| c.audio_path().map(|p| (c.number(), p.to_string())))
            .collect())
    }

    pub fn begin_combining(&mut self, batch_index: u32) -> Result<(), ProjectError> {
        let ready = self.ready_batches().contains(&batch_index);
        let batch = self.batch_mut(batch_index)?;
        if !ready {
            return Err(ProjectError::BatchNotReady(batch_index));
        }
        batch.set_state(BatchState::Combining);
        self.touch();
        Ok(())
    }

    /// 标记批次完成，members 为实际合并的章节
    pub fn complete_batch(
        &mut self,
        batch_index: u32,
        members: Vec<u32>,
        audio_path: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let batch = self
            .batch(batch_index)
            .ok_or(ProjectError::BatchNotFound(batch_index))?;
        let all_synthesized = members.iter().all(|n| {
            batch.covers(*n)
                && self
                    .chapter(*n)
                    .map(|c| c.synth_state().is_done())
                    .unwrap_or(false)
        });
        if members.is_empty() || !all_synthesized {
            return Err(ProjectError::BatchNotReady(batch_index));
        }

        let audio_path = audio_path.into();
        self.batch_mut(batch_index)?.complete(members, audio_path);
        self.touch();
        Ok(())
    }

    pub fn fail_batch(
        &mut self,
        batch_index: u32,
        reason: impl Into<String>,
    ) -> Result<(), ProjectError> {
        let batch = self.batch_mut(batch_index)?;
        batch.set_state(BatchState::Failed(reason.into()));
        self.touch();
        Ok(())
    }

    /// 状态迁移（校验状态机）
    pub fn set_status(&mut self, next: ProjectStatus) -> Result<(), ProjectError> {
        if !self.status.can_transition_to(next) {
            return Err(ProjectError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next != ProjectStatus::Error {
            self.status_reason = None;
        }
        self.touch();
        Ok(())
    }

    /// 停止：全部批次完成则为 completed，否则保持可恢复的 paused
    pub fn halt(&mut self) -> ProjectStatus {
        let next = if self.all_batches_done() {
            ProjectStatus::Completed
        } else {
            ProjectStatus::Paused
        };
        if self.status.can_transition_to(next) {
            self.status = next;
            self.status_reason = None;
            self.touch();
        }
        self.status
    }

    /// 一轮处理结束后计算终态
    ///
    /// 全部批次完成为 completed；否则为 error 并记录原因
    pub fn finalize(&mut self) -> ProjectStatus {
        if self.all_batches_done() {
            self.status = ProjectStatus::Completed;
            self.status_reason = None;
        } else {
            let unresolved: Vec<String> = self
                .batches
                .iter()
                .filter(|b| !b.state().is_done())
                .map(|b| match b.state().reason() {
                    Some(reason) => format!("batch {}: {}", b.batch_index(), reason),
                    None => format!("batch {}: {}", b.batch_index(), b.state().as_str()),
                })
                .collect();
            self.status = ProjectStatus::Error;
            self.status_reason = Some(format!("unresolved batches ({})", unresolved.join("; ")));
        }
        self.touch();
        self.status
    }

    /// 项目级错误（例如持久化失败），强制进入 error
    pub fn mark_error(&mut self, reason: impl Into<String>) {
        self.status = ProjectStatus::Error;
        self.status_reason = Some(reason.into());
        self.touch();
    }

    /// 为恢复处理做准备
    ///
    /// - 未完成批次中的失败章节回到 pending（抓取成功的保留抓取结果）
    /// - failed / combining 批次回到 pending
    /// - 已完成批次及其章节保持不变
    pub fn prepare_resume(&mut self) -> Result<(), ProjectError> {
        let open_batches: Vec<(u32, u32)> = self
            .batches
            .iter()
            .filter(|b| !b.state().is_done())
            .map(|b| (b.first_chapter(), b.last_chapter()))
            .collect();

        for chapter in self.chapters.iter_mut() {
            let in_open_batch = open_batches
                .iter()
                .any(|(first, last)| (*first..=*last).contains(&chapter.number()));
            if !in_open_batch {
                continue;
            }
            if chapter.fetch_state().is_failed() {
                chapter.set_fetch_state(UnitState::Pending);
                chapter.set_synth_state(UnitState::Pending);
                chapter.set_audio_path(None);
            } else if chapter.synth_state().is_failed() {
                chapter.set_synth_state(UnitState::Pending);
            }
        }

        for batch in self.batches.iter_mut() {
            if matches!(batch.state(), BatchState::Failed(_) | BatchState::Combining) {
                batch.reset();
            }
        }

        let next = if self.needs_resolution() {
            ProjectStatus::Starting
        } else {
            ProjectStatus::Processing
        };
        self.set_status(next)
    }

    /// 进程重启后修复被中断的项目：starting/processing 转为 paused，combining 批次回到 pending
    ///
    /// 返回是否有修改
    pub fn recover_interrupted(&mut self) -> bool {
        let mut changed = false;
        if matches!(self.status, ProjectStatus::Starting | ProjectStatus::Processing) {
            self.status = ProjectStatus::Paused;
            changed = true;
        }
        for batch in self.batches.iter_mut() {
            if matches!(batch.state(), BatchState::Combining) {
                batch.set_state(BatchState::Pending);
                changed = true;
            }
        }
        if changed {
            self.touch();
        }
        changed
    }

    fn batch_chapters<'a>(
        &'a self,
        batch: &'a BatchRecord,
    ) -> impl Iterator<Item = &'a ChapterRecord> + 'a {
        self.chapters.iter().filter(move |c| batch.covers(c.number()))
    }

    fn index_of(&self, number: u32) -> Option<usize> {
        if !self.chapter_range.contains(number) {
            return None;
        }
        self.chapters.binary_search_by_key(&number, |c| c.number()).ok()
    }

    fn chapter_mut(&mut self, number: u32) -> Result<&mut ChapterRecord, ProjectError> {
        let index = self
            .index_of(number)
            .ok_or(ProjectError::ChapterNotFound(number))?;
        Ok(&mut self.chapters[index])
    }

    fn batch_mut(&mut self, batch_index: u32) -> Result<&mut BatchRecord, ProjectError> {
        self.batches
            .iter_mut()
            .find(|b| b.batch_index() == batch_index)
            .ok_or(ProjectError::BatchNotFound(batch_index))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(start: u32, end: u32, batch_size: u32) -> Project {
        Project::new(
            NovelName::new("Test Novel").unwrap(),
            "output/audio/Test_Novel",
            ChapterSource::new(None, "https://site.com/b/test-novel", None).unwrap(),
            ChapterRange::resolve(start, Some(end), None).unwrap(),
            BatchSize::new(batch_size).unwrap(),
            VoiceParams::new("en-US-AndrewNeural", 0, 0, 0).unwrap(),
        )
    }

    fn synthesize(project: &mut Project, number: u32) {
        project.mark_fetched(number, None).unwrap();
        project
            .mark_synthesized(number, format!("chapter_{:05}.wav", number))
            .unwrap();
    }

    #[test]
    fn test_new_project_layout() {
        let project = project(1, 23, 10);

        assert_eq!(project.status(), ProjectStatus::Starting);
        assert_eq!(project.chapters().len(), 23);
        assert_eq!(project.batches().len(), 3);
        assert_eq!(project.batches()[2].chapter_numbers(), &[21, 22, 23]);

        let progress = project.progress();
        assert_eq!(progress.total_chapters, 23);
        assert_eq!(progress.total_batches, 3);
        assert_eq!(progress.completed_chapters, 0);
        assert!(project.needs_resolution());
    }

    #[test]
    fn test_synthesis_requires_fetch() {
        let mut project = project(1, 3, 3);
        assert_eq!(
            project.mark_synthesized(2, "x.wav"),
            Err(ProjectError::FetchNotDone(2))
        );
        assert_eq!(
            project.mark_fetched(9, None),
            Err(ProjectError::ChapterNotFound(9))
        );
    }

    #[test]
    fn test_apply_links_with_fallback() {
        let mut project = project(1, 3, 3);
        let links = vec![
            ChapterLink {
                number: 1,
                title: Some("One".to_string()),
                url: "https://site.com/c1".to_string(),
            },
            ChapterLink {
                number: 3,
                title: None,
                url: "https://site.com/c3".to_string(),
            },
        ];

        let fallbacks = project.apply_chapter_links(&links, |n| format!("fb-{}", n));

        assert_eq!(fallbacks, 1);
        assert_eq!(project.chapter(1).unwrap().title(), Some("One"));
        assert_eq!(project.chapter(2).unwrap().url(), Some("fb-2"));
        assert!(!project.needs_resolution());
    }

    #[test]
    fn test_batch_ready_only_when_members_terminal() {
        let mut project = project(1, 4, 2);
        synthesize(&mut project, 1);
        assert!(project.ready_batches().is_empty());

        project.mark_fetch_failed(2, "timeout").unwrap();
        assert_eq!(project.ready_batches(), vec![1]);

        project.begin_combining(1).unwrap();
        assert_eq!(project.batch(1).unwrap().state(), &BatchState::Combining);
        assert_eq!(
            project.begin_combining(2),
            Err(ProjectError::BatchNotReady(2))
        );

        let members = project.synthesized_members(1).unwrap();
        assert_eq!(members, vec![(1, "chapter_00001.wav".to_string())]);

        project.complete_batch(1, vec![1], "batch_001.wav").unwrap();
        let batch = project.batch(1).unwrap();
        assert_eq!(batch.chapter_numbers(), &[1]);
        assert!(batch.state().is_done());
    }

    #[test]
    fn test_complete_batch_rejects_unsynthesized_member() {
        let mut project = project(1, 2, 2);
        synthesize(&mut project, 1);
        project.mark_fetched(2, None).unwrap();

        assert!(project.complete_batch(1, vec![1, 2], "b.wav").is_err());
        assert!(project.complete_batch(1, vec![], "b.wav").is_err());
    }

    #[test]
    fn test_partial_failure_still_completes() {
        let mut project = project(1, 4, 2);
        project.set_status(ProjectStatus::Processing).unwrap();
        synthesize(&mut project, 1);
        project.mark_fetch_failed(2, "404").unwrap();
        synthesize(&mut project, 3);
        synthesize(&mut project, 4);
        project.complete_batch(1, vec![1], "b1.wav").unwrap();
        project.complete_batch(2, vec![3, 4], "b2.wav").unwrap();

        assert_eq!(project.finalize(), ProjectStatus::Completed);
        let progress = project.progress();
        assert_eq!(progress.completed_chapters, 3);
        assert_eq!(progress.failed_chapters, 1);
        assert_eq!(progress.percentage, 100.0);
    }

    #[test]
    fn test_finalize_with_failed_batch_is_error() {
        let mut project = project(1, 2, 1);
        project.set_status(ProjectStatus::Processing).unwrap();
        synthesize(&mut project, 1);
        project.complete_batch(1, vec![1], "b1.wav").unwrap();
        project.mark_fetch_failed(2, "404").unwrap();
        project.fail_batch(2, "no chapters were synthesized").unwrap();

        assert_eq!(project.finalize(), ProjectStatus::Error);
        assert!(project
            .status_reason()
            .unwrap()
            .contains("batch 2: no chapters were synthesized"));
    }

    #[test]
    fn test_halt_outcome() {
        let mut project = project(1, 2, 2);
        project.set_status(ProjectStatus::Processing).unwrap();
        assert_eq!(project.halt(), ProjectStatus::Paused);

        synthesize(&mut project, 1);
        synthesize(&mut project, 2);
        project.complete_batch(1, vec![1, 2], "b1.wav").unwrap();
        assert_eq!(project.halt(), ProjectStatus::Completed);
    }

    #[test]
    fn test_prepare_resume_resets_only_open_batches() {
        let mut project = project(1, 4, 2);
        project.set_status(ProjectStatus::Processing).unwrap();
        project.mark_fetch_failed(1, "timeout").unwrap();
        synthesize(&mut project, 2);
        project.complete_batch(1, vec![2], "b1.wav").unwrap();
        project.mark_fetched(3, None).unwrap();
        project.mark_synth_failed(3, "tts down").unwrap();
        project.mark_fetch_failed(4, "timeout").unwrap();
        project.fail_batch(2, "no chapters were synthesized").unwrap();
        project.finalize();

        project.prepare_resume().unwrap();

        assert!(project.chapter(1).unwrap().fetch_state().is_failed());
        assert!(project.chapter(3).unwrap().fetch_state().is_done());
        assert_eq!(project.chapter(3).unwrap().synth_state(), &UnitState::Pending);
        assert_eq!(project.chapter(4).unwrap().fetch_state(), &UnitState::Pending);
        assert_eq!(project.batch(2).unwrap().state(), &BatchState::Pending);
        assert!(project.batch(1).unwrap().state().is_done());
        assert_eq!(project.status(), ProjectStatus::Starting);
        assert!(project.status_reason().is_none());
    }

    #[test]
    fn test_recover_interrupted() {
        let mut project = project(1, 2, 2);
        project.set_status(ProjectStatus::Processing).unwrap();
        synthesize(&mut project, 1);
        synthesize(&mut project, 2);
        project.begin_combining(1).unwrap();

        assert!(project.recover_interrupted());
        assert_eq!(project.status(), ProjectStatus::Paused);
        assert_eq!(project.batch(1).unwrap().state(), &BatchState::Pending);
        assert!(!project.recover_interrupted());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut project = project(1, 1, 1);
        project.set_status(ProjectStatus::Processing).unwrap();
        assert!(matches!(
            project.set_status(ProjectStatus::Starting),
            Err(ProjectError::InvalidTransition { .. })
        ));
    }
}
