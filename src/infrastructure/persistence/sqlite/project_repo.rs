//! SQLite Project Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::{FromRow, Sqlite, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    mutation, ProjectMutator, ProjectRepositoryPort, ProjectSummary, RepositoryError,
};
use crate::domain::project::{
    BatchRecord, BatchSize, BatchState, ChapterRange, ChapterRecord, ChapterSource, NovelName,
    Progress, Project, ProjectId, ProjectParts, ProjectStatus, UnitState, VoiceParams,
};

/// SQLite Project Repository
///
/// 同一项目的 update 通过进程内的项目锁串行化；单项目读取在一个读事务内完成，
/// 主记录、章节与批次来自同一快照
pub struct SqliteProjectRepository {
    pool: DbPool,
    /// project_id -> 写锁
    locks: DashMap<ProjectId, Arc<Mutex<()>>>,
}

impl SqliteProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, id: ProjectId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 按单列查找一个项目，`column` 只能是内部固定的列名
    async fn find_one(&self, column: &str, key: &str) -> Result<Option<Project>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let sql = format!("SELECT {} FROM projects WHERE {} = ?", PROJECT_COLUMNS, column);
        let row: Option<ProjectRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;

        let project = match row {
            Some(row) => {
                let chapters = load_chapters(&mut tx, &row.id).await?;
                let batches = load_batches(&mut tx, &row.id).await?;
                Some(row.into_project(chapters, batches)?)
            }
            None => None,
        };

        tx.commit().await.map_err(db_error)?;
        Ok(project)
    }

    /// 写入项目主记录与变化的章节/批次（previous 为 None 时全部写入）
    async fn save_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        project: &Project,
        previous: Option<&Project>,
    ) -> Result<(), RepositoryError> {
        let id = project.id().to_string();
        let source = project.source();
        let chapter_urls = source
            .chapter_urls()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, novel_name, folder_path, base_url, start_url, chapter_urls,
                start_chapter, end_chapter, batch_size, voice, rate, pitch, volume,
                status, status_reason, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                status_reason = excluded.status_reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(project.novel_name().as_str())
        .bind(project.folder_path())
        .bind(source.base_url())
        .bind(source.start_url())
        .bind(chapter_urls)
        .bind(project.chapter_range().start() as i64)
        .bind(project.chapter_range().end() as i64)
        .bind(project.batch_size().get() as i64)
        .bind(project.voice().voice_id())
        .bind(project.voice().rate() as i64)
        .bind(project.voice().pitch() as i64)
        .bind(project.voice().volume() as i64)
        .bind(project.status().as_str())
        .bind(project.status_reason())
        .bind(project.created_at().to_rfc3339())
        .bind(project.updated_at().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Duplicate(project.novel_name().to_string())
            } else {
                db_error(e)
            }
        })?;

        for chapter in project.chapters() {
            let unchanged = previous
                .and_then(|p| p.chapter(chapter.number()))
                .map(|old| old == chapter)
                .unwrap_or(false);
            if unchanged {
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO project_chapters (
                    project_id, number, title, url, fetch_state, fetch_error,
                    synth_state, synth_error, audio_path
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(project_id, number) DO UPDATE SET
                    title = excluded.title,
                    url = excluded.url,
                    fetch_state = excluded.fetch_state,
                    fetch_error = excluded.fetch_error,
                    synth_state = excluded.synth_state,
                    synth_error = excluded.synth_error,
                    audio_path = excluded.audio_path
                "#,
            )
            .bind(&id)
            .bind(chapter.number() as i64)
            .bind(chapter.title())
            .bind(chapter.url())
            .bind(chapter.fetch_state().as_str())
            .bind(chapter.fetch_state().reason())
            .bind(chapter.synth_state().as_str())
            .bind(chapter.synth_state().reason())
            .bind(chapter.audio_path())
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }

        for batch in project.batches() {
            let unchanged = previous
                .and_then(|p| p.batch(batch.batch_index()))
                .map(|old| old == batch)
                .unwrap_or(false);
            if unchanged {
                continue;
            }

            let chapter_numbers = serde_json::to_string(batch.chapter_numbers())
                .map_err(|e| RepositoryError::SerializationError(e.to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO project_batches (
                    project_id, batch_index, first_chapter, last_chapter,
                    chapter_numbers, audio_path, state, error
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(project_id, batch_index) DO UPDATE SET
                    chapter_numbers = excluded.chapter_numbers,
                    audio_path = excluded.audio_path,
                    state = excluded.state,
                    error = excluded.error
                "#,
            )
            .bind(&id)
            .bind(batch.batch_index() as i64)
            .bind(batch.first_chapter() as i64)
            .bind(batch.last_chapter() as i64)
            .bind(chapter_numbers)
            .bind(batch.audio_path())
            .bind(batch.state().as_str())
            .bind(batch.state().reason())
            .execute(&mut **tx)
            .await
            .map_err(db_error)?;
        }

        Ok(())
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn serialization_error(message: impl Into<String>) -> RepositoryError {
    RepositoryError::SerializationError(message.into())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| serialization_error(e.to_string()))?
        .with_timezone(&Utc))
}

fn parse_id(value: &str) -> Result<ProjectId, RepositoryError> {
    Uuid::parse_str(value)
        .map(ProjectId::from_uuid)
        .map_err(|e| serialization_error(e.to_string()))
}

fn to_u32(value: i64, field: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| serialization_error(format!("{} out of range: {}", field, value)))
}

fn to_i32(value: i64, field: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| serialization_error(format!("{} out of range: {}", field, value)))
}

async fn load_chapters(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
) -> Result<Vec<ChapterRecord>, RepositoryError> {
    let rows: Vec<ChapterRow> = sqlx::query_as(
        r#"
        SELECT number, title, url, fetch_state, fetch_error, synth_state, synth_error, audio_path
        FROM project_chapters WHERE project_id = ? ORDER BY number
        "#,
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;

    rows.into_iter().map(ChapterRecord::try_from).collect()
}

async fn load_batches(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
) -> Result<Vec<BatchRecord>, RepositoryError> {
    let rows: Vec<BatchRow> = sqlx::query_as(
        r#"
        SELECT batch_index, first_chapter, last_chapter, chapter_numbers, audio_path, state, error
        FROM project_batches WHERE project_id = ? ORDER BY batch_index
        "#,
    )
    .bind(id)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_error)?;

    rows.into_iter().map(BatchRecord::try_from).collect()
}

const PROJECT_COLUMNS: &str = "id, novel_name, folder_path, base_url, start_url, chapter_urls, \
     start_chapter, end_chapter, batch_size, voice, rate, pitch, volume, \
     status, status_reason, created_at, updated_at";

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    novel_name: String,
    folder_path: String,
    base_url: Option<String>,
    start_url: String,
    chapter_urls: Option<String>,
    start_chapter: i64,
    end_chapter: i64,
    batch_size: i64,
    voice: String,
    rate: i64,
    pitch: i64,
    volume: i64,
    status: String,
    status_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ProjectRow {
    fn into_project(
        self,
        chapters: Vec<ChapterRecord>,
        batches: Vec<BatchRecord>,
    ) -> Result<Project, RepositoryError> {
        let chapter_urls: Option<Vec<String>> = self
            .chapter_urls
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| serialization_error(e.to_string()))?;

        let parts = ProjectParts {
            id: parse_id(&self.id)?,
            novel_name: NovelName::new(self.novel_name)
                .map_err(|e| serialization_error(e.to_string()))?,
            folder_path: self.folder_path,
            source: ChapterSource::new(self.base_url, self.start_url, chapter_urls)
                .map_err(|e| serialization_error(e.to_string()))?,
            chapter_range: ChapterRange::resolve(
                to_u32(self.start_chapter, "start_chapter")?,
                Some(to_u32(self.end_chapter, "end_chapter")?),
                None,
            )
            .map_err(|e| serialization_error(e.to_string()))?,
            batch_size: BatchSize::new(to_u32(self.batch_size, "batch_size")?)
                .map_err(|e| serialization_error(e.to_string()))?,
            voice: VoiceParams::new(
                self.voice,
                to_i32(self.rate, "rate")?,
                to_i32(self.pitch, "pitch")?,
                to_i32(self.volume, "volume")?,
            )
            .map_err(|e| serialization_error(e.to_string()))?,
            status: ProjectStatus::from_str(&self.status)
                .ok_or_else(|| serialization_error(format!("unknown status: {}", self.status)))?,
            status_reason: self.status_reason,
            chapters,
            batches,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        };

        Ok(Project::from_parts(parts))
    }
}

#[derive(FromRow)]
struct ChapterRow {
    number: i64,
    title: Option<String>,
    url: Option<String>,
    fetch_state: String,
    fetch_error: Option<String>,
    synth_state: String,
    synth_error: Option<String>,
    audio_path: Option<String>,
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        let fetch_state = UnitState::from_parts(&row.fetch_state, row.fetch_error)
            .ok_or_else(|| serialization_error(format!("unknown fetch state: {}", row.fetch_state)))?;
        let synth_state = UnitState::from_parts(&row.synth_state, row.synth_error)
            .ok_or_else(|| serialization_error(format!("unknown synth state: {}", row.synth_state)))?;

        Ok(ChapterRecord::restore(
            to_u32(row.number, "number")?,
            row.title,
            row.url,
            fetch_state,
            synth_state,
            row.audio_path,
        ))
    }
}

#[derive(FromRow)]
struct BatchRow {
    batch_index: i64,
    first_chapter: i64,
    last_chapter: i64,
    chapter_numbers: String,
    audio_path: Option<String>,
    state: String,
    error: Option<String>,
}

impl TryFrom<BatchRow> for BatchRecord {
    type Error = RepositoryError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let chapter_numbers: Vec<u32> = serde_json::from_str(&row.chapter_numbers)
            .map_err(|e| serialization_error(e.to_string()))?;
        let state = BatchState::from_parts(&row.state, row.error)
            .ok_or_else(|| serialization_error(format!("unknown batch state: {}", row.state)))?;

        Ok(BatchRecord::restore(
            to_u32(row.batch_index, "batch_index")?,
            to_u32(row.first_chapter, "first_chapter")?,
            to_u32(row.last_chapter, "last_chapter")?,
            chapter_numbers,
            row.audio_path,
            state,
        ))
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: String,
    novel_name: String,
    folder_path: String,
    start_chapter: i64,
    end_chapter: i64,
    batch_size: i64,
    status: String,
    status_reason: Option<String>,
    created_at: String,
    updated_at: String,
    completed_chapters: i64,
    failed_chapters: i64,
    total_chapters: i64,
    completed_batches: i64,
    total_batches: i64,
}

impl TryFrom<SummaryRow> for ProjectSummary {
    type Error = RepositoryError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(ProjectSummary {
            project_id: parse_id(&row.id)?,
            novel_name: row.novel_name,
            folder_path: row.folder_path,
            status: ProjectStatus::from_str(&row.status)
                .ok_or_else(|| serialization_error(format!("unknown status: {}", row.status)))?,
            status_reason: row.status_reason,
            start_chapter: to_u32(row.start_chapter, "start_chapter")?,
            end_chapter: to_u32(row.end_chapter, "end_chapter")?,
            batch_size: to_u32(row.batch_size, "batch_size")?,
            progress: Progress::from_counts(
                to_u32(row.completed_chapters, "completed_chapters")?,
                to_u32(row.failed_chapters, "failed_chapters")?,
                to_u32(row.total_chapters, "total_chapters")?,
                to_u32(row.completed_batches, "completed_batches")?,
                to_u32(row.total_batches, "total_batches")?,
            ),
            created_at: parse_time(&row.created_at)?,
            last_updated: parse_time(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl ProjectRepositoryPort for SqliteProjectRepository {
    async fn create(&self, project: &Project) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM projects WHERE id = ?")
            .bind(project.id().to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;
        if exists.is_some() {
            return Err(RepositoryError::Duplicate(project.id().to_string()));
        }

        Self::save_in_tx(&mut tx, project, None).await?;
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(project_id = %project.id(), "Project persisted");
        Ok(())
    }

    async fn find_by_id(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_novel_name(&self, name: &NovelName) -> Result<Option<Project>, RepositoryError> {
        self.find_one("novel_name", name.as_str()).await
    }

    async fn list(&self) -> Result<Vec<ProjectSummary>, RepositoryError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT
                p.id, p.novel_name, p.folder_path, p.start_chapter, p.end_chapter, p.batch_size,
                p.status, p.status_reason, p.created_at, p.updated_at,
                (SELECT COUNT(*) FROM project_chapters c
                    WHERE c.project_id = p.id AND c.synth_state = 'done') AS completed_chapters,
                (SELECT COUNT(*) FROM project_chapters c
                    WHERE c.project_id = p.id
                    AND (c.fetch_state = 'failed' OR c.synth_state = 'failed')) AS failed_chapters,
                (SELECT COUNT(*) FROM project_chapters c
                    WHERE c.project_id = p.id) AS total_chapters,
                (SELECT COUNT(*) FROM project_batches b
                    WHERE b.project_id = p.id AND b.state = 'done') AS completed_batches,
                (SELECT COUNT(*) FROM project_batches b
                    WHERE b.project_id = p.id) AS total_batches
            FROM projects p
            ORDER BY p.updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ProjectSummary::try_from).collect()
    }

    async fn update(&self, id: ProjectId, mutator: ProjectMutator) -> Result<Project, RepositoryError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let previous = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        let mut project = previous.clone();
        mutator(&mut project)?;

        let mut tx = self.pool.begin().await.map_err(db_error)?;
        Self::save_in_tx(&mut tx, &project, Some(&previous)).await?;
        tx.commit().await.map_err(db_error)?;

        Ok(project)
    }

    async fn recover_interrupted(&self) -> Result<Vec<ProjectId>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM projects
            WHERE status IN ('starting', 'processing')
               OR id IN (SELECT project_id FROM project_batches WHERE state = 'combining')
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut recovered = Vec::with_capacity(rows.len());
        for (id,) in rows {
            let id = parse_id(&id)?;
            self.update(
                id,
                mutation(|project| {
                    project.recover_interrupted();
                    Ok(())
                }),
            )
            .await?;
            tracing::info!(project_id = %id, "Interrupted project moved to paused");
            recovered.push(id);
        }

        Ok(recovered)
    }
}
