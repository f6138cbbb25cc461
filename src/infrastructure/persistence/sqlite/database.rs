//! SQLite Database - 数据库连接和迁移

use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    pub database_url: String,
    /// 最大连接数
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/novelcast.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            max_connections: 5,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// 数据库连接池
pub type DbPool = Pool<Sqlite>;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let mut options = SqlitePoolOptions::new().max_connections(config.max_connections);
    // 内存库随连接关闭而消失，连接不能被回收
    if config.database_url.contains(":memory:") {
        options = options.idle_timeout(None).max_lifetime(None);
    }
    let pool = options.connect(&config.database_url).await?;

    // 启用 WAL 模式，允许并发读写
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    // 设置 busy_timeout=5000ms，遇到锁时等待而不是立即失败
    sqlx::query("PRAGMA busy_timeout=5000")
        .execute(&pool)
        .await?;

    // 设置同步模式为 NORMAL（平衡性能和安全性）
    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    tracing::info!("SQLite pool created with WAL mode and busy_timeout=5000ms");

    Ok(pool)
}

/// 运行数据库迁移
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // 创建 projects 表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            novel_name TEXT NOT NULL,
            folder_path TEXT NOT NULL,
            base_url TEXT,
            start_url TEXT NOT NULL,
            chapter_urls TEXT,
            start_chapter INTEGER NOT NULL,
            end_chapter INTEGER NOT NULL,
            batch_size INTEGER NOT NULL,
            voice TEXT NOT NULL,
            rate INTEGER NOT NULL DEFAULT 0,
            pitch INTEGER NOT NULL DEFAULT 0,
            volume INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'starting',
            status_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 创建 project_chapters 表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_chapters (
            project_id TEXT NOT NULL,
            number INTEGER NOT NULL,
            title TEXT,
            url TEXT,
            fetch_state TEXT NOT NULL DEFAULT 'pending',
            fetch_error TEXT,
            synth_state TEXT NOT NULL DEFAULT 'pending',
            synth_error TEXT,
            audio_path TEXT,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            UNIQUE (project_id, number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 创建 project_batches 表
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_batches (
            project_id TEXT NOT NULL,
            batch_index INTEGER NOT NULL,
            first_chapter INTEGER NOT NULL,
            last_chapter INTEGER NOT NULL,
            chapter_numbers TEXT NOT NULL,
            audio_path TEXT,
            state TEXT NOT NULL DEFAULT 'pending',
            error TEXT,
            FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE,
            UNIQUE (project_id, batch_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 索引: novel_name 唯一（项目身份，用于冲突检测）
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_novel_name
        ON projects(novel_name)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_projects_updated_at
        ON projects(updated_at)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_db() {
        let config = DatabaseConfig::in_memory();
        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'project%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["project_batches", "project_chapters", "projects"]);
    }
}
