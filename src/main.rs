//! Novelcast - 网络小说有声书服务入口
//!
//! 启动顺序: 配置 → 日志 → 数据库与中断恢复 → 适配器 → PipelineWorker → HTTP 服务器

use std::sync::Arc;

use novelcast::application::{ProcessingDefaults, ProjectRepositoryPort, SpeechSynthesizerPort};
use novelcast::config::{load_config, print_config};
use novelcast::infrastructure::adapters::{
    AudioCombiner, FileArtifactStorage, HttpChapterFetcher, HttpChapterFetcherConfig,
    HttpTtsClient, HttpTtsClientConfig,
};
use novelcast::infrastructure::events::EventPublisher;
use novelcast::infrastructure::http::{AppState, HttpServer, ServerConfig};
use novelcast::infrastructure::memory::InMemoryProcessControl;
use novelcast::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository,
};
use novelcast::infrastructure::worker::{PipelineWorker, PipelineWorkerConfig};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},novelcast={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Novelcast - webnovel audiobook service");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.output_dir).await?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let project_repo = Arc::new(SqliteProjectRepository::new(pool));

    // 上次进程退出时仍在运行的项目没有流水线持有，转为可恢复的 paused
    let recovered = project_repo.recover_interrupted().await?;
    if !recovered.is_empty() {
        tracing::warn!(count = recovered.len(), "Interrupted projects moved to paused");
    }

    // 创建适配器
    let fetcher = Arc::new(HttpChapterFetcher::new(HttpChapterFetcherConfig {
        timeout_secs: config.fetcher.timeout_secs,
        max_retries: config.fetcher.max_retries,
        retry_base_delay_ms: config.fetcher.retry_base_delay_ms,
        request_delay_ms: config.fetcher.request_delay_ms,
        user_agent: config.fetcher.user_agent.clone(),
    })?);

    let synthesizer = Arc::new(HttpTtsClient::new(HttpTtsClientConfig {
        base_url: config.tts.url.clone(),
        timeout_secs: config.tts.timeout_secs,
        max_retries: config.tts.max_retries,
        retry_base_delay_ms: config.tts.retry_base_delay_ms,
        output_format: config.tts.output_format,
    })?);
    if !synthesizer.health_check().await {
        tracing::warn!(url = %config.tts.url, "TTS service is not reachable yet");
    }

    let storage = Arc::new(FileArtifactStorage::new(config.storage.output_dir.clone()));
    let combiner = Arc::new(AudioCombiner::new());
    let event_publisher = Arc::new(EventPublisher::new());

    // 流水线队列与控制器
    let (queue_tx, queue_rx) = mpsc::channel(16);
    let control = Arc::new(InMemoryProcessControl::new(queue_tx));

    let worker = PipelineWorker::new(
        PipelineWorkerConfig {
            auto_cleanup: config.pipeline.auto_cleanup,
        },
        queue_rx,
        project_repo.clone(),
        fetcher.clone(),
        synthesizer.clone(),
        combiner,
        storage.clone(),
        control.clone(),
        event_publisher.clone(),
    );
    tokio::spawn(worker.run());

    // 创建 HTTP 服务器
    let mut server_config = ServerConfig::new(&config.server.host, config.server.port);
    if config.server.static_files.enabled {
        server_config = server_config.with_static_files(
            config.server.static_files.dir.clone(),
            config.server.static_files.path.clone(),
        );
    }
    let state = AppState::new(
        project_repo,
        storage,
        control,
        fetcher,
        synthesizer,
        event_publisher,
        ProcessingDefaults {
            batch_size: config.pipeline.default_batch_size,
            max_chapters: config.pipeline.max_chapters,
            voice: config.tts.default_voice.clone(),
        },
    );

    let server = HttpServer::new(server_config, state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
