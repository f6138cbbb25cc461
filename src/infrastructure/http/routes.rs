//! HTTP Routes
//!
//! API Endpoints:
//! - /api/process-all-in-one                 POST  启动处理（或覆盖模式下恢复已有项目）
//! - /api/process-status                     GET   当前处理状态快照
//! - /api/process-pause                      POST  请求暂停
//! - /api/process-resume                     POST  取消暂停
//! - /api/process-stop                       POST  请求停止
//! - /api/resume-project                     POST  恢复已有项目
//! - /api/list-projects                      GET   项目列表
//! - /api/check-folder                       POST  检查小说项目是否已存在
//! - /api/clean-temporary-files              POST  清理章节中间产物
//! - /api/projects/:project_id               GET   项目详情（章节 + 批次）
//! - /api/projects/:project_id/audio         GET   批次音频列表
//! - /api/download-audio/:project_id/:file   GET   下载批次音频
//! - /api/voices                             GET   可用音色（?locale= 过滤）
//! - /api/generate                           POST  单段文本合成，直接返回音频
//! - /api/get-chapter-urls                   POST  预览目录页章节列表
//! - /api/scrape-single                      POST  抓取单个章节正文
//! - /api/ping                               GET   健康检查
//! - /ws/events                              WS    流水线事件推送

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .merge(process_routes())
        .merge(project_routes())
        .merge(tool_routes())
        .route(
            "/download-audio/:project_id/:filename",
            get(handlers::download_audio),
        )
}

/// 处理控制路由
fn process_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/process-all-in-one", post(handlers::start_processing))
        .route("/process-status", get(handlers::process_status))
        .route("/process-pause", post(handlers::pause_processing))
        .route("/process-resume", post(handlers::resume_processing))
        .route("/process-stop", post(handlers::stop_processing))
        .route("/resume-project", post(handlers::resume_project))
}

/// 项目路由
fn project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/list-projects", get(handlers::list_projects))
        .route("/check-folder", post(handlers::check_folder))
        .route("/clean-temporary-files", post(handlers::clean_temporary_files))
        .route("/projects/:project_id", get(handlers::get_project))
        .route("/projects/:project_id/audio", get(handlers::list_audio_files))
}

/// 不创建项目的独立工具路由
fn tool_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voices", get(handlers::list_voices))
        .route("/generate", post(handlers::generate_speech))
        .route("/get-chapter-urls", post(handlers::get_chapter_urls))
        .route("/scrape-single", post(handlers::scrape_single))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ArtifactStoragePort, AudioClip, AudioFormat};
    use crate::application::{ProcessingDefaults, ProjectRepositoryPort};
    use crate::domain::project::{
        BatchSize, ChapterRange, ChapterSource, NovelName, Project, VoiceParams,
    };
    use crate::infrastructure::adapters::{FakeChapterFetcher, FakeTtsClient, FileArtifactStorage};
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::InMemoryProcessControl;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteProjectRepository,
    };
    use axum::body::Body;
    use http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        router: Router,
        repo: Arc<SqliteProjectRepository>,
        storage: Arc<FileArtifactStorage>,
        queue: mpsc::Receiver<crate::domain::project::ProjectId>,
    }

    async fn app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteProjectRepository::new(pool));
        let storage = Arc::new(FileArtifactStorage::new(dir.path().join("audio")));
        let (tx, queue) = mpsc::channel(4);
        let control = Arc::new(InMemoryProcessControl::new(tx));

        let state = AppState::new(
            repo.clone(),
            storage.clone(),
            control,
            Arc::new(FakeChapterFetcher::with_chapters("https://site.com/b/tool-novel", 3)),
            Arc::new(FakeTtsClient::with_defaults()),
            Arc::new(EventPublisher::new()),
            ProcessingDefaults {
                batch_size: 10,
                max_chapters: 100,
                voice: "en-US-AndrewNeural".to_string(),
            },
        );
        let router = create_routes().with_state(Arc::new(state));

        TestApp {
            _dir: dir,
            router,
            repo,
            storage,
            queue,
        }
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_control_without_active_run_is_noop() {
        let app = app().await;

        let (status, json) = call(&app.router, "GET", "/api/process-status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errno"], 0);
        assert_eq!(json["data"]["state"], "idle");

        for uri in ["/api/process-pause", "/api/process-resume", "/api/process-stop"] {
            let (_, json) = call(&app.router, "POST", uri, None).await;
            assert_eq!(json["errno"], 0);
            assert_eq!(json["data"]["accepted"], false);
            assert_eq!(json["data"]["state"], "idle");
        }
    }

    #[tokio::test]
    async fn test_start_then_conflict() {
        let mut app = app().await;
        let body = json!({
            "start_url": "https://site.com/b/route-novel",
            "end_chapter": 3,
            "batch_size": 2
        });

        let (_, json) = call(&app.router, "POST", "/api/process-all-in-one", Some(body.clone())).await;
        assert_eq!(json["errno"], 0, "{}", json);
        assert_eq!(json["data"]["novel_name"], "Route Novel");
        assert_eq!(json["data"]["resumed"], false);
        let project_id = json["data"]["project_id"].as_str().unwrap().to_string();
        assert_eq!(app.queue.recv().await.unwrap().to_string(), project_id);

        let (_, json) = call(&app.router, "POST", "/api/process-all-in-one", Some(body)).await;
        assert_eq!(json["errno"], 409);
        assert_eq!(json["data"]["existing_project"]["project_id"], project_id);

        let (_, json) = call(&app.router, "POST", "/api/process-pause", None).await;
        assert_eq!(json["data"]["accepted"], true);
        assert_eq!(json["data"]["state"], "pausing");
    }

    #[tokio::test]
    async fn test_start_rejects_bad_parameters() {
        let app = app().await;
        let (_, json) = call(
            &app.router,
            "POST",
            "/api/process-all-in-one",
            Some(json!({"start_url": "https://site.com/b/x", "start_chapter": 5, "end_chapter": 2})),
        )
        .await;
        assert_eq!(json["errno"], 400);

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/process-all-in-one",
            Some(json!({"start_url": "https://site.com/b/x", "end_chapter": 2, "rate": 500})),
        )
        .await;
        assert_eq!(json["errno"], 400);

        let (_, json) = call(&app.router, "GET", "/api/list-projects", None).await;
        assert_eq!(json["data"]["projects"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_project_detail_audio_listing_and_download() {
        let app = app().await;
        let name = NovelName::from_url("https://site.com/b/audio-novel").unwrap();
        let folder = app.storage.project_folder(&name).to_string_lossy().to_string();
        let project = Project::new(
            name,
            folder.clone(),
            ChapterSource::new(None, "https://site.com/b/audio-novel", None).unwrap(),
            ChapterRange::resolve(1, Some(2), None).unwrap(),
            BatchSize::new(2).unwrap(),
            VoiceParams::new("v", 0, 0, 0).unwrap(),
        );
        app.repo.create(&project).await.unwrap();
        app.storage
            .save_batch_audio(&folder, 1, 1, 2, &AudioClip::new(AudioFormat::Mp3, vec![7; 16]))
            .await
            .unwrap();
        let id = project.id().to_string();

        let (_, json) = call(&app.router, "GET", &format!("/api/projects/{}", id), None).await;
        assert_eq!(json["errno"], 0);
        assert_eq!(json["data"]["chapters"].as_array().unwrap().len(), 2);

        let (_, json) = call(&app.router, "GET", &format!("/api/projects/{}/audio", id), None).await;
        let files = json["data"]["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["filename"], "batch_001_chapters_1_to_2.mp3");

        let request = Request::builder()
            .uri(format!("/api/download-audio/{}/batch_001_chapters_1_to_2.mp3", id))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["content-type"], "audio/mpeg");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.len(), 16);

        let (_, json) = call(
            &app.router,
            "GET",
            &format!("/api/download-audio/{}/..%2Fsecret.mp3", id),
            None,
        )
        .await;
        assert_eq!(json["errno"], 400);

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/check-folder",
            Some(json!({"start_url": "https://site.com/b/audio-novel"})),
        )
        .await;
        assert_eq!(json["data"]["exists"], true);
        assert_eq!(json["data"]["project_id"], id);
    }

    #[tokio::test]
    async fn test_unknown_project_is_not_found() {
        let app = app().await;
        let (_, json) = call(
            &app.router,
            "POST",
            "/api/resume-project",
            Some(json!({"project_id": uuid::Uuid::new_v4()})),
        )
        .await;
        assert_eq!(json["errno"], 404);

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/clean-temporary-files",
            Some(json!({})),
        )
        .await;
        assert_eq!(json["errno"], 400);
    }

    #[tokio::test]
    async fn test_voices_with_locale_filter() {
        let app = app().await;

        let (_, json) = call(&app.router, "GET", "/api/voices", None).await;
        assert_eq!(json["errno"], 0);
        assert_eq!(json["data"]["voices"].as_array().unwrap().len(), 4);

        let (_, json) = call(&app.router, "GET", "/api/voices?locale=en-GB", None).await;
        let voices = json["data"]["voices"].as_array().unwrap();
        assert_eq!(voices.len(), 3);
        assert!(voices.iter().all(|v| v["locale"].as_str().unwrap().starts_with("en-")));

        let (_, json) = call(&app.router, "GET", "/api/voices?locale=de-DE", None).await;
        assert_eq!(json["data"]["voices"][0]["short_name"], "de-DE-KatjaNeural");
    }

    #[tokio::test]
    async fn test_get_chapter_urls_preview() {
        let app = app().await;

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/get-chapter-urls",
            Some(json!({"url": "https://site.com/b/tool-novel"})),
        )
        .await;
        assert_eq!(json["errno"], 0, "{}", json);
        assert_eq!(json["data"]["novel_title"], "Tool Novel");
        assert_eq!(json["data"]["count"], 3);
        assert_eq!(
            json["data"]["chapter_urls"][0]["url"],
            "https://site.com/b/tool-novel/chapter-1"
        );

        let (_, json) = call(&app.router, "POST", "/api/get-chapter-urls", Some(json!({}))).await;
        assert_eq!(json["errno"], 400);
        assert_eq!(app.repo.list().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_scrape_single() {
        let app = app().await;

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/scrape-single",
            Some(json!({"url": "https://site.com/b/tool-novel/chapter-2"})),
        )
        .await;
        assert_eq!(json["errno"], 0);
        assert_eq!(json["data"]["title"], "Title 2");
        assert_eq!(json["data"]["url"], "https://site.com/b/tool-novel/chapter-2");

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/scrape-single",
            Some(json!({"url": "https://site.com/b/tool-novel/chapter-40"})),
        )
        .await;
        assert_eq!(json["errno"], 404);
    }

    #[tokio::test]
    async fn test_generate_returns_audio_bytes() {
        let app = app().await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header("content-type", "application/json")
            .body(Body::from(json!({"text": "Hello world", "rate": 10}).to_string()))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "audio/wav");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..4], b"RIFF");

        let (_, json) = call(
            &app.router,
            "POST",
            "/api/generate",
            Some(json!({"text": "", "voice": "en-US-AriaNeural"})),
        )
        .await;
        assert_eq!(json["errno"], 400);
    }
}
