// Shared harness for the router-level integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use tubeforge_core::agent::llm_bridge::{LanguageModel, LlmError};
use tubeforge_core::agent::render_queue::VideoRecord;
use tubeforge_core::agent::renderer::{RenderError, RenderJob, Renderer};
use tubeforge_core::config::AppConfig;
use tubeforge_core::integrations::youtube::{
    PublishError, PublishedVideo, Publisher, UploadRequest, VideoStatistics,
};
use tubeforge_core::server;
use tubeforge_core::state::{AppState, Collaborators, SharedState};

/// Every call fails, so each feature runs its offline fallback.
pub struct OfflineModel;

#[async_trait]
impl LanguageModel for OfflineModel {
    fn model_name(&self) -> &str {
        "offline-test"
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

/// Writes a few bytes where the real tool would write the mp4.
pub struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
        tokio::fs::write(&job.output_path, b"\x00\x00\x00\x18ftypmp42 fake video").await?;
        Ok(job.output_path.clone())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub uploads: Mutex<Vec<(String, UploadRequest)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn upload(&self, access_token: &str, request: &UploadRequest) -> Result<PublishedVideo, PublishError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((access_token.to_string(), request.clone()));
        let id = format!("yt_{}", uploads.len());
        Ok(PublishedVideo {
            url: format!("https://www.youtube.com/watch?v={}", id),
            youtube_id: id,
            title: request.title.clone(),
        })
    }

    async fn statistics(&self, _access_token: &str, youtube_id: &str) -> Result<VideoStatistics, PublishError> {
        Ok(VideoStatistics {
            video_id: youtube_id.to_string(),
            title: "Stub".to_string(),
            views: 42,
            likes: 7,
            comments: 1,
            published_at: None,
        })
    }
}

pub struct TestApp {
    pub state: SharedState,
    pub router: Router,
    pub publisher: Arc<RecordingPublisher>,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut AppConfig)) -> TestApp {
    spawn_app_rendering_with(tweak, Arc::new(StubRenderer)).await
}

pub async fn spawn_app_rendering_with(
    tweak: impl FnOnce(&mut AppConfig),
    renderer: Arc<dyn Renderer>,
) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::for_data_dir(dir.path());
    config.ffmpeg = "tubeforge-missing-ffmpeg".to_string();
    tweak(&mut config);

    let publisher = Arc::new(RecordingPublisher::default());
    let collaborators = Collaborators {
        llm: Arc::new(OfflineModel),
        renderer,
        publisher: publisher.clone(),
    };
    let state = AppState::build(config, collaborators).await.unwrap();
    let router = server::create_router(state.clone());

    TestApp {
        state,
        router,
        publisher,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.with_body("POST", uri, token, body).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.with_body("PUT", uri, token, body).await
    }

    async fn with_body(&self, method: &str, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Sign up and return `(user_id, api_token)`.
    pub async fn signup(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/signup")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"email": email, "name": "Test User"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);
        (
            body["data"]["user"]["user_id"].as_str().unwrap().to_string(),
            body["data"]["api_token"].as_str().unwrap().to_string(),
        )
    }

    /// Poll until the job leaves pending/processing.
    pub async fn wait_for_video(&self, video_id: &str) -> VideoRecord {
        for _ in 0..200 {
            if let Some(record) = self.state.queue.get(video_id).await {
                if !record.status.is_active() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("video {} never settled", video_id);
    }
}
