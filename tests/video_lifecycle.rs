mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use tubeforge_core::agent::render_queue::VideoStatus;
use tubeforge_core::agent::renderer::UnconfiguredRenderer;

async fn create(app: &common::TestApp, token: &str, title: &str) -> (StatusCode, serde_json::Value) {
    app.post(
        "/api/videos",
        token,
        json!({"title": title, "topic": "rust ownership", "tags": ["rust"]}),
    )
    .await
}

#[tokio::test]
async fn test_video_renders_and_streams() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("maker@example.com").await;

    let (status, body) = create(&app, &token, "Ownership in 60 seconds").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();

    let record = app.wait_for_video(&video_id).await;
    assert_eq!(record.status, VideoStatus::Completed);
    assert_eq!(record.progress, 100);
    assert!(record.script.as_deref().unwrap_or_default().contains("rust ownership"));
    assert!(record.seo.is_some());
    assert!(record.thumbnail_path.is_none());

    let (status, body) = app.get(&format!("/api/videos/{}", video_id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/videos/{}/stream?api_key={}", video_id, token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = app.get("/api/videos", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let usage = app
        .state
        .subscriptions
        .all_usage(&user_id)
        .await;
    assert_eq!(usage[0].videos_created, 1);
}

#[tokio::test]
async fn test_other_users_cannot_touch_a_video() {
    let app = common::spawn_app().await;
    let (_, owner) = app.signup("owner@example.com").await;
    let (_, intruder) = app.signup("intruder@example.com").await;

    let (_, body) = create(&app, &owner, "Private stuff").await;
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();
    app.wait_for_video(&video_id).await;

    let (status, _) = app.get(&format!("/api/videos/{}", video_id), &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get(&format!("/api/videos/{}/stream", video_id), &intruder).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/videos/does-not-exist", &owner).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_free_tier_video_limit() {
    let app = common::spawn_app().await;
    let (_, token) = app.signup("quota@example.com").await;

    for i in 0..3 {
        let (status, _) = create(&app, &token, &format!("Video {}", i)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = create(&app, &token, "One too many").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("Video limit reached"));

    let (status, _) = app.post("/api/videos", &token, json!({"title": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_requires_linked_channel_then_publishes() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("publisher@example.com").await;

    let (_, body) = create(&app, &token, "Publish me").await;
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();
    app.wait_for_video(&video_id).await;

    let upload_uri = format!("/api/videos/{}/upload", video_id);
    let (status, body) = app.post(&upload_uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not connected"));

    let (status, _) = app
        .put(
            "/api/youtube/credentials",
            &token,
            json!({"access_token": "ya29.test", "channel_title": "Rust Clips"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&upload_uri, &token, json!({"privacy_status": "unlisted"}))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["youtube_id"], "yt_1");
    assert_eq!(body["data"]["status"], "uploaded");

    {
        let uploads = app.publisher.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "ya29.test");
        assert_eq!(uploads[0].1.privacy, "unlisted");
        assert!(uploads[0].1.file.ends_with("video.mp4"));
    }

    // Already uploaded.
    let (status, _) = app.post(&upload_uri, &token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/youtube/analytics/yt_1", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["views"], 42);

    let usage = app.state.subscriptions.all_usage(&user_id).await;
    assert_eq!(usage[0].videos_uploaded, 1);
}

#[tokio::test]
async fn test_delete_and_dashboard_stats() {
    let app = common::spawn_app().await;
    let (_, token) = app.signup("cleaner@example.com").await;

    let (_, body) = create(&app, &token, "Short lived").await;
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();
    app.wait_for_video(&video_id).await;

    let (_, body) = app.get("/api/dashboard/stats", &token).await;
    assert_eq!(body["data"]["videos"]["total_videos"], 1);
    assert_eq!(body["data"]["videos"]["success_rate"], 100.0);
    assert_eq!(body["data"]["usage"]["videos_created"], 1);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/videos/{}", video_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.get(&format!("/api/videos/{}", video_id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!app.state.queue.media_dir().join(&video_id).exists());
}

#[tokio::test]
async fn test_seo_optimize_endpoint() {
    let app = common::spawn_app().await;
    let (_, token) = app.signup("seo@example.com").await;

    let (status, body) = app
        .post(
            "/api/videos/seo-optimize",
            &token,
            json!({"title": "rust tips", "description": "", "topic": "rust programming"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["seo_score"].as_u64().unwrap() <= 100);
    assert!(!body["data"]["keywords"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_respect_free_tier_limit() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("burst@example.com").await;

    let titles: Vec<String> = (0..12).map(|i| format!("Burst {}", i)).collect();
    let results = join_all(titles.iter().map(|title| create(&app, &token, title))).await;

    let accepted = results.iter().filter(|(status, _)| *status == StatusCode::OK).count();
    let refused = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::FORBIDDEN)
        .count();
    assert_eq!(accepted, 3);
    assert_eq!(refused, 9);

    let usage = app.state.subscriptions.all_usage(&user_id).await;
    assert_eq!(usage[0].videos_created, 3);
    let (_, body) = app.get("/api/videos", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_concurrent_uploads_publish_once() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("double@example.com").await;

    let (_, body) = create(&app, &token, "Publish me once").await;
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();
    app.wait_for_video(&video_id).await;
    app.put(
        "/api/youtube/credentials",
        &token,
        json!({"access_token": "ya29.test", "channel_title": "Rust Clips"}),
    )
    .await;

    let upload_uri = format!("/api/videos/{}/upload", video_id);
    let (first, second) = tokio::join!(
        app.post(&upload_uri, &token, json!({})),
        app.post(&upload_uri, &token, json!({})),
    );
    let statuses = [first.0, second.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert!(statuses
        .iter()
        .all(|s| matches!(*s, StatusCode::OK | StatusCode::BAD_REQUEST | StatusCode::CONFLICT)));

    assert_eq!(app.publisher.uploads.lock().unwrap().len(), 1);
    assert_eq!(app.wait_for_video(&video_id).await.status, VideoStatus::Uploaded);
    let usage = app.state.subscriptions.all_usage(&user_id).await;
    assert_eq!(usage[0].videos_uploaded, 1);
}

#[tokio::test]
async fn test_placeholder_video_has_no_stream() {
    let app = common::spawn_app_rendering_with(|_| {}, Arc::new(UnconfiguredRenderer)).await;
    let (_, token) = app.signup("draft@example.com").await;

    let (_, body) = create(&app, &token, "Script only").await;
    let video_id = body["data"]["video_id"].as_str().unwrap().to_string();
    let record = app.wait_for_video(&video_id).await;
    assert_eq!(record.status, VideoStatus::Placeholder);

    let (status, body) = app.get(&format!("/api/videos/{}/stream", video_id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Video file not available");
}

#[tokio::test]
async fn test_account_without_subscription_gets_a_trial() {
    let app = common::spawn_app().await;
    let (user, token) = app
        .state
        .accounts
        .signup("direct@example.com", "Direct", None)
        .await
        .unwrap();

    let (status, body) = create(&app, &token, "First video").await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = app.get("/api/subscription", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["status"], "trial");
    let usage = app.state.subscriptions.all_usage(&user.user_id).await;
    assert_eq!(usage[0].videos_created, 1);
}
