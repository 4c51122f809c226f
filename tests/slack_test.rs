mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use tubeforge_core::agent::render_queue::{VideoOrigin, VideoRequest, VideoStatus};
use tubeforge_core::agent::script_writer::VideoBrief;
use tubeforge_core::integrations::slack::sign;

const SECRET: &str = "slack-signing-secret";

fn signed(uri: &str, content_type: &str, body: String, secret: &str) -> Request<Body> {
    let ts = Utc::now().timestamp();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", content_type)
        .header("X-Slack-Request-Timestamp", ts.to_string())
        .header("X-Slack-Signature", sign(secret, ts, body.as_bytes()))
        .body(Body::from(body))
        .unwrap()
}

async fn slack_app(server: &MockServer) -> common::TestApp {
    let api_base = server.url("/api");
    common::spawn_app_with(move |c| {
        c.slack.api_base = api_base;
        c.slack.bot_token = Some("xoxb-test".to_string());
        c.slack.signing_secret = Some(SECRET.to_string());
    })
    .await
}

#[tokio::test]
async fn test_url_verification_requires_valid_signature() {
    let server = MockServer::start_async().await;
    let app = slack_app(&server).await;
    let body = json!({"type": "url_verification", "challenge": "abc123"}).to_string();

    let (status, reply) = app
        .send(signed("/slack/events", "application/json", body.clone(), SECRET))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["challenge"], "abc123");

    let (status, _) = app
        .send(signed("/slack/events", "application/json", body, "wrong-secret"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_message_event_gets_a_reply() {
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/chat.postMessage")
                .header("Authorization", "Bearer xoxb-test")
                .body_contains("C042");
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;
    let app = slack_app(&server).await;

    let body = json!({
        "type": "event_callback",
        "event": {"type": "message", "user": "U777", "channel": "C042", "text": "help"}
    })
    .to_string();
    let (status, reply) = app
        .send(signed("/slack/events", "application/json", body, SECRET))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["ok"], true);

    for _ in 0..100 {
        if post.hits_async().await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(post.hits_async().await, 1);

    // Unlinked Slack users get their own conversation key.
    let history = app.state.brain.history("slack:U777").await;
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_bot_messages_are_ignored() {
    let server = MockServer::start_async().await;
    let post = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat.postMessage");
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;
    let app = slack_app(&server).await;

    let body = json!({
        "type": "event_callback",
        "event": {"type": "message", "user": "U1", "bot_id": "B1", "channel": "C1", "text": "hello"}
    })
    .to_string();
    let (status, _) = app
        .send(signed("/slack/events", "application/json", body, SECRET))
        .await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(post.hits_async().await, 0);
}

#[tokio::test]
async fn test_interactive_payload_is_form_encoded() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat.postMessage");
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;
    let app = slack_app(&server).await;

    let payload = json!({
        "user": {"id": "U9"},
        "channel": {"id": "C9"},
        "actions": [{"action_id": "cancel_btn"}]
    })
    .to_string();
    let form: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("payload", &payload)
        .finish();

    let (status, _) = app
        .send(signed(
            "/slack/interactive",
            "application/x-www-form-urlencoded",
            form,
            SECRET,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(signed(
            "/slack/interactive",
            "application/x-www-form-urlencoded",
            "nothing=here".to_string(),
            SECRET,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_finished_slack_video_is_reported_by_dm() {
    let server = MockServer::start_async().await;
    let open = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/conversations.open").body_contains("U55");
            then.status(200).json_body(json!({"ok": true, "channel": {"id": "D55"}}));
        })
        .await;
    let done = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/chat.postMessage")
                .body_contains("D55")
                .body_contains("Video Creation Complete");
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;
    let app = slack_app(&server).await;
    let (user_id, _) = app.signup("slacker@example.com").await;

    let record = app
        .state
        .studio
        .create_video(
            &user_id,
            VideoRequest {
                brief: VideoBrief::from_topic("Borrowing explained", "rust borrowing"),
                script: None,
                origin: VideoOrigin::Slack,
                notify_channel: Some("U55".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(app.wait_for_video(&record.video_id).await.status, VideoStatus::Completed);

    for _ in 0..100 {
        if done.hits_async().await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(open.hits_async().await, 1);
    assert_eq!(done.hits_async().await, 1);
}
