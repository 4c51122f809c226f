mod common;

use axum::http::StatusCode;
use serde_json::json;

use tubeforge_core::agent::brain::{Brain, Intent, ProjectStatus};

#[test]
fn test_fast_classification() {
    let cases = [
        ("help", Intent::Help),
        ("what can you do?", Intent::Help),
        ("Create a video about sourdough baking", Intent::CreateVideo),
        ("please change the intro of my script", Intent::ModifyScript),
        ("what's the status?", Intent::GetStatus),
        ("publish it to youtube", Intent::UploadVideo),
        ("nice weather today", Intent::GeneralChat),
    ];
    for (message, expected) in cases {
        assert_eq!(Brain::fast_classify(message).intent, expected, "{}", message);
    }
}

async fn say(app: &common::TestApp, token: &str, message: &str) -> serde_json::Value {
    let (status, body) = app
        .post("/api/chat/message", token, json!({ "message": message }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_chat_api_walks_through_a_project() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("chatter@example.com").await;
    let reply = say(&app, &token, "help").await;
    assert_eq!(reply["intent"], "help");
    assert!(reply["project"].is_null());

    let reply = say(&app, &token, "Create a video about sourdough baking").await;
    assert_eq!(reply["intent"], "create_video");
    assert_eq!(reply["project"]["status"], "script_generated");
    assert!(reply["project"]["script"].as_str().unwrap().contains("sourdough"));
    assert!(reply["response"].as_str().unwrap().contains("New Video Project Created"));

    let reply = say(&app, &token, "make another video about cats").await;
    assert_eq!(reply["intent"], "create_video");
    assert!(reply["response"].as_str().unwrap().contains("already have an active project"));

    let reply = say(&app, &token, "what's the status?").await;
    assert_eq!(reply["intent"], "get_status");
    assert!(reply["response"].as_str().unwrap().contains("ScriptGenerated"));

    let reply = say(&app, &token, "upload it").await;
    assert_eq!(reply["intent"], "upload_video");
    assert!(reply["response"].as_str().unwrap().contains("isn't ready yet"));

    let (_, body) = app.get("/api/ai/conversation", &token).await;
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 10);

    let (status, _) = app.post("/api/ai/clear-conversation", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get("/api/ai/conversation", &token).await;
    assert!(body["data"]["current_project"].is_null());
    assert!(body["data"]["history"].as_array().unwrap().is_empty());

    let usage = app.state.subscriptions.all_usage(&user_id).await;
    assert_eq!(usage[0].api_calls, 5);
}

#[tokio::test]
async fn test_empty_chat_message_is_rejected() {
    let app = common::spawn_app().await;
    let (_, token) = app.signup("quiet@example.com").await;
    let (status, _) = app
        .post("/api/chat/message", &token, json!({ "message": "   " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_project_becomes_a_video() {
    use tubeforge_core::agent::render_queue::VideoOrigin;

    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("director@example.com").await;
    app.post(
        "/api/chat/message",
        &token,
        json!({ "message": "Create a video about tide pools" }),
    )
    .await;

    let request = app
        .state
        .brain
        .pending_video_request(&user_id, VideoOrigin::Chat, None)
        .await
        .unwrap();
    let record = app.state.studio.create_video(&user_id, request).await.unwrap();
    app.state.brain.attach_video(&user_id, &record.video_id).await;

    // Starting the same project twice is refused.
    assert!(app
        .state
        .brain
        .pending_video_request(&user_id, VideoOrigin::Chat, None)
        .await
        .is_err());

    app.wait_for_video(&record.video_id).await;
    let mut project = None;
    for _ in 0..100 {
        project = app.state.brain.current_project(&user_id).await;
        if project.as_ref().map(|p| p.status == ProjectStatus::VideoCreated) == Some(true) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let project = project.unwrap();
    assert_eq!(project.video_id.as_deref(), Some(record.video_id.as_str()));
}
