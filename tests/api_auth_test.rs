mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = common::spawn_app().await;

    for uri in ["/api/profile", "/api/videos", "/api/subscription", "/api/automation", "/ws"] {
        let (status, body) = app
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} should be protected", uri);
        assert_eq!(body["success"], false);
    }

    let (status, _) = app.get("/api/profile", "tf_not_a_real_token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes() {
    let app = common::spawn_app().await;

    let (status, body) = app
        .send(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model"], "offline-test");

    let (status, body) = app
        .send(Request::builder().uri("/api/pricing/tiers").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_every_token_transport_is_accepted() {
    let app = common::spawn_app().await;
    let (user_id, token) = app.signup("ada@example.com").await;

    let (status, body) = app.get("/api/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["profile"]["user_id"], user_id.as_str());
    assert_eq!(body["data"]["subscription_tier"], "Free");
    assert!(body["data"]["profile"].get("token_digest").is_none());

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/profile")
                .header("X-API-Key", token.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Request::builder()
                .uri(format!("/api/profile?api_key={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_signup_validation_and_duplicates() {
    let app = common::spawn_app().await;
    app.signup("grace@example.com").await;

    let signup = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/signup")
            .header("Content-Type", "application/json")
            .body(Body::from(json!({"email": email, "name": "Grace"}).to_string()))
            .unwrap()
    };

    let (status, _) = app.send(signup("GRACE@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.send(signup("not-an-email")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rotated_token_replaces_old_one() {
    let app = common::spawn_app().await;
    let (_, old) = app.signup("linus@example.com").await;

    let (status, body) = app.post("/api/token/rotate", &old, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let new = body["data"]["api_token"].as_str().unwrap().to_string();

    assert_eq!(app.get("/api/profile", &old).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/api/profile", &new).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_subscription_upgrade_and_billing() {
    let app = common::spawn_app().await;
    let (_, token) = app.signup("billing@example.com").await;

    let (status, body) = app.get("/api/subscription", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["status"], "trial");
    assert_eq!(body["data"]["can_create_video"], true);

    let (status, _) = app
        .post("/api/subscription/upgrade", &token, json!({"tier": "platinum"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/subscription/upgrade",
            &token,
            json!({"tier": "professional", "billing_cycle": "yearly"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subscription"]["tier"], "Professional");
    assert_eq!(body["data"]["invoice"]["amount"], 790.0);

    let (_, body) = app.get("/api/billing/history", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app.post("/api/subscription/cancel", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["auto_renew"], false);
}

#[tokio::test]
async fn test_admin_dashboard_requires_secret() {
    let app = common::spawn_app_with(|c| c.dashboard_secret = Some("letmein".to_string())).await;
    app.signup("admin-view@example.com").await;

    let (status, _) = app
        .send(Request::builder().uri("/api/admin/stats").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Request::builder()
                .uri("/api/admin/stats")
                .header("X-Dashboard-Token", "letmein")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["global"]["total_users"], 1);
    assert_eq!(body["data"]["global"]["auto_mode"], "OFF");
    assert_eq!(body["data"]["users"][0]["last_title"], "No videos");

    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/admin/users/user_missing")
                .header("X-Dashboard-Token", "letmein")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_dashboard_closed_without_secret() {
    let app = common::spawn_app().await;
    let (status, _) = app
        .send(
            Request::builder()
                .uri("/api/admin/stats")
                .header("X-Dashboard-Token", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
