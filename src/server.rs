// TubeForge HTTP Server
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::integrations::slack::verify_signature;
use crate::saas::accounts::User;
use crate::state::SharedState;
use crate::{account_api, admin_api, chat, video_api};

const ALLOWED_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "mov", "webm", // Video
    "jpg", "jpeg", "png", "webp", // Thumbnails
];

/// `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// The caller resolved from `Authorization: Bearer`, `X-API-Key` or the
/// `api_key` query parameter (browsers cannot set headers on `<video>` or
/// WebSocket requests).
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = request_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("Missing API token".to_string()))?;
        let user = state.accounts.authenticate(&token).await?;
        Ok(AuthUser(user))
    }
}

fn request_token(parts: &Parts) -> Option<String> {
    if let Some(bearer) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }
    if let Some(key) = parts.headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(key.trim().to_string());
    }
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == "api_key")
        .map(|(_, v)| v.into_owned())
}

/// A stored media path may be served only if it is a plain file with a media
/// extension that lives under `media_dir`.
pub fn validate_stream_path(path: &Path, media_dir: &Path) -> Result<PathBuf, ServiceError> {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ServiceError::Forbidden("Access denied: Path traversal detected".to_string()));
    }

    let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase());
    match ext {
        Some(e) if ALLOWED_EXTENSIONS.contains(&e.as_str()) => {}
        Some(e) => {
            return Err(ServiceError::Forbidden(format!(
                "Access denied: Invalid file extension '.{}'",
                e
            )))
        }
        None => {
            return Err(ServiceError::Forbidden(
                "Access denied: No file extension provided".to_string(),
            ))
        }
    }

    if !path.starts_with(media_dir) {
        return Err(ServiceError::Forbidden("Access denied: Outside media directory".to_string()));
    }
    Ok(path.to_path_buf())
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/slack/events", post(slack_events))
        .route("/slack/interactive", post(slack_interactive))
        .merge(account_api::router())
        .merge(video_api::router())
        .merge(admin_api::router())
        .merge(chat::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(state: SharedState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 TubeForge API running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<SharedState>) -> Json<Value> {
    let snapshot = state.health.snapshot();
    Json(json!({
        "status": if snapshot.memory_ok && snapshot.storage_ok { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
        "health": snapshot,
    }))
}

fn check_slack_signature(state: &SharedState, headers: &HeaderMap, body: &[u8]) -> Result<(), ServiceError> {
    let Some(secret) = state.slack.signing_secret() else {
        return Ok(());
    };
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let timestamp = header("X-Slack-Request-Timestamp");
    let signature = header("X-Slack-Signature");

    if verify_signature(secret, timestamp, body, signature, Utc::now().timestamp()) {
        Ok(())
    } else {
        warn!("[SLACK] Rejected request with bad signature");
        Err(ServiceError::Unauthorized("Invalid Slack signature".to_string()))
    }
}

async fn slack_events(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    check_slack_signature(&state, &headers, &body)?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid event payload: {}", e)))?;
    Ok(Json(state.slack.handle_event(payload)))
}

async fn slack_interactive(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    check_slack_signature(&state, &headers, &body)?;
    let raw = url::form_urlencoded::parse(&body)
        .find(|(k, _)| k == "payload")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| ServiceError::BadRequest("Missing payload".to_string()))?;
    let payload: Value = serde_json::from_str(&raw)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid interactive payload: {}", e)))?;
    Ok(Json(state.slack.handle_interactive(&payload).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stream_path() {
        let media = Path::new("/srv/tubeforge/videos");

        assert!(validate_stream_path(Path::new("/srv/tubeforge/videos/abc/video.mp4"), media).is_ok());
        assert!(validate_stream_path(Path::new("/srv/tubeforge/videos/abc/thumb.JPG"), media).is_ok());

        assert!(validate_stream_path(Path::new("/srv/tubeforge/videos/../secret.mp4"), media).is_err());
        assert!(validate_stream_path(Path::new("/srv/tubeforge/videos/abc/script.txt"), media).is_err());
        assert!(validate_stream_path(Path::new("/srv/tubeforge/videos/abc/noext"), media).is_err());
        assert!(validate_stream_path(Path::new("/etc/passwd.mp4"), media).is_err());
        assert!(validate_stream_path(Path::new("image.svg"), media).is_err());
    }

    #[test]
    fn test_request_token_sources() {
        let (parts, _) = axum::http::Request::builder()
            .uri("/api/profile")
            .header("Authorization", "Bearer tf_abc")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts).as_deref(), Some("tf_abc"));

        let (parts, _) = axum::http::Request::builder()
            .uri("/api/profile")
            .header("X-API-Key", "tf_key")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts).as_deref(), Some("tf_key"));

        let (parts, _) = axum::http::Request::builder()
            .uri("/ws?foo=1&api_key=tf_q%2B1")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(request_token(&parts).as_deref(), Some("tf_q+1"));

        let (parts, _) = axum::http::Request::builder().uri("/ws").body(()).unwrap().into_parts();
        assert!(request_token(&parts).is_none());
    }
}
