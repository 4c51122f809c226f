// TubeForge Video API
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info};

use crate::agent::render_queue::{VideoOrigin, VideoRequest};
use crate::agent::script_writer::VideoBrief;
use crate::agent::seo;
use crate::error::ServiceError;
use crate::integrations::youtube::{PublishError, UploadRequest};
use crate::saas::subscription::{month_key, UsageMetric};
use crate::server::{ok, validate_stream_path, AuthUser};
use crate::state::SharedState;

const PRIVACY_LEVELS: &[&str] = &["public", "private", "unlisted"];

#[derive(Debug, Deserialize)]
pub struct CreateVideoBody {
    pub title: String,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub target_audience: Option<String>,
    pub duration: Option<u32>,
    pub style: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub script: Option<String>,
}

impl CreateVideoBody {
    fn into_request(self) -> Result<VideoRequest, ServiceError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::BadRequest("Video title is required".to_string()));
        }
        let topic = self
            .topic
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| title.clone());

        let mut brief = VideoBrief::from_topic(&title, &topic);
        if let Some(description) = self.description {
            brief.description = description;
        }
        if let Some(audience) = self.target_audience {
            brief.target_audience = audience;
        }
        if let Some(duration) = self.duration {
            if !(5..=3600).contains(&duration) {
                return Err(ServiceError::BadRequest(
                    "Duration must be between 5 and 3600 seconds".to_string(),
                ));
            }
            brief.duration = duration;
        }
        if let Some(style) = self.style {
            brief.style = style;
        }
        if let Some(language) = self.language {
            brief.language = language;
        }
        brief.tags = self.tags;

        Ok(VideoRequest {
            brief,
            script: self.script.filter(|s| !s.trim().is_empty()),
            origin: VideoOrigin::Api,
            notify_channel: None,
        })
    }
}

/// Optional overrides for the metadata derived from the SEO report.
#[derive(Debug, Default, Deserialize)]
pub struct UploadBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category_id: Option<String>,
    pub privacy_status: Option<String>,
    pub publish_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeoBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub topic: Option<String>,
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/videos", post(create_video).get(list_videos))
        .route("/api/videos/seo-optimize", post(seo_optimize))
        .route("/api/videos/:id", get(get_video).delete(delete_video))
        .route("/api/videos/:id/stream", get(stream_video))
        .route("/api/videos/:id/upload", post(upload_video))
        .route("/api/dashboard/stats", get(dashboard_stats))
}

async fn create_video(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<CreateVideoBody>,
) -> Result<Json<Value>, ServiceError> {
    let request = body.into_request()?;
    let record = state.studio.create_video(&user.user_id, request).await?;
    Ok(ok(json!({
        "video_id": record.video_id,
        "status": record.status,
        "message": "Video creation started",
    })))
}

async fn list_videos(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    ok(state.queue.list_for_user(&user.user_id).await)
}

async fn get_video(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    Ok(ok(state.queue.get_owned(&video_id, &user.user_id).await?))
}

async fn delete_video(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    state.queue.delete(&video_id, &user.user_id).await?;
    Ok(ok(json!({ "message": "Video deleted" })))
}

async fn stream_video(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
    req: Request,
) -> Result<Response, ServiceError> {
    let record = state.queue.get_owned(&video_id, &user.user_id).await?;
    let stored = record
        .local_path
        .filter(|_| record.status.has_media())
        .ok_or_else(|| ServiceError::NotFound("Video file not available".to_string()))?;
    let path = validate_stream_path(&stored, state.queue.media_dir())?;
    if !path.exists() {
        return Err(ServiceError::NotFound("Video file not found".to_string()));
    }

    match ServeFile::new(path).oneshot(req).await {
        Ok(res) => Ok(res.into_response()),
        Err(err) => {
            error!("[API] ServeFile error: {}", err);
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

async fn upload_video(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(video_id): Path<String>,
    body: Option<Json<UploadBody>>,
) -> Result<Json<Value>, ServiceError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let record = state.queue.get_owned(&video_id, &user.user_id).await?;

    if !record.status.is_uploadable() {
        return Err(ServiceError::BadRequest(format!(
            "Video is not ready for upload (status: {:?})",
            record.status
        )));
    }
    let file = record
        .local_path
        .clone()
        .filter(|p| p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("mp4")) == Some(true))
        .filter(|p| p.exists())
        .ok_or_else(|| {
            ServiceError::BadRequest(
                "Video file not ready. Please generate the video successfully before uploading.".to_string(),
            )
        })?;

    let link = user.youtube.clone().ok_or(PublishError::NotLinked)?;

    let privacy = body.privacy_status.unwrap_or_else(|| "private".to_string()).to_lowercase();
    if !PRIVACY_LEVELS.contains(&privacy.as_str()) {
        return Err(ServiceError::BadRequest(format!("Unknown privacy status '{}'", privacy)));
    }

    let claimed = state.queue.claim_for_upload(&video_id, &user.user_id).await?;
    let mut request = UploadRequest::for_video(&claimed, file, &privacy, body.publish_at);
    if let Some(title) = body.title.filter(|t| !t.trim().is_empty()) {
        request.title = seo::upload_title(&title);
    }
    if let Some(tags) = body.tags {
        request.tags = seo::upload_tags(&tags, &request.title);
    }
    if let Some(description) = body.description {
        request.description = seo::upload_description(&description, &request.tags);
    }
    if let Some(category) = body.category_id {
        request.category_id = category;
    }

    let published = match state.publisher.upload(&link.access_token, &request).await {
        Ok(published) => published,
        Err(e) => {
            if let Err(release) = state.queue.release_upload(&video_id, claimed.status).await {
                error!("[YOUTUBE] Could not release upload claim on {}: {}", video_id, release);
            }
            return Err(e.into());
        }
    };
    let updated = state
        .queue
        .mark_uploaded(&video_id, &published.youtube_id, &published.url)
        .await?;
    state
        .subscriptions
        .record_usage(&user.user_id, UsageMetric::VideosUploaded, 1)
        .await?;
    info!("[YOUTUBE] {} published {} as {}", user.user_id, video_id, published.youtube_id);

    Ok(ok(json!({
        "video_id": updated.video_id,
        "youtube_id": published.youtube_id,
        "youtube_url": published.url,
        "title": published.title,
        "status": updated.status,
    })))
}

async fn seo_optimize(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<SeoBody>,
) -> Result<Json<Value>, ServiceError> {
    if body.title.trim().is_empty() {
        return Err(ServiceError::BadRequest("Title is required".to_string()));
    }
    let topic = body.topic.clone().unwrap_or_else(|| body.title.clone());
    let report = state
        .seo
        .optimize_video_metadata(&body.title, &body.description, &topic)
        .await;
    state
        .subscriptions
        .record_usage(&user.user_id, UsageMetric::ApiCalls, 1)
        .await?;
    Ok(ok(report))
}

async fn dashboard_stats(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    let month = month_key(chrono::Utc::now());
    let videos = state.queue.stats_for_user(&user.user_id).await;
    let subscription = state.subscriptions.get(&user.user_id).await;
    let usage = state.subscriptions.usage(&user.user_id, &month).await;
    let automation = state.automation.get(&user.user_id).await;
    let recent: Vec<_> = state
        .queue
        .list_for_user(&user.user_id)
        .await
        .into_iter()
        .take(5)
        .collect();

    ok(json!({
        "videos": videos,
        "subscription": subscription,
        "usage": usage,
        "month": month,
        "automation": automation,
        "recent_videos": recent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(title: &str) -> CreateVideoBody {
        CreateVideoBody {
            title: title.to_string(),
            topic: None,
            description: None,
            target_audience: None,
            duration: None,
            style: None,
            language: None,
            tags: vec![],
            script: Some("   ".into()),
        }
    }

    #[test]
    fn test_create_body_defaults() {
        let request = body("  Rust in 60 seconds ").into_request().unwrap();
        assert_eq!(request.brief.title, "Rust in 60 seconds");
        assert_eq!(request.brief.topic, "Rust in 60 seconds");
        assert_eq!(request.brief.duration, 60);
        assert!(request.script.is_none());
        assert_eq!(request.origin, VideoOrigin::Api);
    }

    #[test]
    fn test_create_body_validation() {
        assert!(matches!(body("  ").into_request(), Err(ServiceError::BadRequest(_))));
        let mut long = body("x");
        long.duration = Some(7200);
        assert!(matches!(long.into_request(), Err(ServiceError::BadRequest(_))));
    }
}
