// TubeForge YouTube Publisher
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Uploads use the resumable protocol of the YouTube Data API v3: the metadata
// POST returns a session URL in `Location`, then the bytes are PUT there.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::agent::render_queue::VideoRecord;
use crate::agent::seo;
use crate::config::YouTubeConfig;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("YouTube channel not connected")]
    NotLinked,

    #[error("Video file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YouTube request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("YouTube API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("YouTube did not return an upload session")]
    MissingSession,

    #[error("YouTube video {0} not found")]
    NotFound(String),

    #[error("Unexpected YouTube response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadRequest {
    pub file: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: String,
    pub publish_at: Option<String>,
}

impl UploadRequest {
    /// Build upload metadata from a finished video, preferring its SEO report.
    pub fn for_video(record: &VideoRecord, file: PathBuf, privacy: &str, publish_at: Option<String>) -> Self {
        let (title, description, tags) = match &record.seo {
            Some(report) => (
                report.optimized_title.clone(),
                report.optimized_description.clone(),
                if report.keywords.is_empty() { record.brief.tags.clone() } else { report.keywords.clone() },
            ),
            None => (
                record.brief.title.clone(),
                record.brief.description.clone(),
                record.brief.tags.clone(),
            ),
        };

        let tags = seo::upload_tags(&tags, &title);
        Self {
            file,
            category_id: seo::determine_category(&title, &description).to_string(),
            description: seo::upload_description(&description, &tags),
            title: seo::upload_title(&title),
            tags,
            privacy: privacy.to_string(),
            publish_at,
        }
    }

    fn metadata(&self) -> Value {
        let mut status = json!({
            "privacyStatus": self.privacy,
            "selfDeclaredMadeForKids": false,
        });
        if let Some(at) = &self.publish_at {
            status["publishAt"] = json!(at);
        }
        json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
                "defaultLanguage": "en",
                "defaultAudioLanguage": "en",
            },
            "status": status,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublishedVideo {
    pub youtube_id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoStatistics {
    pub video_id: String,
    pub title: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub published_at: Option<String>,
}

pub fn watch_url(youtube_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", youtube_id)
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(&self, access_token: &str, request: &UploadRequest) -> Result<PublishedVideo, PublishError>;
    async fn statistics(&self, access_token: &str, youtube_id: &str) -> Result<VideoStatistics, PublishError>;
}

pub struct YouTubePublisher {
    client: reqwest::Client,
    config: YouTubeConfig,
}

impl YouTubePublisher {
    pub fn new(config: YouTubeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("[YOUTUBE] API error {}: {}", status, body);
    Err(PublishError::Api {
        status: status.as_u16(),
        body,
    })
}

/// Statistics counts arrive as decimal strings.
fn count(stats: &Value, key: &str) -> u64 {
    match &stats[key] {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn upload(&self, access_token: &str, request: &UploadRequest) -> Result<PublishedVideo, PublishError> {
        let bytes = tokio::fs::read(&request.file).await?;
        info!("[YOUTUBE] 📤 Uploading {:?} ({} bytes)", request.file, bytes.len());

        let session = self
            .client
            .post(format!("{}/videos", self.config.upload_base))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&request.metadata())
            .send()
            .await?;
        let session = check(session).await?;
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(PublishError::MissingSession)?;

        let uploaded = self
            .client
            .put(&location)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .await?;
        let body: Value = check(uploaded).await?.json().await?;

        let youtube_id = body["id"]
            .as_str()
            .ok_or_else(|| PublishError::Malformed("missing video id".to_string()))?
            .to_string();
        let title = body["snippet"]["title"].as_str().unwrap_or(&request.title).to_string();
        info!("[YOUTUBE] ✅ Uploaded as {}", youtube_id);

        Ok(PublishedVideo {
            url: watch_url(&youtube_id),
            youtube_id,
            title,
        })
    }

    async fn statistics(&self, access_token: &str, youtube_id: &str) -> Result<VideoStatistics, PublishError> {
        let response = self
            .client
            .get(format!("{}/videos", self.config.api_base))
            .query(&[("part", "statistics,snippet"), ("id", youtube_id)])
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        let item = body["items"]
            .as_array()
            .and_then(|items| items.first())
            .ok_or_else(|| PublishError::NotFound(youtube_id.to_string()))?;
        let stats = &item["statistics"];

        Ok(VideoStatistics {
            video_id: youtube_id.to_string(),
            title: item["snippet"]["title"].as_str().unwrap_or_default().to_string(),
            views: count(stats, "viewCount"),
            likes: count(stats, "likeCount"),
            comments: count(stats, "commentCount"),
            published_at: item["snippet"]["publishedAt"].as_str().map(str::to_string),
        })
    }
}
