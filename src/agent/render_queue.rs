// TubeForge Render Queue
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// A single worker drains an unbounded channel of video ids and runs each
// through script -> render -> thumbnail -> SEO -> finalize. Records live in
// a snapshot store; every transition is broadcast as a `JobEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::renderer::{extract_thumbnail, RenderError, RenderJob, Renderer};
use crate::agent::script_writer::{ScriptWriter, VideoBrief};
use crate::agent::seo::{SeoOptimizer, SeoReport};
use crate::error::ServiceError;
use crate::store::{JsonStore, StoreError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    /// Finished by the scheduler, waiting for the user to publish.
    Prepared,
    /// No renderer available: only the script and metadata exist.
    Placeholder,
    Failed,
    /// Claimed by an in-flight YouTube upload.
    Publishing,
    Uploaded,
}

impl VideoStatus {
    pub fn is_active(self) -> bool {
        matches!(self, VideoStatus::Pending | VideoStatus::Processing)
    }

    pub fn is_uploadable(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Prepared)
    }

    /// A rendered video file exists for this status.
    pub fn has_media(self) -> bool {
        matches!(
            self,
            VideoStatus::Completed | VideoStatus::Prepared | VideoStatus::Publishing | VideoStatus::Uploaded
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VideoOrigin {
    Api,
    Chat,
    Slack,
    Automation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub brief: VideoBrief,
    pub script: Option<String>,
    pub status: VideoStatus,
    pub progress: u8,
    pub origin: VideoOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub script_path: Option<PathBuf>,
    pub local_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub seo: Option<SeoReport>,
    pub youtube_id: Option<String>,
    pub youtube_url: Option<String>,
    pub error_message: Option<String>,
    /// Chat-ops channel to report back to, for Slack-originated jobs.
    #[serde(default)]
    pub notify_channel: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoTable {
    #[serde(default)]
    pub videos: BTreeMap<String, VideoRecord>,
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub brief: VideoBrief,
    /// Pre-written script (from the chat project); generated when absent.
    pub script: Option<String>,
    pub origin: VideoOrigin,
    pub notify_channel: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub video_id: String,
    pub user_id: String,
    pub origin: VideoOrigin,
    pub progress: u8,
    pub status: VideoStatus,
    pub message: String,
    pub notify_channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct VideoStats {
    pub total_videos: usize,
    pub completed_videos: usize,
    pub processing_videos: usize,
    pub failed_videos: usize,
    pub uploaded_videos: usize,
    pub placeholder_videos: usize,
    pub success_rate: f64,
}

/// The collaborators each job is run through.
pub struct PipelineTools {
    pub writer: Arc<ScriptWriter>,
    pub seo: Arc<SeoOptimizer>,
    pub renderer: Arc<dyn Renderer>,
    pub ffmpeg: String,
}

pub struct RenderQueue {
    videos: Arc<JsonStore<VideoTable>>,
    tx: mpsc::UnboundedSender<String>,
    events: broadcast::Sender<JobEvent>,
    media_dir: PathBuf,
}

impl RenderQueue {
    /// Recover interrupted jobs from a previous run and spawn the worker.
    pub async fn start(
        videos: JsonStore<VideoTable>,
        tools: PipelineTools,
        media_dir: PathBuf,
    ) -> Result<Arc<Self>, StoreError> {
        let videos = Arc::new(videos);
        let (interrupted, unclaimed) = videos
            .update(|table| {
                let (mut interrupted, mut unclaimed) = (0, 0);
                for record in table.videos.values_mut() {
                    if record.status.is_active() {
                        record.status = VideoStatus::Failed;
                        record.error_message = Some("Interrupted by restart".to_string());
                        record.updated_at = Utc::now();
                        interrupted += 1;
                    } else if record.status == VideoStatus::Publishing {
                        record.status = rendered_status(record.origin);
                        record.updated_at = Utc::now();
                        unclaimed += 1;
                    }
                }
                Ok::<_, StoreError>((interrupted, unclaimed))
            })
            .await?;
        if interrupted > 0 {
            warn!("[QUEUE] Marked {} interrupted job(s) as failed", interrupted);
        }
        if unclaimed > 0 {
            warn!("[QUEUE] Released {} upload claim(s) left by a restart", unclaimed);
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let (events, _) = broadcast::channel(256);

        let queue = Arc::new(Self {
            videos,
            tx,
            events,
            media_dir,
        });

        let worker = queue.clone();
        tokio::spawn(async move {
            info!("[QUEUE] Render worker started.");
            while let Some(video_id) = rx.recv().await {
                worker.process(&video_id, &tools).await;
            }
            info!("[QUEUE] Render worker stopped.");
        });

        Ok(queue)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub async fn submit(&self, user_id: &str, request: VideoRequest) -> Result<VideoRecord, ServiceError> {
        let now = Utc::now();
        let record = VideoRecord {
            video_id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            brief: request.brief,
            script: request.script,
            status: VideoStatus::Pending,
            progress: 0,
            origin: request.origin,
            created_at: now,
            updated_at: now,
            script_path: None,
            local_path: None,
            thumbnail_path: None,
            seo: None,
            youtube_id: None,
            youtube_url: None,
            error_message: None,
            notify_channel: request.notify_channel,
        };

        let stored = record.clone();
        self.videos
            .update(|table| {
                table.videos.insert(stored.video_id.clone(), stored);
                Ok::<_, ServiceError>(())
            })
            .await?;

        self.tx
            .send(record.video_id.clone())
            .map_err(|_| ServiceError::Internal("Render worker is not running".to_string()))?;
        info!("[QUEUE] Added job {} for {} ({:?})", record.video_id, user_id, record.origin);
        Ok(record)
    }

    pub async fn get(&self, video_id: &str) -> Option<VideoRecord> {
        self.videos.read(|t| t.videos.get(video_id).cloned()).await
    }

    /// Owner-checked lookup.
    pub async fn get_owned(&self, video_id: &str, user_id: &str) -> Result<VideoRecord, ServiceError> {
        let record = self
            .get(video_id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;
        if record.user_id != user_id {
            return Err(ServiceError::Forbidden("Not your video".to_string()));
        }
        Ok(record)
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: &str) -> Vec<VideoRecord> {
        let mut list: Vec<VideoRecord> = self
            .videos
            .read(|t| t.videos.values().filter(|r| r.user_id == user_id).cloned().collect())
            .await;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub async fn list_all(&self) -> Vec<VideoRecord> {
        let mut list: Vec<VideoRecord> = self.videos.read(|t| t.videos.values().cloned().collect()).await;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub async fn delete(&self, video_id: &str, user_id: &str) -> Result<(), ServiceError> {
        let record = self.get_owned(video_id, user_id).await?;
        if record.status.is_active() {
            return Err(ServiceError::Conflict("Video is still being generated".to_string()));
        }
        if record.status == VideoStatus::Publishing {
            return Err(ServiceError::Conflict("Video is being uploaded".to_string()));
        }

        self.videos
            .update(|t| {
                t.videos.remove(video_id);
                Ok::<_, ServiceError>(())
            })
            .await?;

        let dir = self.job_dir(video_id);
        if dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("[QUEUE] Could not remove {:?}: {}", dir, e);
            }
        }
        info!("[QUEUE] Deleted video {}", video_id);
        Ok(())
    }

    pub async fn stats_for_user(&self, user_id: &str) -> VideoStats {
        let videos = self.list_for_user(user_id).await;
        compute_stats(&videos)
    }

    /// Move an uploadable video to `Publishing` so only one upload can run.
    /// Returns the record as it was before the claim.
    pub async fn claim_for_upload(&self, video_id: &str, user_id: &str) -> Result<VideoRecord, ServiceError> {
        self.videos
            .update(|t| {
                let record = t
                    .videos
                    .get_mut(video_id)
                    .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;
                if record.user_id != user_id {
                    return Err(ServiceError::Forbidden("Not your video".to_string()));
                }
                match record.status {
                    VideoStatus::Publishing => {
                        return Err(ServiceError::Conflict("Upload already in progress".to_string()))
                    }
                    status if !status.is_uploadable() => {
                        return Err(ServiceError::BadRequest(format!(
                            "Video is not ready for upload (status: {:?})",
                            status
                        )))
                    }
                    _ => {}
                }
                let before = record.clone();
                record.status = VideoStatus::Publishing;
                record.updated_at = Utc::now();
                Ok(before)
            })
            .await
    }

    /// Undo a claim after a failed upload.
    pub async fn release_upload(&self, video_id: &str, status: VideoStatus) -> Result<(), ServiceError> {
        self.videos
            .update(|t| {
                if let Some(record) = t.videos.get_mut(video_id) {
                    if record.status == VideoStatus::Publishing {
                        record.status = status;
                        record.updated_at = Utc::now();
                    }
                }
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn mark_uploaded(&self, video_id: &str, youtube_id: &str, url: &str) -> Result<VideoRecord, ServiceError> {
        let updated = self
            .videos
            .update(|t| {
                let record = t
                    .videos
                    .get_mut(video_id)
                    .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;
                record.status = VideoStatus::Uploaded;
                record.youtube_id = Some(youtube_id.to_string());
                record.youtube_url = Some(url.to_string());
                record.updated_at = Utc::now();
                Ok::<_, ServiceError>(record.clone())
            })
            .await?;
        self.emit(&updated, "Uploaded to YouTube");
        Ok(updated)
    }

    fn job_dir(&self, video_id: &str) -> PathBuf {
        self.media_dir.join(video_id)
    }

    fn emit(&self, record: &VideoRecord, message: &str) {
        let _ = self.events.send(JobEvent {
            video_id: record.video_id.clone(),
            user_id: record.user_id.clone(),
            origin: record.origin,
            progress: record.progress,
            status: record.status,
            message: message.to_string(),
            notify_channel: record.notify_channel.clone(),
        });
    }

    /// Apply `f` to a record, persist, and broadcast the new state.
    async fn advance(
        &self,
        video_id: &str,
        message: &str,
        f: impl FnOnce(&mut VideoRecord),
    ) -> Result<VideoRecord, ServiceError> {
        let updated = self
            .videos
            .update(|t| {
                let record = t
                    .videos
                    .get_mut(video_id)
                    .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;
                f(record);
                record.updated_at = Utc::now();
                Ok::<_, ServiceError>(record.clone())
            })
            .await?;
        self.emit(&updated, message);
        Ok(updated)
    }

    async fn process(&self, video_id: &str, tools: &PipelineTools) {
        info!("[QUEUE] Processing job {}", video_id);
        if let Err(e) = self.run_pipeline(video_id, tools).await {
            error!("[QUEUE] Job {} failed: {}", video_id, e);
            let message = e.to_string();
            let result = self
                .advance(video_id, &format!("Video generation failed: {}", message), |r| {
                    r.status = VideoStatus::Failed;
                    r.error_message = Some(message.clone());
                })
                .await;
            if let Err(e) = result {
                error!("[QUEUE] Could not record failure for {}: {}", video_id, e);
            }
        }
    }

    async fn run_pipeline(&self, video_id: &str, tools: &PipelineTools) -> Result<(), ServiceError> {
        let record = self
            .advance(video_id, "Starting video generation", |r| {
                r.status = VideoStatus::Processing;
                r.progress = 10;
            })
            .await?;

        let dir = self.job_dir(video_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ServiceError::Internal(format!("Cannot create {:?}: {}", dir, e)))?;

        // 1. Script
        let script = match record.script.clone() {
            Some(s) if !s.trim().is_empty() => s,
            _ if record.origin == VideoOrigin::Automation => {
                tools.writer.script_from_topic(&record.brief.topic).await
            }
            _ => tools.writer.generate_script(&record.brief).await,
        };
        let script_path = dir.join("script.txt");
        tokio::fs::write(&script_path, &script)
            .await
            .map_err(|e| ServiceError::Internal(format!("Cannot write script: {}", e)))?;
        let script_for_record = script.clone();
        let script_path_for_record = script_path.clone();
        self.advance(video_id, "Script ready", move |r| {
            r.script = Some(script_for_record);
            r.script_path = Some(script_path_for_record);
            r.progress = 30;
        })
        .await?;

        // 2. Render
        let job = RenderJob {
            video_id: video_id.to_string(),
            title: record.brief.title.clone(),
            script_path: script_path.clone(),
            output_path: dir.join("video.mp4"),
        };
        let rendered = match tools.renderer.render(&job).await {
            Ok(path) => Some(path),
            Err(RenderError::Unavailable) => None,
            Err(e) => return Err(ServiceError::Upstream(e.to_string())),
        };

        match &rendered {
            Some(path) => {
                let path = path.clone();
                self.advance(video_id, "Video rendered", move |r| {
                    r.local_path = Some(path);
                    r.progress = 70;
                })
                .await?;

                // 3. Thumbnail (optional)
                let thumb = extract_thumbnail(&tools.ffmpeg, &job.output_path, &dir.join("thumbnail.jpg")).await;
                self.advance(video_id, "Thumbnail step finished", move |r| {
                    r.thumbnail_path = thumb;
                    r.progress = 85;
                })
                .await?;
            }
            None => {
                let placeholder = dir.join("placeholder.txt");
                let body = format!(
                    "No renderer is configured.\n\nTitle: {}\nTopic: {}\n\n{}",
                    record.brief.title, record.brief.topic, script
                );
                tokio::fs::write(&placeholder, body)
                    .await
                    .map_err(|e| ServiceError::Internal(format!("Cannot write placeholder: {}", e)))?;
                self.advance(video_id, "No renderer configured, saved script only", move |r| {
                    r.local_path = Some(placeholder);
                    r.progress = 85;
                })
                .await?;
            }
        }

        // 4. SEO
        let seo = tools
            .seo
            .optimize_video_metadata(&record.brief.title, &record.brief.description, &record.brief.topic)
            .await;
        self.advance(video_id, "SEO metadata ready", move |r| {
            r.seo = Some(seo);
            r.progress = 95;
        })
        .await?;

        // 5. Finalize
        let final_status = if rendered.is_some() {
            rendered_status(record.origin)
        } else {
            VideoStatus::Placeholder
        };
        let message = match final_status {
            VideoStatus::Placeholder => "Script and metadata saved; video rendering is unavailable",
            _ => "Video complete",
        };
        self.advance(video_id, message, move |r| {
            r.status = final_status;
            r.progress = 100;
            r.error_message = None;
        })
        .await?;

        info!("[QUEUE] Job {} finished as {:?}", video_id, final_status);
        Ok(())
    }
}

/// Automated videos wait for the user as `Prepared`.
fn rendered_status(origin: VideoOrigin) -> VideoStatus {
    match origin {
        VideoOrigin::Automation => VideoStatus::Prepared,
        _ => VideoStatus::Completed,
    }
}

pub fn compute_stats(videos: &[VideoRecord]) -> VideoStats {
    let count = |pred: fn(VideoStatus) -> bool| videos.iter().filter(|v| pred(v.status)).count();
    let total = videos.len();
    let completed = count(|s| matches!(s, VideoStatus::Completed | VideoStatus::Prepared | VideoStatus::Publishing));
    let uploaded = count(|s| s == VideoStatus::Uploaded);

    VideoStats {
        total_videos: total,
        completed_videos: completed,
        processing_videos: count(VideoStatus::is_active),
        failed_videos: count(|s| s == VideoStatus::Failed),
        uploaded_videos: uploaded,
        placeholder_videos: count(|s| s == VideoStatus::Placeholder),
        success_rate: if total == 0 {
            0.0
        } else {
            ((completed + uploaded) as f64 / total as f64 * 1000.0).round() / 10.0
        },
    }
}
