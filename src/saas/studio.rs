// TubeForge Studio - quota-checked video submission
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agent::render_queue::{RenderQueue, VideoRecord, VideoRequest};
use crate::error::ServiceError;
use crate::saas::subscription::SubscriptionManager;

/// Every path that creates a video (REST, chat, Slack, automation) goes
/// through here so the monthly limit and usage counters stay consistent.
pub struct Studio {
    queue: Arc<RenderQueue>,
    subscriptions: Arc<SubscriptionManager>,
}

impl Studio {
    pub fn new(queue: Arc<RenderQueue>, subscriptions: Arc<SubscriptionManager>) -> Self {
        Self { queue, subscriptions }
    }

    pub fn queue(&self) -> &Arc<RenderQueue> {
        &self.queue
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    pub async fn create_video(&self, user_id: &str, request: VideoRequest) -> Result<VideoRecord, ServiceError> {
        if request.brief.title.trim().is_empty() {
            return Err(ServiceError::BadRequest("Video title is required".to_string()));
        }
        if let Err(e) = self.subscriptions.reserve_video(user_id).await {
            warn!("[STUDIO] {} cannot create a video: {}", user_id, e);
            return Err(e);
        }

        let record = match self.queue.submit(user_id, request).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(release) = self.subscriptions.release_video(user_id).await {
                    error!("[STUDIO] Could not release video reservation for {}: {}", user_id, release);
                }
                return Err(e);
            }
        };
        info!("[STUDIO] 🎬 Queued '{}' as {}", record.brief.title, record.video_id);
        Ok(record)
    }
}
