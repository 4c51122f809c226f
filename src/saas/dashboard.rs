// TubeForge Admin Dashboard
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use tracing::warn;

use crate::agent::health::format_uptime;
use crate::agent::render_queue::{VideoRecord, VideoStatus};
use crate::error::ServiceError;
use crate::saas::accounts::User;
use crate::saas::subscription::{SubscriptionStats, Tier};

#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub total_users: usize,
    pub total_videos: usize,
    pub month_videos: usize,
    pub model: String,
    pub auto_mode: &'static str,
    pub auto_mode_users: usize,
    pub uptime: String,
    pub subscriptions: SubscriptionStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub status: VideoStatus,
    pub created: String,
    pub youtube_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub plan: Tier,
    pub video_count: usize,
    pub last_title: String,
    pub last_date: String,
    pub last_status: String,
    pub youtube_link: Option<String>,
    pub auto_mode: bool,
    pub recent_videos: Vec<VideoSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub global: GlobalStats,
    pub users: Vec<UserSummary>,
}

/// The dashboard is closed unless a secret is configured and matches.
pub fn verify_token(secret: Option<&str>, provided: Option<&str>) -> Result<(), ServiceError> {
    match (secret, provided) {
        (Some(secret), Some(token)) if !secret.is_empty() && secret == token => Ok(()),
        (_, token) => {
            let hint: String = token.unwrap_or("").chars().take(6).collect();
            warn!("[DASHBOARD] Rejected token attempt '{}...'", hint);
            Err(ServiceError::Forbidden("Invalid dashboard token.".to_string()))
        }
    }
}

pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub fn global_stats(
    total_users: usize,
    videos: &[VideoRecord],
    now: DateTime<Utc>,
    model: &str,
    auto_mode_users: usize,
    uptime_secs: u64,
    subscriptions: SubscriptionStats,
) -> GlobalStats {
    let start = month_start(now);
    GlobalStats {
        total_users,
        total_videos: videos.len(),
        month_videos: videos.iter().filter(|v| v.created_at >= start).count(),
        model: model.to_string(),
        auto_mode: if auto_mode_users > 0 { "ON" } else { "OFF" },
        auto_mode_users,
        uptime: format_uptime(uptime_secs),
        subscriptions,
    }
}

fn video_summary(video: &VideoRecord) -> VideoSummary {
    VideoSummary {
        video_id: video.video_id.clone(),
        title: video.brief.title.clone(),
        status: video.status,
        created: format_date(video.created_at),
        youtube_url: video.youtube_url.clone(),
    }
}

/// `videos` must be the user's videos, newest first.
pub fn user_summary(user: &User, plan: Tier, videos: &[VideoRecord], auto_mode: bool, recent: usize) -> UserSummary {
    let last = videos.first();
    UserSummary {
        user_id: user.user_id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        plan,
        video_count: videos.len(),
        last_title: last.map(|v| v.brief.title.clone()).unwrap_or_else(|| "No videos".to_string()),
        last_date: last.map(|v| format_date(v.created_at)).unwrap_or_else(|| "N/A".to_string()),
        last_status: last
            .map(|v| serde_json::to_value(v.status).ok().and_then(|s| s.as_str().map(str::to_string)).unwrap_or_default())
            .unwrap_or_else(|| "N/A".to_string()),
        youtube_link: last
            .and_then(|v| v.youtube_id.as_ref())
            .map(|id| format!("https://youtube.com/watch?v={}", id)),
        auto_mode,
        recent_videos: videos.iter().take(recent).map(video_summary).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::render_queue::VideoOrigin;
    use crate::agent::script_writer::VideoBrief;
    use chrono::Duration;

    fn video(id: &str, created_at: DateTime<Utc>, youtube: Option<&str>) -> VideoRecord {
        VideoRecord {
            video_id: id.into(),
            user_id: "u1".into(),
            brief: VideoBrief::from_topic(&format!("Title {}", id), "topic"),
            script: None,
            status: if youtube.is_some() { VideoStatus::Uploaded } else { VideoStatus::Completed },
            progress: 100,
            origin: VideoOrigin::Api,
            created_at,
            updated_at: created_at,
            script_path: None,
            local_path: None,
            thumbnail_path: None,
            seo: None,
            youtube_id: youtube.map(str::to_string),
            youtube_url: youtube.map(|y| format!("https://www.youtube.com/watch?v={}", y)),
            error_message: None,
            notify_channel: None,
        }
    }

    fn user() -> User {
        User {
            user_id: "u1".into(),
            email: "ada@example.com".into(),
            name: "Ada".into(),
            company: None,
            created_at: Utc::now(),
            is_active: true,
            token_digest: String::new(),
            youtube: None,
            slack_user_id: None,
        }
    }

    #[test]
    fn test_token_gate() {
        assert!(verify_token(Some("s3cret"), Some("s3cret")).is_ok());
        assert!(verify_token(Some("s3cret"), Some("nope")).is_err());
        assert!(verify_token(Some("s3cret"), None).is_err());
        assert!(verify_token(None, Some("anything")).is_err());
        assert!(verify_token(Some(""), Some("")).is_err());
    }

    #[test]
    fn test_month_videos_counted_from_first_of_month() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let videos = vec![
            video("a", now - Duration::days(1), None),
            video("b", Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap(), None),
            video("c", Utc.with_ymd_and_hms(2026, 9, 30, 23, 59, 0).unwrap(), None),
        ];
        let stats = global_stats(2, &videos, now, "m", 0, 90_000, SubscriptionStats {
            total_users: 0,
            active_subscriptions: 0,
            trial_subscriptions: 0,
            cancelled_subscriptions: 0,
            tier_distribution: Default::default(),
            monthly_revenue: 0.0,
            yearly_revenue: 0.0,
            total_monthly_revenue: 0.0,
        });
        assert_eq!(stats.total_videos, 3);
        assert_eq!(stats.month_videos, 2);
        assert_eq!(stats.auto_mode, "OFF");
        assert_eq!(stats.uptime, "1d 1h 0m");
    }

    #[test]
    fn test_user_summary_uses_newest_video() {
        let now = Utc::now();
        let videos = vec![
            video("new", now, Some("yt123")),
            video("mid", now - Duration::hours(1), None),
            video("old", now - Duration::hours(2), None),
            video("older", now - Duration::hours(3), None),
        ];
        let summary = user_summary(&user(), Tier::Starter, &videos, true, 3);
        assert_eq!(summary.video_count, 4);
        assert_eq!(summary.last_title, "Title new");
        assert_eq!(summary.last_status, "uploaded");
        assert_eq!(summary.youtube_link.as_deref(), Some("https://youtube.com/watch?v=yt123"));
        assert_eq!(summary.recent_videos.len(), 3);

        let empty = user_summary(&user(), Tier::Free, &[], false, 3);
        assert_eq!(empty.last_title, "No videos");
        assert_eq!(empty.last_date, "N/A");
    }
}
