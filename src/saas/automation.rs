// TubeForge Upload Automation Scheduler
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Users pick a niche, weekdays and a time of day (UTC). A polling loop
// creates an automated video for every user whose `next_upload` has passed.
// Automated videos end as `prepared`; publishing stays a user action.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agent::render_queue::{VideoOrigin, VideoRequest};
use crate::agent::script_writer::VideoBrief;
use crate::error::ServiceError;
use crate::saas::studio::Studio;
use crate::store::{JsonStore, StoreError};

pub const DEFAULT_UPLOAD_TIME: &str = "09:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl UploadDay {
    pub fn weekday(self) -> Weekday {
        match self {
            UploadDay::Monday => Weekday::Mon,
            UploadDay::Tuesday => Weekday::Tue,
            UploadDay::Wednesday => Weekday::Wed,
            UploadDay::Thursday => Weekday::Thu,
            UploadDay::Friday => Weekday::Fri,
            UploadDay::Saturday => Weekday::Sat,
            UploadDay::Sunday => Weekday::Sun,
        }
    }

    /// Accepts full names or three-letter abbreviations, any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let day = match raw.trim().parse::<Weekday>().ok()? {
            Weekday::Mon => UploadDay::Monday,
            Weekday::Tue => UploadDay::Tuesday,
            Weekday::Wed => UploadDay::Wednesday,
            Weekday::Thu => UploadDay::Thursday,
            Weekday::Fri => UploadDay::Friday,
            Weekday::Sat => UploadDay::Saturday,
            Weekday::Sun => UploadDay::Sunday,
        };
        Some(day)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationSettings {
    pub enabled: bool,
    pub niche: String,
    pub frequency: String,
    pub upload_days: Vec<UploadDay>,
    pub upload_time: String,
    pub last_upload: Option<DateTime<Utc>>,
    pub next_upload: Option<DateTime<Utc>>,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            niche: String::new(),
            frequency: "weekly".to_string(),
            upload_days: Vec::new(),
            upload_time: DEFAULT_UPLOAD_TIME.to_string(),
            last_upload: None,
            next_upload: None,
        }
    }
}

/// Body of `PUT /api/automation`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutomationInput {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub niche: String,
    pub frequency: Option<String>,
    #[serde(default)]
    pub upload_days: Vec<UploadDay>,
    pub upload_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationTable {
    pub users: BTreeMap<String, AutomationSettings>,
}

pub fn parse_upload_time(raw: &str) -> Result<NaiveTime, ServiceError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ServiceError::BadRequest(format!("Invalid upload time '{}', expected HH:MM", raw)))
}

/// Earliest instant strictly after `now` that lands on one of `days` at `time`.
pub fn next_upload_after(days: &[UploadDay], time: NaiveTime, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if days.is_empty() {
        return None;
    }
    let today = now.date_naive();
    (0..=7)
        .map(|offset| today + Duration::days(offset))
        .filter(|date| days.iter().any(|d| d.weekday() == date.weekday()))
        .map(|date| Utc.from_utc_datetime(&date.and_time(time)))
        .find(|candidate| *candidate > now)
}

fn schedule_for(settings: &AutomationSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !settings.enabled {
        return None;
    }
    let time = parse_upload_time(&settings.upload_time).ok()?;
    next_upload_after(&settings.upload_days, time, now)
}

pub fn automated_request(niche: &str) -> VideoRequest {
    let niche = niche.trim();
    let mut title_niche = String::new();
    for (i, word) in niche.split_whitespace().enumerate() {
        if i > 0 {
            title_niche.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            title_niche.extend(first.to_uppercase());
            title_niche.push_str(&chars.as_str().to_lowercase());
        }
    }

    let mut brief = VideoBrief::from_topic(
        &format!("Automated {} Video", title_niche),
        &format!("Latest trends in {}", niche),
    );
    brief.description = format!("Automated video about {} topics", niche);
    brief.tags = vec![niche.to_string(), "automated".to_string(), "trending".to_string()];

    VideoRequest {
        brief,
        script: None,
        origin: VideoOrigin::Automation,
        notify_channel: None,
    }
}

pub struct AutomationManager {
    settings: JsonStore<AutomationTable>,
    is_running: Arc<AtomicBool>,
}

impl AutomationManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            settings: JsonStore::open(path)?,
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub async fn get(&self, user_id: &str) -> AutomationSettings {
        self.settings
            .read(|t| t.users.get(user_id).cloned().unwrap_or_default())
            .await
    }

    pub async fn all(&self) -> BTreeMap<String, AutomationSettings> {
        self.settings.read(|t| t.users.clone()).await
    }

    pub async fn enabled_count(&self) -> usize {
        self.settings.read(|t| t.users.values().filter(|s| s.enabled).count()).await
    }

    pub async fn save_settings(&self, user_id: &str, input: AutomationInput, now: DateTime<Utc>) -> Result<AutomationSettings, ServiceError> {
        let niche = input.niche.trim().to_string();
        if niche.is_empty() {
            return Err(ServiceError::BadRequest("Video niche is required".to_string()));
        }
        if input.upload_days.is_empty() {
            return Err(ServiceError::BadRequest("At least one upload day is required".to_string()));
        }
        let upload_time = input.upload_time.unwrap_or_else(|| DEFAULT_UPLOAD_TIME.to_string());
        parse_upload_time(&upload_time)?;

        let mut days: Vec<UploadDay> = Vec::new();
        for day in input.upload_days {
            if !days.contains(&day) {
                days.push(day);
            }
        }

        let previous = self.get(user_id).await;
        let mut settings = AutomationSettings {
            enabled: input.enabled.unwrap_or(true),
            niche,
            frequency: input.frequency.unwrap_or_else(|| "weekly".to_string()),
            upload_days: days,
            upload_time,
            last_upload: previous.last_upload,
            next_upload: None,
        };
        settings.next_upload = schedule_for(&settings, now);

        let stored = settings.clone();
        self.settings
            .update(|t| {
                t.users.insert(user_id.to_string(), stored);
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!(
            "[SCHEDULER] Saved automation for {} (next: {:?})",
            user_id, settings.next_upload
        );
        Ok(settings)
    }

    pub async fn set_enabled(&self, user_id: &str, enabled: bool, now: DateTime<Utc>) -> Result<AutomationSettings, ServiceError> {
        self.settings
            .update(|t| {
                let settings = t.users.entry(user_id.to_string()).or_default();
                if enabled && (settings.niche.is_empty() || settings.upload_days.is_empty()) {
                    return Err(ServiceError::BadRequest(
                        "Configure a niche and upload days before enabling automation".to_string(),
                    ));
                }
                settings.enabled = enabled;
                settings.next_upload = schedule_for(settings, now);
                Ok(settings.clone())
            })
            .await
    }

    /// Create videos for every due user. Returns how many were queued.
    pub async fn run_due(&self, studio: &Studio, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let due: Vec<(String, String)> = self
            .settings
            .read(|t| {
                t.users
                    .iter()
                    .filter(|(_, s)| s.enabled && s.next_upload.map(|n| n <= now).unwrap_or(false))
                    .map(|(user, s)| (user.clone(), s.niche.clone()))
                    .collect()
            })
            .await;

        let mut created = 0;
        for (user_id, niche) in due {
            info!("[SCHEDULER] ⏰ Automated video due for {} ({})", user_id, niche);
            match studio.create_video(&user_id, automated_request(&niche)).await {
                Ok(record) => {
                    created += 1;
                    info!("[SCHEDULER] Queued {} for {}", record.video_id, user_id);
                }
                Err(e) => warn!("[SCHEDULER] Skipped run for {}: {}", user_id, e),
            }

            // Advance the schedule even when the run was skipped.
            self.settings
                .update(|t| {
                    if let Some(s) = t.users.get_mut(&user_id) {
                        s.last_upload = Some(now);
                        s.next_upload = schedule_for(s, now);
                    }
                    Ok::<_, ServiceError>(())
                })
                .await?;
        }
        Ok(created)
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Spawn the polling loop. Each tick also refreshes subscription lifecycles.
    pub fn start(self: &Arc<Self>, studio: Arc<Studio>, tick_secs: u64) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            info!("[SCHEDULER] Already running.");
            return;
        }
        let manager = self.clone();
        let is_running = self.is_running.clone();

        tokio::spawn(async move {
            info!("[SCHEDULER] 🚀 Automation loop started ({}s tick)", tick_secs);
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs.max(1)));

            while is_running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }
                let now = Utc::now();
                if let Err(e) = studio.subscriptions().refresh_all(now).await {
                    error!("[SCHEDULER] Subscription refresh failed: {}", e);
                }
                if let Err(e) = manager.run_due(&studio, now).await {
                    error!("[SCHEDULER] Automation run failed: {}", e);
                }
            }

            info!("[SCHEDULER] 🛑 Loop stopped");
        });
    }

    pub fn stop(&self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap())
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_next_upload_today_when_time_ahead() {
        // 2026-10-19 is a Monday
        let now = at(2026, 10, 19, 8, 0);
        let next = next_upload_after(&[UploadDay::Monday], nine(), now).unwrap();
        assert_eq!(next, at(2026, 10, 19, 9, 0));
    }

    #[test]
    fn test_next_upload_skips_today_once_passed() {
        let now = at(2026, 10, 19, 9, 0);
        let next = next_upload_after(&[UploadDay::Monday], nine(), now).unwrap();
        assert_eq!(next, at(2026, 10, 26, 9, 0));

        let next = next_upload_after(&[UploadDay::Monday, UploadDay::Wednesday], nine(), now).unwrap();
        assert_eq!(next, at(2026, 10, 21, 9, 0));
    }

    #[test]
    fn test_next_upload_wraps_week() {
        // Saturday evening -> Sunday
        let now = at(2026, 10, 24, 20, 0);
        let next = next_upload_after(&[UploadDay::Sunday, UploadDay::Friday], nine(), now).unwrap();
        assert_eq!(next, at(2026, 10, 25, 9, 0));
        assert!(next_upload_after(&[], nine(), now).is_none());
    }

    #[test]
    fn test_upload_day_and_time_parsing() {
        assert_eq!(UploadDay::parse("Friday"), Some(UploadDay::Friday));
        assert_eq!(UploadDay::parse("sat"), Some(UploadDay::Saturday));
        assert_eq!(UploadDay::parse("someday"), None);
        assert!(parse_upload_time("25:00").is_err());
        assert!(parse_upload_time("9am").is_err());
        assert!(parse_upload_time("18:30").is_ok());
    }

    #[test]
    fn test_automated_request_shape() {
        let req = automated_request("home fitness");
        assert_eq!(req.brief.title, "Automated Home Fitness Video");
        assert_eq!(req.brief.topic, "Latest trends in home fitness");
        assert_eq!(req.brief.tags, vec!["home fitness", "automated", "trending"]);
        assert_eq!(req.origin, VideoOrigin::Automation);
    }

    #[tokio::test]
    async fn test_save_validation_and_toggle() {
        let dir = tempfile::TempDir::new().unwrap();
        let auto = AutomationManager::open(dir.path().join("automation.json")).unwrap();
        let now = at(2026, 10, 19, 8, 0);

        let missing_niche = AutomationInput {
            enabled: None,
            niche: " ".into(),
            frequency: None,
            upload_days: vec![UploadDay::Monday],
            upload_time: None,
        };
        assert!(matches!(
            auto.save_settings("u1", missing_niche, now).await,
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            auto.set_enabled("u1", true, now).await,
            Err(ServiceError::BadRequest(_))
        ));

        let saved = auto
            .save_settings(
                "u1",
                AutomationInput {
                    enabled: None,
                    niche: "cooking".into(),
                    frequency: None,
                    upload_days: vec![UploadDay::Monday],
                    upload_time: None,
                },
                now,
            )
            .await
            .unwrap();
        assert!(saved.enabled);
        assert_eq!(saved.upload_time, "09:00");
        assert_eq!(saved.next_upload, Some(at(2026, 10, 19, 9, 0)));
        assert_eq!(auto.enabled_count().await, 1);

        let off = auto.set_enabled("u1", false, now).await.unwrap();
        assert!(off.next_upload.is_none());
        assert_eq!(auto.enabled_count().await, 0);
    }
}
