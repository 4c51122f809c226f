// TubeForge Runtime Configuration
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Everything is read from the process environment (after `.env` has been
// loaded by the binary). Invalid values fall back to defaults with a warning.

use std::path::PathBuf;
use tracing::warn;

pub const DEFAULT_OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "moonshotai/kimi-k2:free";
pub const DEFAULT_SLACK_API: &str = "https://slack.com/api";
pub const DEFAULT_YOUTUBE_API: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_YOUTUBE_UPLOAD: &str = "https://www.googleapis.com/upload/youtube/v3";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub referer: String,
    pub app_title: String,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: Option<String>,
    pub signing_secret: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_base: String,
    pub upload_base: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub media_dir: PathBuf,
    pub llm: LlmConfig,
    pub render_command: Option<PathBuf>,
    pub ffmpeg: String,
    pub slack: SlackConfig,
    pub youtube: YouTubeConfig,
    pub dashboard_secret: Option<String>,
    pub scheduler_tick_secs: u64,
    pub health_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = PathBuf::from(get("TUBEFORGE_DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let media_dir = get("TUBEFORGE_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("videos"));

        Self {
            host: get("TUBEFORGE_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("TUBEFORGE_PORT", get("TUBEFORGE_PORT"), 8000),
            data_dir,
            media_dir,
            llm: LlmConfig {
                api_key: get("OPENROUTER_API_KEY"),
                base_url: base_url_or("OPENROUTER_BASE_URL", get("OPENROUTER_BASE_URL"), DEFAULT_OPENROUTER_BASE),
                model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout_secs: parse_or("TUBEFORGE_LLM_TIMEOUT_SECS", get("TUBEFORGE_LLM_TIMEOUT_SECS"), 30),
                referer: get("TUBEFORGE_PUBLIC_URL").unwrap_or_else(|| "http://localhost:8000".to_string()),
                app_title: "TubeForge".to_string(),
            },
            render_command: get("TUBEFORGE_RENDER_CMD").map(PathBuf::from),
            ffmpeg: get("TUBEFORGE_FFMPEG").unwrap_or_else(|| "ffmpeg".to_string()),
            slack: SlackConfig {
                bot_token: get("SLACK_BOT_TOKEN"),
                signing_secret: get("SLACK_SIGNING_SECRET"),
                api_base: base_url_or("SLACK_API_BASE", get("SLACK_API_BASE"), DEFAULT_SLACK_API),
            },
            youtube: YouTubeConfig {
                api_base: base_url_or("YOUTUBE_API_BASE", get("YOUTUBE_API_BASE"), DEFAULT_YOUTUBE_API),
                upload_base: base_url_or("YOUTUBE_UPLOAD_BASE", get("YOUTUBE_UPLOAD_BASE"), DEFAULT_YOUTUBE_UPLOAD),
            },
            dashboard_secret: get("DASHBOARD_SECRET"),
            scheduler_tick_secs: parse_or("TUBEFORGE_SCHEDULER_TICK_SECS", get("TUBEFORGE_SCHEDULER_TICK_SECS"), 60).max(1),
            health_interval_secs: parse_or("TUBEFORGE_HEALTH_INTERVAL_SECS", get("TUBEFORGE_HEALTH_INTERVAL_SECS"), 30).max(1),
        }
    }

    /// Defaults rooted at `data_dir`, with every external collaborator unset.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut config = Self::from_lookup(|_| None);
        config.media_dir = data_dir.join("videos");
        config.data_dir = data_dir;
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("[CONFIG] {}={} is not valid, using {}", key, value, default);
            default
        }),
        None => default,
    }
}

fn base_url_or(key: &str, raw: Option<String>, default: &str) -> String {
    match raw {
        Some(value) => match url::Url::parse(&value) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                value.trim_end_matches('/').to_string()
            }
            _ => {
                warn!("[CONFIG] {}={} is not an http(s) URL, using {}", key, value, default);
                default.to_string()
            }
        },
        None => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.port, 8000);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.media_dir, PathBuf::from("data").join("videos"));
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert!(config.llm.api_key.is_none());
        assert!(config.dashboard_secret.is_none());
        assert_eq!(config.scheduler_tick_secs, 60);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TUBEFORGE_PORT", "not-a-port"),
            ("OPENROUTER_API_KEY", "  sk-test  "),
            ("OPENROUTER_BASE_URL", "http://127.0.0.1:9999/v1/"),
            ("SLACK_API_BASE", "ftp://nope"),
            ("SLACK_BOT_TOKEN", ""),
        ]));
        assert_eq!(config.port, 8000);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "http://127.0.0.1:9999/v1");
        assert_eq!(config.slack.api_base, DEFAULT_SLACK_API);
        assert!(config.slack.bot_token.is_none());
    }
}
