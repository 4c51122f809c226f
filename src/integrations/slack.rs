// TubeForge Slack Bot
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Events API + interactive buttons. Slack users chat with the brain under
// `slack:<id>` unless they linked their Slack id to a TubeForge account, in
// which case they share the account's conversation and quota.

use hmac::{Hmac, Mac};
use regex::Regex;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::agent::brain::{Brain, Intent, VideoProject};
use crate::agent::render_queue::{JobEvent, VideoOrigin, VideoStatus};
use crate::config::SlackConfig;
use crate::error::ServiceError;
use crate::saas::accounts::AccountStore;
use crate::saas::studio::Studio;

/// Requests older than this are treated as replays.
pub const SIGNATURE_WINDOW_SECS: i64 = 300;

#[derive(Error, Debug)]
pub enum SlackError {
    #[error("Slack bot token is not configured")]
    NotConfigured,

    #[error("Slack request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Slack API error: {0}")]
    Api(String),
}

/// Check `X-Slack-Signature` against `v0:<timestamp>:<body>`.
pub fn verify_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str, now_secs: i64) -> bool {
    let Ok(ts) = timestamp.trim().parse::<i64>() else {
        return false;
    };
    if now_secs.abs_diff(ts) > SIGNATURE_WINDOW_SECS.unsigned_abs() {
        return false;
    }
    let Some(expected) = signature.strip_prefix("v0=").and_then(|hex_sig| hex::decode(hex_sig).ok()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("v0:{}:", ts).as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Sign a request body the way Slack does.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<@[A-Za-z0-9]+>").expect("mention pattern"))
}

pub fn strip_mentions(text: &str) -> String {
    mention_re().replace_all(text, "").split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn video_creation_blocks(project: &VideoProject) -> Value {
    json!([
        {
            "type": "header",
            "text": {"type": "plain_text", "text": "🎬 Create New Video"}
        },
        {
            "type": "section",
            "fields": [
                {"type": "mrkdwn", "text": format!("*Title:* {}", project.brief.title)},
                {"type": "mrkdwn", "text": format!("*Topic:* {}", project.brief.topic)},
                {"type": "mrkdwn", "text": format!("*Duration:* {} seconds", project.brief.duration)},
                {"type": "mrkdwn", "text": format!("*Style:* {}", project.brief.style)}
            ]
        },
        {
            "type": "actions",
            "elements": [
                {"type": "button", "text": {"type": "plain_text", "text": "Create Video"},
                 "value": "create_video", "action_id": "create_video_btn", "style": "primary"},
                {"type": "button", "text": {"type": "plain_text", "text": "Modify Script"},
                 "value": "modify_script", "action_id": "modify_script_btn"},
                {"type": "button", "text": {"type": "plain_text", "text": "Cancel"},
                 "value": "cancel", "action_id": "cancel_btn", "style": "danger"}
            ]
        }
    ])
}

pub struct SlackClient {
    client: reqwest::Client,
    bot_token: Option<String>,
    api_base: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some()
    }

    async fn call(&self, method: &str, payload: Value) -> Result<Value, SlackError> {
        let token = self.bot_token.as_ref().ok_or(SlackError::NotConfigured)?;
        let body: Value = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Slack reports failures in-band with HTTP 200.
        if body["ok"].as_bool() == Some(false) {
            let reason = body["error"].as_str().unwrap_or("unknown_error").to_string();
            return Err(SlackError::Api(reason));
        }
        Ok(body)
    }

    pub async fn post_message(&self, channel: &str, text: &str, mention: Option<&str>) -> Result<(), SlackError> {
        let text = match mention {
            Some(user) => format!("<@{}> {}", user, text),
            None => text.to_string(),
        };
        self.call("chat.postMessage", json!({"channel": channel, "text": text, "mrkdwn": true}))
            .await?;
        info!("[SLACK] Message sent to {}", channel);
        Ok(())
    }

    pub async fn post_blocks(&self, channel: &str, blocks: Value, mention: Option<&str>) -> Result<(), SlackError> {
        let mut payload = json!({"channel": channel, "blocks": blocks});
        if let Some(user) = mention {
            payload["text"] = json!(format!("<@{}>", user));
        }
        self.call("chat.postMessage", payload).await?;
        Ok(())
    }

    pub async fn open_dm(&self, user: &str) -> Result<String, SlackError> {
        let body = self.call("conversations.open", json!({"users": user})).await?;
        body["channel"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SlackError::Api("conversations.open returned no channel".to_string()))
    }

    pub async fn send_dm(&self, user: &str, text: &str) -> Result<(), SlackError> {
        let channel = self.open_dm(user).await?;
        self.post_message(&channel, text, None).await
    }
}

pub struct SlackBot {
    client: SlackClient,
    signing_secret: Option<String>,
    brain: Arc<Brain>,
    accounts: Arc<AccountStore>,
    studio: Arc<Studio>,
}

impl SlackBot {
    pub fn new(config: &SlackConfig, brain: Arc<Brain>, accounts: Arc<AccountStore>, studio: Arc<Studio>) -> Self {
        Self {
            client: SlackClient::new(config),
            signing_secret: config.signing_secret.clone(),
            brain,
            accounts,
            studio,
        }
    }

    pub fn signing_secret(&self) -> Option<&str> {
        self.signing_secret.as_deref()
    }

    /// Linked TubeForge account id, or the standalone `slack:<id>` key.
    async fn identity(&self, slack_user: &str) -> (String, bool) {
        match self.accounts.find_by_slack(slack_user).await {
            Some(user) => (user.user_id, true),
            None => (format!("slack:{}", slack_user), false),
        }
    }

    async fn reply(&self, channel: &str, text: &str, slack_user: Option<&str>) {
        if let Err(e) = self.client.post_message(channel, text, slack_user).await {
            warn!("[SLACK] Could not post to {}: {}", channel, e);
        }
    }

    async fn dm(&self, slack_user: &str, text: &str) {
        if let Err(e) = self.client.send_dm(slack_user, text).await {
            warn!("[SLACK] Could not DM {}: {}", slack_user, e);
        }
    }

    /// Answer the Events API envelope. Callbacks run in the background so
    /// Slack gets its acknowledgement within its timeout.
    pub fn handle_event(self: &Arc<Self>, payload: Value) -> Value {
        match payload["type"].as_str() {
            Some("url_verification") => json!({"challenge": payload["challenge"]}),
            Some("event_callback") => {
                let bot = self.clone();
                tokio::spawn(async move {
                    bot.process_event(&payload["event"]).await;
                });
                json!({"ok": true})
            }
            _ => json!({"ok": true}),
        }
    }

    pub async fn process_event(&self, event: &Value) {
        match event["type"].as_str() {
            Some("message") => {
                if event.get("bot_id").is_some() || event.get("subtype").is_some() {
                    return;
                }
                let (Some(user), Some(channel)) = (event["user"].as_str(), event["channel"].as_str()) else {
                    return;
                };
                let text = event["text"].as_str().unwrap_or("").trim();
                if text.is_empty() {
                    return;
                }
                self.converse(user, channel, text).await;
            }
            Some("app_mention") => {
                let (Some(user), Some(channel)) = (event["user"].as_str(), event["channel"].as_str()) else {
                    return;
                };
                let mut text = strip_mentions(event["text"].as_str().unwrap_or(""));
                if text.is_empty() {
                    text = "Hello! How can I help you create videos today?".to_string();
                }
                self.converse(user, channel, &text).await;
            }
            Some("reaction_added") => {
                let (Some(user), Some(reaction)) = (event["user"].as_str(), event["reaction"].as_str()) else {
                    return;
                };
                let channel = event["item"]["channel"].as_str().unwrap_or_default();
                self.handle_reaction(user, reaction, channel).await;
            }
            _ => {}
        }
    }

    async fn converse(&self, slack_user: &str, channel: &str, text: &str) {
        let (key, _) = self.identity(slack_user).await;
        match self.brain.process_message(&key, text, "slack").await {
            Ok(reply) => {
                self.reply(channel, &reply.text, Some(slack_user)).await;
                if reply.analysis.intent == Intent::CreateVideo {
                    if let Some(project) = self.brain.current_project(&key).await {
                        if let Err(e) = self
                            .client
                            .post_blocks(channel, video_creation_blocks(&project), Some(slack_user))
                            .await
                        {
                            warn!("[SLACK] Could not post project buttons: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error!("[SLACK] Brain failed for {}: {}", slack_user, e);
                self.reply(channel, "Sorry, I encountered an error. Please try again.", Some(slack_user))
                    .await;
            }
        }
    }

    async fn handle_reaction(&self, slack_user: &str, reaction: &str, channel: &str) {
        let (key, _) = self.identity(slack_user).await;
        match reaction {
            "video" => {
                self.reply(channel, "What topic would you like to create a video about?", Some(slack_user))
                    .await
            }
            "movie_camera" => {
                let text = self
                    .brain
                    .status_report(&key)
                    .await
                    .unwrap_or_else(|| "You don't have any active video projects.".to_string());
                self.reply(channel, &text, Some(slack_user)).await;
            }
            "play" => self.start_video_creation(slack_user, channel).await,
            _ => {}
        }
    }

    /// Button clicks from `POST /slack/interactive`.
    pub async fn handle_interactive(&self, payload: &Value) -> Value {
        let user = payload["user"]["id"].as_str().unwrap_or_default();
        let channel = payload["channel"]["id"].as_str().unwrap_or_default();
        let actions = payload["actions"].as_array().cloned().unwrap_or_default();

        for action in actions {
            match action["action_id"].as_str() {
                Some("create_video_btn") => self.start_video_creation(user, channel).await,
                Some("modify_script_btn") => {
                    let (key, _) = self.identity(user).await;
                    let text = match self.brain.current_project(&key).await.and_then(|p| p.script) {
                        Some(script) => format!("Current script:\n\n{}\n\nReply with your modifications.", script),
                        None => "No script available to modify.".to_string(),
                    };
                    self.reply(channel, &text, Some(user)).await;
                }
                Some("cancel_btn") => {
                    let (key, _) = self.identity(user).await;
                    self.brain.drop_project(&key).await;
                    self.reply(channel, "Video creation cancelled.", None).await;
                }
                other => info!("[SLACK] Ignoring action {:?}", other),
            }
        }
        json!({"ok": true})
    }

    async fn start_video_creation(&self, slack_user: &str, channel: &str) {
        let (key, linked) = self.identity(slack_user).await;
        if !linked {
            self.reply(
                channel,
                "Link your Slack user id in your TubeForge profile to create videos from Slack.",
                Some(slack_user),
            )
            .await;
            return;
        }

        match self.submit(&key, slack_user).await {
            Ok(title) => {
                self.dm(
                    slack_user,
                    &format!(
                        "🎬 Starting video creation for: *{}*\n\nThis will take a few minutes. I'll notify you when it's ready!",
                        title
                    ),
                )
                .await
            }
            Err(ServiceError::BadRequest(_)) => {
                self.reply(channel, "Please create a video project first.", Some(slack_user)).await
            }
            Err(e) => {
                warn!("[SLACK] Video creation refused for {}: {}", slack_user, e);
                self.reply(channel, &format!("Sorry, I couldn't start video creation: {}", e), Some(slack_user))
                    .await;
            }
        }
    }

    async fn submit(&self, user_id: &str, slack_user: &str) -> Result<String, ServiceError> {
        let request = self
            .brain
            .pending_video_request(user_id, VideoOrigin::Slack, Some(slack_user.to_string()))
            .await?;
        let title = request.brief.title.clone();
        let record = self.studio.create_video(user_id, request).await?;
        self.brain.attach_video(user_id, &record.video_id).await;
        Ok(title)
    }

    /// DM the requester when a Slack-originated job settles.
    pub async fn notify(&self, event: &JobEvent) {
        let settled = event.progress >= 100 || event.status == VideoStatus::Failed;
        if event.origin != VideoOrigin::Slack || !settled {
            return;
        }
        let Some(slack_user) = event.notify_channel.as_deref() else {
            return;
        };
        let text = match event.status {
            VideoStatus::Completed => format!(
                "✅ *Video Creation Complete!*\n\n**Video:** {}\n**Status:** Ready for upload\n\n\
Publish it from your TubeForge dashboard when you're ready.",
                event.video_id
            ),
            VideoStatus::Placeholder => format!("⚠️ {}. The script and SEO metadata are saved.", event.message),
            VideoStatus::Failed => format!("❌ {}", event.message),
            _ => return,
        };
        self.dm(slack_user, &text).await;
    }
}
