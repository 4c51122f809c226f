// TubeForge WebSocket Chat
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// One socket per browser tab. A writer task owns the sink; the reader loop
// and the job-event forwarder both push frames to it through a channel.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

use crate::agent::brain::{ProjectStatus, VideoProject};
use crate::agent::render_queue::{JobEvent, VideoOrigin, VideoStatus};
use crate::error::ServiceError;
use crate::server::AuthUser;
use crate::state::SharedState;

pub const CHUNK_SIZE: usize = 50;
const CHUNK_DELAY: Duration = Duration::from_millis(100);

const WELCOME: &str = "Hello! I'm your AI assistant for creating YouTube videos. How can I help you today?";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// Server -> client frames. Each is sent as JSON with a `type` tag and a
/// `timestamp`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    Message { sender: Sender, content: String },
    MessageChunk { sender: Sender, content: String, is_partial: bool },
    Typing { sender: Sender },
    Error { content: String },
    VideoPrompt { content: String },
    VideoStatus { project: VideoProject },
    ScriptEdit { script: String, content: String },
    VideoProgress { video_id: String, content: String, progress: u8 },
    VideoComplete { video_id: String, content: String },
    VideoError { video_id: String, content: String },
    UploadStatus { content: String },
    UploadPrompt { video_id: String, content: String },
}

impl ChatFrame {
    fn assistant(content: impl Into<String>) -> Self {
        ChatFrame::Message {
            sender: Sender::Assistant,
            content: content.into(),
        }
    }

    fn encode(&self) -> Option<String> {
        let mut value = serde_json::to_value(self).ok()?;
        value["timestamp"] = json!(Utc::now().to_rfc3339());
        Some(value.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct Inbound {
    #[serde(default)]
    content: String,
}

/// What the user asked for beyond the brain's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    RequestVideo,
    StartCreation,
    EditScript,
    Upload,
}

fn patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"(?s)```.*?```").expect("code block pattern"), ""),
            (Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"), "$1"),
            (Regex::new(r"__(.*?)__").expect("bold pattern"), "$1"),
            (Regex::new(r"\*(.*?)\*").expect("italic pattern"), "$1"),
            (Regex::new(r"\b_(.*?)_\b").expect("italic pattern"), "$1"),
            (Regex::new(r"`(.*?)`").expect("code pattern"), "$1"),
            (Regex::new(r"(?m)^#+\s*").expect("header pattern"), ""),
            (Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("link pattern"), "$1"),
        ]
    })
}

/// Drop markdown emphasis, code, headers and link targets.
pub fn strip_markdown(content: &str) -> String {
    let mut out = content.to_string();
    for (pattern, replacement) in patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

/// Greedy word packing; a single word longer than `size` gets its own chunk.
pub fn split_into_chunks(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > size {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn detect_follow_up(message: &str) -> Option<FollowUp> {
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |list: &[&str]| words.iter().any(|w| list.contains(w));

    if ["create video", "make video", "generate video", "new video"]
        .iter()
        .any(|p| lower.contains(p))
    {
        Some(FollowUp::RequestVideo)
    } else if has(&["start", "begin", "go", "yes"]) {
        Some(FollowUp::StartCreation)
    } else if has(&["modify", "change", "edit", "script"]) {
        Some(FollowUp::EditScript)
    } else if has(&["upload", "publish"]) {
        Some(FollowUp::Upload)
    } else {
        None
    }
}

/// Frames pushed to the owner for a queue event.
pub fn event_frames(event: &JobEvent) -> Vec<ChatFrame> {
    let video_id = event.video_id.clone();
    match event.status {
        VideoStatus::Pending | VideoStatus::Processing => vec![ChatFrame::VideoProgress {
            video_id,
            content: event.message.clone(),
            progress: event.progress,
        }],
        VideoStatus::Completed | VideoStatus::Prepared => vec![
            ChatFrame::VideoComplete {
                video_id: video_id.clone(),
                content: "🎉 Your video is ready!".to_string(),
            },
            ChatFrame::UploadPrompt {
                content: format!(
                    "Would you like to upload it to YouTube? Use POST /api/videos/{}/upload when you're ready.",
                    video_id
                ),
                video_id,
            },
        ],
        VideoStatus::Placeholder | VideoStatus::Failed => vec![ChatFrame::VideoError {
            video_id,
            content: event.message.clone(),
        }],
        VideoStatus::Publishing | VideoStatus::Uploaded => vec![ChatFrame::UploadStatus {
            content: event.message.clone(),
        }],
    }
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, state, user.user_id))
}

type Outbox = mpsc::UnboundedSender<ChatFrame>;

async fn run_session(socket: WebSocket, state: SharedState, user_id: String) {
    info!("[CHAT] {} connected", user_id);
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ChatFrame>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let Some(text) = frame.encode() else { continue };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let forwarder = {
        let tx = tx.clone();
        let mut events = state.queue.subscribe();
        let user_id = user_id.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.user_id == user_id => {
                        for frame in event_frames(&event) {
                            if tx.send(frame).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!("[CHAT] {} missed {} job event(s)", user_id, n),
                    Err(RecvError::Closed) => return,
                }
            }
        })
    };

    let _ = tx.send(ChatFrame::assistant(WELCOME));

    while let Some(incoming) = stream.next().await {
        let text = match incoming {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("[CHAT] Socket error for {}: {}", user_id, e);
                break;
            }
        };
        let content = match serde_json::from_str::<Inbound>(&text) {
            Ok(inbound) => inbound.content,
            Err(_) => text,
        };
        if content.trim().is_empty() {
            continue;
        }
        handle_message(&state, &user_id, &content, &tx).await;
    }

    forwarder.abort();
    drop(tx);
    let _ = writer.await;
    info!("[CHAT] {} disconnected", user_id);
}

async fn handle_message(state: &SharedState, user_id: &str, content: &str, tx: &Outbox) {
    let _ = tx.send(ChatFrame::Message {
        sender: Sender::User,
        content: strip_markdown(content),
    });
    let _ = tx.send(ChatFrame::Typing {
        sender: Sender::Assistant,
    });

    let reply = match state.brain.process_message(user_id, content, "web").await {
        Ok(reply) => reply,
        Err(e) => {
            error!("[CHAT] Brain failed for {}: {}", user_id, e);
            let _ = tx.send(ChatFrame::Error {
                content: "Sorry, I encountered an error while processing your message.".to_string(),
            });
            return;
        }
    };

    let chunks = split_into_chunks(&reply.text, CHUNK_SIZE);
    let last = chunks.len().saturating_sub(1);
    for (i, chunk) in chunks.into_iter().enumerate() {
        let frame = if i < last {
            ChatFrame::MessageChunk {
                sender: Sender::Assistant,
                content: chunk,
                is_partial: true,
            }
        } else {
            ChatFrame::assistant(chunk)
        };
        let _ = tx.send(frame);
        if i < last {
            tokio::time::sleep(CHUNK_DELAY).await;
        }
    }

    if let Some(follow_up) = detect_follow_up(content) {
        if let Some(frame) = follow_up_frame(state, user_id, follow_up).await {
            let _ = tx.send(frame);
        }
    }
}

async fn follow_up_frame(state: &SharedState, user_id: &str, follow_up: FollowUp) -> Option<ChatFrame> {
    let project = state.brain.current_project(user_id).await;
    match follow_up {
        FollowUp::RequestVideo => Some(match project {
            Some(project) => ChatFrame::VideoStatus { project },
            None => ChatFrame::VideoPrompt {
                content: "What topic would you like to create a video about?".to_string(),
            },
        }),
        FollowUp::StartCreation => {
            let project = project?;
            if project.status != ProjectStatus::ScriptGenerated || project.video_id.is_some() {
                return None;
            }
            Some(match start_creation(state, user_id).await {
                Ok((video_id, title)) => ChatFrame::VideoProgress {
                    video_id,
                    content: format!("🎬 Starting video creation for: {}", title),
                    progress: 0,
                },
                Err(e) => {
                    warn!("[CHAT] Could not start video for {}: {}", user_id, e);
                    ChatFrame::Error {
                        content: format!("Sorry, I couldn't start video creation: {}", e),
                    }
                }
            })
        }
        FollowUp::EditScript => {
            let script = project?.script?;
            Some(ChatFrame::ScriptEdit {
                script,
                content: "Here's your current script. Reply with your modifications:".to_string(),
            })
        }
        FollowUp::Upload => Some(match project {
            Some(VideoProject {
                status: ProjectStatus::VideoCreated,
                video_id: Some(video_id),
                ..
            }) => ChatFrame::UploadPrompt {
                content: format!("Your video is ready. Publish it with POST /api/videos/{}/upload.", video_id),
                video_id,
            },
            Some(VideoProject {
                status: ProjectStatus::Uploaded,
                ..
            }) => ChatFrame::UploadStatus {
                content: "This video is already on YouTube.".to_string(),
            },
            _ => ChatFrame::UploadStatus {
                content: "Your video needs to be created first before uploading to YouTube.".to_string(),
            },
        }),
    }
}

async fn start_creation(state: &SharedState, user_id: &str) -> Result<(String, String), ServiceError> {
    let request = state
        .brain
        .pending_video_request(user_id, VideoOrigin::Chat, None)
        .await?;
    let title = request.brief.title.clone();
    let record = state.studio.create_video(user_id, request).await?;
    state.brain.attach_video(user_id, &record.video_id).await;
    Ok((record.video_id, title))
}
