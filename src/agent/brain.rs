// TubeForge Brain - Intent Classification & Conversation State
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agent::llm_bridge::{complete_json, LanguageModel};
use crate::agent::memory::{ConversationRecord, MemoryBank, MemoryEntry};
use crate::agent::render_queue::{JobEvent, VideoOrigin, VideoRequest, VideoStatus};
use crate::agent::script_writer::{ScriptWriter, VideoBrief};
use crate::error::ServiceError;

const MAX_HISTORY: usize = 50;
const HYDRATE_TURNS: usize = 5;

/// Intents that the Brain can classify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CreateVideo,
    ModifyScript,
    GetStatus,
    UploadVideo,
    Help,
    GeneralChat,
}

impl Intent {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "create_video" => Intent::CreateVideo,
            "modify_script" => Intent::ModifyScript,
            "get_status" => Intent::GetStatus,
            "upload_video" => Intent::UploadVideo,
            "help" => Intent::Help,
            _ => Intent::GeneralChat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateVideo => "create_video",
            Intent::ModifyScript => "modify_script",
            Intent::GetStatus => "get_status",
            Intent::UploadVideo => "upload_video",
            Intent::Help => "help",
            Intent::GeneralChat => "general_chat",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentAnalysis {
    pub intent: Intent,
    pub confidence: f32,
    pub parameters: Value,
    pub suggested_actions: Vec<String>,
}

impl IntentAnalysis {
    fn new(intent: Intent, confidence: f32, action: &str) -> Self {
        Self {
            intent,
            confidence,
            parameters: json!({}),
            suggested_actions: vec![action.to_string()],
        }
    }

    fn from_llm(value: &Value) -> Option<Self> {
        let intent = Intent::parse(value["intent"].as_str()?);
        Some(Self {
            intent,
            confidence: value["confidence"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0) as f32,
            parameters: value
                .get("parameters")
                .filter(|p| p.is_object())
                .cloned()
                .unwrap_or_else(|| json!({})),
            suggested_actions: value["suggested_actions"]
                .as_array()
                .map(|a| a.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    ScriptGenerated,
    VideoCreated,
    Uploaded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoProject {
    #[serde(flatten)]
    pub brief: VideoBrief,
    pub script: Option<String>,
    pub status: ProjectStatus,
    pub video_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationContext {
    pub user_id: String,
    pub history: VecDeque<ChatTurn>,
    pub current_project: Option<VideoProject>,
    pub preferences: BTreeMap<String, String>,
    pub last_interaction: DateTime<Utc>,
}

impl ConversationContext {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            history: VecDeque::new(),
            current_project: None,
            preferences: BTreeMap::new(),
            last_interaction: Utc::now(),
        }
    }

    fn push(&mut self, role: TurnRole, content: &str) {
        self.history.push_back(ChatTurn {
            role,
            content: content.to_string(),
            at: Utc::now(),
        });
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        self.last_interaction = Utc::now();
    }

    fn project_summary(&self) -> String {
        match &self.current_project {
            Some(p) => format!(
                "Active project '{}' about '{}' (status: {:?}, script: {})",
                p.brief.title,
                p.brief.topic,
                p.status,
                if p.script.is_some() { "yes" } else { "no" }
            ),
            None => "No active project".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrainReply {
    pub text: String,
    pub analysis: IntentAnalysis,
}

/// The Central Brain of TubeForge
pub struct Brain {
    writer: Arc<ScriptWriter>,
    memory: Arc<MemoryBank>,
    contexts: Mutex<HashMap<String, Arc<Mutex<ConversationContext>>>>,
}

impl Brain {
    pub fn new(writer: Arc<ScriptWriter>, memory: Arc<MemoryBank>) -> Self {
        Self {
            writer,
            memory,
            contexts: Mutex::new(HashMap::new()),
        }
    }

    fn llm(&self) -> &dyn LanguageModel {
        self.writer.llm().as_ref()
    }

    /// Fast heuristic classification, used whenever the LLM is unavailable.
    pub fn fast_classify(message: &str) -> IntentAnalysis {
        let lower = message.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if has_any(&["help", "what can you do"]) {
            IntentAnalysis::new(Intent::Help, 0.9, "show_help")
        } else if has_any(&["create", "make", "generate", "new video"]) {
            IntentAnalysis::new(Intent::CreateVideo, 0.8, "ask_for_topic")
        } else if has_any(&["script", "modify", "change", "edit"]) {
            IntentAnalysis::new(Intent::ModifyScript, 0.7, "show_current_script")
        } else if has_any(&["status", "progress", "how"]) {
            IntentAnalysis::new(Intent::GetStatus, 0.9, "show_status")
        } else if has_any(&["upload", "youtube", "publish"]) {
            IntentAnalysis::new(Intent::UploadVideo, 0.8, "check_ready_to_upload")
        } else {
            IntentAnalysis::new(Intent::GeneralChat, 0.5, "provide_help")
        }
    }

    async fn context_for(&self, user_id: &str) -> Arc<Mutex<ConversationContext>> {
        if let Some(ctx) = self.contexts.lock().await.get(user_id) {
            return ctx.clone();
        }

        let mut ctx = ConversationContext::new(user_id);
        for record in self.memory.conversation_history(user_id, HYDRATE_TURNS).await {
            ctx.push(TurnRole::User, &record.message);
            ctx.push(TurnRole::Assistant, &record.response);
        }
        ctx.preferences = self.memory.preferences(user_id).await;

        self.contexts
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ctx)))
            .clone()
    }

    /// Process one chat turn. Turns for the same user are serialized.
    pub async fn process_message(&self, user_id: &str, message: &str, platform: &str) -> Result<BrainReply, ServiceError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ServiceError::BadRequest("Message is empty".to_string()));
        }

        let ctx_handle = self.context_for(user_id).await;
        let mut ctx = ctx_handle.lock().await;
        ctx.push(TurnRole::User, message);

        let memories = self.memory.retrieve_memories(user_id, message, 3).await;
        let analysis = self.analyze_intent(message, &ctx, &memories).await;
        info!(
            "[BRAIN] {} -> {} ({:.2}) via {}",
            user_id,
            analysis.intent.as_str(),
            analysis.confidence,
            platform
        );

        let text = match analysis.intent {
            Intent::CreateVideo => self.handle_create_video(message, &mut ctx).await,
            Intent::ModifyScript => self.handle_modify_script(message, &mut ctx).await,
            Intent::GetStatus => handle_get_status(&ctx),
            Intent::UploadVideo => handle_upload_video(&ctx),
            Intent::Help => help_text().to_string(),
            Intent::GeneralChat => self.handle_general_chat(message, &ctx).await,
        };

        self.memory
            .store_conversation(
                user_id,
                ConversationRecord {
                    message: message.to_string(),
                    response: text.clone(),
                    intent: analysis.intent.as_str().to_string(),
                    parameters: json!({ "platform": platform, "detected": analysis.parameters }),
                    created_at: Utc::now(),
                },
            )
            .await?;

        let importance = match analysis.intent {
            Intent::CreateVideo => Some(0.8),
            Intent::ModifyScript => Some(0.6),
            _ => None,
        };
        if let Some(importance) = importance {
            let reply_head: String = text.chars().take(200).collect();
            self.memory
                .store_memory(
                    user_id,
                    MemoryEntry {
                        kind: analysis.intent.as_str().to_string(),
                        content: format!("User: {} | Assistant: {}", message, reply_head),
                        metadata: json!({ "platform": platform }),
                        importance,
                        created_at: Utc::now(),
                    },
                )
                .await?;
        }

        ctx.push(TurnRole::Assistant, &text);
        Ok(BrainReply { text, analysis })
    }

    async fn analyze_intent(&self, message: &str, ctx: &ConversationContext, memories: &[MemoryEntry]) -> IntentAnalysis {
        let memory_lines: String = memories
            .iter()
            .map(|m| format!("- {}\n", m.content.chars().take(100).collect::<String>()))
            .collect();

        let prompt = format!(
            "You are the assistant of a YouTube video creation platform. Classify the user's \
message and return only JSON with: intent (one of create_video, modify_script, get_status, \
upload_video, help, general_chat), parameters (object), confidence (0-1), suggested_actions (list).\n\n\
Current context: {}\nUser preferences: {:?}\nRelevant past interactions:\n{}",
            ctx.project_summary(),
            ctx.preferences,
            if memory_lines.is_empty() { "- none\n".to_string() } else { memory_lines },
        );

        match complete_json(self.llm(), &prompt, message).await {
            Ok(value) => match IntentAnalysis::from_llm(&value) {
                Some(analysis) => analysis,
                None => {
                    warn!("[BRAIN] LLM reply had no intent, using heuristics");
                    Self::fast_classify(message)
                }
            },
            Err(e) => {
                info!("[BRAIN] ⚡ Fast-path classification ({})", e);
                Self::fast_classify(message)
            }
        }
    }

    async fn handle_create_video(&self, message: &str, ctx: &mut ConversationContext) -> String {
        if let Some(project) = &ctx.current_project {
            if project.status != ProjectStatus::Uploaded {
                return format!(
                    "You already have an active project: \"{}\". Would you like to modify it, start \
creating it, or clear the conversation to begin a new one?",
                    project.brief.title
                );
            }
        }

        let brief = self.writer.extract_parameters(message).await;
        let script = self.writer.generate_script(&brief).await;
        let reply = format!(
            "🎬 *New Video Project Created!*\n\n\
**Title:** {}\n**Topic:** {}\n**Duration:** {} seconds\n**Style:** {}\n\n\
I've generated an initial script. Would you like me to:\n\
1. Show you the script for review\n\
2. Start creating the video now\n\
3. Modify the script first\n\
4. Add more details to the project\n\n\
What would you prefer?",
            brief.title, brief.topic, brief.duration, brief.style
        );

        ctx.current_project = Some(VideoProject {
            brief,
            script: Some(script),
            status: ProjectStatus::ScriptGenerated,
            video_id: None,
            created_at: Utc::now(),
        });
        reply
    }

    async fn handle_modify_script(&self, message: &str, ctx: &mut ConversationContext) -> String {
        let Some(project) = ctx.current_project.as_mut() else {
            return "You don't have an active video project. Let's create one first!".to_string();
        };
        if project.status != ProjectStatus::ScriptGenerated {
            return "The video for this project is already being made, so the script can't change now."
                .to_string();
        }

        let current = project.script.clone().unwrap_or_default();
        match self.writer.revise_script(&current, message).await {
            Some(updated) => {
                project.script = Some(updated.clone());
                format!(
                    "✅ Script updated! Here's your modified script:\n\n{}\n\nWould you like to start creating the video now?",
                    updated
                )
            }
            None => "I couldn't modify the script at the moment. Please try again or give more specific instructions."
                .to_string(),
        }
    }

    async fn handle_general_chat(&self, message: &str, ctx: &ConversationContext) -> String {
        let recent: String = ctx
            .history
            .iter()
            .rev()
            .skip(1)
            .take(6)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|t| format!("{:?}: {}\n", t.role, t.content))
            .collect();
        let prompt = format!(
            "You are a helpful assistant for a YouTube video creation platform. Reply naturally \
and helpfully. If the user seems interested in making videos, gently guide them toward it.\n\n\
Current context: {}\nRecent conversation:\n{}",
            ctx.project_summary(),
            recent
        );

        match self.llm().complete(&prompt, message).await {
            Ok(reply) => reply,
            Err(_) => "I'm here to help you create amazing YouTube videos! What would you like to work on today?"
                .to_string(),
        }
    }

    /// Build the render request for the user's scripted project.
    pub async fn pending_video_request(
        &self,
        user_id: &str,
        origin: VideoOrigin,
        notify_channel: Option<String>,
    ) -> Result<VideoRequest, ServiceError> {
        let ctx_handle = self.context_for(user_id).await;
        let ctx = ctx_handle.lock().await;
        let project = ctx
            .current_project
            .as_ref()
            .ok_or_else(|| ServiceError::BadRequest("No active video project".to_string()))?;

        if project.status != ProjectStatus::ScriptGenerated || project.video_id.is_some() {
            return Err(ServiceError::Conflict(
                "This project's video has already been started".to_string(),
            ));
        }

        Ok(VideoRequest {
            brief: project.brief.clone(),
            script: project.script.clone(),
            origin,
            notify_channel,
        })
    }

    pub async fn attach_video(&self, user_id: &str, video_id: &str) {
        let ctx_handle = self.context_for(user_id).await;
        let mut ctx = ctx_handle.lock().await;
        if let Some(project) = ctx.current_project.as_mut() {
            project.video_id = Some(video_id.to_string());
        }
    }

    /// Advance the chat project when its video finishes or is published.
    pub async fn apply_job_event(&self, event: &JobEvent) {
        if !matches!(event.origin, VideoOrigin::Chat | VideoOrigin::Slack) {
            return;
        }
        let handle = match self.contexts.lock().await.get(&event.user_id) {
            Some(h) => h.clone(),
            None => return,
        };
        let mut ctx = handle.lock().await;
        let Some(project) = ctx.current_project.as_mut() else {
            return;
        };
        if project.video_id.as_deref() != Some(event.video_id.as_str()) {
            return;
        }

        match event.status {
            VideoStatus::Completed => project.status = ProjectStatus::VideoCreated,
            VideoStatus::Uploaded => project.status = ProjectStatus::Uploaded,
            // The project can be retried once its video is known to be lost.
            VideoStatus::Failed | VideoStatus::Placeholder => project.video_id = None,
            _ => {}
        }
    }

    /// Status checklist for the active project, if any.
    pub async fn status_report(&self, user_id: &str) -> Option<String> {
        let ctx_handle = self.context_for(user_id).await;
        let ctx = ctx_handle.lock().await;
        ctx.current_project.as_ref().map(|_| handle_get_status(&ctx))
    }

    /// Abandon the active project. Returns whether there was one.
    pub async fn drop_project(&self, user_id: &str) -> bool {
        let ctx_handle = self.context_for(user_id).await;
        let mut ctx = ctx_handle.lock().await;
        ctx.current_project.take().is_some()
    }

    pub async fn current_project(&self, user_id: &str) -> Option<VideoProject> {
        let ctx_handle = self.context_for(user_id).await;
        let ctx = ctx_handle.lock().await;
        ctx.current_project.clone()
    }

    pub async fn history(&self, user_id: &str) -> Vec<ChatTurn> {
        let ctx_handle = self.context_for(user_id).await;
        let ctx = ctx_handle.lock().await;
        ctx.history.iter().cloned().collect()
    }

    /// Drop history and the active project. Long-term memories are kept.
    pub async fn clear_conversation(&self, user_id: &str) -> Result<(), ServiceError> {
        self.contexts.lock().await.remove(user_id);
        self.memory.clear_conversations(user_id).await?;
        info!("[BRAIN] Conversation cleared for {}", user_id);
        Ok(())
    }
}

fn handle_get_status(ctx: &ConversationContext) -> String {
    let Some(project) = &ctx.current_project else {
        return "You don't have any active video projects. Let's create one!".to_string();
    };
    let tick = |done: bool| if done { "✅" } else { "⏳" };
    let created = matches!(project.status, ProjectStatus::VideoCreated | ProjectStatus::Uploaded);

    format!(
        "📊 *Current Project Status*\n\n\
**Title:** {}\n**Status:** {:?}\n**Topic:** {}\n**Duration:** {} seconds\n\n\
**Progress:**\n- ✅ Project created\n- {} Script generated\n- {} Video created\n- {} Uploaded to YouTube\n\n\
What would you like to do next?",
        project.brief.title,
        project.status,
        project.brief.topic,
        project.brief.duration,
        tick(project.script.is_some()),
        tick(created),
        tick(project.status == ProjectStatus::Uploaded),
    )
}

fn handle_upload_video(ctx: &ConversationContext) -> String {
    let Some(project) = &ctx.current_project else {
        return "You don't have a video to upload. Let's create one first!".to_string();
    };
    match (project.status, &project.video_id) {
        (ProjectStatus::VideoCreated, Some(video_id)) => format!(
            "🎬 Your video is ready! Publish it from your dashboard or with \
`POST /api/videos/{}/upload` and I'll apply optimized SEO metadata.",
            video_id
        ),
        (ProjectStatus::Uploaded, _) => "This video is already on YouTube.".to_string(),
        (status, _) => format!(
            "Your video isn't ready yet (status: {:?}). Please wait for it to finish before uploading.",
            status
        ),
    }
}

pub fn help_text() -> &'static str {
    "🤖 *TubeForge Help*\n\n\
I can help you with:\n\n\
🎬 **Video Creation**\n- Create new videos from a topic\n- Generate scripts automatically\n- Revise scripts from your feedback\n\n\
📊 **Project Management**\n- Check video creation status\n- Track the progress of your projects\n\n\
📤 **YouTube Integration**\n- Upload videos with optimized SEO metadata\n- Schedule automated uploads\n\n\
**Try:**\n- \"Create a video about [topic]\"\n- \"Make the intro punchier\"\n- \"What's the status?\"\n- \"Upload to YouTube\""
}
