// TubeForge Script Writer
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::llm_bridge::{complete_json, LanguageModel};

pub const DEFAULT_DURATION: u32 = 60;
pub const DEFAULT_STYLE: &str = "educational";
pub const DEFAULT_LANGUAGE: &str = "en";

/// What a video is about, independent of where it sits in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoBrief {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_audience() -> String {
    "general".to_string()
}
fn default_duration() -> u32 {
    DEFAULT_DURATION
}
fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}
fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl VideoBrief {
    pub fn from_topic(title: &str, topic: &str) -> Self {
        Self {
            title: title.to_string(),
            topic: topic.to_string(),
            description: format!("A video about {}", topic),
            target_audience: default_audience(),
            duration: DEFAULT_DURATION,
            style: default_style(),
            language: default_language(),
            tags: Vec::new(),
        }
    }

    /// Keyword fallback when the LLM cannot extract parameters.
    pub fn fallback_from_message(message: &str) -> Self {
        let lead: Vec<&str> = message.split_whitespace().take(3).collect();
        let title = if lead.is_empty() {
            "New video".to_string()
        } else {
            format!("Video about {}", lead.join(" "))
        };
        Self::from_topic(&title, message.trim())
    }

    /// Merge LLM-extracted fields over the fallback.
    fn from_extraction(value: &Value, message: &str) -> Self {
        let mut brief = Self::fallback_from_message(message);
        let text = |key: &str| {
            value[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(title) = text("title") {
            brief.title = title;
        }
        if let Some(topic) = text("topic") {
            brief.topic = topic;
        }
        if let Some(description) = text("description") {
            brief.description = description;
        }
        if let Some(audience) = text("target_audience") {
            brief.target_audience = audience;
        }
        if let Some(style) = text("style") {
            brief.style = style;
        }
        if let Some(language) = text("language") {
            brief.language = language;
        }
        if let Some(duration) = value["duration"].as_u64().filter(|d| (5..=3600).contains(d)) {
            brief.duration = duration as u32;
        }
        if let Some(tags) = value["tags"].as_array() {
            brief.tags = tags
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
        }
        brief
    }
}

pub struct ScriptWriter {
    llm: Arc<dyn LanguageModel>,
}

impl ScriptWriter {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &Arc<dyn LanguageModel> {
        &self.llm
    }

    pub async fn extract_parameters(&self, message: &str) -> VideoBrief {
        let prompt = "Extract video creation parameters from the user's message. Return only a JSON \
object with: title, topic, description, target_audience, duration (seconds, default 60), \
style (educational, entertainment, business, ...), language (code, default \"en\"), tags (list).";

        match complete_json(self.llm.as_ref(), prompt, message).await {
            Ok(value) => VideoBrief::from_extraction(&value, message),
            Err(e) => {
                warn!("[SCRIPT] Parameter extraction fell back to keywords: {}", e);
                VideoBrief::fallback_from_message(message)
            }
        }
    }

    pub async fn generate_script(&self, brief: &VideoBrief) -> String {
        let prompt = format!(
            "Write an engaging YouTube video script.\n\n\
Title: {}\nTopic: {}\nDescription: {}\nTarget audience: {}\nDuration: {} seconds\nLanguage: {}\nStyle: {}\n\n\
The script must be natural, fluent plain text with no bracketed labels such as [Opening], \
[scene] or [music]. Open with a strong hook, keep a logical flow without section headers, \
fit the target duration, and close with a conversational call to action (like, subscribe).",
            brief.title,
            brief.topic,
            brief.description,
            brief.target_audience,
            brief.duration,
            brief.language,
            brief.style,
        );

        match self.llm.complete(&prompt, &brief.topic).await {
            Ok(script) => {
                info!("[SCRIPT] Generated script for '{}' ({} chars)", brief.title, script.len());
                script
            }
            Err(e) => {
                warn!("[SCRIPT] Using template script for '{}': {}", brief.title, e);
                fallback_script(brief)
            }
        }
    }

    /// Short script for scheduled uploads, where only a topic is known.
    pub async fn script_from_topic(&self, topic: &str) -> String {
        let prompt = "Write a short, engaging YouTube video script (about 60 seconds) on the \
given topic. Plain conversational text, no bracketed stage directions. Open with a hook, \
give three concrete takeaways and end by asking viewers to subscribe.";

        match self.llm.complete(prompt, topic).await {
            Ok(script) => script,
            Err(e) => {
                warn!("[SCRIPT] Using takeaway template for '{}': {}", topic, e);
                topic_template(topic)
            }
        }
    }

    /// Rewrite `script` following the user's instructions. `None` when the LLM is unavailable.
    pub async fn revise_script(&self, script: &str, instructions: &str) -> Option<String> {
        let prompt = format!(
            "The user wants to modify the script of their video.\n\nCurrent script:\n{}\n\n\
Return only the full updated script, as natural plain text.",
            script
        );
        match self.llm.complete(&prompt, instructions).await {
            Ok(updated) => Some(updated),
            Err(e) => {
                warn!("[SCRIPT] Revision failed: {}", e);
                None
            }
        }
    }
}

pub fn fallback_script(brief: &VideoBrief) -> String {
    format!(
        "Welcome! Today we're diving into {topic}.\n\n\
If you've ever wondered how {topic} works or why it matters, you're in the right place. \
Over the next {duration} seconds we'll walk through the essentials step by step.\n\n\
First, we'll cover the core idea behind {topic}. Then we'll look at a practical example \
you can apply right away. Finally, we'll wrap up with the key takeaways to remember.\n\n\
If this helped, give the video a like and subscribe for more. See you in the next one!",
        topic = brief.topic,
        duration = brief.duration,
    )
}

pub fn topic_template(topic: &str) -> String {
    format!(
        "Here's what you need to know about {topic} right now.\n\n\
Key takeaway one: {topic} is moving fast, and the basics still matter most.\n\
Key takeaway two: small, consistent steps beat big one-off efforts.\n\
Key takeaway three: learn from the people already doing it well.\n\n\
That's {topic} in a minute. Subscribe so you don't miss the next update!",
        topic = topic,
    )
}
