// TubeForge Shared Application State
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::agent::brain::Brain;
use crate::agent::health::HealthMonitor;
use crate::agent::llm_bridge::{LanguageModel, OpenRouterClient};
use crate::agent::memory::MemoryBank;
use crate::agent::render_queue::{JobEvent, PipelineTools, RenderQueue, VideoOrigin, VideoStatus};
use crate::agent::renderer::{CommandRenderer, Renderer, UnconfiguredRenderer};
use crate::agent::script_writer::ScriptWriter;
use crate::agent::seo::SeoOptimizer;
use crate::config::AppConfig;
use crate::integrations::slack::SlackBot;
use crate::integrations::youtube::{Publisher, YouTubePublisher};
use crate::saas::accounts::AccountStore;
use crate::saas::automation::AutomationManager;
use crate::saas::studio::Studio;
use crate::saas::subscription::{SubscriptionManager, UsageMetric};
use crate::store::{JsonStore, StoreError};

/// The external services the kernel talks to. Tests swap these for stubs.
pub struct Collaborators {
    pub llm: Arc<dyn LanguageModel>,
    pub renderer: Arc<dyn Renderer>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    pub fn from_config(config: &AppConfig) -> Self {
        let renderer: Arc<dyn Renderer> = match &config.render_command {
            Some(program) => Arc::new(CommandRenderer::new(program.clone())),
            None => {
                warn!("[CONFIG] TUBEFORGE_RENDER_CMD not set, videos will be saved as placeholders");
                Arc::new(UnconfiguredRenderer)
            }
        };
        Self {
            llm: Arc::new(OpenRouterClient::new(config.llm.clone())),
            renderer,
            publisher: Arc::new(YouTubePublisher::new(config.youtube.clone())),
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub accounts: Arc<AccountStore>,
    pub subscriptions: Arc<SubscriptionManager>,
    pub automation: Arc<AutomationManager>,
    pub memory: Arc<MemoryBank>,
    pub writer: Arc<ScriptWriter>,
    pub seo: Arc<SeoOptimizer>,
    pub brain: Arc<Brain>,
    pub queue: Arc<RenderQueue>,
    pub studio: Arc<Studio>,
    pub publisher: Arc<dyn Publisher>,
    pub slack: Arc<SlackBot>,
    pub health: Arc<HealthMonitor>,
    pub model: String,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub async fn from_config(config: AppConfig) -> Result<SharedState, StoreError> {
        let collaborators = Collaborators::from_config(&config);
        Self::build(config, collaborators).await
    }

    /// Open every store under `config.data_dir`, start the render worker and
    /// the job-event follower.
    pub async fn build(config: AppConfig, collaborators: Collaborators) -> Result<SharedState, StoreError> {
        let data = config.data_dir.clone();
        let Collaborators { llm, renderer, publisher } = collaborators;

        let accounts = Arc::new(AccountStore::open(data.join("users.json"))?);
        let subscriptions = Arc::new(SubscriptionManager::open(data.join("subscriptions.json"))?);
        let automation = Arc::new(AutomationManager::open(data.join("automation.json"))?);
        let memory = Arc::new(MemoryBank::open(data.join("memory.json"))?);

        let model = llm.model_name().to_string();
        let writer = Arc::new(ScriptWriter::new(llm.clone()));
        let seo = Arc::new(SeoOptimizer::new(llm));
        let brain = Arc::new(Brain::new(writer.clone(), memory.clone()));

        let tools = PipelineTools {
            writer: writer.clone(),
            seo: seo.clone(),
            renderer,
            ffmpeg: config.ffmpeg.clone(),
        };
        let queue = RenderQueue::start(
            JsonStore::open(data.join("videos.json"))?,
            tools,
            config.media_dir.clone(),
        )
        .await?;

        let studio = Arc::new(Studio::new(queue.clone(), subscriptions.clone()));
        let slack = Arc::new(SlackBot::new(&config.slack, brain.clone(), accounts.clone(), studio.clone()));
        let health = Arc::new(HealthMonitor::new(config.health_interval_secs, data));

        let state = Arc::new(Self {
            config,
            accounts,
            subscriptions,
            automation,
            memory,
            writer,
            seo,
            brain,
            queue,
            studio,
            publisher,
            slack,
            health,
            model,
        });

        spawn_event_follower(&state);
        info!("[API] State ready (model: {})", state.model);
        Ok(state)
    }

    /// Start the scheduler and the heartbeat loop.
    pub fn start_background(&self) {
        self.automation
            .start(self.studio.clone(), self.config.scheduler_tick_secs);
        self.health.start();
    }
}

/// Keep chat projects, Slack DMs and storage usage in step with the queue.
fn spawn_event_follower(state: &SharedState) {
    let mut events = state.queue.subscribe();
    let brain = state.brain.clone();
    let slack = state.slack.clone();
    let subscriptions = state.subscriptions.clone();
    let media_dir = state.queue.media_dir().to_path_buf();

    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[QUEUE] Event follower skipped {} event(s)", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            brain.apply_job_event(&event).await;
            if event.origin == VideoOrigin::Slack {
                let slack = slack.clone();
                let event = event.clone();
                tokio::spawn(async move { slack.notify(&event).await });
            }
            record_storage(&subscriptions, &media_dir, &event).await;
        }
    });
}

async fn record_storage(subscriptions: &SubscriptionManager, media_dir: &Path, event: &JobEvent) {
    if !matches!(event.status, VideoStatus::Completed | VideoStatus::Prepared) {
        return;
    }
    let dir = media_dir.join(&event.video_id);
    let megabytes = match tokio::task::spawn_blocking(move || dir_size_mb(&dir)).await {
        Ok(megabytes) => megabytes,
        Err(e) => {
            warn!("[BILLING] Storage scan for {} failed: {}", event.video_id, e);
            return;
        }
    };
    if megabytes == 0 {
        return;
    }
    if let Err(e) = subscriptions
        .record_usage(&event.user_id, UsageMetric::StorageUsed, megabytes)
        .await
    {
        warn!("[BILLING] Could not record storage for {}: {}", event.video_id, e);
    }
}

/// Size of everything under `dir`, rounded up to whole megabytes.
pub fn dir_size_mb(dir: &Path) -> u64 {
    let bytes: u64 = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum();
    bytes.div_ceil(1024 * 1024)
}
