// TubeForge Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tubeforge_core::agent::brain::Brain;
use tubeforge_core::agent::llm_bridge::{LanguageModel, OpenRouterClient};
use tubeforge_core::agent::memory::MemoryBank;
use tubeforge_core::agent::script_writer::ScriptWriter;
use tubeforge_core::agent::seo::SeoOptimizer;
use tubeforge_core::config::AppConfig;
use tubeforge_core::saas::automation::{next_upload_after, parse_upload_time, UploadDay};
use tubeforge_core::saas::subscription::catalog;
use tubeforge_core::server;
use tubeforge_core::state::AppState;

#[derive(Parser)]
#[command(name = "tubeforge")]
#[command(about = "TubeForge AI video backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server, scheduler and health monitor
    Serve {
        /// Port to listen on (overrides TUBEFORGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one chat turn through the brain
    Chat {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        message: String,
    },

    /// Print an SEO report for a title
    Seo {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        topic: Option<String>,
    },

    /// Show when the next automated upload would run
    NextUpload {
        /// Comma-separated weekdays, e.g. "monday,friday"
        #[arg(long)]
        days: String,

        /// HH:MM (UTC)
        #[arg(long, default_value = "09:00")]
        time: String,
    },

    /// Print the subscription catalog
    Tiers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn")),
        )
        .init();

    // Global panic handler: log panics instead of crashing silently
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        tracing::error!("🚨 [TUBEFORGE PANIC] at {}: {}", location, message);
    }));

    let args = Cli::parse();
    let mut config = AppConfig::from_env();

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            info!("--- TUBEFORGE v{} ---", env!("CARGO_PKG_VERSION"));
            let state = AppState::from_config(config)
                .await
                .context("failed to open data stores")?;
            state.start_background();
            info!("🩺 Health monitor and upload scheduler started");
            server::start_server(state).await?;
        }

        Commands::Chat { user, message } => {
            let llm: Arc<dyn LanguageModel> = Arc::new(OpenRouterClient::new(config.llm.clone()));
            let memory = Arc::new(MemoryBank::open(config.data_dir.join("memory.json"))?);
            let brain = Brain::new(Arc::new(ScriptWriter::new(llm)), memory);
            let reply = brain.process_message(&user, &message, "cli").await?;
            println!("[{}] {}", reply.analysis.intent.as_str(), reply.text);
        }

        Commands::Seo {
            title,
            description,
            topic,
        } => {
            let optimizer = SeoOptimizer::new(Arc::new(OpenRouterClient::new(config.llm.clone())));
            let topic = topic.unwrap_or_else(|| title.clone());
            let report = optimizer.optimize_video_metadata(&title, &description, &topic).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::NextUpload { days, time } => {
            let days = days
                .split(',')
                .filter(|d| !d.trim().is_empty())
                .map(|d| UploadDay::parse(d).with_context(|| format!("unknown weekday '{}'", d.trim())))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let time = parse_upload_time(&time)?;
            match next_upload_after(&days, time, Utc::now()) {
                Some(next) => println!("Next upload: {}", next.format("%A %Y-%m-%d %H:%M UTC")),
                None => println!("No upload days configured."),
            }
        }

        Commands::Tiers => {
            println!("{}", serde_json::to_string_pretty(&catalog())?);
        }
    }

    Ok(())
}
