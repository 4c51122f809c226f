// TubeForge Agent Modules
// Copyright (c) 2026 Xing_The_Creator | TubeForge

pub mod brain;
pub mod health;
pub mod llm_bridge;
pub mod memory;
pub mod render_queue;
pub mod renderer;
pub mod script_writer;
pub mod seo;
