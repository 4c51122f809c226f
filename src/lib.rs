// TubeForge Core Library
// Copyright (c) 2026 Xing_The_Creator | TubeForge

pub mod account_api;
pub mod admin_api;
pub mod agent;
pub mod chat;
pub mod config;
pub mod error;
pub mod integrations;
pub mod saas;
pub mod server;
pub mod state;
pub mod store;
pub mod video_api;
