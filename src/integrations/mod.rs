// TubeForge External Integrations
// Copyright (c) 2026 Xing_The_Creator | TubeForge

pub mod slack;
pub mod youtube;
