// TubeForge SaaS Modules
// Copyright (c) 2026 Xing_The_Creator | TubeForge

pub mod accounts;
pub mod automation;
pub mod dashboard;
pub mod studio;
pub mod subscription;
