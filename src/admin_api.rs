// TubeForge Admin API
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;

use crate::agent::render_queue::VideoRecord;
use crate::error::ServiceError;
use crate::saas::accounts::User;
use crate::saas::dashboard::{global_stats, user_summary, verify_token, DashboardReport, UserSummary};
use crate::saas::subscription::Tier;
use crate::server::ok;
use crate::state::SharedState;

pub const TOKEN_HEADER: &str = "X-Dashboard-Token";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/admin/stats", get(admin_stats))
        .route("/api/admin/users/:id", get(admin_user))
}

fn authorize(state: &SharedState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let provided = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    verify_token(state.config.dashboard_secret.as_deref(), provided)
}

async fn summarize(state: &SharedState, user: &User, all_videos: &[VideoRecord], recent: usize) -> UserSummary {
    let videos: Vec<VideoRecord> = all_videos
        .iter()
        .filter(|v| v.user_id == user.user_id)
        .cloned()
        .collect();
    let plan = state
        .subscriptions
        .get(&user.user_id)
        .await
        .map(|s| s.tier)
        .unwrap_or(Tier::Free);
    let auto_mode = state.automation.get(&user.user_id).await.enabled;
    user_summary(user, plan, &videos, auto_mode, recent)
}

async fn admin_stats(State(state): State<SharedState>, headers: HeaderMap) -> Result<Json<Value>, ServiceError> {
    authorize(&state, &headers)?;

    let users = state.accounts.list().await;
    let videos = state.queue.list_all().await;
    let global = global_stats(
        users.len(),
        &videos,
        Utc::now(),
        &state.model,
        state.automation.enabled_count().await,
        state.health.uptime_secs(),
        state.subscriptions.stats().await,
    );

    let mut summaries = Vec::with_capacity(users.len());
    for user in &users {
        summaries.push(summarize(&state, user, &videos, 3).await);
    }

    Ok(ok(DashboardReport {
        global,
        users: summaries,
    }))
}

async fn admin_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    authorize(&state, &headers)?;

    let user = state
        .accounts
        .get(&user_id)
        .await
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
    let videos = state.queue.list_for_user(&user_id).await;
    Ok(ok(summarize(&state, &user, &videos, 5).await))
}
