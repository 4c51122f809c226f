// TubeForge Account API - profile, billing, automation and chat endpoints
// Copyright (c) 2026 Xing_The_Creator | TubeForge

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::error::ServiceError;
use crate::integrations::youtube::PublishError;
use crate::saas::accounts::{ProfileUpdate, UserProfile, YouTubeCredentials};
use crate::saas::automation::AutomationInput;
use crate::saas::subscription::{catalog, month_key, BillingCycle, Tier, UsageMetric};
use crate::server::{ok, AuthUser};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeBody {
    pub tier: String,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub month: Option<String>,
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/pricing/tiers", get(pricing_tiers))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/token/rotate", post(rotate_token))
        .route(
            "/api/youtube/credentials",
            get(get_youtube).put(link_youtube).delete(unlink_youtube),
        )
        .route("/api/youtube/analytics/:youtube_id", get(youtube_analytics))
        .route("/api/subscription", get(get_subscription))
        .route("/api/subscription/upgrade", post(upgrade_subscription))
        .route("/api/subscription/cancel", post(cancel_subscription))
        .route("/api/billing/history", get(billing_history))
        .route("/api/usage", get(usage))
        .route("/api/automation", get(get_automation).put(save_automation))
        .route("/api/automation/enabled", post(set_automation_enabled))
        .route("/api/chat/message", post(chat_message))
        .route("/api/ai/conversation", get(conversation))
        .route("/api/ai/clear-conversation", post(clear_conversation))
}

async fn signup(State(state): State<SharedState>, Json(body): Json<SignupBody>) -> Result<Json<Value>, ServiceError> {
    let (user, token) = state.accounts.signup(&body.email, &body.name, body.company).await?;
    // The token is only ever shown here, so a half-created account is unusable.
    let subscription = match state.subscriptions.ensure_subscription(&user.user_id).await {
        Ok(subscription) => subscription,
        Err(e) => {
            if let Err(undo) = state.accounts.remove(&user.user_id).await {
                error!("[ACCOUNTS] Could not undo signup of {}: {}", user.user_id, undo);
            }
            return Err(e);
        }
    };
    if let Err(e) = state.memory.ensure_user(&user.user_id).await {
        warn!("[ACCOUNTS] Memory profile for {} not created: {}", user.user_id, e);
    }
    info!("[ACCOUNTS] 👋 Welcome {}", user.user_id);

    Ok(ok(json!({
        "user": UserProfile::from(&user),
        "api_token": token,
        "subscription": subscription,
        "message": "Store this API token now; it will not be shown again.",
    })))
}

async fn pricing_tiers() -> Json<Value> {
    ok(catalog())
}

async fn get_profile(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    let tier = state
        .subscriptions
        .get(&user.user_id)
        .await
        .map(|s| s.tier)
        .unwrap_or(Tier::Free);
    ok(json!({
        "profile": UserProfile::from(&user),
        "subscription_tier": tier,
    }))
}

async fn update_profile(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Value>, ServiceError> {
    let updated = state.accounts.update_profile(&user.user_id, update).await?;
    Ok(ok(UserProfile::from(&updated)))
}

async fn rotate_token(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, ServiceError> {
    let token = state.accounts.rotate_token(&user.user_id).await?;
    Ok(ok(json!({ "api_token": token })))
}

async fn get_youtube(AuthUser(user): AuthUser) -> Json<Value> {
    let profile = UserProfile::from(&user);
    ok(json!({
        "connected": profile.youtube_channel.is_some(),
        "channel": profile.youtube_channel,
    }))
}

async fn link_youtube(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(creds): Json<YouTubeCredentials>,
) -> Result<Json<Value>, ServiceError> {
    let updated = state.accounts.link_youtube(&user.user_id, creds).await?;
    Ok(ok(json!({
        "connected": true,
        "channel": UserProfile::from(&updated).youtube_channel,
    })))
}

async fn unlink_youtube(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, ServiceError> {
    state.accounts.unlink_youtube(&user.user_id).await?;
    Ok(ok(json!({ "connected": false })))
}

async fn youtube_analytics(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Path(youtube_id): Path<String>,
) -> Result<Json<Value>, ServiceError> {
    let link = user.youtube.as_ref().ok_or(PublishError::NotLinked)?;
    let stats = state.publisher.statistics(&link.access_token, &youtube_id).await?;
    state
        .subscriptions
        .record_usage(&user.user_id, UsageMetric::ApiCalls, 1)
        .await?;
    Ok(ok(stats))
}

async fn get_subscription(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, ServiceError> {
    let now = Utc::now();
    state.subscriptions.refresh_status(&user.user_id, now).await?;
    let subscription = state.subscriptions.ensure_subscription(&user.user_id).await?;

    Ok(ok(json!({
        "subscription": subscription,
        "tier": subscription.tier.info(),
        "usage": state.subscriptions.usage(&user.user_id, &month_key(now)).await,
        "can_create_video": state.subscriptions.check_video_limit(&user.user_id).await,
    })))
}

async fn upgrade_subscription(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<UpgradeBody>,
) -> Result<Json<Value>, ServiceError> {
    let tier = Tier::from_str(&body.tier)?;
    let (subscription, invoice) = state
        .subscriptions
        .upgrade(&user.user_id, tier, body.billing_cycle)
        .await?;
    Ok(ok(json!({ "subscription": subscription, "invoice": invoice })))
}

async fn cancel_subscription(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, ServiceError> {
    Ok(ok(state.subscriptions.cancel(&user.user_id).await?))
}

async fn billing_history(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    ok(state.subscriptions.billing_history(&user.user_id).await)
}

async fn usage(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Query(query): Query<UsageQuery>,
) -> Json<Value> {
    let month = query.month.unwrap_or_else(|| month_key(Utc::now()));
    ok(json!({
        "month": month,
        "usage": state.subscriptions.usage(&user.user_id, &month).await,
        "history": state.subscriptions.all_usage(&user.user_id).await,
    }))
}

async fn get_automation(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    ok(state.automation.get(&user.user_id).await)
}

async fn save_automation(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(input): Json<AutomationInput>,
) -> Result<Json<Value>, ServiceError> {
    let settings = state.automation.save_settings(&user.user_id, input, Utc::now()).await?;
    Ok(ok(settings))
}

async fn set_automation_enabled(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<EnabledBody>,
) -> Result<Json<Value>, ServiceError> {
    let settings = state
        .automation
        .set_enabled(&user.user_id, body.enabled, Utc::now())
        .await?;
    Ok(ok(settings))
}

async fn chat_message(
    AuthUser(user): AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<Value>, ServiceError> {
    let reply = state.brain.process_message(&user.user_id, &body.message, "api").await?;
    state
        .subscriptions
        .record_usage(&user.user_id, UsageMetric::ApiCalls, 1)
        .await?;

    Ok(ok(json!({
        "response": reply.text,
        "intent": reply.analysis.intent,
        "confidence": reply.analysis.confidence,
        "suggested_actions": reply.analysis.suggested_actions,
        "project": state.brain.current_project(&user.user_id).await,
    })))
}

async fn conversation(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Json<Value> {
    ok(json!({
        "history": state.brain.history(&user.user_id).await,
        "current_project": state.brain.current_project(&user.user_id).await,
    }))
}

async fn clear_conversation(AuthUser(user): AuthUser, State(state): State<SharedState>) -> Result<Json<Value>, ServiceError> {
    state.brain.clear_conversation(&user.user_id).await?;
    Ok(ok(json!({ "message": "Conversation cleared" })))
}
