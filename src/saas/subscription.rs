// TubeForge Subscriptions, Billing & Usage
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Subscriptions, invoices and monthly usage live in one snapshot so that an
// upgrade and its invoice are persisted together.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::error::ServiceError;
use crate::store::{JsonStore, StoreError};

pub const TRIAL_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Starter,
    Professional,
    Enterprise,
}

impl FromStr for Tier {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "starter" => Ok(Tier::Starter),
            "professional" => Ok(Tier::Professional),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(ServiceError::BadRequest("Invalid subscription tier".to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierInfo {
    pub name: Tier,
    pub price_monthly: f64,
    pub price_yearly: f64,
    /// -1 means unlimited.
    pub video_limit: i64,
    pub features: &'static [&'static str],
    pub max_team_members: i64,
    pub priority_support: bool,
    pub custom_branding: bool,
    pub api_access: bool,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Starter, Tier::Professional, Tier::Enterprise];

    pub fn info(self) -> TierInfo {
        match self {
            Tier::Free => TierInfo {
                name: self,
                price_monthly: 0.0,
                price_yearly: 0.0,
                video_limit: 3,
                features: &["Basic video creation", "YouTube upload", "Email support"],
                max_team_members: 1,
                priority_support: false,
                custom_branding: false,
                api_access: false,
            },
            Tier::Starter => TierInfo {
                name: self,
                price_monthly: 29.0,
                price_yearly: 290.0,
                video_limit: 20,
                features: &["Advanced video creation", "YouTube upload", "Priority support", "Custom thumbnails"],
                max_team_members: 3,
                priority_support: true,
                custom_branding: false,
                api_access: false,
            },
            Tier::Professional => TierInfo {
                name: self,
                price_monthly: 79.0,
                price_yearly: 790.0,
                video_limit: 100,
                features: &["Unlimited video creation", "YouTube upload", "Priority support", "Custom branding", "API access"],
                max_team_members: 10,
                priority_support: true,
                custom_branding: true,
                api_access: true,
            },
            Tier::Enterprise => TierInfo {
                name: self,
                price_monthly: 199.0,
                price_yearly: 1990.0,
                video_limit: -1,
                features: &["Everything in Professional", "Dedicated support", "Custom integrations", "White-label solution"],
                max_team_members: -1,
                priority_support: true,
                custom_branding: true,
                api_access: true,
            },
        }
    }
}

pub fn catalog() -> Vec<TierInfo> {
    Tier::ALL.iter().map(|t| t.info()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn days(self) -> i64 {
        match self {
            BillingCycle::Monthly => 30,
            BillingCycle::Yearly => 365,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
        }
    }

    pub fn price(self, tier: Tier) -> f64 {
        let info = tier.info();
        match self {
            BillingCycle::Monthly => info.price_monthly,
            BillingCycle::Yearly => info.price_yearly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    Trial,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub user_id: String,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub billing_cycle: BillingCycle,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub auto_renew: bool,
    #[serde(default)]
    pub trial_ends: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub user_id: String,
    pub invoice_id: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub date: DateTime<Utc>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMetric {
    VideosCreated,
    VideosUploaded,
    ApiCalls,
    StorageUsed,
    TeamMembers,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageMetrics {
    pub user_id: String,
    pub month: String,
    pub videos_created: u64,
    pub videos_uploaded: u64,
    pub api_calls: u64,
    /// Megabytes.
    pub storage_used: u64,
    pub team_members: u64,
}

impl UsageMetrics {
    fn empty(user_id: &str, month: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            month: month.to_string(),
            videos_created: 0,
            videos_uploaded: 0,
            api_calls: 0,
            storage_used: 0,
            team_members: 0,
        }
    }

    fn counter(&mut self, metric: UsageMetric) -> &mut u64 {
        match metric {
            UsageMetric::VideosCreated => &mut self.videos_created,
            UsageMetric::VideosUploaded => &mut self.videos_uploaded,
            UsageMetric::ApiCalls => &mut self.api_calls,
            UsageMetric::StorageUsed => &mut self.storage_used,
            UsageMetric::TeamMembers => &mut self.team_members,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingBook {
    pub subscriptions: BTreeMap<String, Subscription>,
    pub invoices: BTreeMap<String, Vec<Invoice>>,
    /// user -> "YYYY-MM" -> metrics
    pub usage: BTreeMap<String, BTreeMap<String, UsageMetrics>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionStats {
    pub total_users: usize,
    pub active_subscriptions: usize,
    pub trial_subscriptions: usize,
    pub cancelled_subscriptions: usize,
    pub tier_distribution: BTreeMap<Tier, usize>,
    pub monthly_revenue: f64,
    /// Yearly plans expressed as monthly equivalent.
    pub yearly_revenue: f64,
    pub total_monthly_revenue: f64,
}

pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

fn new_invoice(user_id: &str, tier: Tier, cycle: BillingCycle, now: DateTime<Utc>) -> Invoice {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    Invoice {
        user_id: user_id.to_string(),
        invoice_id: format!("inv_{}", hex::encode(bytes)),
        amount: cycle.price(tier),
        currency: "USD".to_string(),
        status: "paid".to_string(),
        date: now,
        description: format!("{:?} subscription - {} billing", tier, cycle.label()),
    }
}

pub struct SubscriptionManager {
    book: JsonStore<BillingBook>,
}

impl SubscriptionManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            book: JsonStore::open(path)?,
        })
    }

    /// The user's subscription, starting a free trial if they have none.
    pub async fn ensure_subscription(&self, user_id: &str) -> Result<Subscription, ServiceError> {
        if let Some(existing) = self.get(user_id).await {
            return Ok(existing);
        }
        let now = Utc::now();
        let created = self
            .book
            .update(|b| {
                let sub = b
                    .subscriptions
                    .entry(user_id.to_string())
                    .or_insert_with(|| free_trial(user_id, now));
                Ok::<_, ServiceError>(sub.clone())
            })
            .await?;
        info!("[BILLING] Created free trial for {}", user_id);
        Ok(created)
    }

    pub async fn upgrade(&self, user_id: &str, tier: Tier, cycle: BillingCycle) -> Result<(Subscription, Invoice), ServiceError> {
        let now = Utc::now();
        let subscription = Subscription {
            user_id: user_id.to_string(),
            tier,
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: now + Duration::days(cycle.days()),
            billing_cycle: cycle,
            payment_method: None,
            auto_renew: true,
            trial_ends: None,
        };
        let invoice = new_invoice(user_id, tier, cycle, now);

        let (sub, inv) = (subscription.clone(), invoice.clone());
        self.book
            .update(|b| {
                b.subscriptions.insert(sub.user_id.clone(), sub);
                b.invoices.entry(inv.user_id.clone()).or_default().push(inv);
                Ok::<_, ServiceError>(())
            })
            .await?;
        info!("[BILLING] 💳 {} upgraded to {:?} ({:?})", user_id, tier, cycle);
        Ok((subscription, invoice))
    }

    pub async fn cancel(&self, user_id: &str) -> Result<Subscription, ServiceError> {
        let cancelled = self
            .book
            .update(|b| {
                let sub = b
                    .subscriptions
                    .get_mut(user_id)
                    .ok_or_else(|| ServiceError::NotFound("Subscription not found".to_string()))?;
                sub.status = SubscriptionStatus::Cancelled;
                sub.auto_renew = false;
                Ok::<_, ServiceError>(sub.clone())
            })
            .await?;
        info!("[BILLING] Cancelled subscription for {}", user_id);
        Ok(cancelled)
    }

    pub async fn get(&self, user_id: &str) -> Option<Subscription> {
        self.book.read(|b| b.subscriptions.get(user_id).cloned()).await
    }

    /// Whether the user may create another video this month.
    pub async fn check_video_limit(&self, user_id: &str) -> bool {
        let month = month_key(Utc::now());
        self.book.read(|b| has_video_left(b, user_id, &month)).await
    }

    /// Check the monthly limit and count one created video under a single
    /// write lock. Users without a subscription get a free trial first.
    pub async fn reserve_video(&self, user_id: &str) -> Result<(), ServiceError> {
        let now = Utc::now();
        let month = month_key(now);
        self.book
            .update(|b| {
                if !b.subscriptions.contains_key(user_id) {
                    info!("[BILLING] {} had no subscription, starting a free trial", user_id);
                    b.subscriptions.insert(user_id.to_string(), free_trial(user_id, now));
                }
                if !has_video_left(b, user_id, &month) {
                    return Err(ServiceError::QuotaExceeded(
                        "Video limit reached for your subscription. Please upgrade to create more videos.".to_string(),
                    ));
                }
                usage_entry(b, user_id, &month).videos_created += 1;
                Ok(())
            })
            .await
    }

    /// Give back a reservation whose video was never queued.
    pub async fn release_video(&self, user_id: &str) -> Result<(), ServiceError> {
        let month = month_key(Utc::now());
        self.book
            .update(|b| {
                let metrics = usage_entry(b, user_id, &month);
                metrics.videos_created = metrics.videos_created.saturating_sub(1);
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn record_usage(&self, user_id: &str, metric: UsageMetric, amount: u64) -> Result<(), ServiceError> {
        let month = month_key(Utc::now());
        self.book
            .update(|b| {
                *usage_entry(b, user_id, &month).counter(metric) += amount;
                Ok::<_, ServiceError>(())
            })
            .await
    }

    pub async fn usage(&self, user_id: &str, month: &str) -> Option<UsageMetrics> {
        self.book
            .read(|b| b.usage.get(user_id).and_then(|m| m.get(month)).cloned())
            .await
    }

    /// Oldest month first.
    pub async fn all_usage(&self, user_id: &str) -> Vec<UsageMetrics> {
        self.book
            .read(|b| b.usage.get(user_id).map(|m| m.values().cloned().collect()).unwrap_or_default())
            .await
    }

    pub async fn billing_history(&self, user_id: &str) -> Vec<Invoice> {
        self.book
            .read(|b| b.invoices.get(user_id).cloned().unwrap_or_default())
            .await
    }

    /// Expire trials, renew or expire lapsed paid plans. Returns the resulting status.
    pub async fn refresh_status(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<SubscriptionStatus>, ServiceError> {
        self.book
            .update(|b| {
                let Some(sub) = b.subscriptions.get_mut(user_id) else {
                    return Ok::<_, ServiceError>(None);
                };
                if let Some(invoice) = apply_lifecycle(sub, now) {
                    b.invoices.entry(user_id.to_string()).or_default().push(invoice);
                }
                Ok(Some(sub.status))
            })
            .await
    }

    /// Run the lifecycle over every subscription. Returns how many changed.
    pub async fn refresh_all(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let changed = self
            .book
            .update(|b| {
                let mut changed = 0;
                let mut billed = Vec::new();
                for sub in b.subscriptions.values_mut() {
                    let before = sub.clone();
                    if let Some(invoice) = apply_lifecycle(sub, now) {
                        billed.push(invoice);
                    }
                    if *sub != before {
                        changed += 1;
                    }
                }
                for invoice in billed {
                    b.invoices.entry(invoice.user_id.clone()).or_default().push(invoice);
                }
                Ok::<_, ServiceError>(changed)
            })
            .await?;
        if changed > 0 {
            info!("[BILLING] Lifecycle updated {} subscription(s)", changed);
        }
        Ok(changed)
    }

    pub async fn stats(&self) -> SubscriptionStats {
        self.book.read(|b| compute_stats(b.subscriptions.values())).await
    }
}

fn free_trial(user_id: &str, now: DateTime<Utc>) -> Subscription {
    let trial_end = now + Duration::days(TRIAL_DAYS);
    Subscription {
        user_id: user_id.to_string(),
        tier: Tier::Free,
        status: SubscriptionStatus::Trial,
        start_date: now,
        end_date: trial_end,
        billing_cycle: BillingCycle::Monthly,
        payment_method: None,
        auto_renew: true,
        trial_ends: Some(trial_end),
    }
}

fn usage_entry<'a>(b: &'a mut BillingBook, user_id: &str, month: &str) -> &'a mut UsageMetrics {
    b.usage
        .entry(user_id.to_string())
        .or_default()
        .entry(month.to_string())
        .or_insert_with(|| UsageMetrics::empty(user_id, month))
}

fn has_video_left(b: &BillingBook, user_id: &str, month: &str) -> bool {
    let Some(sub) = b.subscriptions.get(user_id) else {
        return false;
    };
    let limit = sub.tier.info().video_limit;
    if limit < 0 {
        return true;
    }
    let used = b
        .usage
        .get(user_id)
        .and_then(|months| months.get(month))
        .map(|m| m.videos_created)
        .unwrap_or(0);
    (used as i64) < limit
}

/// Returns an invoice when the subscription auto-renewed.
fn apply_lifecycle(sub: &mut Subscription, now: DateTime<Utc>) -> Option<Invoice> {
    match sub.status {
        SubscriptionStatus::Trial => {
            let trial_end = sub.trial_ends.unwrap_or(sub.end_date);
            if now > trial_end {
                sub.status = SubscriptionStatus::Expired;
                sub.tier = Tier::Free;
                sub.end_date = now + Duration::days(30);
            }
            None
        }
        SubscriptionStatus::Active if now > sub.end_date => {
            if sub.auto_renew {
                sub.end_date += Duration::days(sub.billing_cycle.days());
                Some(new_invoice(&sub.user_id, sub.tier, sub.billing_cycle, now))
            } else {
                sub.status = SubscriptionStatus::Expired;
                None
            }
        }
        _ => None,
    }
}

fn compute_stats<'a>(subs: impl Iterator<Item = &'a Subscription>) -> SubscriptionStats {
    let mut stats = SubscriptionStats {
        total_users: 0,
        active_subscriptions: 0,
        trial_subscriptions: 0,
        cancelled_subscriptions: 0,
        tier_distribution: BTreeMap::new(),
        monthly_revenue: 0.0,
        yearly_revenue: 0.0,
        total_monthly_revenue: 0.0,
    };

    for sub in subs {
        stats.total_users += 1;
        let info = sub.tier.info();
        match sub.status {
            SubscriptionStatus::Active => {
                stats.active_subscriptions += 1;
                match sub.billing_cycle {
                    BillingCycle::Monthly => stats.monthly_revenue += info.price_monthly,
                    BillingCycle::Yearly => stats.yearly_revenue += info.price_yearly / 12.0,
                }
            }
            SubscriptionStatus::Trial => stats.trial_subscriptions += 1,
            SubscriptionStatus::Cancelled => stats.cancelled_subscriptions += 1,
            SubscriptionStatus::Expired => {}
        }
        *stats.tier_distribution.entry(sub.tier).or_default() += 1;
    }
    stats.total_monthly_revenue = stats.monthly_revenue + stats.yearly_revenue;
    stats
}
