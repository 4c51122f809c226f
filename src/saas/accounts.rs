// TubeForge Accounts
// Copyright (c) 2026 Xing_The_Creator | TubeForge
//
// Users authenticate with an opaque API token. Only its SHA-256 digest is
// persisted; the plain token is shown once at signup or rotation.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::error::ServiceError;
use crate::store::{JsonStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YouTubeLink {
    pub access_token: String,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub linked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    pub token_digest: String,
    #[serde(default)]
    pub youtube: Option<YouTubeLink>,
    #[serde(default)]
    pub slack_user_id: Option<String>,
}

/// Public view of a user; never carries secrets.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub slack_user_id: Option<String>,
    pub youtube_channel: Option<ChannelView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelView {
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub linked_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            company: user.company.clone(),
            created_at: user.created_at,
            slack_user_id: user.slack_user_id.clone(),
            youtube_channel: user.youtube.as_ref().map(|y| ChannelView {
                channel_id: y.channel_id.clone(),
                channel_title: y.channel_title.clone(),
                linked_at: y.linked_at,
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub slack_user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeCredentials {
    pub access_token: String,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserTable {
    pub users: BTreeMap<String, User>,
}

pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

fn new_token() -> String {
    format!("tf_{}", random_hex(24))
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct AccountStore {
    users: JsonStore<UserTable>,
}

impl AccountStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            users: JsonStore::open(path)?,
        })
    }

    /// Create a user. Returns the user and its plain API token.
    pub async fn signup(&self, email: &str, name: &str, company: Option<String>) -> Result<(User, String), ServiceError> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ServiceError::BadRequest("A valid email address is required".to_string()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::BadRequest("Name is required".to_string()));
        }

        let token = new_token();
        let user = User {
            user_id: format!("user_{}", random_hex(8)),
            email,
            name: name.to_string(),
            company: clean(company),
            created_at: Utc::now(),
            is_active: true,
            token_digest: token_digest(&token),
            youtube: None,
            slack_user_id: None,
        };

        let stored = user.clone();
        self.users
            .update(|t| {
                if t.users.values().any(|u| u.email == stored.email) {
                    return Err(ServiceError::Conflict("Email already registered".to_string()));
                }
                t.users.insert(stored.user_id.clone(), stored);
                Ok(())
            })
            .await?;

        info!("[ACCOUNTS] New user {} ({})", user.user_id, user.email);
        Ok((user, token))
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let digest = token_digest(token.trim());
        let user = self
            .users
            .read(|t| t.users.values().find(|u| u.token_digest == digest).cloned())
            .await
            .ok_or_else(|| ServiceError::Unauthorized("Invalid API token".to_string()))?;
        if !user.is_active {
            return Err(ServiceError::Unauthorized("Account is disabled".to_string()));
        }
        Ok(user)
    }

    pub async fn get(&self, user_id: &str) -> Option<User> {
        self.users.read(|t| t.users.get(user_id).cloned()).await
    }

    pub async fn list(&self) -> Vec<User> {
        self.users.read(|t| t.users.values().cloned().collect()).await
    }

    pub async fn find_by_slack(&self, slack_user_id: &str) -> Option<User> {
        self.users
            .read(|t| {
                t.users
                    .values()
                    .find(|u| u.is_active && u.slack_user_id.as_deref() == Some(slack_user_id))
                    .cloned()
            })
            .await
    }

    async fn modify(&self, user_id: &str, f: impl FnOnce(&mut User) -> Result<(), ServiceError>) -> Result<User, ServiceError> {
        self.users
            .update(|t| {
                let user = t
                    .users
                    .get_mut(user_id)
                    .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
                f(user)?;
                Ok(user.clone())
            })
            .await
    }

    /// Issue a new token; the previous one stops working immediately.
    pub async fn rotate_token(&self, user_id: &str) -> Result<String, ServiceError> {
        let token = new_token();
        let digest = token_digest(&token);
        self.modify(user_id, move |u| {
            u.token_digest = digest;
            Ok(())
        })
        .await?;
        info!("[ACCOUNTS] Rotated token for {}", user_id);
        Ok(token)
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<User, ServiceError> {
        let name = clean(update.name);
        let company = clean(update.company);
        let slack = clean(update.slack_user_id);

        if let Some(slack_id) = &slack {
            if let Some(owner) = self.find_by_slack(slack_id).await {
                if owner.user_id != user_id {
                    return Err(ServiceError::Conflict("Slack user is linked to another account".to_string()));
                }
            }
        }

        self.modify(user_id, move |u| {
            if let Some(name) = name {
                u.name = name;
            }
            if company.is_some() {
                u.company = company;
            }
            if slack.is_some() {
                u.slack_user_id = slack;
            }
            Ok(())
        })
        .await
    }

    pub async fn link_youtube(&self, user_id: &str, creds: YouTubeCredentials) -> Result<User, ServiceError> {
        let access_token = creds.access_token.trim().to_string();
        if access_token.is_empty() {
            return Err(ServiceError::BadRequest("access_token is required".to_string()));
        }
        let link = YouTubeLink {
            access_token,
            channel_id: clean(creds.channel_id),
            channel_title: clean(creds.channel_title),
            linked_at: Utc::now(),
        };
        let user = self
            .modify(user_id, move |u| {
                u.youtube = Some(link);
                Ok(())
            })
            .await?;
        info!("[ACCOUNTS] 📺 YouTube linked for {}", user_id);
        Ok(user)
    }

    pub async fn unlink_youtube(&self, user_id: &str) -> Result<User, ServiceError> {
        self.modify(user_id, |u| {
            u.youtube = None;
            Ok(())
        })
        .await
    }

    /// Drop an account. Used to undo a signup that could not be completed.
    pub async fn remove(&self, user_id: &str) -> Result<Option<User>, ServiceError> {
        let removed = self
            .users
            .update(|t| Ok::<_, ServiceError>(t.users.remove(user_id)))
            .await?;
        if removed.is_some() {
            info!("[ACCOUNTS] Removed user {}", user_id);
        }
        Ok(removed)
    }
}
