use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::config::QuotaConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Tier given to every new account.
    #[default]
    Unsubscribed,
    Subscribed,
}

impl SubscriptionTier {
    /// Convert from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unsubscribed" => Some(SubscriptionTier::Unsubscribed),
            "subscribed" => Some(SubscriptionTier::Subscribed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Unsubscribed => "unsubscribed",
            SubscriptionTier::Subscribed => "subscribed",
        }
    }

    /// Quota ceiling for this tier.
    pub fn max_collections(self, quota: &QuotaConfig) -> i64 {
        match self {
            SubscriptionTier::Unsubscribed => quota.unsubscribed_max,
            SubscriptionTier::Subscribed => quota.subscribed_max,
        }
    }
}

impl TryFrom<String> for SubscriptionTier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value).ok_or_else(|| format!("Invalid subscription tier: {}", value))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub account_id: i64,
    #[sqlx(try_from = "String")]
    pub tier: SubscriptionTier,
    pub expires_at: Option<NaiveDateTime>,
    pub max_collections: i64,
}
