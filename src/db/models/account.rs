use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    // Filled in by the provisioning transaction once the dependent rows exist.
    pub subscription_id: Option<i64>,
    pub settings_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Input for account provisioning.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountDraft {
    pub username: String,
    pub email: String,
}
