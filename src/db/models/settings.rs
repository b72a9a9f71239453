use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Sentinel for "no current collection".
pub const NO_CURRENT_COLLECTION: i64 = -1;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountSettings {
    pub id: i64,
    pub account_id: i64,
    pub current_collection: i64,
    pub repetitions: i64,
    pub min_tempo: i64,
    pub max_tempo: i64,
    pub tempo_step: i64,
}

impl AccountSettings {
    /// Defaults written for a freshly provisioned account.
    pub fn defaults_for(account_id: i64) -> Self {
        Self {
            id: 0,
            account_id,
            current_collection: NO_CURRENT_COLLECTION,
            repetitions: 20,
            min_tempo: 80,
            max_tempo: 80,
            tempo_step: 10,
        }
    }
}
