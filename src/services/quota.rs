use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::models::{Subscription, SubscriptionTier};
use crate::db::{GrantRepository, LockKey, Store, SubscriptionRepository};
use crate::error::{AppResult, PreconditionError};
use crate::AppState;

/// Guards every grant-adding path against the account's subscription ceiling.
pub struct QuotaEnforcer;

impl QuotaEnforcer {
    /// Succeeds when the account can take one more grant.
    ///
    /// Runs on the caller's transaction; callers adding a grant should hold
    /// the account's lock so two additions cannot both pass the check.
    pub async fn check_can_grant(conn: &mut SqliteConnection, account_id: i64) -> AppResult<()> {
        let remaining = Self::headroom(conn, account_id).await?;
        if remaining <= 0 {
            tracing::debug!("Account {} is at its collection quota", account_id);
            return Err(PreconditionError::QuotaExceeded.into());
        }
        Ok(())
    }

    /// How many more collections the account may hold. Zero or negative
    /// means none.
    pub async fn headroom(conn: &mut SqliteConnection, account_id: i64) -> AppResult<i64> {
        let subscription = SubscriptionRepository::find_by_account(&mut *conn, account_id)
            .await?
            .ok_or(PreconditionError::NotFound)?;
        let held = GrantRepository::count_for_account(&mut *conn, account_id).await?;

        Ok(subscription.max_collections - held)
    }

    /// Move an account to `tier` and reset its ceiling to the tier's
    /// configured quota. Grants already above a lowered ceiling are kept.
    pub async fn change_tier(
        state: &Arc<AppState>,
        account_id: i64,
        tier: SubscriptionTier,
    ) -> AppResult<Subscription> {
        let max = tier.max_collections(&state.config.quota);

        let _guard = state.store.lock(&[LockKey::Account(account_id)]).await;
        let mut tx = state.store.begin().await?;
        let result = Self::change_tier_in_tx(&mut tx, account_id, tier, max).await;
        let subscription = Store::finish(tx, result).await?;

        tracing::info!(
            "Account {} moved to tier {} (max {})",
            account_id,
            tier.as_str(),
            max
        );
        Ok(subscription)
    }

    async fn change_tier_in_tx(
        conn: &mut SqliteConnection,
        account_id: i64,
        tier: SubscriptionTier,
        max: i64,
    ) -> AppResult<Subscription> {
        if SubscriptionRepository::find_by_account(&mut *conn, account_id)
            .await?
            .is_none()
        {
            return Err(PreconditionError::NotFound.into());
        }
        SubscriptionRepository::set_tier(&mut *conn, account_id, tier, max).await?;
        SubscriptionRepository::find_by_account(&mut *conn, account_id)
            .await?
            .ok_or_else(|| PreconditionError::NotFound.into())
    }
}
