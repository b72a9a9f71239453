use sqlx::SqliteExecutor;

use crate::db::models::{Subscription, SubscriptionTier};
use crate::error::{AppError, AppResult};

pub struct SubscriptionRepository;

impl SubscriptionRepository {
    pub async fn create<'e, E>(
        executor: E,
        account_id: i64,
        tier: SubscriptionTier,
        max_collections: i64,
    ) -> AppResult<Subscription>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (account_id, tier, expires_at, max_collections)
            VALUES (?, ?, NULL, ?)
            RETURNING id, account_id, tier, expires_at, max_collections
            "#,
        )
        .bind(account_id)
        .bind(tier.as_str())
        .bind(max_collections)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_account<'e, E>(executor: E, account_id: i64) -> AppResult<Option<Subscription>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, account_id, tier, expires_at, max_collections
            FROM subscriptions
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Change an account's tier and quota ceiling.
    pub async fn set_tier<'e, E>(
        executor: E,
        account_id: i64,
        tier: SubscriptionTier,
        max_collections: i64,
    ) -> AppResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE subscriptions SET tier = ?, max_collections = ? WHERE account_id = ?")
            .bind(tier.as_str())
            .bind(max_collections)
            .bind(account_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}
