use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::error::{AppError, AppResult};

/// The `grants` join table: one row per (account, collection) pair the
/// account currently holds.
pub struct GrantRepository;

impl GrantRepository {
    pub async fn associate<'e, E>(executor: E, account_id: i64, collection_id: i64) -> AppResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query("INSERT INTO grants (account_id, collection_id, created_at) VALUES (?, ?, ?)")
            .bind(account_id)
            .bind(collection_id)
            .bind(now)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Returns false when the account did not hold the collection.
    pub async fn dissociate<'e, E>(executor: E, account_id: i64, collection_id: i64) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM grants WHERE account_id = ? AND collection_id = ?")
            .bind(account_id)
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn exists<'e, E>(executor: E, account_id: i64, collection_id: i64) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM grants WHERE account_id = ? AND collection_id = ?",
        )
        .bind(account_id)
        .bind(collection_id)
        .fetch_one(executor)
        .await
        .map(|n| n > 0)
        .map_err(AppError::Database)
    }

    pub async fn count_for_account<'e, E>(executor: E, account_id: i64) -> AppResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM grants WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }

    pub async fn count_for_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM grants WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }
}
