use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Account Repository
// ============================================================================

pub struct AccountRepository;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, subscription_id, settings_id, created_at, updated_at";

impl AccountRepository {
    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> AppResult<Option<Account>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_username<'e, E>(executor: E, username: &str) -> AppResult<Option<Account>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE username = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Accounts clashing with either identity field of a draft.
    pub async fn find_by_username_or_email<'e, E>(
        executor: E,
        username: &str,
        email: &str,
    ) -> AppResult<Vec<Account>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE username = ? OR email = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Insert the bare account row. Subscription and settings ids are linked
    /// afterwards with [`AccountRepository::link_dependents`].
    pub async fn create<'e, E>(executor: E, draft: &AccountDraft) -> AppResult<Account>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (username, email, subscription_id, settings_id, created_at, updated_at)
            VALUES (?, ?, NULL, NULL, ?, ?)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(&draft.username)
        .bind(&draft.email)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn link_dependents<'e, E>(
        executor: E,
        account_id: i64,
        subscription_id: i64,
        settings_id: i64,
    ) -> AppResult<Account>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET subscription_id = ?, settings_id = ?, updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(subscription_id)
        .bind(settings_id)
        .bind(now)
        .bind(account_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    #[cfg(test)]
    pub async fn count_all<'e, E>(executor: E) -> AppResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }
}
