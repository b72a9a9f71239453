use sqlx::SqliteExecutor;

use crate::db::models::{AccountSettings, NO_CURRENT_COLLECTION};
use crate::error::{AppError, AppResult};

// ============================================================================
// Account Settings Repository
// ============================================================================

pub struct SettingsRepository;

impl SettingsRepository {
    pub async fn create<'e, E>(executor: E, settings: &AccountSettings) -> AppResult<AccountSettings>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AccountSettings>(
            r#"
            INSERT INTO settings (
                account_id, current_collection, repetitions,
                min_tempo, max_tempo, tempo_step
            )
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING
                id, account_id, current_collection, repetitions,
                min_tempo, max_tempo, tempo_step
            "#,
        )
        .bind(settings.account_id)
        .bind(settings.current_collection)
        .bind(settings.repetitions)
        .bind(settings.min_tempo)
        .bind(settings.max_tempo)
        .bind(settings.tempo_step)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_account<'e, E>(
        executor: E,
        account_id: i64,
    ) -> AppResult<Option<AccountSettings>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, AccountSettings>(
            r#"
            SELECT
                id, account_id, current_collection, repetitions,
                min_tempo, max_tempo, tempo_step
            FROM settings
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn set_current_collection<'e, E>(
        executor: E,
        account_id: i64,
        collection_id: i64,
    ) -> AppResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query("UPDATE settings SET current_collection = ? WHERE account_id = ?")
            .bind(collection_id)
            .bind(account_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Reset the pointer for every account whose current collection is `collection_id`.
    pub async fn clear_current_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("UPDATE settings SET current_collection = ? WHERE current_collection = ?")
            .bind(NO_CURRENT_COLLECTION)
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected())
    }

    /// Reset one account's pointer if it names `collection_id`.
    pub async fn clear_current_collection_for<'e, E>(
        executor: E,
        account_id: i64,
        collection_id: i64,
    ) -> AppResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            "UPDATE settings SET current_collection = ? WHERE account_id = ? AND current_collection = ?",
        )
        .bind(NO_CURRENT_COLLECTION)
        .bind(account_id)
        .bind(collection_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
