use chrono::Utc;
use sqlx::SqliteExecutor;

use crate::db::models::{Collection, CollectionDraft, Item, ItemDraft};
use crate::error::{AppError, AppResult};

// ============================================================================
// Collection Repository
// ============================================================================

pub struct CollectionRepository;

impl CollectionRepository {
    pub async fn create<'e, E>(
        executor: E,
        owner_id: Option<i64>,
        draft: &CollectionDraft,
        public: bool,
    ) -> AppResult<Collection>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Collection>(
            r#"
            INSERT INTO collections (owner_id, name, category, comments, item_ordering, public, created_at)
            VALUES (?, ?, ?, ?, '[]', ?, ?)
            RETURNING id, owner_id, name, category, comments, item_ordering, public, created_at
            "#,
        )
        .bind(owner_id)
        .bind(&draft.name)
        .bind(&draft.category)
        .bind(&draft.comments)
        .bind(public)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> AppResult<Option<Collection>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Collection>(
            r#"
            SELECT id, owner_id, name, category, comments, item_ordering, public, created_at
            FROM collections
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn exists<'e, E>(executor: E, id: i64) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM collections WHERE id = ?")
            .bind(id)
            .fetch_one(executor)
            .await
            .map(|n| n > 0)
            .map_err(AppError::Database)
    }

    pub async fn find_public_ids<'e, E>(executor: E) -> AppResult<Vec<i64>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT id FROM collections WHERE public = 1 ORDER BY id")
            .fetch_all(executor)
            .await
            .map_err(AppError::Database)
    }

    /// Collections currently held by an account.
    pub async fn list_held<'e, E>(executor: E, account_id: i64) -> AppResult<Vec<Collection>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, Collection>(
            r#"
            SELECT c.id, c.owner_id, c.name, c.category, c.comments, c.item_ordering, c.public, c.created_at
            FROM collections c
            JOIN grants g ON g.collection_id = c.id
            WHERE g.account_id = ?
            ORDER BY c.id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn set_item_ordering<'e, E>(executor: E, id: i64, ordering: &[i64]) -> AppResult<()>
    where
        E: SqliteExecutor<'e>,
    {
        let json = serde_json::to_string(ordering).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query("UPDATE collections SET item_ordering = ? WHERE id = ?")
            .bind(json)
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected() > 0)
    }
}

// ============================================================================
// Item Repository
// ============================================================================

pub struct ItemRepository;

impl ItemRepository {
    pub async fn create<'e, E>(executor: E, collection_id: i64, draft: &ItemDraft) -> AppResult<Item>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (collection_id, name, notation, category, comments, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, collection_id, name, notation, category, comments, created_at
            "#,
        )
        .bind(collection_id)
        .bind(&draft.name)
        .bind(&draft.notation)
        .bind(&draft.category)
        .bind(&draft.comments)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
    }

    pub async fn count_for_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }

    pub async fn delete_for_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM items WHERE collection_id = ?")
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected())
    }
}
