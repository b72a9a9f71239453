use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::db::models::{Collection, ShareOffer, SharingFilter};
use crate::error::{AppError, AppResult, PreconditionError};

// ============================================================================
// Share Offer Repository
// ============================================================================

pub struct ShareOfferRepository;

/// An offer joined with its collection and both parties' usernames.
pub struct OfferWithParties {
    pub offer: ShareOffer,
    pub collection: Collection,
    pub sharer_name: String,
    pub receiver_name: String,
}

impl ShareOfferRepository {
    /// Insert a new offer. The `(sharer, receiver, collection)` unique
    /// constraint decides races: the losing insert gets `DuplicateOffer`.
    pub async fn create<'e, E>(
        executor: E,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
        comments: &str,
    ) -> AppResult<ShareOffer>
    where
        E: SqliteExecutor<'e>,
    {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().naive_utc();

        sqlx::query_as::<_, ShareOffer>(
            r#"
            INSERT INTO share_offers (
                id, sharer_id, receiver_id, collection_id, comments, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, sharer_id, receiver_id, collection_id, comments, created_at
            "#,
        )
        .bind(id)
        .bind(sharer_id)
        .bind(receiver_id)
        .bind(collection_id)
        .bind(comments)
        .bind(now)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Precondition(PreconditionError::DuplicateOffer)
            } else {
                AppError::Database(e)
            }
        })
    }

    pub async fn find_by_triple<'e, E>(
        executor: E,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<Option<ShareOffer>>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ShareOffer>(
            r#"
            SELECT id, sharer_id, receiver_id, collection_id, comments, created_at
            FROM share_offers
            WHERE sharer_id = ? AND receiver_id = ? AND collection_id = ?
            LIMIT 1
            "#,
        )
        .bind(sharer_id)
        .bind(receiver_id)
        .bind(collection_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
    }

    /// Any pending offer of `collection_id` to `receiver_id`, from any sharer.
    pub async fn exists_for_receiver<'e, E>(
        executor: E,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM share_offers WHERE receiver_id = ? AND collection_id = ?",
        )
        .bind(receiver_id)
        .bind(collection_id)
        .fetch_one(executor)
        .await
        .map(|n| n > 0)
        .map_err(AppError::Database)
    }

    /// Returns false when no offer matched.
    pub async fn delete_by_triple<'e, E>(
        executor: E,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<bool>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query(
            "DELETE FROM share_offers WHERE sharer_id = ? AND receiver_id = ? AND collection_id = ?",
        )
        .bind(sharer_id)
        .bind(receiver_id)
        .bind(collection_id)
        .execute(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(res.rows_affected() > 0)
    }

    /// Remove every offer of `collection_id` addressed to `receiver_id`.
    pub async fn delete_for_receiver<'e, E>(
        executor: E,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM share_offers WHERE receiver_id = ? AND collection_id = ?")
            .bind(receiver_id)
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected())
    }

    /// Remove every offer of `collection_id` made by `sharer_id`.
    pub async fn delete_from_sharer<'e, E>(
        executor: E,
        sharer_id: i64,
        collection_id: i64,
    ) -> AppResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM share_offers WHERE sharer_id = ? AND collection_id = ?")
            .bind(sharer_id)
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected())
    }

    pub async fn delete_for_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let res = sqlx::query("DELETE FROM share_offers WHERE collection_id = ?")
            .bind(collection_id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(res.rows_affected())
    }

    #[cfg(test)]
    pub async fn count_for_collection<'e, E>(executor: E, collection_id: i64) -> AppResult<i64>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM share_offers WHERE collection_id = ?")
            .bind(collection_id)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)
    }

    /// Offers where the account is the receiver, plus (for `SharingFilter::All`)
    /// offers it has made, joined with collection metadata and usernames.
    pub async fn list_with_parties<'e, E>(
        executor: E,
        account_id: i64,
        filter: SharingFilter,
    ) -> AppResult<Vec<OfferWithParties>>
    where
        E: SqliteExecutor<'e>,
    {
        let include_shared = matches!(filter, SharingFilter::All);

        let rows = sqlx::query(
            r#"
            SELECT
                s.id AS share_id,
                s.sharer_id AS sharer_id,
                s.receiver_id AS receiver_id,
                s.collection_id AS collection_id,
                s.comments AS share_comments,
                s.created_at AS share_created_at,
                c.owner_id AS owner_id,
                c.name AS name,
                c.category AS category,
                c.comments AS collection_comments,
                c.item_ordering AS item_ordering,
                c.public AS public,
                c.created_at AS collection_created_at,
                sa.username AS sharer_name,
                ra.username AS receiver_name
            FROM share_offers s
            JOIN collections c ON c.id = s.collection_id
            JOIN accounts sa ON sa.id = s.sharer_id
            JOIN accounts ra ON ra.id = s.receiver_id
            WHERE s.receiver_id = ? OR (? AND s.sharer_id = ?)
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(account_id)
        .bind(include_shared)
        .bind(account_id)
        .fetch_all(executor)
        .await
        .map_err(AppError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let offer = ShareOffer {
                id: r.get("share_id"),
                sharer_id: r.get("sharer_id"),
                receiver_id: r.get("receiver_id"),
                collection_id: r.get("collection_id"),
                comments: r.get("share_comments"),
                created_at: r.get("share_created_at"),
            };
            let collection = Collection {
                id: offer.collection_id,
                owner_id: r.get("owner_id"),
                name: r.get("name"),
                category: r.get("category"),
                comments: r.get("collection_comments"),
                item_ordering: r.try_get("item_ordering").map_err(AppError::Database)?,
                public: r.get("public"),
                created_at: r.get("collection_created_at"),
            };

            out.push(OfferWithParties {
                offer,
                collection,
                sharer_name: r.get("sharer_name"),
                receiver_name: r.get("receiver_name"),
            });
        }

        Ok(out)
    }
}
