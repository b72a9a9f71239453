//! Reference counting of the grants relation.
//!
//! A collection lives exactly as long as some account holds it. Removing the
//! last grant deletes the collection together with its items and any offers
//! that still name it, in the same transaction as the removal.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::{
    CollectionRepository, GrantRepository, ItemRepository, LockKey, SettingsRepository,
    ShareOfferRepository, Store,
};
use crate::error::{AppResult, PreconditionError};
use crate::AppState;

pub struct LifecycleManager;

impl LifecycleManager {
    /// Run after a grant on `collection_id` has been deleted in `conn`'s
    /// transaction. Returns true when the collection was deleted.
    ///
    /// The caller must hold `LockKey::Collection(collection_id)` for the
    /// whole transaction so no grant can be added between the count and the
    /// delete.
    pub async fn on_grant_removed(
        conn: &mut SqliteConnection,
        account_id: i64,
        collection_id: i64,
    ) -> AppResult<bool> {
        let remaining = GrantRepository::count_for_collection(&mut *conn, collection_id).await?;
        if remaining > 0 {
            tracing::debug!(
                "Collection {} still held by {} account(s) after account {} released it",
                collection_id,
                remaining,
                account_id
            );
            return Ok(false);
        }

        let offers = ShareOfferRepository::delete_for_collection(&mut *conn, collection_id).await?;
        let items = ItemRepository::delete_for_collection(&mut *conn, collection_id).await?;
        SettingsRepository::clear_current_collection(&mut *conn, collection_id).await?;
        let deleted = CollectionRepository::delete(&mut *conn, collection_id).await?;

        if deleted {
            tracing::info!(
                "Deleted collection {} ({} items, {} pending offers) after its last grant was removed",
                collection_id,
                items,
                offers
            );
        }

        Ok(deleted)
    }

    /// Explicit unlink: `account_id` stops holding `collection_id`.
    ///
    /// Also withdraws the account's outgoing offers for the collection, since
    /// an offer may only exist while its sharer holds what it offers.
    pub async fn remove_grant(
        state: &Arc<AppState>,
        account_id: i64,
        collection_id: i64,
    ) -> AppResult<bool> {
        let _guard = state
            .store
            .lock(&[LockKey::Account(account_id), LockKey::Collection(collection_id)])
            .await;
        let mut tx = state.store.begin().await?;
        let result = Self::remove_grant_in_tx(&mut tx, account_id, collection_id).await;
        Store::finish(tx, result).await
    }

    async fn remove_grant_in_tx(
        conn: &mut SqliteConnection,
        account_id: i64,
        collection_id: i64,
    ) -> AppResult<bool> {
        if !GrantRepository::dissociate(&mut *conn, account_id, collection_id).await? {
            return Err(PreconditionError::NotFound.into());
        }

        let withdrawn =
            ShareOfferRepository::delete_from_sharer(&mut *conn, account_id, collection_id).await?;
        if withdrawn > 0 {
            tracing::debug!(
                "Withdrew {} offer(s) of collection {} from account {}",
                withdrawn,
                collection_id,
                account_id
            );
        }
        SettingsRepository::clear_current_collection_for(&mut *conn, account_id, collection_id)
            .await?;

        Self::on_grant_removed(conn, account_id, collection_id).await
    }
}
