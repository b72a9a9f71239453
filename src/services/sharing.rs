//! Offer, revoke, accept, and list collection shares.
//!
//! Every mutation takes the collection's lock (and, when a grant may be
//! added, the receiver's account lock) before opening its transaction. Checks
//! and writes then run on that one transaction, so a failed precondition
//! leaves nothing behind.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::models::{Account, Collection, ShareDescriptor, SharingFilter, SharingLists};
use crate::db::{
    AccountRepository, CollectionRepository, GrantRepository, LockKey, ShareOfferRepository, Store,
};
use crate::error::{AppResult, PreconditionError};
use crate::services::quota::QuotaEnforcer;
use crate::services::validation::validate_share_comments;
use crate::AppState;

pub struct SharingCoordinator;

impl SharingCoordinator {
    /// Propose handing `collection_id` from `sharer_id` to `receiver_id`.
    pub async fn offer(
        state: &Arc<AppState>,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
        comments: &str,
    ) -> AppResult<ShareDescriptor> {
        validate_share_comments(comments)?;

        let _guard = state.store.lock(&[LockKey::Collection(collection_id)]).await;
        let mut tx = state.store.begin().await?;
        let result = Self::offer_in_tx(
            &mut tx,
            &state.config.accounts.guest_username,
            sharer_id,
            receiver_id,
            collection_id,
            comments,
        )
        .await;
        let descriptor = Store::finish(tx, result).await?;

        tracing::info!(
            "Account {} offered collection {} to account {}",
            sharer_id,
            collection_id,
            receiver_id
        );
        Ok(descriptor)
    }

    async fn offer_in_tx(
        conn: &mut SqliteConnection,
        guest_username: &str,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
        comments: &str,
    ) -> AppResult<ShareDescriptor> {
        if let Some(guest) = AccountRepository::find_by_username(&mut *conn, guest_username).await? {
            if guest.id == receiver_id || guest.id == sharer_id {
                return Err(PreconditionError::GuestNotAllowed.into());
            }
        }

        let receiver = AccountRepository::find_by_id(&mut *conn, receiver_id)
            .await?
            .ok_or(PreconditionError::ReceiverNotFound)?;
        let sharer = AccountRepository::find_by_id(&mut *conn, sharer_id)
            .await?
            .ok_or(PreconditionError::SharerNotFound)?;

        if !GrantRepository::exists(&mut *conn, sharer_id, collection_id).await? {
            return Err(PreconditionError::SharerLacksCollection.into());
        }
        if GrantRepository::exists(&mut *conn, receiver_id, collection_id).await? {
            return Err(PreconditionError::ReceiverAlreadyHasCollection.into());
        }
        if ShareOfferRepository::find_by_triple(&mut *conn, sharer_id, receiver_id, collection_id)
            .await?
            .is_some()
        {
            return Err(PreconditionError::DuplicateOffer.into());
        }

        let offer =
            ShareOfferRepository::create(&mut *conn, sharer_id, receiver_id, collection_id, comments)
                .await?;
        let collection = CollectionRepository::find_by_id(&mut *conn, collection_id)
            .await?
            .ok_or(PreconditionError::NotFound)?;

        Ok(ShareDescriptor::new(
            &collection,
            &offer,
            sharer.username,
            receiver.username,
        ))
    }

    /// Withdraw an offer. Returns false when there was nothing to withdraw.
    pub async fn revoke(
        state: &Arc<AppState>,
        sharer_id: i64,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<bool> {
        let _guard = state.store.lock(&[LockKey::Collection(collection_id)]).await;
        let mut tx = state.store.begin().await?;
        let result =
            ShareOfferRepository::delete_by_triple(&mut *tx, sharer_id, receiver_id, collection_id)
                .await;
        let removed = Store::finish(tx, result).await?;

        if removed {
            tracing::info!(
                "Account {} revoked offer of collection {} to account {}",
                sharer_id,
                collection_id,
                receiver_id
            );
        }
        Ok(removed)
    }

    /// Take up a pending offer. The grant is added and every offer of the
    /// collection to this receiver is consumed.
    pub async fn accept(
        state: &Arc<AppState>,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<Collection> {
        let _guard = state
            .store
            .lock(&[LockKey::Account(receiver_id), LockKey::Collection(collection_id)])
            .await;
        let mut tx = state.store.begin().await?;
        let result = Self::accept_in_tx(&mut tx, receiver_id, collection_id).await;
        let collection = Store::finish(tx, result).await?;

        tracing::info!(
            "Account {} accepted collection {}",
            receiver_id,
            collection_id
        );
        Ok(collection)
    }

    async fn accept_in_tx(
        conn: &mut SqliteConnection,
        receiver_id: i64,
        collection_id: i64,
    ) -> AppResult<Collection> {
        if !ShareOfferRepository::exists_for_receiver(&mut *conn, receiver_id, collection_id).await? {
            return Err(PreconditionError::NotShared.into());
        }
        if GrantRepository::exists(&mut *conn, receiver_id, collection_id).await? {
            return Err(PreconditionError::AlreadyHeld.into());
        }

        QuotaEnforcer::check_can_grant(conn, receiver_id).await?;

        GrantRepository::associate(&mut *conn, receiver_id, collection_id).await?;
        ShareOfferRepository::delete_for_receiver(&mut *conn, receiver_id, collection_id).await?;

        CollectionRepository::find_by_id(&mut *conn, collection_id)
            .await?
            .ok_or_else(|| PreconditionError::NotFound.into())
    }

    /// Offers received by `account_id`, and with `SharingFilter::All` also
    /// the offers it has made. Both lists are newest first.
    pub async fn list_sharing(
        state: &Arc<AppState>,
        account: &Account,
        filter: SharingFilter,
    ) -> AppResult<SharingLists> {
        let rows =
            ShareOfferRepository::list_with_parties(state.store.pool(), account.id, filter).await?;

        let mut lists = SharingLists::default();
        for row in rows {
            let descriptor = ShareDescriptor::new(
                &row.collection,
                &row.offer,
                row.sharer_name,
                row.receiver_name,
            );
            if row.offer.receiver_id == account.id {
                lists.received.push(descriptor);
            } else {
                lists.shared.push(descriptor);
            }
        }

        Ok(lists)
    }
}
