use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::models::{Collection, CollectionDraft, Item, ItemDraft};
use crate::db::{
    AccountRepository, CollectionRepository, GrantRepository, ItemRepository, LockKey,
    SettingsRepository, Store,
};
use crate::error::{AppResult, PreconditionError};
use crate::services::quota::QuotaEnforcer;
use crate::services::validation::{
    validate_collection_draft, validate_item_draft, MAX_ITEMS_PER_COLLECTION,
};
use crate::AppState;

/// Owner actions on collections: creating them and adding items.
pub struct CollectionService;

impl CollectionService {
    /// Create a collection held by `owner_id`. Counts against the owner's
    /// quota and becomes their current collection.
    pub async fn create_collection(
        state: &Arc<AppState>,
        owner_id: i64,
        draft: CollectionDraft,
    ) -> AppResult<Collection> {
        let draft = CollectionDraft {
            name: draft.name.trim().to_string(),
            category: draft.category.trim().to_string(),
            ..draft
        };
        validate_collection_draft(&draft)?;

        let _guard = state.store.lock(&[LockKey::Account(owner_id)]).await;
        let mut tx = state.store.begin().await?;
        let result = Self::create_in_tx(&mut tx, owner_id, &draft).await;
        let collection = Store::finish(tx, result).await?;

        tracing::debug!("Account {} created collection {}", owner_id, collection.id);
        Ok(collection)
    }

    async fn create_in_tx(
        conn: &mut SqliteConnection,
        owner_id: i64,
        draft: &CollectionDraft,
    ) -> AppResult<Collection> {
        if AccountRepository::find_by_id(&mut *conn, owner_id).await?.is_none() {
            return Err(PreconditionError::NotFound.into());
        }
        QuotaEnforcer::check_can_grant(conn, owner_id).await?;

        let collection = CollectionRepository::create(&mut *conn, Some(owner_id), draft, false).await?;
        GrantRepository::associate(&mut *conn, owner_id, collection.id).await?;
        SettingsRepository::set_current_collection(&mut *conn, owner_id, collection.id).await?;

        Ok(collection)
    }

    /// Create an ownerless public collection. Every account provisioned from
    /// now on is granted it. Refused once the public set would exceed the
    /// lowest tier's quota, since signups would then fail.
    pub async fn publish(state: &Arc<AppState>, draft: CollectionDraft) -> AppResult<Collection> {
        let draft = CollectionDraft {
            name: draft.name.trim().to_string(),
            category: draft.category.trim().to_string(),
            ..draft
        };
        validate_collection_draft(&draft)?;

        let ceiling = state.config.quota.unsubscribed_max;
        let mut tx = state.store.begin().await?;
        let result = Self::publish_in_tx(&mut tx, ceiling, &draft).await;
        let collection = Store::finish(tx, result).await?;

        tracing::info!("Published collection {} ({})", collection.id, collection.name);
        Ok(collection)
    }

    async fn publish_in_tx(
        conn: &mut SqliteConnection,
        ceiling: i64,
        draft: &CollectionDraft,
    ) -> AppResult<Collection> {
        let published = CollectionRepository::find_public_ids(&mut *conn).await?.len() as i64;
        if published >= ceiling {
            return Err(PreconditionError::QuotaExceeded.into());
        }
        CollectionRepository::create(&mut *conn, None, draft, true).await
    }

    /// Append an item to a collection the account holds.
    pub async fn add_item(
        state: &Arc<AppState>,
        account_id: i64,
        collection_id: i64,
        draft: ItemDraft,
    ) -> AppResult<Item> {
        validate_item_draft(&draft)?;

        let _guard = state.store.lock(&[LockKey::Collection(collection_id)]).await;
        let mut tx = state.store.begin().await?;
        let result = Self::add_item_in_tx(&mut tx, account_id, collection_id, &draft).await;
        Store::finish(tx, result).await
    }

    async fn add_item_in_tx(
        conn: &mut SqliteConnection,
        account_id: i64,
        collection_id: i64,
        draft: &ItemDraft,
    ) -> AppResult<Item> {
        if !GrantRepository::exists(&mut *conn, account_id, collection_id).await? {
            return Err(PreconditionError::NotFound.into());
        }
        if ItemRepository::count_for_collection(&mut *conn, collection_id).await?
            >= MAX_ITEMS_PER_COLLECTION
        {
            return Err(PreconditionError::ItemLimitReached.into());
        }

        let collection = CollectionRepository::find_by_id(&mut *conn, collection_id)
            .await?
            .ok_or(PreconditionError::NotFound)?;
        let item = ItemRepository::create(&mut *conn, collection_id, draft).await?;

        let mut ordering = collection.item_ids().to_vec();
        ordering.push(item.id);
        CollectionRepository::set_item_ordering(&mut *conn, collection_id, &ordering).await?;

        Ok(item)
    }

    pub async fn list_held(state: &Arc<AppState>, account_id: i64) -> AppResult<Vec<Collection>> {
        CollectionRepository::list_held(state.store.pool(), account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountDraft;
    use crate::db::testing::test_state;
    use crate::services::provisioning::AccountProvisioner;

    async fn owner(state: &Arc<AppState>) -> i64 {
        AccountProvisioner::provision_account(
            state,
            AccountDraft {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await
        .unwrap()
        .id
    }

    fn item(name: &str) -> ItemDraft {
        ItemDraft {
            name: name.to_string(),
            notation: "RLRR LRLL".to_string(),
            category: "paradiddle".to_string(),
            comments: String::new(),
        }
    }

    #[tokio::test]
    async fn created_collection_is_held_and_current() {
        let state = test_state().await;
        let alice = owner(&state).await;

        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "  Paradiddles ".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(c.name, "Paradiddles");
        assert_eq!(c.owner_id, Some(alice));

        let held = CollectionService::list_held(&state, alice).await.unwrap();
        assert_eq!(held.len(), 1);

        let settings = SettingsRepository::find_by_account(state.store.pool(), alice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settings.current_collection, c.id);
    }

    #[tokio::test]
    async fn items_are_appended_in_order() {
        let state = test_state().await;
        let alice = owner(&state).await;
        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "Rolls".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let first = CollectionService::add_item(&state, alice, c.id, item("single"))
            .await
            .unwrap();
        let second = CollectionService::add_item(&state, alice, c.id, item("double"))
            .await
            .unwrap();

        let c = CollectionRepository::find_by_id(state.store.pool(), c.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.item_ids(), &[first.id, second.id]);
    }

    #[tokio::test]
    async fn item_cap_is_enforced() {
        let state = test_state().await;
        let alice = owner(&state).await;
        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "Full".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        for i in 0..MAX_ITEMS_PER_COLLECTION {
            CollectionService::add_item(&state, alice, c.id, item(&format!("item {}", i)))
                .await
                .unwrap();
        }
        let err = CollectionService::add_item(&state, alice, c.id, item("one too many"))
            .await
            .unwrap_err();
        assert_eq!(err.precondition(), Some(PreconditionError::ItemLimitReached));
    }

    #[tokio::test]
    async fn undecodable_ordering_fails_instead_of_being_replaced() {
        let state = test_state().await;
        let alice = owner(&state).await;
        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "Flams".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        sqlx::query("UPDATE collections SET item_ordering = 'not json' WHERE id = ?")
            .bind(c.id)
            .execute(state.store.pool())
            .await
            .unwrap();

        let err = CollectionService::add_item(&state, alice, c.id, item("flam tap"))
            .await
            .unwrap_err();
        assert!(err.is_store_failure());

        let raw: String = sqlx::query_scalar("SELECT item_ordering FROM collections WHERE id = ?")
            .bind(c.id)
            .fetch_one(state.store.pool())
            .await
            .unwrap();
        assert_eq!(raw, "not json");
        assert_eq!(
            ItemRepository::count_for_collection(state.store.pool(), c.id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn owner_collections_are_never_public() {
        let state = test_state().await;
        let alice = owner(&state).await;
        for name in ["one", "two", "three"] {
            let c = CollectionService::create_collection(
                &state,
                alice,
                CollectionDraft {
                    name: name.to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert!(!c.public);
        }

        // A later signup is unaffected by other accounts' collections.
        let bobby = AccountProvisioner::provision_account(
            &state,
            AccountDraft {
                username: "bobby".to_string(),
                email: "bobby@example.com".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(CollectionService::list_held(&state, bobby.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn published_collections_reach_new_accounts_up_to_the_ceiling() {
        let state = test_state().await;
        let ceiling = state.config.quota.unsubscribed_max;
        for i in 0..ceiling {
            let c = CollectionService::publish(
                &state,
                CollectionDraft {
                    name: format!("Basics {}", i),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
            assert!(c.public);
            assert_eq!(c.owner_id, None);
        }

        let err = CollectionService::publish(
            &state,
            CollectionDraft {
                name: "One too many".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.precondition(), Some(PreconditionError::QuotaExceeded));

        let alice = owner(&state).await;
        let held = CollectionService::list_held(&state, alice).await.unwrap();
        assert_eq!(held.len() as i64, ceiling);
    }

    #[tokio::test]
    async fn items_need_a_grant() {
        let state = test_state().await;
        let alice = owner(&state).await;
        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "Private".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = CollectionService::add_item(&state, alice + 1, c.id, item("sneaky"))
            .await
            .unwrap_err();
        assert_eq!(err.precondition(), Some(PreconditionError::NotFound));
    }
}
