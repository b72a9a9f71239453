//! Account provisioning.
//!
//! An account is only ever created together with its subscription, its
//! settings, a grant on every public collection, and a verification request.
//! All of it commits in one transaction or none of it does.

use std::sync::Arc;

use sqlx::SqliteConnection;

use crate::db::models::{Account, AccountDraft, AccountSettings, SubscriptionTier};
use crate::db::{
    is_unique_violation, AccountRepository, CollectionRepository, GrantRepository, LockKey,
    SettingsRepository, Store, SubscriptionRepository,
};
use crate::error::{AppError, AppResult, IdentityField, PreconditionError};
use crate::services::quota::QuotaEnforcer;
use crate::services::validation::validate_account_draft;
use crate::services::verification::VerificationSender;
use crate::AppState;

pub struct AccountProvisioner;

impl AccountProvisioner {
    /// Create an account from a signup draft.
    pub async fn provision_account(state: &Arc<AppState>, draft: AccountDraft) -> AppResult<Account> {
        let draft = normalize(draft);
        validate_account_draft(&draft)?;

        let account = Self::provision(state, &draft, true).await?;
        tracing::info!("Provisioned account {} ({})", account.id, account.username);
        Ok(account)
    }

    /// Return the guest account, creating it on first start. The guest skips
    /// signup validation and verification.
    pub async fn ensure_guest(state: &Arc<AppState>) -> AppResult<Account> {
        let guest_username = &state.config.accounts.guest_username;
        if let Some(existing) = AccountRepository::find_by_username(state.store.pool(), guest_username).await? {
            return Ok(existing);
        }

        let draft = AccountDraft {
            username: guest_username.clone(),
            email: state.config.accounts.guest_email.clone(),
        };
        let guest = Self::provision(state, &draft, false).await?;
        tracing::info!("Created guest account {}", guest.id);
        Ok(guest)
    }

    async fn provision(state: &Arc<AppState>, draft: &AccountDraft, verify: bool) -> AppResult<Account> {
        // Fail fast on taken identities before any lock or transaction.
        if let Some(field) = Self::taken_identity(state, draft).await? {
            return Err(PreconditionError::DuplicateIdentity(field).into());
        }

        // Public collections get a grant each; lock them so none can be
        // deleted underneath the provisioning transaction.
        let public_ids = CollectionRepository::find_public_ids(state.store.pool()).await?;
        let keys: Vec<LockKey> = public_ids.iter().map(|id| LockKey::Collection(*id)).collect();
        let _guard = state.store.lock(&keys).await;

        let verifier = if verify { Some(state.verifier.as_ref()) } else { None };

        let mut tx = state.store.begin().await?;
        let result = Self::provision_in_tx(&mut tx, state, draft, &public_ids, verifier).await;
        Store::finish(tx, result).await
    }

    async fn taken_identity(state: &Arc<AppState>, draft: &AccountDraft) -> AppResult<Option<IdentityField>> {
        let matches =
            AccountRepository::find_by_username_or_email(state.store.pool(), &draft.username, &draft.email)
                .await?;

        if matches.iter().any(|a| a.username == draft.username) {
            Ok(Some(IdentityField::Username))
        } else if matches.is_empty() {
            Ok(None)
        } else {
            Ok(Some(IdentityField::Email))
        }
    }

    async fn provision_in_tx(
        conn: &mut SqliteConnection,
        state: &Arc<AppState>,
        draft: &AccountDraft,
        public_ids: &[i64],
        verifier: Option<&dyn VerificationSender>,
    ) -> AppResult<Account> {
        let account = match AccountRepository::create(&mut *conn, draft).await {
            Ok(account) => account,
            Err(AppError::Database(e)) if is_unique_violation(&e) => {
                // Lost a race against a concurrent signup for the same identity.
                let field = if e.to_string().contains("email") {
                    IdentityField::Email
                } else {
                    IdentityField::Username
                };
                return Err(PreconditionError::DuplicateIdentity(field).into());
            }
            Err(e) => return Err(e),
        };

        let tier = SubscriptionTier::default();
        let subscription = SubscriptionRepository::create(
            &mut *conn,
            account.id,
            tier,
            tier.max_collections(&state.config.quota),
        )
        .await?;
        let settings =
            SettingsRepository::create(&mut *conn, &AccountSettings::defaults_for(account.id)).await?;
        let account =
            AccountRepository::link_dependents(&mut *conn, account.id, subscription.id, settings.id)
                .await?;

        for &collection_id in public_ids {
            if !CollectionRepository::exists(&mut *conn, collection_id).await? {
                continue;
            }
            QuotaEnforcer::check_can_grant(conn, account.id).await?;
            GrantRepository::associate(&mut *conn, account.id, collection_id).await?;
        }

        if let Some(verifier) = verifier {
            verifier
                .send(&account)
                .await
                .map_err(|e| AppError::Verification(e.to_string()))?;
        }

        Ok(account)
    }
}

fn normalize(draft: AccountDraft) -> AccountDraft {
    AccountDraft {
        username: draft.username.trim().to_string(),
        email: draft.email.trim().to_lowercase(),
    }
}
