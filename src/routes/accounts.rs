use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::models::{Account, AccountDraft, AccountSettings, SubscriptionTier};
use crate::db::{GrantRepository, SettingsRepository, SubscriptionRepository};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::auth::AuthService;
use crate::services::provisioning::AccountProvisioner;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_account))
        .route("/me", get(me))
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            username: a.username,
            email: a.email,
        }
    }
}

/// Signup response: the new account and a session token for it.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    pub tier: SubscriptionTier,
    pub max_collections: i64,
    pub held_collections: i64,
    pub settings: AccountSettings,
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<AccountDraft>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let account = AccountProvisioner::provision_account(&state, draft).await?;
    let token = AuthService::create_jwt(&state, account.id)?;
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            account: account.into(),
            token,
        }),
    ))
}

async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> AppResult<Json<MeResponse>> {
    let pool = state.store.pool();

    let subscription = SubscriptionRepository::find_by_account(pool, account.id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("account {} has no subscription", account.id)))?;
    let settings = SettingsRepository::find_by_account(pool, account.id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("account {} has no settings", account.id)))?;
    let held_collections = GrantRepository::count_for_account(pool, account.id).await?;

    Ok(Json(MeResponse {
        account: account.into(),
        tier: subscription.tier,
        max_collections: subscription.max_collections,
        held_collections,
        settings,
    }))
}
