use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::{Account, AccountRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Create a signed JWT for an account id
    pub fn create_jwt(state: &Arc<AppState>, account_id: i64) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(state.config.jwt.expiration_hours);
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// Decode and validate a JWT, returning the claims
    pub fn decode_jwt(state: &Arc<AppState>, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Get account from JWT token
    pub async fn get_account_from_token(state: &Arc<AppState>, token: &str) -> AppResult<Account> {
        let claims = Self::decode_jwt(state, token)?;
        let account_id: i64 = claims.sub.parse().map_err(|_| AppError::Unauthorized)?;

        AccountRepository::find_by_id(state.store.pool(), account_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountDraft;
    use crate::db::testing::test_state;
    use crate::services::provisioning::AccountProvisioner;

    #[tokio::test]
    async fn token_round_trips_to_account() {
        let state = test_state().await;
        let account = AccountProvisioner::provision_account(
            &state,
            AccountDraft {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            },
        )
        .await
        .unwrap();

        let token = AuthService::create_jwt(&state, account.id).unwrap();
        let found = AuthService::get_account_from_token(&state, &token).await.unwrap();
        assert_eq!(found.id, account.id);
    }

    #[tokio::test]
    async fn token_for_missing_account_is_unauthorized() {
        let state = test_state().await;
        let token = AuthService::create_jwt(&state, 77).unwrap();

        let err = AuthService::get_account_from_token(&state, &token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let state = test_state().await;
        let err = AuthService::get_account_from_token(&state, "not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AppError::Jwt(_)));
    }
}
