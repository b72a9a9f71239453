use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::models::{CollectionDraft, CollectionSummary, Item, ItemDraft};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::collections::CollectionService;
use crate::services::lifecycle::LifecycleManager;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_held).post(create_collection))
        .route("/:id", delete(unlink_collection))
        .route("/:id/items", post(add_item))
}

#[derive(Debug, Serialize)]
pub struct UnlinkResponse {
    pub ok: bool,
    /// True when this was the last holder and the collection is gone.
    pub deleted: bool,
}

async fn list_held(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
) -> AppResult<Json<Vec<CollectionSummary>>> {
    let held = CollectionService::list_held(&state, account.id).await?;
    Ok(Json(held.iter().map(CollectionSummary::from).collect()))
}

async fn create_collection(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Json(draft): Json<CollectionDraft>,
) -> AppResult<(StatusCode, Json<CollectionSummary>)> {
    let collection = CollectionService::create_collection(&state, account.id, draft).await?;
    Ok((StatusCode::CREATED, Json(CollectionSummary::from(&collection))))
}

async fn add_item(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(collection_id): Path<i64>,
    Json(draft): Json<ItemDraft>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = CollectionService::add_item(&state, account.id, collection_id, draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn unlink_collection(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(collection_id): Path<i64>,
) -> AppResult<Json<UnlinkResponse>> {
    let deleted = LifecycleManager::remove_grant(&state, account.id, collection_id).await?;
    Ok(Json(UnlinkResponse { ok: true, deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::AccountDraft;
    use crate::db::testing::test_state;
    use crate::services::auth::AuthService;
    use crate::services::provisioning::AccountProvisioner;
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn signed_up(state: &Arc<AppState>, name: &str) -> String {
        let account = AccountProvisioner::provision_account(
            state,
            AccountDraft {
                username: name.to_string(),
                email: format!("{}@example.com", name),
            },
        )
        .await
        .unwrap();
        format!("Bearer {}", AuthService::create_jwt(state, account.id).unwrap())
    }

    fn create(auth: &str, body: serde_json::Value) -> Request<Body> {
        Request::post("/api/collections")
            .header(http::header::AUTHORIZATION, auth)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn clients_cannot_publish_collections() {
        let state = test_state().await;
        let alice = signed_up(&state, "alice").await;

        for i in 0..2 {
            let resp = crate::routes::api_router()
                .with_state(state.clone())
                .oneshot(create(&alice, serde_json::json!({ "name": format!("Set {}", i), "public": true })))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["public"], false);
        }

        // Signups keep working with an empty default grant set.
        let bobby = signed_up(&state, "bobby").await;
        let resp = crate::routes::api_router()
            .with_state(state.clone())
            .oneshot(
                Request::get("/api/collections")
                    .header(http::header::AUTHORIZATION, &bobby)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(0));
    }
}
