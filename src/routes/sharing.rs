use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{CollectionSummary, ShareDescriptor, SharingFilter, SharingLists};
use crate::db::AccountRepository;
use crate::error::{AppResult, PreconditionError};
use crate::routes::auth::AuthUser;
use crate::services::sharing::SharingCoordinator;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_sharing).post(offer_share))
        .route("/:collection_id/accept", post(accept_share))
        .route("/:collection_id/:receiver_id", delete(revoke_share))
}

#[derive(Debug, Default, Deserialize)]
pub struct SharingQuery {
    #[serde(default)]
    pub filter: SharingFilter,
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    #[serde(alias = "receiverName")]
    pub receiver_name: String,
    #[serde(alias = "collectionId")]
    pub collection_id: i64,
    #[serde(default)]
    pub comments: String,
}

async fn list_sharing(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Query(query): Query<SharingQuery>,
) -> AppResult<Json<SharingLists>> {
    let lists = SharingCoordinator::list_sharing(&state, &account, query.filter).await?;
    Ok(Json(lists))
}

async fn offer_share(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Json(request): Json<OfferRequest>,
) -> AppResult<(StatusCode, Json<ShareDescriptor>)> {
    let receiver = AccountRepository::find_by_username(state.store.pool(), request.receiver_name.trim())
        .await?
        .ok_or(PreconditionError::ReceiverNotFound)?;

    let descriptor = SharingCoordinator::offer(
        &state,
        account.id,
        receiver.id,
        request.collection_id,
        &request.comments,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(descriptor)))
}

async fn revoke_share(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path((collection_id, receiver_id)): Path<(i64, i64)>,
) -> AppResult<Json<serde_json::Value>> {
    let removed = SharingCoordinator::revoke(&state, account.id, receiver_id, collection_id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })))
}

async fn accept_share(
    State(state): State<Arc<AppState>>,
    AuthUser(account): AuthUser,
    Path(collection_id): Path<i64>,
) -> AppResult<Json<CollectionSummary>> {
    let collection = SharingCoordinator::accept(&state, account.id, collection_id).await?;
    Ok(Json(CollectionSummary::from(&collection)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AccountDraft, CollectionDraft};
    use crate::db::testing::test_state;
    use crate::services::auth::AuthService;
    use crate::services::collections::CollectionService;
    use crate::services::provisioning::AccountProvisioner;
    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        crate::routes::api_router().with_state(state)
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn signed_up(state: &Arc<AppState>, name: &str) -> (i64, String) {
        let account = AccountProvisioner::provision_account(
            state,
            AccountDraft {
                username: name.to_string(),
                email: format!("{}@example.com", name),
            },
        )
        .await
        .unwrap();
        let token = AuthService::create_jwt(state, account.id).unwrap();
        (account.id, format!("Bearer {}", token))
    }

    #[tokio::test]
    async fn offer_list_accept_over_http() {
        let state = test_state().await;
        let (alice, alice_auth) = signed_up(&state, "alice").await;
        let (_, bobby_auth) = signed_up(&state, "bobby").await;
        let c = CollectionService::create_collection(
            &state,
            alice,
            CollectionDraft {
                name: "Paradiddles".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let body = serde_json::json!({
            "receiverName": "bobby",
            "collectionId": c.id,
            "comments": "have fun"
        });
        let resp = app(state.clone())
            .oneshot(
                Request::post("/api/sharing")
                    .header(http::header::AUTHORIZATION, &alice_auth)
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let descriptor = json_body(resp).await;
        assert_eq!(descriptor["name"], "Paradiddles");
        assert_eq!(descriptor["receiver_name"], "bobby");

        let resp = app(state.clone())
            .oneshot(
                Request::get("/api/sharing?filter=received")
                    .header(http::header::AUTHORIZATION, &bobby_auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let lists = json_body(resp).await;
        assert_eq!(lists["received"].as_array().unwrap().len(), 1);
        assert_eq!(lists["received"][0]["sharer_name"], "alice");

        let resp = app(state.clone())
            .oneshot(
                Request::post(format!("/api/sharing/{}/accept", c.id))
                    .header(http::header::AUTHORIZATION, &bobby_auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app(state)
            .oneshot(
                Request::get("/api/sharing")
                    .header(http::header::AUTHORIZATION, &bobby_auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let lists = json_body(resp).await;
        assert!(lists["received"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn offering_to_an_unknown_name_is_not_found() {
        let state = test_state().await;
        let (_, alice_auth) = signed_up(&state, "alice").await;

        let resp = app(state)
            .oneshot(
                Request::post("/api/sharing")
                    .header(http::header::AUTHORIZATION, &alice_auth)
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"receiver_name":"nobody","collection_id":1}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "RECEIVER_NOT_FOUND");
    }

    #[tokio::test]
    async fn accept_without_offer_reports_not_shared() {
        let state = test_state().await;
        let (_, bobby_auth) = signed_up(&state, "bobby").await;

        let resp = app(state)
            .oneshot(
                Request::post("/api/sharing/42/accept")
                    .header(http::header::AUTHORIZATION, &bobby_auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["code"], "NOT_SHARED");
    }
}
