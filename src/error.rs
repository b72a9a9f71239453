use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Business-rule violations. Each one is returned only after any open
/// transaction has been rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("Guest account cannot take part in sharing")]
    GuestNotAllowed,

    #[error("Receiver does not exist")]
    ReceiverNotFound,

    #[error("Sharer does not exist")]
    SharerNotFound,

    #[error("Sharer does not hold the collection")]
    SharerLacksCollection,

    #[error("Receiver already holds the collection")]
    ReceiverAlreadyHasCollection,

    #[error("Collection has already been shared with this receiver")]
    DuplicateOffer,

    #[error("Collection has not been shared with this account")]
    NotShared,

    #[error("Account already holds the collection")]
    AlreadyHeld,

    #[error("Collection quota exceeded")]
    QuotaExceeded,

    #[error("{0} is already in use")]
    DuplicateIdentity(IdentityField),

    #[error("Collection already holds the maximum number of items")]
    ItemLimitReached,

    #[error("Resource not found")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Username,
    Email,
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityField::Username => f.write_str("User name"),
            IdentityField::Email => f.write_str("Email"),
        }
    }
}

impl PreconditionError {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            PreconditionError::GuestNotAllowed => "GUEST_NOT_ALLOWED",
            PreconditionError::ReceiverNotFound => "RECEIVER_NOT_FOUND",
            PreconditionError::SharerNotFound => "SHARER_NOT_FOUND",
            PreconditionError::SharerLacksCollection => "SHARER_LACKS_COLLECTION",
            PreconditionError::ReceiverAlreadyHasCollection => "RECEIVER_ALREADY_HAS_COLLECTION",
            PreconditionError::DuplicateOffer => "DUPLICATE_OFFER",
            PreconditionError::NotShared => "NOT_SHARED",
            PreconditionError::AlreadyHeld => "ALREADY_HELD",
            PreconditionError::QuotaExceeded => "QUOTA_EXCEEDED",
            PreconditionError::DuplicateIdentity(_) => "DUPLICATE_IDENTITY",
            PreconditionError::ItemLimitReached => "ITEM_LIMIT_REACHED",
            PreconditionError::NotFound => "NOT_FOUND",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            PreconditionError::ReceiverNotFound
            | PreconditionError::SharerNotFound
            | PreconditionError::NotShared
            | PreconditionError::NotFound => StatusCode::NOT_FOUND,
            PreconditionError::GuestNotAllowed
            | PreconditionError::SharerLacksCollection
            | PreconditionError::QuotaExceeded
            | PreconditionError::ItemLimitReached => StatusCode::FORBIDDEN,
            PreconditionError::ReceiverAlreadyHasCollection
            | PreconditionError::DuplicateOffer
            | PreconditionError::AlreadyHeld
            | PreconditionError::DuplicateIdentity(_) => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Validation error: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction could not begin within {0:?}")]
    BeginTimeout(Duration),

    #[error("Account verification failed: {0}")]
    Verification(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// The precondition that caused this error, if any.
    #[cfg(test)]
    pub fn precondition(&self) -> Option<PreconditionError> {
        match self {
            AppError::Precondition(p) => Some(*p),
            _ => None,
        }
    }

    /// True for failures of the underlying store (begin, commit, or a
    /// statement aborted). Clients may retry these.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::BeginTimeout(_))
    }

    /// Structured context for the error body, when there is any.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { field, .. } => Some(serde_json::json!({ "field": field })),
            AppError::Precondition(PreconditionError::DuplicateIdentity(field)) => {
                let field = match field {
                    IdentityField::Username => "username",
                    IdentityField::Email => "email",
                };
                Some(serde_json::json!({ "field": field }))
            }
            AppError::BeginTimeout(budget) => Some(serde_json::json!({
                "retryable": true,
                "budget_ms": budget.as_millis() as u64,
            })),
            e if e.is_store_failure() => Some(serde_json::json!({ "retryable": true })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let details = self.details();
        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AppError::Validation { message, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                message.clone(),
            ),
            AppError::Precondition(p) => (p.status(), p.code(), p.to_string()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_FAILURE",
                    "A database error occurred".to_string(),
                )
            }
            AppError::BeginTimeout(budget) => {
                tracing::warn!("Transaction begin exceeded budget of {:?}", budget);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_FAILURE",
                    "The store is busy, try again later".to_string(),
                )
            }
            AppError::Verification(msg) => {
                tracing::warn!("Verification failed: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "VERIFICATION_FAILED",
                    "Could not send account verification".to_string(),
                )
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_TOKEN",
                    "Invalid or expired token".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_codes_are_stable() {
        assert_eq!(PreconditionError::GuestNotAllowed.code(), "GUEST_NOT_ALLOWED");
        assert_eq!(
            PreconditionError::DuplicateIdentity(IdentityField::Email).code(),
            "DUPLICATE_IDENTITY"
        );
        assert_eq!(
            PreconditionError::DuplicateIdentity(IdentityField::Username).to_string(),
            "User name is already in use"
        );
    }

    #[test]
    fn store_failures_are_classified() {
        assert!(AppError::BeginTimeout(Duration::from_secs(10)).is_store_failure());
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_store_failure());
        assert!(!AppError::from(PreconditionError::NotShared).is_store_failure());
        assert_eq!(
            AppError::from(PreconditionError::NotShared).precondition(),
            Some(PreconditionError::NotShared)
        );
    }

    #[test]
    fn precondition_maps_to_status() {
        let resp = AppError::from(PreconditionError::DuplicateOffer).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::from(PreconditionError::QuotaExceeded).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        use http_body_util::BodyExt;

        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn error_bodies_carry_details() {
        let (status, body) = body_of(AppError::Validation {
            field: "name",
            message: "name cannot be empty".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"]["field"], "name");

        let (_, body) =
            body_of(PreconditionError::DuplicateIdentity(IdentityField::Email).into()).await;
        assert_eq!(body["error"]["details"]["field"], "email");

        let (status, body) = body_of(AppError::BeginTimeout(Duration::from_millis(250))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["details"]["retryable"], true);
        assert_eq!(body["error"]["details"]["budget_ms"], 250);

        let (_, body) = body_of(AppError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(body["error"]["code"], "STORE_FAILURE");
        assert_eq!(body["error"]["details"]["retryable"], true);

        let (_, body) = body_of(PreconditionError::NotShared.into()).await;
        assert!(body["error"].get("details").is_none());
    }
}
