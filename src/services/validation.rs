//! Field-length constraints for user-supplied text.

use crate::db::models::{AccountDraft, CollectionDraft, ItemDraft};
use crate::error::{AppError, AppResult};

pub const MAX_NAME_LENGTH: usize = 60;
pub const MAX_NOTATION_LENGTH: usize = 600;
pub const MAX_CATEGORY_LENGTH: usize = 100;
pub const MAX_ITEM_COMMENTS_LENGTH: usize = 100;
pub const MAX_COLLECTION_COMMENTS_LENGTH: usize = 200;
pub const MAX_SHARE_COMMENTS_LENGTH: usize = 100;
pub const MAX_ITEMS_PER_COLLECTION: i64 = 24;

pub const MIN_USERNAME_LENGTH: usize = 5;
pub const MAX_USERNAME_LENGTH: usize = 20;
pub const MAX_EMAIL_LENGTH: usize = 254;

pub fn validate_length(field: &'static str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();

    if len < min {
        let message = if min == 1 {
            format!("{} cannot be empty", field)
        } else {
            format!("{} must be at least {} characters", field, min)
        };
        return Err(AppError::Validation { field, message });
    }

    if len > max {
        return Err(AppError::Validation {
            field,
            message: format!("{} cannot exceed {} characters", field, max),
        });
    }

    Ok(())
}

pub fn validate_account_draft(draft: &AccountDraft) -> AppResult<()> {
    validate_length(
        "username",
        &draft.username,
        MIN_USERNAME_LENGTH,
        MAX_USERNAME_LENGTH,
    )?;
    validate_length("email", &draft.email, 1, MAX_EMAIL_LENGTH)?;

    if !draft.email.contains('@') {
        return Err(AppError::Validation {
            field: "email",
            message: "email must contain '@'".to_string(),
        });
    }

    Ok(())
}

pub fn validate_collection_draft(draft: &CollectionDraft) -> AppResult<()> {
    validate_length("name", &draft.name, 1, MAX_NAME_LENGTH)?;
    validate_length("category", &draft.category, 0, MAX_CATEGORY_LENGTH)?;
    validate_length("comments", &draft.comments, 0, MAX_COLLECTION_COMMENTS_LENGTH)
}

pub fn validate_item_draft(draft: &ItemDraft) -> AppResult<()> {
    validate_length("name", &draft.name, 0, MAX_NAME_LENGTH)?;
    validate_length("notation", &draft.notation, 1, MAX_NOTATION_LENGTH)?;
    validate_length("category", &draft.category, 1, MAX_CATEGORY_LENGTH)?;
    validate_length("comments", &draft.comments, 0, MAX_ITEM_COMMENTS_LENGTH)
}

pub fn validate_share_comments(comments: &str) -> AppResult<()> {
    validate_length("comments", comments, 0, MAX_SHARE_COMMENTS_LENGTH)
}
