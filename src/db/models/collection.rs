use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

// ============================================================================
// Collection Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Collection {
    pub id: i64,
    /// Creator. Informational only; grants decide who holds the collection.
    pub owner_id: Option<i64>,
    pub name: String,
    pub category: String,
    pub comments: String,
    /// Item ids in display order, stored as a JSON array. A row whose
    /// ordering does not decode fails to load.
    pub item_ordering: Json<Vec<i64>>,
    /// Granted to every new account. Set only through `publish`.
    pub public: bool,
    pub created_at: NaiveDateTime,
}

impl Collection {
    pub fn item_ids(&self) -> &[i64] {
        &self.item_ordering.0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionDraft {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub comments: String,
}

/// Collection metadata as shown to clients, without bookkeeping fields.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub comments: String,
    pub item_ordering: Vec<i64>,
    pub public: bool,
}

impl From<&Collection> for CollectionSummary {
    fn from(c: &Collection) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
            category: c.category.clone(),
            comments: c.comments.clone(),
            item_ordering: c.item_ids().to_vec(),
            public: c.public,
        }
    }
}

// ============================================================================
// Item Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub collection_id: i64,
    pub name: String,
    pub notation: String,
    pub category: String,
    pub comments: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemDraft {
    #[serde(default)]
    pub name: String,
    pub notation: String,
    pub category: String,
    #[serde(default)]
    pub comments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_carries_the_item_ordering() {
        let c = Collection {
            id: 1,
            owner_id: Some(1),
            name: "Rudiments".to_string(),
            category: "warmup".to_string(),
            comments: String::new(),
            item_ordering: Json(vec![3, 1, 2]),
            public: false,
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert_eq!(c.item_ids(), &[3, 1, 2]);

        let summary = CollectionSummary::from(&c);
        assert_eq!(summary.name, "Rudiments");
        assert_eq!(summary.item_ordering, vec![3, 1, 2]);
    }

    #[test]
    fn draft_ignores_a_client_supplied_public_flag() {
        let draft: CollectionDraft =
            serde_json::from_str(r#"{"name": "Rolls", "public": true}"#).unwrap();
        assert_eq!(draft.name, "Rolls");
    }
}
