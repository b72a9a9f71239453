use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Collection, CollectionSummary};

// ============================================================================
// Share Offer Models
// ============================================================================

/// A pending proposal from `sharer_id` to hand `collection_id` to `receiver_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShareOffer {
    pub id: String,
    pub sharer_id: i64,
    pub receiver_id: i64,
    pub collection_id: i64,
    pub comments: String,
    pub created_at: NaiveDateTime,
}

/// Client-facing view of an offer: collection metadata merged with the offer
/// and both parties' names. Owner id and raw timestamps are left out.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShareDescriptor {
    #[serde(flatten)]
    pub collection: CollectionSummary,
    pub share_id: String,
    pub sharer_id: i64,
    pub sharer_name: String,
    pub receiver_id: i64,
    pub receiver_name: String,
    /// Comments left by the sharer.
    pub share_comments: String,
}

impl ShareDescriptor {
    pub fn new(
        collection: &Collection,
        offer: &ShareOffer,
        sharer_name: impl Into<String>,
        receiver_name: impl Into<String>,
    ) -> Self {
        Self {
            collection: CollectionSummary::from(collection),
            share_id: offer.id.clone(),
            sharer_id: offer.sharer_id,
            sharer_name: sharer_name.into(),
            receiver_id: offer.receiver_id,
            receiver_name: receiver_name.into(),
            share_comments: offer.comments.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingFilter {
    #[default]
    All,
    #[serde(alias = "received")]
    ReceivedOnly,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SharingLists {
    pub received: Vec<ShareDescriptor>,
    pub shared: Vec<ShareDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_strips_bookkeeping_fields() {
        let now = chrono::Utc::now().naive_utc();
        let collection = Collection {
            id: 10,
            owner_id: Some(1),
            name: "Paradiddles".to_string(),
            category: "rudiments".to_string(),
            comments: "owner notes".to_string(),
            item_ordering: sqlx::types::Json(vec![5]),
            public: false,
            created_at: now,
        };
        let offer = ShareOffer {
            id: "offer-1".to_string(),
            sharer_id: 1,
            receiver_id: 2,
            collection_id: 10,
            comments: "try these".to_string(),
            created_at: now,
        };

        let descriptor = ShareDescriptor::new(&collection, &offer, "alice", "bobby");
        let json = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(json["id"], 10);
        assert_eq!(json["share_id"], "offer-1");
        assert_eq!(json["sharer_name"], "alice");
        assert_eq!(json["receiver_name"], "bobby");
        assert_eq!(json["share_comments"], "try these");
        assert!(json.get("owner_id").is_none());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn filter_accepts_short_alias() {
        let f: SharingFilter = serde_json::from_str("\"received\"").unwrap();
        assert_eq!(f, SharingFilter::ReceivedOnly);
        let f: SharingFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(f, SharingFilter::All);
    }
}
