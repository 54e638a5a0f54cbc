//! Trade records and proposal-time validation.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::clock::TimeStamp;
use crate::error::ExchangeError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    Rejected,
    #[n(3)]
    Cancelled,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Accepted => "accepted",
            TradeStatus::Rejected => "rejected",
            TradeStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a trade's offered or requested list. After normalization card
/// ids are unique within a list.
#[derive(
    Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct TradeItem {
    #[n(0)]
    pub card_id: String,
    #[n(1)]
    pub quantity: u32,
}

impl TradeItem {
    pub fn new(card_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            card_id: card_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub from_user_id: String,
    #[n(2)]
    pub to_user_id: String,
    #[n(3)]
    pub from_username: String,
    #[n(4)]
    pub to_username: String,
    #[n(5)]
    pub status: TradeStatus,
    #[n(6)]
    pub offered_cards: Vec<TradeItem>,
    #[n(7)]
    pub requested_cards: Vec<TradeItem>,
    #[n(8)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[n(9)]
    pub created_at: TimeStamp<Utc>,
    #[n(10)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<TimeStamp<Utc>>,
}

/// Validate and normalize one raw item list: card ids trimmed and
/// non-empty, quantities positive, duplicates aggregated by summing while
/// first-seen order is kept.
pub fn normalize_items(label: &str, raw: &[TradeItem]) -> Result<Vec<TradeItem>, ExchangeError> {
    if raw.is_empty() {
        return Err(ExchangeError::validation(format!(
            "{label} must be a non-empty list"
        )));
    }

    let mut normalized: Vec<TradeItem> = Vec::with_capacity(raw.len());
    for item in raw {
        let card_id = item.card_id.trim();
        if card_id.is_empty() {
            return Err(ExchangeError::validation(format!(
                "{label} contains an item without a card id"
            )));
        }
        if item.quantity == 0 {
            return Err(ExchangeError::validation(format!(
                "{label} contains a non-positive quantity for {card_id}"
            )));
        }

        match normalized.iter_mut().find(|entry| entry.card_id == card_id) {
            Some(entry) => entry.quantity += item.quantity,
            None => normalized.push(TradeItem::new(card_id, item.quantity)),
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_renders_lowercase() {
        assert_eq!(TradeStatus::Pending.as_str(), "pending");
        assert_eq!(
            serde_json::to_string(&TradeStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert!(TradeStatus::Accepted.is_terminal());
        assert!(!TradeStatus::Pending.is_terminal());
    }

    #[test]
    fn duplicates_are_aggregated() {
        let raw = vec![
            TradeItem::new("card_x", 1),
            TradeItem::new("card_y", 2),
            TradeItem::new("card_x", 3),
        ];
        let normalized = normalize_items("offeredCards", &raw).unwrap();
        assert_eq!(
            normalized,
            vec![TradeItem::new("card_x", 4), TradeItem::new("card_y", 2)]
        );
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = normalize_items("offeredCards", &[]).unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let raw = vec![TradeItem::new("card_x", 0)];
        assert!(matches!(
            normalize_items("requestedCards", &raw),
            Err(ExchangeError::Validation(_))
        ));
    }

    #[test]
    fn blank_card_id_is_rejected() {
        let raw = vec![TradeItem::new("   ", 1)];
        assert!(matches!(
            normalize_items("offeredCards", &raw),
            Err(ExchangeError::Validation(_))
        ));
    }

    #[test]
    fn card_ids_are_trimmed() {
        let raw = vec![TradeItem::new("  card_x ", 1), TradeItem::new("card_x", 1)];
        let normalized = normalize_items("offeredCards", &raw).unwrap();
        assert_eq!(normalized, vec![TradeItem::new("card_x", 2)]);
    }

    #[test]
    fn boundary_shape_is_camel_case() {
        let trade = Trade {
            id: "trade_1".into(),
            from_user_id: "user_a".into(),
            to_user_id: "user_b".into(),
            from_username: "alice".into(),
            to_username: "bob".into(),
            status: TradeStatus::Pending,
            offered_cards: vec![TradeItem::new("card_x", 1)],
            requested_cards: vec![TradeItem::new("card_y", 1)],
            message: None,
            created_at: TimeStamp::new_with(2025, 1, 1, 0, 0, 0),
            updated_at: None,
            completed_at: None,
        };

        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["fromUserId"], "user_a");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["offeredCards"][0]["cardId"], "card_x");
        assert!(json.get("completedAt").is_none());
    }
}
