//! Owned-copy multisets and the removal simulation shared by proposal
//! validation and the exchange coordinator.
//!
//! A collection is a list of undifferentiated copies; quantity owned of a card
//! is the number of matching copies. Removal is simulated copy by copy so a
//! shortfall is detected before anything is persisted.

use chrono::Utc;

use crate::clock::TimeStamp;
use crate::trade::TradeItem;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct OwnedCopy {
    #[n(0)]
    pub card_id: String,
    #[n(1)]
    pub obtained_at: TimeStamp<Utc>,
}

impl OwnedCopy {
    pub fn new(card_id: impl Into<String>, obtained_at: TimeStamp<Utc>) -> Self {
        Self {
            card_id: card_id.into(),
            obtained_at,
        }
    }
}

pub fn quantity_of(copies: &[OwnedCopy], card_id: &str) -> usize {
    copies.iter().filter(|copy| copy.card_id == card_id).count()
}

/// Simulate removing every item's quantity from `source`, oldest copies first.
/// Returns the remaining copies, or `None` if any required copy is missing,
/// in which case the caller must treat the whole removal as failed.
pub fn remove_copies(source: &[OwnedCopy], items: &[TradeItem]) -> Option<Vec<OwnedCopy>> {
    let mut result = source.to_vec();
    for item in items {
        for _ in 0..item.quantity {
            let index = result.iter().position(|copy| copy.card_id == item.card_id)?;
            result.remove(index);
        }
    }
    Some(result)
}

/// Append one copy per card id, all stamped with the same acquisition time.
pub fn grant<I>(copies: &mut Vec<OwnedCopy>, card_ids: I, at: TimeStamp<Utc>)
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    for card_id in card_ids {
        copies.push(OwnedCopy::new(card_id, at));
    }
}

/// Flatten items into one card id per copy to transfer.
pub fn expand_items(items: &[TradeItem]) -> Vec<String> {
    let mut out = Vec::new();
    for item in items {
        for _ in 0..item.quantity {
            out.push(item.card_id.clone());
        }
    }
    out
}

/// Drop for-trade markings consumed by a transfer. Unlike [`remove_copies`]
/// this is tolerant: a card that was never marked is simply skipped, and at
/// most `quantity` markings per card are consumed.
pub fn strip_markings(markings: &[String], items: &[TradeItem]) -> Vec<String> {
    let mut result = markings.to_vec();
    for item in items {
        for _ in 0..item.quantity {
            match result.iter().position(|id| id == &item.card_id) {
                Some(index) => {
                    result.remove(index);
                }
                None => break,
            }
        }
    }
    result
}
