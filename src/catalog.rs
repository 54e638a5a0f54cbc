//! Card catalog types and the read-only lookup the engine consumes.
//!
//! Catalog lifecycle (create/edit/delete of definitions) is owned elsewhere;
//! the exchange engine only ever reads a snapshot of it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// The five ordered rarity tiers. Ordering matters: `Common < Legendary`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
)]
pub enum Rarity {
    #[n(0)]
    Common,
    #[n(1)]
    Uncommon,
    #[n(2)]
    Rare,
    #[n(3)]
    Epic,
    #[n(4)]
    Legendary,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    /// Relative draw weight inside a booster pool.
    pub fn booster_weight(self) -> u32 {
        match self {
            Rarity::Common => 50,
            Rarity::Uncommon => 30,
            Rarity::Rare => 15,
            Rarity::Epic => 4,
            Rarity::Legendary => 1,
        }
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub series_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub rarity: Rarity,
    #[n(4)]
    pub attack: u32,
    #[n(5)]
    pub defense: u32,
    #[n(6)]
    pub abilities: Vec<String>,
}

/// One consistent read of the catalog. Booster generation and reconciliation
/// both take a fresh snapshot per call, never a cached one.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    cards: Vec<Card>,
}

impl CatalogSnapshot {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards restricted to one series, or the whole catalog when no filter is
    /// given.
    pub fn pool(&self, series_id: Option<&str>) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|card| series_id.is_none_or(|sid| card.series_id == sid))
            .collect()
    }

    pub fn valid_ids(&self) -> HashSet<&str> {
        self.cards.iter().map(|card| card.id.as_str()).collect()
    }

    pub fn contains(&self, card_id: &str) -> bool {
        self.cards.iter().any(|card| card.id == card_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, series: &str, rarity: Rarity) -> Card {
        Card {
            id: id.into(),
            series_id: series.into(),
            name: id.into(),
            rarity,
            attack: 1,
            defense: 1,
            abilities: vec![],
        }
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Epic < Rarity::Legendary);
    }

    #[test]
    fn weights_match_the_drop_table() {
        let weights: Vec<u32> = Rarity::ALL.iter().map(|r| r.booster_weight()).collect();
        assert_eq!(weights, vec![50, 30, 15, 4, 1]);
    }

    #[test]
    fn pool_honours_series_filter() {
        let snapshot = CatalogSnapshot::new(vec![
            card("card_a", "series_1", Rarity::Common),
            card("card_b", "series_2", Rarity::Rare),
        ]);

        assert_eq!(snapshot.pool(None).len(), 2);
        let filtered = snapshot.pool(Some("series_2"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "card_b");
        assert!(snapshot.pool(Some("series_3")).is_empty());
    }

    #[test]
    fn valid_ids_covers_every_card() {
        let snapshot = CatalogSnapshot::new(vec![
            card("card_a", "series_1", Rarity::Common),
            card("card_b", "series_1", Rarity::Epic),
        ]);
        let ids = snapshot.valid_ids();
        assert!(ids.contains("card_a") && ids.contains("card_b"));
        assert!(!snapshot.contains("card_c"));
    }
}
