//! Booster generation: rarity-weighted random draws, plus the accrual policy
//! deciding how many unopened boosters a user has banked.

use chrono::Utc;
use rand::Rng;

use crate::catalog::{Card, CatalogSnapshot};
use crate::clock::TimeStamp;

/// Accrual policy constants. Immutable, injected at service construction.
#[derive(Debug, Clone, Copy)]
pub struct BoosterPolicy {
    /// Hours between booster grants.
    pub interval_hours: i64,
    /// Cap on banked unopened boosters.
    pub max_stored: u8,
    /// Cards drawn per booster.
    pub cards_per_booster: usize,
}

impl Default for BoosterPolicy {
    fn default() -> Self {
        Self {
            interval_hours: 6,
            max_stored: 2,
            cards_per_booster: 5,
        }
    }
}

impl BoosterPolicy {
    /// Boosters available at `now` given the last grant time and the count
    /// already banked. A user who never opened one gets a single welcome
    /// booster; everyone else earns one per elapsed interval, capped.
    pub fn accrued(
        &self,
        last_booster_at: Option<TimeStamp<Utc>>,
        stored: u8,
        now: TimeStamp<Utc>,
    ) -> u8 {
        let Some(last) = last_booster_at else {
            return u8::min(1, self.max_stored);
        };

        let elapsed = now.to_datetime_utc() - last.to_datetime_utc();
        let earned =
            (elapsed.num_hours() / self.interval_hours).clamp(0, i64::from(self.max_stored));
        stored.saturating_add(earned as u8).min(self.max_stored)
    }
}

/// Draw `count` cards with replacement from the weighted pool. Each candidate
/// appears in the pool once per unit of its rarity weight, so duplicates
/// within one booster are expected. An empty pool yields an empty draw.
pub fn draw<R: Rng>(
    snapshot: &CatalogSnapshot,
    series_id: Option<&str>,
    count: usize,
    rng: &mut R,
) -> Vec<Card> {
    let candidates = snapshot.pool(series_id);
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut weighted: Vec<usize> = Vec::new();
    for (index, card) in candidates.iter().enumerate() {
        for _ in 0..card.rarity.booster_weight() {
            weighted.push(index);
        }
    }

    (0..count)
        .map(|_| candidates[weighted[rng.gen_range(0..weighted.len())]])
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Rarity;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn card(id: &str, rarity: Rarity) -> Card {
        Card {
            id: id.into(),
            series_id: "series_1".into(),
            name: id.into(),
            rarity,
            attack: 1,
            defense: 1,
            abilities: vec![],
        }
    }

    #[test]
    fn new_user_gets_one_welcome_booster() {
        let policy = BoosterPolicy::default();
        assert_eq!(policy.accrued(None, 0, TimeStamp::now()), 1);
    }

    #[test]
    fn accrual_earns_one_per_interval() {
        let policy = BoosterPolicy::default();
        let now = TimeStamp::now();
        let last = TimeStamp::from(now.to_datetime_utc() - Duration::hours(7));

        assert_eq!(policy.accrued(Some(last), 0, now), 1);
        assert_eq!(policy.accrued(Some(last), 1, now), 2);
    }

    #[test]
    fn accrual_is_capped() {
        let policy = BoosterPolicy::default();
        let now = TimeStamp::now();
        let last = TimeStamp::from(now.to_datetime_utc() - Duration::hours(100));

        assert_eq!(policy.accrued(Some(last), 2, now), policy.max_stored);
    }

    #[test]
    fn nothing_accrues_before_the_interval_elapses() {
        let policy = BoosterPolicy::default();
        let now = TimeStamp::now();
        let last = TimeStamp::from(now.to_datetime_utc() - Duration::hours(5));

        assert_eq!(policy.accrued(Some(last), 0, now), 0);
        assert_eq!(policy.accrued(Some(last), 1, now), 1);
    }

    #[test]
    fn draw_returns_requested_count() {
        let snapshot = CatalogSnapshot::new(vec![
            card("card_a", Rarity::Common),
            card("card_b", Rarity::Legendary),
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        let booster = draw(&snapshot, None, 5, &mut rng);
        assert_eq!(booster.len(), 5);
    }

    #[test]
    fn empty_pool_draws_nothing() {
        let snapshot = CatalogSnapshot::default();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(draw(&snapshot, None, 5, &mut rng).is_empty());
        // a series filter matching nothing behaves the same
        let snapshot = CatalogSnapshot::new(vec![card("card_a", Rarity::Common)]);
        assert!(draw(&snapshot, Some("series_void"), 5, &mut rng).is_empty());
    }

    #[test]
    fn single_candidate_pool_always_draws_it() {
        let snapshot = CatalogSnapshot::new(vec![card("card_a", Rarity::Legendary)]);
        let mut rng = StdRng::seed_from_u64(7);
        let booster = draw(&snapshot, None, 3, &mut rng);
        assert!(booster.iter().all(|c| c.id == "card_a"));
    }
}
