//! Per-user profile record: identity flags, for-trade markings, favorites,
//! and booster accrual bookkeeping.

use chrono::Utc;

use crate::clock::TimeStamp;

#[derive(Debug, Clone, PartialEq, minicbor::Encode, minicbor::Decode)]
pub struct UserProfile {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub username: String,
    #[n(2)]
    pub is_admin: bool,
    /// Card ids the user pinned as favorites.
    #[n(3)]
    pub favorite_cards: Vec<String>,
    /// Card ids flagged as available for exchange. A marking never removes the
    /// card from the collection, it only advertises it.
    #[n(4)]
    pub cards_for_trade: Vec<String>,
    #[n(5)]
    pub last_booster_at: Option<TimeStamp<Utc>>,
    /// Unopened boosters banked up to the policy cap.
    #[n(6)]
    pub stored_boosters: u8,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_admin: false,
            favorite_cards: Vec::new(),
            cards_for_trade: Vec::new(),
            last_booster_at: None,
            stored_boosters: 0,
        }
    }

    pub fn admin(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(id, username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_profile_has_no_booster_history() {
        let profile = UserProfile::new("user_1", "alice");
        assert!(!profile.is_admin);
        assert!(profile.last_booster_at.is_none());
        assert_eq!(profile.stored_boosters, 0);
        assert!(profile.cards_for_trade.is_empty());
    }

    #[test]
    fn cbor_roundtrip() {
        let mut profile = UserProfile::admin("user_2", "bob");
        profile.cards_for_trade.push("card_x".into());
        profile.last_booster_at = Some(TimeStamp::now());

        let bytes = minicbor::to_vec(&profile).unwrap();
        let back: UserProfile = minicbor::decode(&bytes).unwrap();
        assert_eq!(back, profile);
    }
}
