//! Identifier minting: uuid7 payloads behind bech32m human-readable prefixes.

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::ExchangeError;

pub const TRADE_HRP: &str = "trade_";
pub const USER_HRP: &str = "user_";
pub const CARD_HRP: &str = "card_";
pub const SERIES_HRP: &str = "series_";

/// Mint a fresh unique id carrying the given human-readable prefix.
pub fn mint(hrp: &str) -> Result<String, ExchangeError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| ExchangeError::Codec(e.to_string()))?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| ExchangeError::Codec(e.to_string()))?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_prefix() {
        let id = mint(TRADE_HRP).unwrap();
        assert!(id.starts_with("trade_1"));
        assert!(id.len() > 10);
    }

    #[test]
    fn rejects_empty_prefix() {
        assert!(mint("").is_err());
    }

    #[test]
    fn successive_mints_are_unique() {
        let a = mint(USER_HRP).unwrap();
        let b = mint(USER_HRP).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_prefixes_differ() {
        let card = mint(CARD_HRP).unwrap();
        let user = mint(USER_HRP).unwrap();
        assert!(card.starts_with("card_"));
        assert!(user.starts_with("user_"));
        assert_ne!(card, user);
    }
}
