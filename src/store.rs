//! Typed sled repository.
//!
//! All records live in one tree under key namespaces (`card/`, `user/`,
//! `collection/`, `trade/`), values CBOR-encoded. A trade settlement touches
//! the trade record, both collections, and both marking sets; keeping one
//! tree makes that a plain single-tree transaction, and sled serializes
//! conflicting settlements on the keys they share.

use sled::{Db, Tree};

use crate::catalog::{Card, CatalogSnapshot};
use crate::error::ExchangeError;
use crate::inventory::OwnedCopy;
use crate::profile::UserProfile;
use crate::trade::Trade;

const STATE_TREE: &str = "exchange_state";

const CARD_PREFIX: &str = "card/";
const USER_PREFIX: &str = "user/";
const COLLECTION_PREFIX: &str = "collection/";
const TRADE_PREFIX: &str = "trade/";

pub(crate) fn key(prefix: &str, id: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + id.len());
    out.extend_from_slice(prefix.as_bytes());
    out.extend_from_slice(id.as_bytes());
    out
}

pub(crate) fn card_key(id: &str) -> Vec<u8> {
    key(CARD_PREFIX, id)
}
pub(crate) fn user_key(id: &str) -> Vec<u8> {
    key(USER_PREFIX, id)
}
pub(crate) fn collection_key(id: &str) -> Vec<u8> {
    key(COLLECTION_PREFIX, id)
}
pub(crate) fn trade_key(id: &str) -> Vec<u8> {
    key(TRADE_PREFIX, id)
}

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, ExchangeError> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<'b, T: minicbor::Decode<'b, ()>>(bytes: &'b [u8]) -> Result<T, ExchangeError> {
    Ok(minicbor::decode(bytes)?)
}

#[derive(Clone)]
pub struct ExchangeStore {
    db: Db,
    state: Tree,
}

impl ExchangeStore {
    pub fn new(db: Db) -> Result<Self, ExchangeError> {
        let state = db.open_tree(STATE_TREE)?;
        Ok(Self { db, state })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// The tree carrying all exchange state, for transactional operations.
    pub(crate) fn state_tree(&self) -> &Tree {
        &self.state
    }

    // catalog

    pub fn put_card(&self, card: &Card) -> Result<(), ExchangeError> {
        self.state.insert(card_key(&card.id), encode(card)?)?;
        Ok(())
    }

    pub fn remove_card(&self, card_id: &str) -> Result<(), ExchangeError> {
        self.state.remove(card_key(card_id))?;
        Ok(())
    }

    pub fn card(&self, card_id: &str) -> Result<Option<Card>, ExchangeError> {
        match self.state.get(card_key(card_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// One consistent read of every card definition. Never cached: admins can
    /// add or remove cards between calls.
    pub fn catalog_snapshot(&self) -> Result<CatalogSnapshot, ExchangeError> {
        let mut cards = Vec::new();
        for entry in self.state.scan_prefix(CARD_PREFIX) {
            let (_, raw) = entry?;
            cards.push(decode(&raw)?);
        }
        Ok(CatalogSnapshot::new(cards))
    }

    // users

    pub fn put_user(&self, profile: &UserProfile) -> Result<(), ExchangeError> {
        self.state.insert(user_key(&profile.id), encode(profile)?)?;
        Ok(())
    }

    pub fn user(&self, user_id: &str) -> Result<Option<UserProfile>, ExchangeError> {
        match self.state.get(user_key(user_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_user(&self, user_id: &str) -> Result<UserProfile, ExchangeError> {
        self.user(user_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("user {user_id} not found")))
    }

    // collections

    pub fn collection(&self, user_id: &str) -> Result<Vec<OwnedCopy>, ExchangeError> {
        match self.state.get(collection_key(user_id))? {
            Some(raw) => Ok(decode(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Full replacement of a user's owned-copy multiset.
    pub fn put_collection(&self, user_id: &str, copies: &[OwnedCopy]) -> Result<(), ExchangeError> {
        self.state
            .insert(collection_key(user_id), encode(&copies.to_vec())?)?;
        Ok(())
    }

    // trades

    pub fn put_trade(&self, trade: &Trade) -> Result<(), ExchangeError> {
        self.state.insert(trade_key(&trade.id), encode(trade)?)?;
        Ok(())
    }

    pub fn trade(&self, trade_id: &str) -> Result<Option<Trade>, ExchangeError> {
        match self.state.get(trade_key(trade_id))? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_trade(&self, trade_id: &str) -> Result<Trade, ExchangeError> {
        self.trade(trade_id)?
            .ok_or_else(|| ExchangeError::not_found(format!("trade {trade_id} not found")))
    }

    /// Every trade the user participates in, newest first.
    pub fn trades_for_user(&self, user_id: &str) -> Result<Vec<Trade>, ExchangeError> {
        let mut out = Vec::new();
        for entry in self.state.scan_prefix(TRADE_PREFIX) {
            let (_, raw) = entry?;
            let trade: Trade = decode(&raw)?;
            if trade.from_user_id == user_id || trade.to_user_id == user_id {
                out.push(trade);
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}
