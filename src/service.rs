//! Service layer: every exchange operation, including the atomic settlement
//! of an accepted trade.
//!
//! Settlement is all-or-nothing: the trade record, both participants'
//! collections, and both marking sets change together in one sled transaction
//! or not at all. Two concurrent accepts of one trade are serialized on the
//! trade key: exactly one commits Accepted, the other observes the terminal
//! status and fails with Conflict.

use rand::Rng;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree,
};

use crate::booster::{self, BoosterPolicy};
use crate::catalog::Card;
use crate::clock::TimeStamp;
use crate::error::ExchangeError;
use crate::ids;
use crate::inventory::{self, OwnedCopy};
use crate::lifecycle::{self, Actor};
use crate::profile::UserProfile;
use crate::reconcile::{self, ReconcileReport};
use crate::store::{
    ExchangeStore, collection_key, decode, encode, trade_key, user_key,
};
use crate::trade::{Trade, TradeItem, TradeStatus, normalize_items};

/// Seam for the external notification system. The engine only reports that a
/// trade changed state; delivery is someone else's problem.
pub trait Notifier: Send + Sync {
    fn trade_event(&self, trade: &Trade);
}

/// Default notifier: a structured log line per state change.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn trade_event(&self, trade: &Trade) {
        tracing::info!(
            trade_id = %trade.id,
            status = %trade.status,
            from = %trade.from_user_id,
            to = %trade.to_user_id,
            "trade state changed"
        );
    }
}

type TxError = ConflictableTransactionError<ExchangeError>;

fn tx_abort<T>(err: ExchangeError) -> Result<T, TxError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn unwrap_tx<T>(result: Result<T, TransactionError<ExchangeError>>) -> Result<T, ExchangeError> {
    result.map_err(|err| match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => ExchangeError::Storage(e),
    })
}

fn tx_collection(tx: &TransactionalTree, user_id: &str) -> Result<Vec<OwnedCopy>, TxError> {
    match tx.get(collection_key(user_id))? {
        Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort),
        None => Ok(Vec::new()),
    }
}

fn tx_profile(tx: &TransactionalTree, user_id: &str) -> Result<UserProfile, TxError> {
    match tx.get(user_key(user_id))? {
        Some(raw) => decode(&raw).map_err(ConflictableTransactionError::Abort),
        None => tx_abort(ExchangeError::not_found(format!("user {user_id} not found"))),
    }
}

pub struct ExchangeService {
    store: ExchangeStore,
    policy: BoosterPolicy,
    notifier: Box<dyn Notifier>,
}

impl ExchangeService {
    pub fn new(store: ExchangeStore) -> Self {
        Self {
            store,
            policy: BoosterPolicy::default(),
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_policy(mut self, policy: BoosterPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &ExchangeStore {
        &self.store
    }

    pub fn policy(&self) -> &BoosterPolicy {
        &self.policy
    }

    fn require_self_or_admin(actor: &Actor, user_id: &str) -> Result<(), ExchangeError> {
        if !actor.is_admin && actor.user_id != user_id {
            return Err(ExchangeError::forbidden(
                "caller may only operate on their own account",
            ));
        }
        Ok(())
    }

    // trades

    /// Validate and persist a new pending trade. Validation (including the
    /// sender ownership simulation) is a cheap pre-check outside any
    /// transaction; acceptance re-validates under one.
    pub fn create_trade(
        &self,
        actor: &Actor,
        from_user_id: &str,
        to_user_id: &str,
        offered: &[TradeItem],
        requested: &[TradeItem],
        message: Option<String>,
    ) -> Result<Trade, ExchangeError> {
        if from_user_id == to_user_id {
            return Err(ExchangeError::validation(
                "cannot create trade with same source and target user",
            ));
        }

        let offered = normalize_items("offeredCards", offered)?;
        let requested = normalize_items("requestedCards", requested)?;

        if !actor.is_admin && actor.user_id != from_user_id {
            return Err(ExchangeError::forbidden(
                "only trade sender can create this trade",
            ));
        }

        let from_user = self.store.require_user(from_user_id)?;
        let to_user = self.store.require_user(to_user_id)?;

        let sender_copies = self.store.collection(from_user_id)?;
        if inventory::remove_copies(&sender_copies, &offered).is_none() {
            return Err(ExchangeError::conflict("sender does not own offered cards"));
        }

        let trade = Trade {
            id: ids::mint(ids::TRADE_HRP)?,
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            from_username: from_user.username,
            to_username: to_user.username,
            status: TradeStatus::Pending,
            offered_cards: offered,
            requested_cards: requested,
            message,
            created_at: TimeStamp::now(),
            updated_at: None,
            completed_at: None,
        };
        self.store.put_trade(&trade)?;

        tracing::info!(trade_id = %trade.id, from = %from_user_id, to = %to_user_id, "trade proposed");
        self.notifier.trade_event(&trade);
        Ok(trade)
    }

    /// Every trade the user participates in, newest first.
    pub fn trades_for_user(
        &self,
        actor: &Actor,
        user_id: &str,
    ) -> Result<Vec<Trade>, ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        self.store.trades_for_user(user_id)
    }

    /// Move a pending trade to Rejected or Cancelled. Accepted is refused
    /// here: acceptance swaps ownership and must go through [`accept_trade`].
    ///
    /// [`accept_trade`]: ExchangeService::accept_trade
    pub fn set_trade_status(
        &self,
        actor: &Actor,
        trade_id: &str,
        status: TradeStatus,
    ) -> Result<Trade, ExchangeError> {
        match status {
            TradeStatus::Accepted => {
                return Err(ExchangeError::validation(
                    "use accept_trade for accepted status",
                ));
            }
            TradeStatus::Pending => {
                return Err(ExchangeError::validation("unsupported status transition"));
            }
            TradeStatus::Rejected | TradeStatus::Cancelled => {}
        }

        let now = TimeStamp::now();
        let result = self.store.state_tree().transaction(|tx| {
            let Some(raw) = tx.get(trade_key(trade_id))? else {
                return tx_abort(ExchangeError::not_found(format!(
                    "trade {trade_id} not found"
                )));
            };
            let mut trade: Trade = decode(&raw).map_err(ConflictableTransactionError::Abort)?;

            lifecycle::authorize_transition(&trade, status, actor)
                .map_err(ConflictableTransactionError::Abort)?;

            trade.status = status;
            trade.updated_at = Some(now);
            trade.completed_at = Some(now);
            tx.insert(
                trade_key(&trade.id),
                encode(&trade).map_err(ConflictableTransactionError::Abort)?,
            )?;
            Ok(trade)
        });

        let trade = unwrap_tx(result)?;
        tracing::info!(trade_id = %trade.id, status = %trade.status, "trade settled");
        self.notifier.trade_event(&trade);
        Ok(trade)
    }

    /// Accept a pending trade and swap ownership atomically.
    ///
    /// Inside one transaction: re-load the trade, check it is still pending,
    /// authorize the caller as recipient (or admin), re-simulate both sides'
    /// removals against current collections, persist both final multisets by
    /// full replacement, strip the consumed for-trade markings, and mark the
    /// trade Accepted with a completion timestamp. Any check failure aborts
    /// the whole transaction; the trade stays Pending.
    ///
    /// The swap conserves cards: per card id, the total across the two
    /// participants is identical before and after.
    pub fn accept_trade(&self, actor: &Actor, trade_id: &str) -> Result<Trade, ExchangeError> {
        let now = TimeStamp::now();
        let result = self.store.state_tree().transaction(|tx| {
            let Some(raw) = tx.get(trade_key(trade_id))? else {
                return tx_abort(ExchangeError::not_found(format!(
                    "trade {trade_id} not found"
                )));
            };
            let mut trade: Trade = decode(&raw).map_err(ConflictableTransactionError::Abort)?;

            lifecycle::authorize_transition(&trade, TradeStatus::Accepted, actor)
                .map_err(ConflictableTransactionError::Abort)?;

            // Participants are read in ascending user-id order so the access
            // pattern is deterministic regardless of trade direction.
            let sender_first = trade.from_user_id <= trade.to_user_id;
            let (from_copies, to_copies) = if sender_first {
                let from = tx_collection(tx, &trade.from_user_id)?;
                let to = tx_collection(tx, &trade.to_user_id)?;
                (from, to)
            } else {
                let to = tx_collection(tx, &trade.to_user_id)?;
                let from = tx_collection(tx, &trade.from_user_id)?;
                (from, to)
            };

            // Recipient gives up the requested cards, sender the offered ones.
            // Checked in that order to keep the original error precedence.
            let Some(to_remaining) = inventory::remove_copies(&to_copies, &trade.requested_cards)
            else {
                return tx_abort(ExchangeError::conflict(
                    "recipient does not own requested cards anymore",
                ));
            };
            let Some(from_remaining) = inventory::remove_copies(&from_copies, &trade.offered_cards)
            else {
                return tx_abort(ExchangeError::conflict(
                    "sender does not own offered cards anymore",
                ));
            };

            let mut to_final = to_remaining;
            inventory::grant(&mut to_final, inventory::expand_items(&trade.offered_cards), now);
            let mut from_final = from_remaining;
            inventory::grant(
                &mut from_final,
                inventory::expand_items(&trade.requested_cards),
                now,
            );

            tx.insert(
                collection_key(&trade.to_user_id),
                encode(&to_final).map_err(ConflictableTransactionError::Abort)?,
            )?;
            tx.insert(
                collection_key(&trade.from_user_id),
                encode(&from_final).map_err(ConflictableTransactionError::Abort)?,
            )?;

            let (mut from_profile, mut to_profile) = if sender_first {
                let from = tx_profile(tx, &trade.from_user_id)?;
                let to = tx_profile(tx, &trade.to_user_id)?;
                (from, to)
            } else {
                let to = tx_profile(tx, &trade.to_user_id)?;
                let from = tx_profile(tx, &trade.from_user_id)?;
                (from, to)
            };

            // Markings for copies that were traded away are consumed; cards
            // that were never marked are simply skipped.
            to_profile.cards_for_trade =
                inventory::strip_markings(&to_profile.cards_for_trade, &trade.requested_cards);
            from_profile.cards_for_trade =
                inventory::strip_markings(&from_profile.cards_for_trade, &trade.offered_cards);

            tx.insert(
                user_key(&to_profile.id),
                encode(&to_profile).map_err(ConflictableTransactionError::Abort)?,
            )?;
            tx.insert(
                user_key(&from_profile.id),
                encode(&from_profile).map_err(ConflictableTransactionError::Abort)?,
            )?;

            trade.status = TradeStatus::Accepted;
            trade.updated_at = Some(now);
            trade.completed_at = Some(now);
            tx.insert(
                trade_key(&trade.id),
                encode(&trade).map_err(ConflictableTransactionError::Abort)?,
            )?;

            Ok(trade)
        });

        let trade = unwrap_tx(result)?;
        tracing::info!(
            trade_id = %trade.id,
            from = %trade.from_user_id,
            to = %trade.to_user_id,
            "trade accepted, ownership swapped"
        );
        self.notifier.trade_event(&trade);
        Ok(trade)
    }

    // boosters

    /// Pure weighted draw against a fresh catalog snapshot. An empty pool
    /// (or a series filter matching nothing) yields an empty booster.
    pub fn generate_booster<R: Rng>(
        &self,
        rng: &mut R,
        count: usize,
        series_id: Option<&str>,
    ) -> Result<Vec<Card>, ExchangeError> {
        let snapshot = self.store.catalog_snapshot()?;
        Ok(booster::draw(&snapshot, series_id, count, rng))
    }

    /// Boosters the user could open right now, per the accrual policy.
    pub fn available_boosters(&self, user_id: &str) -> Result<u8, ExchangeError> {
        let profile = self.store.require_user(user_id)?;
        Ok(self.policy.accrued(
            profile.last_booster_at,
            profile.stored_boosters,
            TimeStamp::now(),
        ))
    }

    /// Consume one banked booster: draw its cards and append them to the
    /// user's collection. The accrual re-check, the grant, and the profile
    /// update commit together.
    pub fn open_booster<R: Rng>(
        &self,
        actor: &Actor,
        user_id: &str,
        rng: &mut R,
    ) -> Result<Vec<Card>, ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        self.store.require_user(user_id)?;

        let snapshot = self.store.catalog_snapshot()?;
        let now = TimeStamp::now();
        let cards = booster::draw(&snapshot, None, self.policy.cards_per_booster, rng);
        let card_ids: Vec<String> = cards.iter().map(|card| card.id.clone()).collect();

        let policy = self.policy;
        let result = self.store.state_tree().transaction(|tx| {
            let mut profile = tx_profile(tx, user_id)?;
            let available = policy.accrued(profile.last_booster_at, profile.stored_boosters, now);
            if available == 0 {
                return tx_abort(ExchangeError::conflict("no booster available"));
            }
            profile.stored_boosters = available - 1;
            profile.last_booster_at = Some(now);

            let mut copies = tx_collection(tx, user_id)?;
            inventory::grant(&mut copies, card_ids.iter().cloned(), now);

            tx.insert(
                collection_key(user_id),
                encode(&copies).map_err(ConflictableTransactionError::Abort)?,
            )?;
            tx.insert(
                user_key(user_id),
                encode(&profile).map_err(ConflictableTransactionError::Abort)?,
            )?;
            Ok(())
        });
        unwrap_tx(result)?;

        tracing::info!(user = %user_id, cards = cards.len(), "booster opened");
        Ok(cards)
    }

    // reconciliation

    /// Remove every reference to a card id the catalog no longer knows:
    /// owned copies, favorites, and for-trade markings. Runs outside the
    /// settlement transaction; it repairs the inconsistency after the fact.
    pub fn reconcile_user(&self, user_id: &str) -> Result<ReconcileReport, ExchangeError> {
        let snapshot = self.store.catalog_snapshot()?;
        let valid = snapshot.valid_ids();

        let mut profile = self.store.require_user(user_id)?;
        let copies = self.store.collection(user_id)?;

        let (kept, report) = reconcile::filter_collection(copies, &valid);
        if report.removed > 0 {
            self.store.put_collection(user_id, &kept)?;
        }

        let favorites_before = profile.favorite_cards.len();
        let markings_before = profile.cards_for_trade.len();
        reconcile::filter_references(&mut profile.favorite_cards, &valid);
        reconcile::filter_references(&mut profile.cards_for_trade, &valid);
        if profile.favorite_cards.len() != favorites_before
            || profile.cards_for_trade.len() != markings_before
        {
            self.store.put_user(&profile)?;
        }

        if report.removed > 0 {
            tracing::info!(
                user = %user_id,
                removed = report.removed,
                kept = report.kept,
                "ghost references reconciled"
            );
        }
        Ok(report)
    }

    // collection maintenance

    pub fn add_to_collection(
        &self,
        actor: &Actor,
        user_id: &str,
        card_ids: &[String],
    ) -> Result<usize, ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        if card_ids.is_empty() {
            return Err(ExchangeError::validation("cardIds must be a non-empty list"));
        }
        self.store.require_user(user_id)?;

        let mut copies = self.store.collection(user_id)?;
        inventory::grant(&mut copies, card_ids.iter().cloned(), TimeStamp::now());
        self.store.put_collection(user_id, &copies)?;
        Ok(card_ids.len())
    }

    /// Remove the oldest copy of one card from the user's collection.
    pub fn remove_one_copy(
        &self,
        actor: &Actor,
        user_id: &str,
        card_id: &str,
    ) -> Result<(), ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        self.store.require_user(user_id)?;

        let mut copies = self.store.collection(user_id)?;
        let oldest = copies
            .iter()
            .enumerate()
            .filter(|(_, copy)| copy.card_id == card_id)
            .min_by_key(|(_, copy)| copy.obtained_at)
            .map(|(index, _)| index);
        let Some(index) = oldest else {
            return Err(ExchangeError::not_found("card not found in user collection"));
        };
        copies.remove(index);
        self.store.put_collection(user_id, &copies)?;
        Ok(())
    }

    /// Replace the user's whole collection, stamping every copy now.
    pub fn replace_collection(
        &self,
        actor: &Actor,
        user_id: &str,
        card_ids: &[String],
    ) -> Result<usize, ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        self.store.require_user(user_id)?;

        let now = TimeStamp::now();
        let copies: Vec<OwnedCopy> = card_ids
            .iter()
            .map(|card_id| OwnedCopy::new(card_id.clone(), now))
            .collect();
        self.store.put_collection(user_id, &copies)?;
        Ok(copies.len())
    }

    // markings

    /// Replace the user's for-trade marking set. Every id must be a known
    /// catalog card the user currently owns.
    pub fn set_for_trade(
        &self,
        actor: &Actor,
        user_id: &str,
        card_ids: &[String],
    ) -> Result<(), ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        let mut profile = self.store.require_user(user_id)?;
        let snapshot = self.store.catalog_snapshot()?;
        let copies = self.store.collection(user_id)?;

        let mut markings: Vec<String> = Vec::new();
        for card_id in card_ids {
            if !snapshot.contains(card_id) {
                return Err(ExchangeError::validation(format!(
                    "unknown card id {card_id}"
                )));
            }
            if inventory::quantity_of(&copies, card_id) == 0 {
                return Err(ExchangeError::conflict(format!(
                    "cannot mark unowned card {card_id}"
                )));
            }
            if !markings.contains(card_id) {
                markings.push(card_id.clone());
            }
        }

        profile.cards_for_trade = markings;
        self.store.put_user(&profile)
    }

    /// Replace the user's favorite list. Ids must exist in the catalog;
    /// ownership is not required for favorites.
    pub fn set_favorites(
        &self,
        actor: &Actor,
        user_id: &str,
        card_ids: &[String],
    ) -> Result<(), ExchangeError> {
        Self::require_self_or_admin(actor, user_id)?;
        let mut profile = self.store.require_user(user_id)?;
        let snapshot = self.store.catalog_snapshot()?;

        let mut favorites: Vec<String> = Vec::new();
        for card_id in card_ids {
            if !snapshot.contains(card_id) {
                return Err(ExchangeError::validation(format!(
                    "unknown card id {card_id}"
                )));
            }
            if !favorites.contains(card_id) {
                favorites.push(card_id.clone());
            }
        }

        profile.favorite_cards = favorites;
        self.store.put_user(&profile)
    }
}
