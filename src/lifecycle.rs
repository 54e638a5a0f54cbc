//! Trade lifecycle state machine: which actor may move a pending trade to
//! which terminal status.
//!
//! | From    | Event  | Actor allowed        | To        |
//! |---------|--------|----------------------|-----------|
//! | Pending | accept | recipient (or admin) | Accepted  |
//! | Pending | reject | recipient (or admin) | Rejected  |
//! | Pending | cancel | sender (or admin)    | Cancelled |
//!
//! Any transition attempted on a non-pending trade is rejected without side
//! effects. An admin bypasses the actor restriction but never the state
//! restriction.

use crate::error::ExchangeError;
use crate::trade::{Trade, TradeStatus};

/// The authenticated caller, as resolved by the external identity provider.
/// The engine never inspects credentials, only this assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin: true,
        }
    }
}

/// Check the transition table for moving `trade` to `next` on behalf of
/// `actor`. State is checked before authorization so a terminal trade always
/// reads as Conflict, never Forbidden.
pub fn authorize_transition(
    trade: &Trade,
    next: TradeStatus,
    actor: &Actor,
) -> Result<(), ExchangeError> {
    if trade.status != TradeStatus::Pending {
        return Err(ExchangeError::conflict("trade is not pending"));
    }

    let (required, denial) = match next {
        TradeStatus::Accepted => (&trade.to_user_id, "only recipient can accept this trade"),
        TradeStatus::Rejected => (&trade.to_user_id, "only recipient can reject this trade"),
        TradeStatus::Cancelled => (&trade.from_user_id, "only sender can cancel this trade"),
        TradeStatus::Pending => {
            return Err(ExchangeError::validation("unsupported status transition"));
        }
    };

    if !actor.is_admin && actor.user_id != *required {
        return Err(ExchangeError::forbidden(denial));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TimeStamp;
    use crate::trade::TradeItem;

    fn pending_trade() -> Trade {
        Trade {
            id: "trade_1".into(),
            from_user_id: "user_sender".into(),
            to_user_id: "user_recipient".into(),
            from_username: "alice".into(),
            to_username: "bob".into(),
            status: TradeStatus::Pending,
            offered_cards: vec![TradeItem::new("card_x", 1)],
            requested_cards: vec![TradeItem::new("card_y", 1)],
            message: None,
            created_at: TimeStamp::now(),
            updated_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn recipient_may_accept_and_reject() {
        let trade = pending_trade();
        let recipient = Actor::user("user_recipient");
        assert!(authorize_transition(&trade, TradeStatus::Accepted, &recipient).is_ok());
        assert!(authorize_transition(&trade, TradeStatus::Rejected, &recipient).is_ok());
        assert!(matches!(
            authorize_transition(&trade, TradeStatus::Cancelled, &recipient),
            Err(ExchangeError::Forbidden(_))
        ));
    }

    #[test]
    fn sender_may_only_cancel() {
        let trade = pending_trade();
        let sender = Actor::user("user_sender");
        assert!(authorize_transition(&trade, TradeStatus::Cancelled, &sender).is_ok());
        assert!(matches!(
            authorize_transition(&trade, TradeStatus::Accepted, &sender),
            Err(ExchangeError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_transition(&trade, TradeStatus::Rejected, &sender),
            Err(ExchangeError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_bypasses_actor_restriction() {
        let trade = pending_trade();
        let admin = Actor::admin("user_someone_else");
        for next in [
            TradeStatus::Accepted,
            TradeStatus::Rejected,
            TradeStatus::Cancelled,
        ] {
            assert!(authorize_transition(&trade, next, &admin).is_ok());
        }
    }

    #[test]
    fn terminal_trades_always_conflict() {
        for status in [
            TradeStatus::Accepted,
            TradeStatus::Rejected,
            TradeStatus::Cancelled,
        ] {
            let mut trade = pending_trade();
            trade.status = status;
            // even an admin cannot reopen a settled trade
            let err =
                authorize_transition(&trade, TradeStatus::Cancelled, &Actor::admin("user_root"))
                    .unwrap_err();
            assert!(matches!(err, ExchangeError::Conflict(_)));
        }
    }

    #[test]
    fn pending_is_not_a_transition_target() {
        let trade = pending_trade();
        let err = authorize_transition(&trade, TradeStatus::Pending, &Actor::admin("user_root"))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
    }
}
