//! Trade exchange engine for a collectible-card application.
//!
//! Users accumulate cards through periodic boosters, browse a collection, and
//! trade cards bilaterally. The engineering core is the atomic settlement of
//! an accepted trade: ownership is re-validated and swapped inside a single
//! datastore transaction, so a trade either fully applies both sides of the
//! swap or leaves all state unchanged.
//!
//! Identity verification, transport, and media handling are external
//! collaborators; callers hand the service a resolved [`lifecycle::Actor`].

pub mod booster;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod ids;
pub mod inventory;
pub mod lifecycle;
pub mod profile;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod trade;

pub use booster::BoosterPolicy;
pub use catalog::{Card, CatalogSnapshot, Rarity};
pub use error::ExchangeError;
pub use lifecycle::Actor;
pub use profile::UserProfile;
pub use reconcile::ReconcileReport;
pub use service::{ExchangeService, LogNotifier, Notifier};
pub use store::ExchangeStore;
pub use trade::{Trade, TradeItem, TradeStatus};
