// Entity models and their store operations.
//
// One file per entity: the struct, row mapping, and the SQL that touches
// its table. Cross-entity flows (pack opening, trade settlement) live in
// the engine modules and compose these operations inside transactions.

pub mod account;
pub mod cook;
pub mod trade;

pub use account::{Account, LeaderboardRow};
pub use cook::{Cook, InventoryLine};
pub use trade::{TradeOffer, TradeStatus};
