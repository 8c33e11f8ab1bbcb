// Cook'it - Core Library
// Exposes all modules for use in the CLI and tests

pub mod admin;
pub mod auth;
pub mod claim;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod shop;
pub mod trading;

// Re-export commonly used types
pub use config::{GameConfig, PackPrices, RarityTier};
pub use entities::{
    Account, Cook, InventoryLine, LeaderboardRow, TradeOffer, TradeStatus,
};
pub use error::{GameError, GameResult};
pub use shop::PackReward;
pub use trading::{TradeCookRef, TradeView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
