// Game error taxonomy - every engine returns these as typed results.
// Display strings are the user-facing messages; no internal detail leaks.

use chrono::Duration;
use thiserror::Error;

/// Errors that can occur in the game core.
#[derive(Error, Debug)]
pub enum GameError {
    /// The named entity does not exist (account, cook, pack, pending trade).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of thing was looked up.
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// The acting account is banned.
    #[error("your account has been banned, please contact support")]
    Banned,

    /// Balance too low for the requested purchase.
    #[error("not enough tokens: need {needed}, have {available}")]
    InsufficientFunds {
        /// Tokens the operation requires.
        needed: i64,
        /// Tokens the account holds.
        available: i64,
    },

    /// Daily claim attempted inside the 24h cooldown window.
    #[error("daily tokens already claimed, next claim in {}", format_wait(.wait))]
    AlreadyClaimed {
        /// Remaining wait until the next claim is allowed.
        wait: Duration,
    },

    /// A trade references a cook its supposed owner does not hold.
    #[error("{0}")]
    OwnershipError(String),

    /// Ownership drifted between trade creation and acceptance.
    /// The offer stays pending; the caller may retry or decline.
    #[error("trade is stale: one or both cooks changed hands since the offer was made")]
    StaleTrade,

    /// The rarity table is malformed (empty, non-positive weights, tier
    /// without candidate cooks).
    #[error("game configuration error: {0}")]
    ConfigError(String),

    /// Tokens were debited, the item grant failed, and the refund also
    /// failed. Data-integrity incident: must be alerted on, never dropped.
    #[error("pack purchase failed and {amount} tokens could not be refunded to {handle}")]
    CompensationFailure {
        /// Account that lost the tokens.
        handle: String,
        /// Amount awaiting manual reconciliation.
        amount: i64,
    },

    /// Registration with a handle that is already in use.
    #[error("handle already taken: {0}")]
    HandleTaken(String),

    /// Password verification failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Underlying storage failure.
    #[error("storage error")]
    Database(#[from] rusqlite::Error),
}

/// Result type for game operations.
pub type GameResult<T> = Result<T, GameError>;

/// Formats a wait duration the way the claim page displays it: "3h 42m".
fn format_wait(wait: &Duration) -> String {
    let total_minutes = wait.num_minutes().max(0);
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_claimed_message_shows_remaining_wait() {
        let err = GameError::AlreadyClaimed {
            wait: Duration::minutes(3 * 60 + 42),
        };
        assert_eq!(
            err.to_string(),
            "daily tokens already claimed, next claim in 3h 42m"
        );
    }

    #[test]
    fn test_negative_wait_clamps_to_zero() {
        let err = GameError::AlreadyClaimed {
            wait: Duration::minutes(-5),
        };
        assert_eq!(err.to_string(), "daily tokens already claimed, next claim in 0h 0m");
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = GameError::InsufficientFunds {
            needed: 25,
            available: 10,
        };
        assert_eq!(err.to_string(), "not enough tokens: need 25, have 10");
    }
}
