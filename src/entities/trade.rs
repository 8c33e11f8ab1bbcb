// Trade offer entity.
//
// An offer transitions status at most once: pending -> accepted or
// pending -> declined. Terminal states are final and enforced with a
// conditional status update guarded on the expected current status.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::GameResult;

/// Lifecycle state of a trade offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Accepted,
    Declined,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Accepted => "accepted",
            TradeStatus::Declined => "declined",
        }
    }

    fn from_str(raw: &str) -> Self {
        match raw {
            "accepted" => TradeStatus::Accepted,
            "declined" => TradeStatus::Declined,
            _ => TradeStatus::Pending,
        }
    }
}

/// A proposed 1-for-1 cook exchange between two accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: String,
    pub proposer_id: String,
    pub counterparty_id: String,
    pub offered_cook_id: String,
    pub requested_cook_id: String,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeOffer {
    /// Creates a pending offer from proposer to counterparty.
    pub fn new(
        proposer_id: &str,
        counterparty_id: &str,
        offered_cook_id: &str,
        requested_cook_id: &str,
    ) -> Self {
        let now = Utc::now();
        TradeOffer {
            id: uuid::Uuid::new_v4().to_string(),
            proposer_id: proposer_id.to_string(),
            counterparty_id: counterparty_id.to_string(),
            offered_cook_id: offered_cook_id.to_string(),
            requested_cook_id: requested_cook_id.to_string(),
            status: TradeStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

fn offer_from_row(row: &Row) -> rusqlite::Result<TradeOffer> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(TradeOffer {
        id: row.get(0)?,
        proposer_id: row.get(1)?,
        counterparty_id: row.get(2)?,
        offered_cook_id: row.get(3)?,
        requested_cook_id: row.get(4)?,
        status: TradeStatus::from_str(&status),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

const TRADE_COLUMNS: &str = "id, proposer_id, counterparty_id, offered_cook_id, \
                             requested_cook_id, status, created_at, updated_at";

pub fn insert(conn: &Connection, offer: &TradeOffer) -> GameResult<()> {
    conn.execute(
        "INSERT INTO trades (id, proposer_id, counterparty_id, offered_cook_id,
                             requested_cook_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            offer.id,
            offer.proposer_id,
            offer.counterparty_id,
            offer.offered_cook_id,
            offer.requested_cook_id,
            offer.status.as_str(),
            offer.created_at.to_rfc3339(),
            offer.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> GameResult<Option<TradeOffer>> {
    let offer = conn
        .query_row(
            &format!("SELECT {TRADE_COLUMNS} FROM trades WHERE id = ?1"),
            params![id],
            offer_from_row,
        )
        .optional()?;
    Ok(offer)
}

/// Loads a pending offer addressed to `counterparty_id`.
///
/// Mirrors the original lookup: a settled offer, an offer for somebody
/// else, and a missing offer all look the same to the caller.
pub fn find_pending_for_counterparty(
    conn: &Connection,
    id: &str,
    counterparty_id: &str,
) -> GameResult<Option<TradeOffer>> {
    let offer = conn
        .query_row(
            &format!(
                "SELECT {TRADE_COLUMNS} FROM trades
                 WHERE id = ?1 AND counterparty_id = ?2 AND status = 'pending'"
            ),
            params![id, counterparty_id],
            offer_from_row,
        )
        .optional()?;
    Ok(offer)
}

/// Flips the status only if the current status matches `expected`.
pub fn set_status(
    conn: &Connection,
    id: &str,
    new_status: TradeStatus,
    expected: TradeStatus,
) -> GameResult<bool> {
    let changed = conn.execute(
        "UPDATE trades SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            new_status.as_str(),
            Utc::now().to_rfc3339(),
            id,
            expected.as_str(),
        ],
    )?;
    Ok(changed > 0)
}
