// Admin operations - moderation and manual balance corrections.
//
// These are trusted-operator tools; authorization (who may call them) is
// the surrounding application's concern. Balance corrections clamp at zero
// in the same statement that applies them, so the non-negative invariant
// holds even for concurrent corrections.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::error::{GameError, GameResult};

/// Adjusts an account's balance by `delta` (positive or negative), clamped
/// at zero. Returns the new balance.
pub fn adjust_tokens(conn: &Connection, handle: &str, delta: i64) -> GameResult<i64> {
    let new_balance: Option<i64> = conn
        .query_row(
            "UPDATE users
             SET tokens = MAX(0, tokens + ?1), updated_at = ?2
             WHERE handle = ?3
             RETURNING tokens",
            params![delta, Utc::now().to_rfc3339(), handle],
            |row| row.get(0),
        )
        .optional()?;

    let new_balance = new_balance.ok_or_else(|| GameError::NotFound {
        entity: "account",
        id: handle.to_string(),
    })?;

    info!(handle, delta, new_balance, "balance adjusted");
    Ok(new_balance)
}

/// Bans or unbans an account.
///
/// Pending outbound trades of a banned account are left untouched; the
/// counterparty can still accept or decline them.
pub fn set_banned(conn: &Connection, handle: &str, banned: bool) -> GameResult<()> {
    let changed = conn.execute(
        "UPDATE users SET is_banned = ?1, updated_at = ?2 WHERE handle = ?3",
        params![banned, Utc::now().to_rfc3339(), handle],
    )?;
    if changed == 0 {
        return Err(GameError::NotFound {
            entity: "account",
            id: handle.to_string(),
        });
    }
    info!(handle, banned, "ban flag updated");
    Ok(())
}

/// Grants or revokes the admin flag.
pub fn set_admin(conn: &Connection, handle: &str, admin: bool) -> GameResult<()> {
    let changed = conn.execute(
        "UPDATE users SET is_admin = ?1, updated_at = ?2 WHERE handle = ?3",
        params![admin, Utc::now().to_rfc3339(), handle],
    )?;
    if changed == 0 {
        return Err(GameError::NotFound {
            entity: "account",
            id: handle.to_string(),
        });
    }
    info!(handle, admin, "admin flag updated");
    Ok(())
}

/// Deletes an account and everything it owns: cooks, trades it appears in,
/// then the user row. One transaction; the only sanctioned delete path.
pub fn delete_account(conn: &mut Connection, handle: &str) -> GameResult<()> {
    let tx = conn.transaction()?;

    let user_id: Option<String> = tx
        .query_row(
            "SELECT id FROM users WHERE handle = ?1",
            params![handle],
            |row| row.get(0),
        )
        .optional()?;
    let user_id = user_id.ok_or_else(|| GameError::NotFound {
        entity: "account",
        id: handle.to_string(),
    })?;

    tx.execute("DELETE FROM cooks WHERE owner_id = ?1", params![user_id])?;
    tx.execute(
        "DELETE FROM trades WHERE proposer_id = ?1 OR counterparty_id = ?1",
        params![user_id],
    )?;
    tx.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;

    tx.commit()?;

    info!(handle, "account deleted with cascade");
    Ok(())
}

/// One row of the admin user listing.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub handle: String,
    pub name: String,
    pub tokens: i64,
    pub is_admin: bool,
    pub is_banned: bool,
    pub cook_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Lists all accounts with their cook counts, newest first.
pub fn list_accounts(conn: &Connection) -> GameResult<Vec<AccountSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.handle, u.name, u.tokens, u.is_admin, u.is_banned,
                COUNT(c.id) AS cook_count, u.created_at
         FROM users u
         LEFT JOIN cooks c ON c.owner_id = u.id
         GROUP BY u.id
         ORDER BY u.created_at DESC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let created_at: String = row.get(6)?;
            Ok(AccountSummary {
                handle: row.get(0)?,
                name: row.get(1)?,
                tokens: row.get(2)?,
                is_admin: row.get(3)?,
                is_banned: row.get(4)?,
                cook_count: row.get(5)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
