// Account entity - identity, balance and claim bookkeeping.
//
// Balance-affecting writes are conditional UPDATEs: the WHERE clause
// re-checks the precondition at write time and the changed-row count tells
// the caller whether it won. Two concurrent operations against the same
// account can never both succeed on stale data.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{GameError, GameResult};

/// A registered player account.
///
/// Identity is the UUID; the handle is unique but user-editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub handle: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Token balance, never negative.
    pub tokens: i64,
    /// When the daily claim was last taken. None = never claimed.
    pub last_claim: Option<DateTime<Utc>>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account value with the starting balance of 100 tokens.
    pub fn new(name: &str, handle: &str, password_hash: &str) -> Self {
        let now = Utc::now();
        Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            handle: handle.to_string(),
            password_hash: password_hash.to_string(),
            tokens: 100,
            last_claim: None,
            is_admin: false,
            is_banned: false,
            created_at: now,
            updated_at: now,
        }
    }
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    let last_claim: Option<String> = row.get(5)?;
    let created_at: String = row.get(8)?;
    let updated_at: String = row.get(9)?;

    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        handle: row.get(2)?,
        password_hash: row.get(3)?,
        tokens: row.get(4)?,
        last_claim: last_claim
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        is_admin: row.get(6)?,
        is_banned: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

const ACCOUNT_COLUMNS: &str = "id, name, handle, password_hash, tokens, last_claim, \
                               is_admin, is_banned, created_at, updated_at";

pub fn insert(conn: &Connection, account: &Account) -> GameResult<()> {
    conn.execute(
        "INSERT INTO users (id, name, handle, password_hash, tokens, last_claim,
                            is_admin, is_banned, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            account.id,
            account.name,
            account.handle,
            account.password_hash,
            account.tokens,
            account.last_claim.map(|dt| dt.to_rfc3339()),
            account.is_admin,
            account.is_banned,
            account.created_at.to_rfc3339(),
            account.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_handle(conn: &Connection, handle: &str) -> GameResult<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE handle = ?1"),
            params![handle],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

pub fn find_by_id(conn: &Connection, id: &str) -> GameResult<Option<Account>> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            account_from_row,
        )
        .optional()?;
    Ok(account)
}

/// Loads an account by handle and rejects missing or banned accounts.
///
/// Every engine starts with this check, in the same order the original
/// actions did: NotFound before Banned.
pub fn require_active(conn: &Connection, handle: &str) -> GameResult<Account> {
    let account = find_by_handle(conn, handle)?.ok_or_else(|| GameError::NotFound {
        entity: "account",
        id: handle.to_string(),
    })?;
    if account.is_banned {
        return Err(GameError::Banned);
    }
    Ok(account)
}

/// Debits `amount` tokens only if the balance still covers it at write time.
///
/// Returns false when the guard fails (a concurrent debit won the race or
/// the balance was too low all along).
pub fn conditional_debit(conn: &Connection, handle: &str, amount: i64) -> GameResult<bool> {
    let changed = conn.execute(
        "UPDATE users
         SET tokens = tokens - ?1, updated_at = ?2
         WHERE handle = ?3 AND tokens >= ?1",
        params![amount, Utc::now().to_rfc3339(), handle],
    )?;
    Ok(changed > 0)
}

/// Unconditionally credits tokens (sale proceeds, pack refund).
pub fn credit(conn: &Connection, handle: &str, amount: i64) -> GameResult<()> {
    let changed = conn.execute(
        "UPDATE users
         SET tokens = tokens + ?1, updated_at = ?2
         WHERE handle = ?3",
        params![amount, Utc::now().to_rfc3339(), handle],
    )?;
    if changed == 0 {
        return Err(GameError::NotFound {
            entity: "account",
            id: handle.to_string(),
        });
    }
    Ok(())
}

/// Replaces the stored password hash.
pub fn set_password_hash(conn: &Connection, handle: &str, password_hash: &str) -> GameResult<()> {
    let changed = conn.execute(
        "UPDATE users
         SET password_hash = ?1, updated_at = ?2
         WHERE handle = ?3",
        params![password_hash, Utc::now().to_rfc3339(), handle],
    )?;
    if changed == 0 {
        return Err(GameError::NotFound {
            entity: "account",
            id: handle.to_string(),
        });
    }
    Ok(())
}

/// Updates the display name and handle.
pub fn update_profile(
    conn: &Connection,
    handle: &str,
    new_name: &str,
    new_handle: &str,
) -> GameResult<()> {
    let changed = conn.execute(
        "UPDATE users
         SET name = ?1, handle = ?2, updated_at = ?3
         WHERE handle = ?4",
        params![new_name, new_handle, Utc::now().to_rfc3339(), handle],
    )?;
    if changed == 0 {
        return Err(GameError::NotFound {
            entity: "account",
            id: handle.to_string(),
        });
    }
    Ok(())
}

/// Grants the daily claim and stamps `last_claim` in one conditional write.
///
/// The guard compares against the `last_claim` value the caller read, so of
/// two concurrent claims only one can apply; the loser sees false.
pub fn apply_claim(
    conn: &Connection,
    handle: &str,
    amount: i64,
    now: DateTime<Utc>,
    expected_previous: Option<DateTime<Utc>>,
) -> GameResult<bool> {
    let changed = conn.execute(
        "UPDATE users
         SET tokens = tokens + ?1, last_claim = ?2, updated_at = ?2
         WHERE handle = ?3 AND last_claim IS ?4",
        params![
            amount,
            now.to_rfc3339(),
            handle,
            expected_previous.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(changed > 0)
}

/// One row of the leaderboard: accounts ranked by balance.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub handle: String,
    pub name: String,
    pub tokens: i64,
    pub cook_count: i64,
}

pub fn leaderboard(conn: &Connection, limit: u32) -> GameResult<Vec<LeaderboardRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.handle, u.name, u.tokens, COUNT(c.id) AS cook_count
         FROM users u
         LEFT JOIN cooks c ON c.owner_id = u.id
         GROUP BY u.id
         ORDER BY u.tokens DESC, u.handle ASC
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit], |row| {
            Ok(LeaderboardRow {
                handle: row.get(0)?,
                name: row.get(1)?,
                tokens: row.get(2)?,
                cook_count: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
