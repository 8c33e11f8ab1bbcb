// Database setup - SQLite schema for users, cooks and trades.
//
// The database is the sole shared mutable resource. All cross-entity
// mutations (pack purchase, trade settlement, account cascade) run inside a
// single transaction scoped to that operation; single-row mutations use
// conditional UPDATEs and check the changed-row count.

use rusqlite::Connection;
use std::path::Path;

use crate::error::GameResult;

/// Opens (or creates) the database file and installs the schema.
pub fn open(path: &Path) -> GameResult<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Opens an in-memory database with the schema installed. Test helper.
pub fn open_in_memory() -> GameResult<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> GameResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Users Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            handle TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            tokens INTEGER NOT NULL DEFAULT 100 CHECK (tokens >= 0),
            last_claim TEXT,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_banned INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Cooks Table (inventory items, exactly one owner at all times)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cooks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            rarity TEXT NOT NULL,
            sell_value INTEGER NOT NULL,
            icon TEXT NOT NULL,
            owner_id TEXT NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Trades Table (1-for-1 offers, status transitions exactly once)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            proposer_id TEXT NOT NULL REFERENCES users(id),
            counterparty_id TEXT NOT NULL REFERENCES users(id),
            offered_cook_id TEXT NOT NULL,
            requested_cook_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'accepted', 'declined')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_cooks_owner ON cooks(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trades_counterparty ON trades(counterparty_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trades_proposer ON trades(proposer_id, status)",
        [],
    )?;

    Ok(())
}
