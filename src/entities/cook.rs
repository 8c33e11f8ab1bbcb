// Cook entity - the collectible item.
//
// A cook has exactly one owner at all times. Ownership moves through the
// trade engine (conditional reassignment) or disappears through a sale or
// an admin cascade; there is no other mutation path.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::config::RarityTier;
use crate::error::GameResult;

/// A collectible cook owned by an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cook {
    pub id: String,
    pub name: String,
    /// Rarity tier label this cook was drawn from.
    pub rarity: String,
    /// Fixed token value when sold back.
    pub sell_value: i64,
    pub icon: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl Cook {
    /// Creates a cook drawn from `tier` for `owner_id`.
    pub fn from_tier(name: &str, tier: &RarityTier, owner_id: &str) -> Self {
        Cook {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            rarity: tier.label.clone(),
            sell_value: tier.sell_value,
            icon: tier.icon.clone(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        }
    }
}

fn cook_from_row(row: &Row) -> rusqlite::Result<Cook> {
    let created_at: String = row.get(6)?;
    Ok(Cook {
        id: row.get(0)?,
        name: row.get(1)?,
        rarity: row.get(2)?,
        sell_value: row.get(3)?,
        icon: row.get(4)?,
        owner_id: row.get(5)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}

const COOK_COLUMNS: &str = "id, name, rarity, sell_value, icon, owner_id, created_at";

pub fn insert(conn: &Connection, cook: &Cook) -> GameResult<()> {
    conn.execute(
        "INSERT INTO cooks (id, name, rarity, sell_value, icon, owner_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            cook.id,
            cook.name,
            cook.rarity,
            cook.sell_value,
            cook.icon,
            cook.owner_id,
            cook.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &str) -> GameResult<Option<Cook>> {
    let cook = conn
        .query_row(
            &format!("SELECT {COOK_COLUMNS} FROM cooks WHERE id = ?1"),
            params![id],
            cook_from_row,
        )
        .optional()?;
    Ok(cook)
}

pub fn find_by_owner(conn: &Connection, owner_id: &str) -> GameResult<Vec<Cook>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COOK_COLUMNS} FROM cooks WHERE owner_id = ?1 ORDER BY created_at DESC"
    ))?;
    let cooks = stmt
        .query_map(params![owner_id], cook_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cooks)
}

/// True if the cook exists and currently belongs to `owner_id`.
pub fn is_owned_by(conn: &Connection, cook_id: &str, owner_id: &str) -> GameResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cooks WHERE id = ?1 AND owner_id = ?2",
        params![cook_id, owner_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Reassigns ownership only if the cook still belongs to `expected_owner`.
///
/// Returns false when ownership has drifted since the caller last looked.
pub fn reassign_owner(
    conn: &Connection,
    cook_id: &str,
    new_owner: &str,
    expected_owner: &str,
) -> GameResult<bool> {
    let changed = conn.execute(
        "UPDATE cooks SET owner_id = ?1 WHERE id = ?2 AND owner_id = ?3",
        params![new_owner, cook_id, expected_owner],
    )?;
    Ok(changed > 0)
}

/// Deletes a cook only if it still belongs to `expected_owner`.
pub fn delete_owned(conn: &Connection, cook_id: &str, expected_owner: &str) -> GameResult<bool> {
    let changed = conn.execute(
        "DELETE FROM cooks WHERE id = ?1 AND owner_id = ?2",
        params![cook_id, expected_owner],
    )?;
    Ok(changed > 0)
}

/// Total number of cooks in existence. Used by trade tests to verify the
/// 1-for-1 invariant.
pub fn count(conn: &Connection) -> GameResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cooks", [], |row| row.get(0))?;
    Ok(count)
}

/// A grouped inventory line: identical cooks collapsed with a count, the
/// way the inventory page displays them.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryLine {
    pub name: String,
    pub rarity: String,
    pub sell_value: i64,
    pub icon: String,
    pub count: i64,
    /// Ids of the individual cooks in this line (for sell/trade pickers).
    pub ids: Vec<String>,
}

pub fn grouped_inventory(conn: &Connection, owner_id: &str) -> GameResult<Vec<InventoryLine>> {
    let cooks = find_by_owner(conn, owner_id)?;

    let mut lines: Vec<InventoryLine> = Vec::new();
    for cook in cooks {
        match lines
            .iter_mut()
            .find(|l| l.name == cook.name && l.rarity == cook.rarity)
        {
            Some(line) => {
                line.count += 1;
                line.ids.push(cook.id);
            }
            None => lines.push(InventoryLine {
                name: cook.name,
                rarity: cook.rarity,
                sell_value: cook.sell_value,
                icon: cook.icon,
                count: 1,
                ids: vec![cook.id],
            }),
        }
    }

    Ok(lines)
}
