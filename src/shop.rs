// Pack opening and selling.
//
// A pack purchase is debit + item insert in one transaction: nobody can
// observe the balance down without the cook present. The conditional debit
// re-checks the balance at write time, so a racing purchase or claim cannot
// push the account negative.

use rand::Rng;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::GameConfig;
use crate::entities::account;
use crate::entities::cook::{self, Cook};
use crate::error::{GameError, GameResult};

/// The outcome of a successful pack opening.
#[derive(Debug, Clone, Serialize)]
pub struct PackReward {
    /// The cook that was drawn, already credited to the buyer.
    pub cook: Cook,
    /// Label of the tier it came from.
    pub tier: String,
    /// The tier's configured drop weight, for display.
    pub drop_weight: f64,
}

/// Opens a pack for `handle`.
///
/// Fails with `NotFound` (unknown pack or account), `Banned`,
/// `ConfigError` or `InsufficientFunds` without touching any state. After
/// the debit has been applied, an insert failure rolls the debit back; if
/// even the rollback fails the tokens are gone and the call returns
/// `CompensationFailure`, which is logged at error level for manual
/// reconciliation.
pub fn open_pack<R: Rng + ?Sized>(
    conn: &mut Connection,
    config: &GameConfig,
    handle: &str,
    pack_id: &str,
    rng: &mut R,
) -> GameResult<PackReward> {
    let price = config.pack_price(pack_id).ok_or_else(|| GameError::NotFound {
        entity: "pack",
        id: pack_id.to_string(),
    })?;

    let acct = account::require_active(conn, handle)?;

    config.validate()?;

    let tier = config.draw_tier(rng);
    let name = tier.draw_cook(rng).to_string();
    let reward_cook = Cook::from_tier(&name, tier, &acct.id);

    let tx = conn.transaction()?;

    // The debit is the authoritative funds check: the guard runs at write
    // time, so a racing purchase or claim cannot push the account negative.
    // The balance in the error is re-read so the message is current.
    if !account::conditional_debit(&tx, handle, price)? {
        let available = account::find_by_handle(&tx, handle)?
            .map(|a| a.tokens)
            .unwrap_or(0);
        return Err(GameError::InsufficientFunds {
            needed: price,
            available,
        });
    }

    if let Err(insert_err) = cook::insert(&tx, &reward_cook) {
        warn!(handle, pack_id, "cook insert failed after debit, rolling back");
        if let Err(rollback_err) = tx.rollback() {
            // Debited but no cook and no refund: the one place tokens can
            // be lost. Surface it, never swallow it.
            error!(
                handle,
                amount = price,
                %rollback_err,
                "pack purchase compensation failed, manual reconciliation required"
            );
            return Err(GameError::CompensationFailure {
                handle: handle.to_string(),
                amount: price,
            });
        }
        return Err(insert_err);
    }

    tx.commit()?;

    info!(
        handle,
        pack_id,
        cook = %reward_cook.name,
        tier = %tier.label,
        "pack opened"
    );

    Ok(PackReward {
        cook: reward_cook,
        tier: tier.label.clone(),
        drop_weight: tier.weight,
    })
}

/// Sells a cook back for its fixed sell value.
///
/// Deletion and credit are one transaction; the conditional delete verifies
/// ownership at write time, so a cook that was traded away in the meantime
/// cannot be sold.
pub fn sell_cook(conn: &mut Connection, handle: &str, cook_id: &str) -> GameResult<i64> {
    let acct = account::require_active(conn, handle)?;

    let item = cook::find_by_id(conn, cook_id)?
        .filter(|c| c.owner_id == acct.id)
        .ok_or_else(|| GameError::NotFound {
            entity: "cook",
            id: cook_id.to_string(),
        })?;

    let tx = conn.transaction()?;

    if !cook::delete_owned(&tx, cook_id, &acct.id)? {
        return Err(GameError::NotFound {
            entity: "cook",
            id: cook_id.to_string(),
        });
    }
    account::credit(&tx, handle, item.sell_value)?;

    tx.commit()?;

    info!(handle, cook = %item.name, value = item.sell_value, "cook sold");
    Ok(item.sell_value)
}
