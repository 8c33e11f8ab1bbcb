// Trade engine - two-party conditional cook exchange.
//
// Ownership is verified twice: at creation time and again at acceptance
// time, because cooks can change hands (or be sold) while an offer sits
// pending. Acceptance swaps both cooks and flips the status inside one
// transaction with expected-owner guards on every write; a failed guard
// rolls the whole swap back and leaves the offer pending.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

use crate::entities::account;
use crate::entities::cook;
use crate::entities::trade::{self, TradeOffer, TradeStatus};
use crate::error::{GameError, GameResult};

/// Creates a pending 1-for-1 offer.
///
/// Both cooks must belong to their respective parties right now;
/// otherwise `OwnershipError`.
pub fn create_trade(
    conn: &Connection,
    proposer_handle: &str,
    counterparty_handle: &str,
    offered_cook_id: &str,
    requested_cook_id: &str,
) -> GameResult<TradeOffer> {
    let proposer = account::require_active(conn, proposer_handle)?;
    let counterparty =
        account::find_by_handle(conn, counterparty_handle)?.ok_or_else(|| GameError::NotFound {
            entity: "account",
            id: counterparty_handle.to_string(),
        })?;

    if !cook::is_owned_by(conn, offered_cook_id, &proposer.id)? {
        return Err(GameError::OwnershipError(
            "you don't own the offered cook".to_string(),
        ));
    }
    if !cook::is_owned_by(conn, requested_cook_id, &counterparty.id)? {
        return Err(GameError::OwnershipError(
            "the other player doesn't own the requested cook".to_string(),
        ));
    }

    let offer = TradeOffer::new(
        &proposer.id,
        &counterparty.id,
        offered_cook_id,
        requested_cook_id,
    );
    trade::insert(conn, &offer)?;

    info!(
        trade = %offer.id,
        proposer = proposer_handle,
        counterparty = counterparty_handle,
        "trade offer created"
    );
    Ok(offer)
}

/// Accepts a pending offer. Only the counterparty may accept.
///
/// Re-verifies both ownerships via conditional reassignment: if either cook
/// drifted since the offer was made, the call fails with `StaleTrade`, the
/// transaction rolls back, and the offer stays pending for the caller to
/// retry or decline. Partial swaps are never observable.
pub fn accept_trade(
    conn: &mut Connection,
    trade_id: &str,
    acting_handle: &str,
) -> GameResult<TradeOffer> {
    let actor = account::require_active(conn, acting_handle)?;

    let offer = trade::find_pending_for_counterparty(conn, trade_id, &actor.id)?.ok_or_else(
        || GameError::NotFound {
            entity: "pending trade",
            id: trade_id.to_string(),
        },
    )?;

    let tx = conn.transaction()?;

    // Each reassignment is guarded on the owner the offer was created
    // against. Zero changed rows = ownership drifted = stale offer.
    let offered_moved = cook::reassign_owner(
        &tx,
        &offer.offered_cook_id,
        &offer.counterparty_id,
        &offer.proposer_id,
    )?;
    if !offered_moved {
        return Err(GameError::StaleTrade);
    }

    let requested_moved = cook::reassign_owner(
        &tx,
        &offer.requested_cook_id,
        &offer.proposer_id,
        &offer.counterparty_id,
    )?;
    if !requested_moved {
        return Err(GameError::StaleTrade);
    }

    // Status guard closes the settle race: if another request settled this
    // offer since our read, the whole swap rolls back untouched.
    if !trade::set_status(&tx, trade_id, TradeStatus::Accepted, TradeStatus::Pending)? {
        return Err(GameError::NotFound {
            entity: "pending trade",
            id: trade_id.to_string(),
        });
    }

    tx.commit()?;

    info!(trade = trade_id, counterparty = acting_handle, "trade accepted");
    Ok(TradeOffer {
        status: TradeStatus::Accepted,
        ..offer
    })
}

/// Declines a pending offer. Only the counterparty may decline.
/// No ownership changes.
pub fn decline_trade(
    conn: &Connection,
    trade_id: &str,
    acting_handle: &str,
) -> GameResult<TradeOffer> {
    let actor = account::require_active(conn, acting_handle)?;

    let offer = trade::find_pending_for_counterparty(conn, trade_id, &actor.id)?.ok_or_else(
        || GameError::NotFound {
            entity: "pending trade",
            id: trade_id.to_string(),
        },
    )?;

    if !trade::set_status(conn, trade_id, TradeStatus::Declined, TradeStatus::Pending)? {
        return Err(GameError::NotFound {
            entity: "pending trade",
            id: trade_id.to_string(),
        });
    }

    info!(trade = trade_id, counterparty = acting_handle, "trade declined");
    Ok(TradeOffer {
        status: TradeStatus::Declined,
        ..offer
    })
}

/// One side of a trade as displayed on the trades page. The cook fields are
/// optional because a referenced cook may have been sold since.
#[derive(Debug, Clone, Serialize)]
pub struct TradeCookRef {
    pub id: String,
    pub name: Option<String>,
    pub rarity: Option<String>,
    pub icon: Option<String>,
}

/// A trade offer joined with both parties and both cooks.
#[derive(Debug, Clone, Serialize)]
pub struct TradeView {
    pub id: String,
    pub proposer_handle: String,
    pub counterparty_handle: String,
    pub offered: TradeCookRef,
    pub requested: TradeCookRef,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    /// True when the listed account is the proposer.
    pub sent_by_me: bool,
}

/// Lists all offers an account sent or received, newest first.
pub fn list_for_account(conn: &Connection, handle: &str) -> GameResult<Vec<TradeView>> {
    let acct = account::find_by_handle(conn, handle)?.ok_or_else(|| GameError::NotFound {
        entity: "account",
        id: handle.to_string(),
    })?;

    let mut stmt = conn.prepare(
        "SELECT t.id, pu.handle, cu.handle,
                t.offered_cook_id, oc.name, oc.rarity, oc.icon,
                t.requested_cook_id, rc.name, rc.rarity, rc.icon,
                t.status, t.created_at, t.proposer_id
         FROM trades t
         JOIN users pu ON pu.id = t.proposer_id
         JOIN users cu ON cu.id = t.counterparty_id
         LEFT JOIN cooks oc ON oc.id = t.offered_cook_id
         LEFT JOIN cooks rc ON rc.id = t.requested_cook_id
         WHERE t.proposer_id = ?1 OR t.counterparty_id = ?1
         ORDER BY t.created_at DESC",
    )?;

    let views = stmt
        .query_map(params![acct.id], |row| {
            let status: String = row.get(11)?;
            let created_at: String = row.get(12)?;
            let proposer_id: String = row.get(13)?;
            Ok(TradeView {
                id: row.get(0)?,
                proposer_handle: row.get(1)?,
                counterparty_handle: row.get(2)?,
                offered: TradeCookRef {
                    id: row.get(3)?,
                    name: row.get(4)?,
                    rarity: row.get(5)?,
                    icon: row.get(6)?,
                },
                requested: TradeCookRef {
                    id: row.get(7)?,
                    name: row.get(8)?,
                    rarity: row.get(9)?,
                    icon: row.get(10)?,
                },
                status: match status.as_str() {
                    "accepted" => TradeStatus::Accepted,
                    "declined" => TradeStatus::Declined,
                    _ => TradeStatus::Pending,
                },
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
                sent_by_me: proposer_id == acct.id,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth;
    use crate::config::GameConfig;
    use crate::db;
    use crate::entities::cook::Cook;
    use crate::shop;

    struct Fixture {
        conn: Connection,
        alice_id: String,
        bob_id: String,
        alice_cook: String,
        bob_cook: String,
    }

    /// Two users, one cook each.
    fn setup() -> Fixture {
        let conn = db::open_in_memory().unwrap();
        let alice = auth::register(&conn, "Alice", "alice", "pw").unwrap();
        let bob = auth::register(&conn, "Bob", "bob", "pw").unwrap();

        let config = GameConfig::default();
        let alice_cook = Cook::from_tier("Katie", &config.rarities[3], &alice.id);
        let bob_cook = Cook::from_tier("blabla", &config.rarities[5], &bob.id);
        cook::insert(&conn, &alice_cook).unwrap();
        cook::insert(&conn, &bob_cook).unwrap();

        Fixture {
            conn,
            alice_id: alice.id,
            bob_id: bob.id,
            alice_cook: alice_cook.id,
            bob_cook: bob_cook.id,
        }
    }

    #[test]
    fn test_round_trip_swaps_exactly_the_two_cooks() {
        let mut fx = setup();

        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();
        assert_eq!(offer.status, TradeStatus::Pending);

        let before = cook::count(&fx.conn).unwrap();
        let settled = accept_trade(&mut fx.conn, &offer.id, "bob").unwrap();
        assert_eq!(settled.status, TradeStatus::Accepted);

        // Ownership swapped, total count unchanged
        assert!(cook::is_owned_by(&fx.conn, &fx.alice_cook, &fx.bob_id).unwrap());
        assert!(cook::is_owned_by(&fx.conn, &fx.bob_cook, &fx.alice_id).unwrap());
        assert_eq!(cook::count(&fx.conn).unwrap(), before);

        // Accepting again: terminal state, no mutation
        assert!(matches!(
            accept_trade(&mut fx.conn, &offer.id, "bob"),
            Err(GameError::NotFound { entity: "pending trade", .. })
        ));
        assert!(cook::is_owned_by(&fx.conn, &fx.alice_cook, &fx.bob_id).unwrap());
    }

    #[test]
    fn test_proposer_cannot_self_accept() {
        let mut fx = setup();
        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        assert!(matches!(
            accept_trade(&mut fx.conn, &offer.id, "alice"),
            Err(GameError::NotFound { entity: "pending trade", .. })
        ));

        // Nothing moved
        assert!(cook::is_owned_by(&fx.conn, &fx.alice_cook, &fx.alice_id).unwrap());
        assert!(cook::is_owned_by(&fx.conn, &fx.bob_cook, &fx.bob_id).unwrap());
    }

    #[test]
    fn test_decline_keeps_ownership() {
        let fx = setup();
        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        let declined = decline_trade(&fx.conn, &offer.id, "bob").unwrap();
        assert_eq!(declined.status, TradeStatus::Declined);

        assert!(cook::is_owned_by(&fx.conn, &fx.alice_cook, &fx.alice_id).unwrap());
        assert!(cook::is_owned_by(&fx.conn, &fx.bob_cook, &fx.bob_id).unwrap());

        // Declining twice fails: terminal state
        assert!(matches!(
            decline_trade(&fx.conn, &offer.id, "bob"),
            Err(GameError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_requires_ownership_on_both_sides() {
        let fx = setup();

        // Offered cook belongs to bob, not alice
        assert!(matches!(
            create_trade(&fx.conn, "alice", "bob", &fx.bob_cook, &fx.bob_cook),
            Err(GameError::OwnershipError(_))
        ));

        // Requested cook belongs to alice, not bob
        assert!(matches!(
            create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.alice_cook),
            Err(GameError::OwnershipError(_))
        ));
    }

    #[test]
    fn test_accept_after_offered_cook_was_sold_is_stale() {
        let mut fx = setup();
        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        // Alice sells the offered cook while the offer is pending
        shop::sell_cook(&mut fx.conn, "alice", &fx.alice_cook).unwrap();

        assert!(matches!(
            accept_trade(&mut fx.conn, &offer.id, "bob"),
            Err(GameError::StaleTrade)
        ));

        // Offer stays pending, bob's cook untouched
        let still = trade::find_by_id(&fx.conn, &offer.id).unwrap().unwrap();
        assert_eq!(still.status, TradeStatus::Pending);
        assert!(cook::is_owned_by(&fx.conn, &fx.bob_cook, &fx.bob_id).unwrap());
    }

    #[test]
    fn test_accept_after_requested_cook_drifted_rolls_back_first_move() {
        let mut fx = setup();
        let carol = auth::register(&fx.conn, "Carol", "carol", "pw").unwrap();

        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        // Bob's cook moves to carol through another channel
        assert!(cook::reassign_owner(&fx.conn, &fx.bob_cook, &carol.id, &fx.bob_id).unwrap());

        assert!(matches!(
            accept_trade(&mut fx.conn, &offer.id, "bob"),
            Err(GameError::StaleTrade)
        ));

        // The first reassignment (alice -> bob) must have rolled back
        assert!(cook::is_owned_by(&fx.conn, &fx.alice_cook, &fx.alice_id).unwrap());
        assert!(cook::is_owned_by(&fx.conn, &fx.bob_cook, &carol.id).unwrap());
        let still = trade::find_by_id(&fx.conn, &offer.id).unwrap().unwrap();
        assert_eq!(still.status, TradeStatus::Pending);
    }

    #[test]
    fn test_banned_actor_cannot_accept() {
        let mut fx = setup();
        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        fx.conn
            .execute("UPDATE users SET is_banned = 1 WHERE handle = 'bob'", [])
            .unwrap();

        assert!(matches!(
            accept_trade(&mut fx.conn, &offer.id, "bob"),
            Err(GameError::Banned)
        ));
    }

    #[test]
    fn test_list_for_account_shows_sent_and_received() {
        let fx = setup();
        let offer = create_trade(&fx.conn, "alice", "bob", &fx.alice_cook, &fx.bob_cook).unwrap();

        let alice_view = list_for_account(&fx.conn, "alice").unwrap();
        assert_eq!(alice_view.len(), 1);
        assert!(alice_view[0].sent_by_me);
        assert_eq!(alice_view[0].id, offer.id);
        assert_eq!(alice_view[0].offered.name.as_deref(), Some("Katie"));

        let bob_view = list_for_account(&fx.conn, "bob").unwrap();
        assert_eq!(bob_view.len(), 1);
        assert!(!bob_view[0].sent_by_me);
        assert_eq!(bob_view[0].requested.name.as_deref(), Some("blabla"));
    }
}
