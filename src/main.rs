// Cook'it CLI - drive the game engines from the command line.
//
// The database path comes from COOKIT_DB (default cookit.db) and the rarity
// table from COOKIT_CONFIG when set, otherwise the built-in defaults.

use anyhow::Result;
use rusqlite::Connection;
use std::env;
use std::path::{Path, PathBuf};

use cookit::{admin, auth, claim, db, shop, trading, GameConfig};
use cookit::entities::{account, cook};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cookit=info".into()),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    let result = match command {
        "init" => run_init(),
        "register" => run_register(&args),
        "login" => run_login(&args),
        "password" => run_password(&args),
        "settings" => run_settings(&args),
        "claim" => run_claim(&args),
        "open" => run_open(&args),
        "inventory" => run_inventory(&args),
        "sell" => run_sell(&args),
        "trade" => run_trade(&args),
        "leaderboard" => run_leaderboard(&args),
        "admin" => run_admin(&args),
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }

    Ok(())
}

fn db_path() -> PathBuf {
    env::var("COOKIT_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("cookit.db"))
}

fn open_db() -> Result<Connection> {
    Ok(db::open(&db_path())?)
}

fn load_config() -> Result<GameConfig> {
    match env::var("COOKIT_CONFIG") {
        Ok(path) => Ok(GameConfig::load(Path::new(&path))?),
        Err(_) => Ok(GameConfig::default()),
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing argument: <{name}>"))
}

fn run_init() -> Result<()> {
    let path = db_path();
    db::open(&path)?;
    println!("✓ Database initialized at {}", path.display());
    Ok(())
}

fn run_register(args: &[String]) -> Result<()> {
    let name = arg(args, 2, "name")?;
    let handle = arg(args, 3, "handle")?;
    let password = arg(args, 4, "password")?;

    let conn = open_db()?;
    let created = auth::register(&conn, name, handle, password)?;
    println!("✓ Registered @{} with {} tokens", created.handle, created.tokens);
    Ok(())
}

fn run_login(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;
    let password = arg(args, 3, "password")?;

    let conn = open_db()?;
    let acct = auth::authenticate(&conn, handle, password)?;
    println!("✓ Welcome back, {} (@{}) - {} tokens", acct.name, acct.handle, acct.tokens);
    Ok(())
}

fn run_password(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;
    let current = arg(args, 3, "current-password")?;
    let new_password = arg(args, 4, "new-password")?;

    let conn = open_db()?;
    auth::change_password(&conn, handle, current, new_password)?;
    println!("✓ Password changed for @{handle}");
    Ok(())
}

fn run_settings(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;
    let new_name = arg(args, 3, "name")?;
    let new_handle = arg(args, 4, "new-handle")?;

    let conn = open_db()?;
    let updated = auth::update_profile(&conn, handle, new_name, new_handle)?;
    println!("✓ Profile updated: {} (@{})", updated.name, updated.handle);
    Ok(())
}

fn run_claim(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;

    let conn = open_db()?;
    let amount = claim::claim_daily(&conn, handle, &mut rand::thread_rng())?;
    let acct = account::find_by_handle(&conn, handle)?
        .ok_or_else(|| anyhow::anyhow!("account disappeared"))?;
    println!("🎁 Claimed {amount} tokens, balance is now {}", acct.tokens);
    Ok(())
}

fn run_open(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;
    let pack_id = args.get(3).map(String::as_str).unwrap_or("og");

    let mut conn = open_db()?;
    let config = load_config()?;
    let reward = shop::open_pack(&mut conn, &config, handle, pack_id, &mut rand::thread_rng())?;
    println!(
        "🎉 You pulled {} {} [{}] (sells for {})",
        reward.cook.icon, reward.cook.name, reward.tier, reward.cook.sell_value
    );
    Ok(())
}

fn run_inventory(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;

    let conn = open_db()?;
    let acct = account::find_by_handle(&conn, handle)?
        .ok_or_else(|| anyhow::anyhow!("no account with handle @{handle}"))?;

    let lines = cook::grouped_inventory(&conn, &acct.id)?;
    println!("👨‍🍳 @{handle} - {} tokens", acct.tokens);
    if lines.is_empty() {
        println!("   (no cooks yet - try opening a pack)");
        return Ok(());
    }
    for line in lines {
        println!(
            "   {} {} x{} [{}] sell {} each  ids: {}",
            line.icon,
            line.name,
            line.count,
            line.rarity,
            line.sell_value,
            line.ids.join(", ")
        );
    }
    Ok(())
}

fn run_sell(args: &[String]) -> Result<()> {
    let handle = arg(args, 2, "handle")?;
    let cook_id = arg(args, 3, "cook-id")?;

    let mut conn = open_db()?;
    let value = shop::sell_cook(&mut conn, handle, cook_id)?;
    println!("💰 Sold for {value} tokens");
    Ok(())
}

fn run_trade(args: &[String]) -> Result<()> {
    let action = arg(args, 2, "offer|accept|decline|list")?;
    match action {
        "offer" => {
            let handle = arg(args, 3, "handle")?;
            let counterparty = arg(args, 4, "counterparty")?;
            let offered = arg(args, 5, "offered-cook-id")?;
            let requested = arg(args, 6, "requested-cook-id")?;

            let conn = open_db()?;
            let offer = trading::create_trade(&conn, handle, counterparty, offered, requested)?;
            println!("📨 Offer {} sent to @{counterparty}", offer.id);
        }
        "accept" => {
            let handle = arg(args, 3, "handle")?;
            let trade_id = arg(args, 4, "trade-id")?;

            let mut conn = open_db()?;
            trading::accept_trade(&mut conn, trade_id, handle)?;
            println!("🤝 Trade {trade_id} accepted, cooks swapped");
        }
        "decline" => {
            let handle = arg(args, 3, "handle")?;
            let trade_id = arg(args, 4, "trade-id")?;

            let conn = open_db()?;
            trading::decline_trade(&conn, trade_id, handle)?;
            println!("🚫 Trade {trade_id} declined");
        }
        "list" => {
            let handle = arg(args, 3, "handle")?;

            let conn = open_db()?;
            let views = trading::list_for_account(&conn, handle)?;
            if views.is_empty() {
                println!("(no trades)");
            }
            for view in views {
                let direction = if view.sent_by_me { "→" } else { "←" };
                println!(
                    "{} [{}] {} offers {} for {} (vs @{}): {}",
                    direction,
                    view.status.as_str(),
                    view.proposer_handle,
                    view.offered.name.as_deref().unwrap_or("(sold)"),
                    view.requested.name.as_deref().unwrap_or("(sold)"),
                    view.counterparty_handle,
                    view.id
                );
            }
        }
        other => anyhow::bail!("unknown trade action: {other}"),
    }
    Ok(())
}

fn run_leaderboard(args: &[String]) -> Result<()> {
    let limit: u32 = args
        .get(2)
        .map(|raw| raw.parse())
        .transpose()?
        .unwrap_or(10);

    let conn = open_db()?;
    let rows = account::leaderboard(&conn, limit)?;
    println!("🏆 Leaderboard");
    for (rank, row) in rows.iter().enumerate() {
        println!(
            "{:>3}. @{} ({}) - {} tokens, {} cooks",
            rank + 1,
            row.handle,
            row.name,
            row.tokens,
            row.cook_count
        );
    }
    Ok(())
}

fn run_admin(args: &[String]) -> Result<()> {
    let action = arg(args, 2, "tokens|ban|unban|promote|demote|delete|users")?;
    match action {
        "tokens" => {
            let handle = arg(args, 3, "handle")?;
            let delta: i64 = arg(args, 4, "delta")?.parse()?;

            let conn = open_db()?;
            let balance = admin::adjust_tokens(&conn, handle, delta)?;
            println!("✓ @{handle} balance is now {balance}");
        }
        "ban" | "unban" => {
            let handle = arg(args, 3, "handle")?;

            let conn = open_db()?;
            admin::set_banned(&conn, handle, action == "ban")?;
            println!("✓ @{handle} {}", if action == "ban" { "banned" } else { "unbanned" });
        }
        "promote" | "demote" => {
            let handle = arg(args, 3, "handle")?;

            let conn = open_db()?;
            admin::set_admin(&conn, handle, action == "promote")?;
            println!("✓ @{handle} admin = {}", action == "promote");
        }
        "delete" => {
            let handle = arg(args, 3, "handle")?;

            let mut conn = open_db()?;
            admin::delete_account(&mut conn, handle)?;
            println!("✓ @{handle} deleted along with cooks and trades");
        }
        "users" => {
            let conn = open_db()?;
            for row in admin::list_accounts(&conn)? {
                let flags = match (row.is_admin, row.is_banned) {
                    (true, true) => " [admin, banned]",
                    (true, false) => " [admin]",
                    (false, true) => " [banned]",
                    (false, false) => "",
                };
                println!(
                    "@{} ({}) - {} tokens, {} cooks{}",
                    row.handle, row.name, row.tokens, row.cook_count, flags
                );
            }
        }
        other => anyhow::bail!("unknown admin action: {other}"),
    }
    Ok(())
}

fn print_usage() {
    println!("Cook'it v{}", cookit::VERSION);
    println!();
    println!("Usage: cookit <command> [args]");
    println!();
    println!("  init                                            create the database");
    println!("  register <name> <handle> <password>             create an account");
    println!("  login <handle> <password>                       verify credentials");
    println!("  password <handle> <current> <new>               change password");
    println!("  settings <handle> <name> <new-handle>           update profile");
    println!("  claim <handle>                                  claim daily tokens");
    println!("  open <handle> [pack]                            open a pack (default: og)");
    println!("  inventory <handle>                              show owned cooks");
    println!("  sell <handle> <cook-id>                         sell a cook back");
    println!("  trade offer <handle> <counterparty> <offered-cook-id> <requested-cook-id>");
    println!("  trade accept <handle> <trade-id>");
    println!("  trade decline <handle> <trade-id>");
    println!("  trade list <handle>");
    println!("  leaderboard [limit]                             top accounts by tokens");
    println!("  admin tokens <handle> <delta>                   adjust a balance");
    println!("  admin ban|unban <handle>");
    println!("  admin promote|demote <handle>");
    println!("  admin delete <handle>");
    println!("  admin users");
    println!();
    println!("Environment: COOKIT_DB (database path), COOKIT_CONFIG (TOML rarity table)");
}
