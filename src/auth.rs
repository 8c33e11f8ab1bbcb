// Registration and credential checks.
//
// Passwords are stored as salt$digest with a per-account random salt and a
// SHA-256 digest. Session handling lives in the surrounding application
// layer; this module only covers the storage side of credentials.

use rand::RngCore;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::entities::account::{self, Account};
use crate::error::{GameError, GameResult};

/// Hashes a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex_encode(&salt_bytes);
    format!("{salt}${}", digest(&salt, password))
}

/// Checks a password against a stored salt$digest value.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Registers a new account with the starting balance of 100 tokens.
///
/// The handle must be unused; a duplicate returns `HandleTaken`.
pub fn register(conn: &Connection, name: &str, handle: &str, password: &str) -> GameResult<Account> {
    if account::find_by_handle(conn, handle)?.is_some() {
        return Err(GameError::HandleTaken(handle.to_string()));
    }

    let new_account = Account::new(name, handle, &hash_password(password));
    account::insert(conn, &new_account)?;
    tracing::info!(handle, "account registered");
    Ok(new_account)
}

/// Looks up an account by handle and verifies the password.
///
/// Banned accounts cannot authenticate.
pub fn authenticate(conn: &Connection, handle: &str, password: &str) -> GameResult<Account> {
    let found = account::require_active(conn, handle)?;
    if !verify_password(password, &found.password_hash) {
        return Err(GameError::InvalidCredentials);
    }
    Ok(found)
}

/// Changes the password after verifying the current one.
pub fn change_password(
    conn: &Connection,
    handle: &str,
    current: &str,
    new_password: &str,
) -> GameResult<()> {
    let found = account::require_active(conn, handle)?;
    if !verify_password(current, &found.password_hash) {
        return Err(GameError::InvalidCredentials);
    }
    account::set_password_hash(conn, handle, &hash_password(new_password))?;
    tracing::info!(handle, "password changed");
    Ok(())
}

/// Updates display name and handle.
///
/// The new handle must not belong to another account; the unique index
/// backs the check up at write time.
pub fn update_profile(
    conn: &Connection,
    handle: &str,
    new_name: &str,
    new_handle: &str,
) -> GameResult<Account> {
    account::require_active(conn, handle)?;

    if new_handle != handle && account::find_by_handle(conn, new_handle)?.is_some() {
        return Err(GameError::HandleTaken(new_handle.to_string()));
    }
    account::update_profile(conn, handle, new_name, new_handle)?;

    tracing::info!(handle, new_handle, "profile updated");
    account::find_by_handle(conn, new_handle)?.ok_or_else(|| GameError::NotFound {
        entity: "account",
        id: new_handle.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        // Fresh salt per account
        assert_ne!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_value() {
        assert!(!verify_password("anything", "no-separator-here"));
    }

    #[test]
    fn test_register_grants_starting_balance() {
        let conn = db::open_in_memory().unwrap();
        let created = register(&conn, "Alice", "alice", "hunter2").unwrap();
        assert_eq!(created.tokens, 100);
        assert!(!created.is_admin);
    }

    #[test]
    fn test_register_duplicate_handle() {
        let conn = db::open_in_memory().unwrap();
        register(&conn, "Alice", "alice", "hunter2").unwrap();
        assert!(matches!(
            register(&conn, "Other", "alice", "pw"),
            Err(GameError::HandleTaken(_))
        ));
    }

    #[test]
    fn test_change_password_requires_current() {
        let conn = db::open_in_memory().unwrap();
        register(&conn, "Alice", "alice", "hunter2").unwrap();

        assert!(matches!(
            change_password(&conn, "alice", "wrong", "newpass"),
            Err(GameError::InvalidCredentials)
        ));
        assert!(authenticate(&conn, "alice", "hunter2").is_ok());

        change_password(&conn, "alice", "hunter2", "newpass").unwrap();
        assert!(authenticate(&conn, "alice", "newpass").is_ok());
        assert!(matches!(
            authenticate(&conn, "alice", "hunter2"),
            Err(GameError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_update_profile_changes_name_and_handle() {
        let conn = db::open_in_memory().unwrap();
        register(&conn, "Alice", "alice", "hunter2").unwrap();

        let updated = update_profile(&conn, "alice", "Alicia", "alicia").unwrap();
        assert_eq!(updated.name, "Alicia");
        assert_eq!(updated.handle, "alicia");

        // Old handle is gone, password unchanged
        assert!(account::find_by_handle(&conn, "alice").unwrap().is_none());
        assert!(authenticate(&conn, "alicia", "hunter2").is_ok());
    }

    #[test]
    fn test_update_profile_rejects_taken_handle() {
        let conn = db::open_in_memory().unwrap();
        register(&conn, "Alice", "alice", "hunter2").unwrap();
        register(&conn, "Bob", "bob", "pw").unwrap();

        assert!(matches!(
            update_profile(&conn, "alice", "Alice", "bob"),
            Err(GameError::HandleTaken(_))
        ));

        // Keeping your own handle while renaming is fine
        let renamed = update_profile(&conn, "alice", "Alice B", "alice").unwrap();
        assert_eq!(renamed.name, "Alice B");
    }

    #[test]
    fn test_authenticate() {
        let conn = db::open_in_memory().unwrap();
        register(&conn, "Alice", "alice", "hunter2").unwrap();

        assert!(authenticate(&conn, "alice", "hunter2").is_ok());
        assert!(matches!(
            authenticate(&conn, "alice", "wrong"),
            Err(GameError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&conn, "ghost", "hunter2"),
            Err(GameError::NotFound { .. })
        ));
    }
}
