//! SQLite-backed account store.
//!
//! Holds the administrator accounts the welcome gate checks for and creates.
//! Passwords are stored as bcrypt hashes.

mod sqlite_util;

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode, params};

use gatehouse_core::{AccountStore, CreationError, StoreError};
use gatehouse_types::{Password, Username};

pub struct SqliteAccountStore {
    db: Mutex<Connection>,
    hash_cost: u32,
}

impl SqliteAccountStore {
    const SCHEMA: &'static str = "
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_admin
        ON accounts(is_admin);
    ";

    /// Open or create the account database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sqlite_util::open_secure_db(path)?;
        tracing::debug!(path = %path.display(), "Opened account store");
        Self::initialize(db)
    }

    /// Open an in-memory account store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory account store")?;
        Self::initialize(db)
    }

    /// Override the bcrypt work factor (tests use the minimum).
    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")
            .context("Failed to set account store pragmas")?;
        db.execute_batch(Self::SCHEMA)
            .context("Failed to create account store schema")?;
        Ok(Self {
            db: Mutex::new(db),
            hash_cost: bcrypt::DEFAULT_COST,
        })
    }

    fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check a password against the stored hash. `Ok(false)` for unknown users.
    #[cfg(test)]
    fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        use rusqlite::OptionalExtension;

        let hash: Option<String> = self
            .db()
            .query_row(
                "SELECT password_hash FROM accounts WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to look up account")?;

        match hash {
            Some(hash) => bcrypt::verify(password, &hash).context("Stored password hash is invalid"),
            None => Ok(false),
        }
    }

    /// Number of stored accounts, administrators or not.
    pub fn account_count(&self) -> Result<usize> {
        let count: i64 = self
            .db()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))
            .context("Failed to count accounts")?;
        usize::try_from(count).context("Account count out of range")
    }
}

impl AccountStore for SqliteAccountStore {
    fn account_exists(&self) -> Result<bool, StoreError> {
        self.db()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE is_admin = 1)",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StoreError(Box::new(e)))
    }

    fn create_account(
        &self,
        username: &Username,
        password: &Password,
    ) -> Result<(), CreationError> {
        let hash = bcrypt::hash(password.expose(), self.hash_cost)
            .map_err(|e| CreationError::Backend(Box::new(e)))?;
        let created_at = chrono::Utc::now().to_rfc3339();

        let inserted = self.db().execute(
            "INSERT INTO accounts (username, password_hash, is_admin, created_at)
             VALUES (?1, ?2, 1, ?3)",
            params![username.as_str(), hash, created_at],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(CreationError::Duplicate {
                    username: username.as_str().to_string(),
                })
            }
            Err(err) => Err(CreationError::Backend(Box::new(err))),
        }
    }
}
