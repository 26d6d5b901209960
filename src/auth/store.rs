//! User Storage
//! Mission: Persist accounts behind a small capability interface

use crate::auth::error::StoreError;
use crate::auth::models::{NewUser, User};
use crate::db::{run_blocking, SharedConnection, DEFAULT_BUSY_TIMEOUT};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Storage capability the auth core depends on.
///
/// Lookups return `Ok(None)` when nothing matches. Ids are the decimal string
/// form of the numeric row id; ids that do not parse never match.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new account and return it with its assigned id
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Overwrite an existing account as a whole value
    async fn save(&self, user: &User) -> Result<(), StoreError>;
}

fn parse_id(id: &str) -> Option<i64> {
    id.parse::<i64>().ok()
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    conn: SharedConnection,
}

impl SqliteUserStore {
    /// Open (or create) the database with rusqlite's default lock wait
    pub fn new(db_path: &str) -> anyhow::Result<Self> {
        Self::open(db_path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open (or create) the database, waiting at most `busy_timeout` on a locked file
    pub fn open(db_path: &str, busy_timeout: Duration) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {db_path}"))?;
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        Self::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, mostly for tests
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared connection handle for other stores living in the same database
    pub fn connection(&self) -> SharedConnection {
        self.conn.clone()
    }

    fn init_db(conn: &Connection) -> anyhow::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create users table")?;
        Ok(())
    }

    fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: parse_timestamp(row.get::<_, String>(4)?, 4)?,
            updated_at: parse_timestamp(row.get::<_, String>(5)?, 5)?,
        })
    }
}

fn parse_timestamp(raw: String, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, e.into())
        })
}

const SELECT_USER: &str =
    "SELECT id, name, email, password_hash, created_at, updated_at FROM users";

#[async_trait]
impl UserRepository for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        run_blocking(&self.conn, move |conn| -> Result<Option<User>, StoreError> {
            let user = conn
                .query_row(
                    &format!("{SELECT_USER} WHERE email = ?1"),
                    params![email],
                    Self::row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        run_blocking(&self.conn, move |conn| -> Result<Option<User>, StoreError> {
            let user = conn
                .query_row(
                    &format!("{SELECT_USER} WHERE id = ?1"),
                    params![id],
                    Self::row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let created = run_blocking(&self.conn, move |conn| -> Result<User, StoreError> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO users (name, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.name,
                    user.email,
                    user.password_hash,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;

            Ok(User {
                id: conn.last_insert_rowid(),
                name: user.name,
                email: user.email,
                password_hash: user.password_hash,
                created_at: now,
                updated_at: now,
            })
        })
        .await?;

        info!("Created user {} ({})", created.id, created.email);
        Ok(created)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        run_blocking(&self.conn, move |conn| -> Result<(), StoreError> {
            let rows_affected = conn.execute(
                "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    user.name,
                    user.email,
                    user.password_hash,
                    Utc::now().to_rfc3339(),
                    user.id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(StoreError::Backend(anyhow::anyhow!(
                    "user {} does not exist",
                    user.id
                )));
            }
            Ok(())
        })
        .await
    }
}

/// Process-local storage, handy for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryUserStore {
    inner: SyncMutex<MemoryUsers>,
}

#[derive(Default)]
struct MemoryUsers {
    next_id: i64,
    users: HashMap<i64, User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete an account, e.g. to simulate removal after tokens were issued
    pub fn remove(&self, id: i64) -> Option<User> {
        self.inner.lock().users.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock();
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        inner.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        match inner.users.get_mut(&user.id) {
            Some(existing) => {
                *existing = User {
                    updated_at: Utc::now(),
                    ..user.clone()
                };
                Ok(())
            }
            None => Err(StoreError::Backend(anyhow::anyhow!(
                "user {} does not exist",
                user.id
            ))),
        }
    }
}
