//! Task Storage
//! Mission: Persist per-user tasks next to the user table

use crate::db::{run_blocking, SharedConnection};
use crate::tasks::models::Task;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use rusqlite::params;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, user_id: i64, title: &str) -> Result<Task>;

    /// All tasks of one user, oldest first. Empty when the user has none.
    async fn fetch_by_user_id(&self, user_id: i64) -> Result<Vec<Task>>;
}

/// Task storage with SQLite backend
pub struct SqliteTaskStore {
    conn: SharedConnection,
}

impl SqliteTaskStore {
    /// Reuse an existing connection (normally the user store's) and create the table
    pub async fn new(conn: SharedConnection) -> Result<Self> {
        run_blocking(&conn, |conn| -> Result<()> {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    user_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);",
            )
            .context("Failed to create tasks table")
        })
        .await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskStore {
    async fn create(&self, user_id: i64, title: &str) -> Result<Task> {
        let title = title.to_string();
        run_blocking(&self.conn, move |conn| -> Result<Task> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO tasks (title, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![title, user_id, now.to_rfc3339()],
            )
            .context("Failed to insert task")?;

            Ok(Task {
                id: conn.last_insert_rowid(),
                title,
                user_id,
                created_at: now,
            })
        })
        .await
    }

    async fn fetch_by_user_id(&self, user_id: i64) -> Result<Vec<Task>> {
        let rows = run_blocking(&self.conn, move |conn| -> Result<Vec<_>> {
            let mut stmt = conn.prepare(
                "SELECT id, title, user_id, created_at FROM tasks WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;

        rows.into_iter()
            .map(|(id, title, user_id, created_at)| -> Result<Task> {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .with_context(|| format!("Bad created_at on task {id}"))?
                    .with_timezone(&Utc);
                Ok(Task {
                    id,
                    title,
                    user_id,
                    created_at,
                })
            })
            .collect()
    }
}

/// Process-local task storage
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: SyncMutex<Vec<Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskStore {
    async fn create(&self, user_id: i64, title: &str) -> Result<Task> {
        let mut tasks = self.tasks.lock();
        let task = Task {
            id: tasks.len() as i64 + 1,
            title: title.to_string(),
            user_id,
            created_at: Utc::now(),
        };
        tasks.push(task.clone());
        Ok(task)
    }

    async fn fetch_by_user_id(&self, user_id: i64) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}
