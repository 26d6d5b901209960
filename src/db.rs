//! SQLite Access
//! Mission: Run rusqlite work off the async workers and stop it when the caller gives up

use rusqlite::{Connection, InterruptHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinError;

/// One connection shared by every store living in the same database file
pub type SharedConnection = Arc<Mutex<Connection>>;

/// rusqlite's own default lock wait
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Interrupts the running statement unless disarmed first
struct InterruptOnDrop {
    handle: Option<InterruptHandle>,
}

impl InterruptOnDrop {
    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.interrupt();
        }
    }
}

/// Run `op` against the shared connection on the blocking pool.
///
/// If the returned future is dropped mid-query (an expired operation timeout),
/// the statement is interrupted. Lock waits are capped by the connection's busy timeout.
pub async fn run_blocking<T, E, F>(conn: &SharedConnection, op: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    let guard = conn.clone().lock_owned().await;
    let interrupt = InterruptOnDrop {
        handle: Some(guard.get_interrupt_handle()),
    };

    let result = tokio::task::spawn_blocking(move || op(&guard)).await;
    interrupt.disarm();
    result?
}
