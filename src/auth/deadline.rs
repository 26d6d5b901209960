//! Per-operation time bound

use crate::auth::error::AuthError;
use std::future::Future;
use std::time::Duration;

/// Run `fut` to completion or fail with `Internal` once `limit` elapses.
///
/// On expiry the future is dropped, which cancels whatever storage call it
/// was awaiting. Nothing is retried.
pub async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::internal(anyhow::anyhow!(
            "{operation} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
