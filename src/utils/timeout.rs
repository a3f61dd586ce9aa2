//! Async timeout helpers.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default timeout for the initial TCP connect
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `fut`, mapping an elapsed deadline to `ProtocolError::Timeout`.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = duration.as_millis() as u64, "operation timed out");
            Err(ProtocolError::Timeout)
        }
    }
}
