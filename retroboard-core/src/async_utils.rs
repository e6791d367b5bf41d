//! Async utilities

use crate::error::{ErrorContext, RetroboardError, RetroboardResult};
use tokio::time::{timeout, Duration};

/// Await `future`, failing with [`RetroboardError::Timeout`] once `timeout_ms` elapses.
///
/// The inner future is dropped on timeout.
pub async fn with_timeout<F, T>(
    future: F,
    timeout_ms: u64,
    operation_name: &str,
) -> RetroboardResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(RetroboardError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation(operation_name)
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Check storage availability"),
        }),
    }
}
