//! Fallback wrapper: run a primary operation, and if it fails, run a
//! fallback instead of propagating the error. Used to make event
//! persistence best-effort — a storage hiccup must never block dispatch.

use std::future::Future;
use tracing::warn;

/// Runs `primary`; on failure, logs a warning and runs `fallback`, returning
/// its result unconditionally (fallback failures are not escalated further
/// by this helper — callers that care should have the fallback itself
/// return a `Result` and inspect it).
pub async fn with_fallback<T, F, Fut, G, Gut>(primary: F, fallback: G) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Box<dyn std::error::Error + Send + Sync>>>,
    G: FnOnce() -> Gut,
    Gut: Future<Output = T>,
{
    match primary().await {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "primary operation failed, using fallback");
            fallback().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uses_primary_on_success() {
        let result = with_fallback(
            || async { Ok::<_, Box<dyn std::error::Error + Send + Sync>>(1) },
            || async { 2 },
        )
        .await;
        assert_eq!(result, 1);
    }

    #[tokio::test]
    async fn uses_fallback_on_failure() {
        let result = with_fallback(
            || async { Err("boom".into()) },
            || async { 99 },
        )
        .await;
        assert_eq!(result, 99);
    }
}
