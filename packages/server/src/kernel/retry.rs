//! Bounded retry with exponential backoff for transient store errors.

use std::future::Future;
use std::time::Duration;

/// Fixed retry budget for adapter calls. Exhausting it surfaces the last
/// error; nothing blocks indefinitely.
pub const DEFAULT_ATTEMPTS: u32 = 3;

const BASE_DELAY_MS: u64 = 100;

/// Runs `f` up to `attempts` times, sleeping with exponential backoff between
/// tries. Only errors classified transient by `is_transient` are retried;
/// constraint violations and not-found outcomes surface immediately.
pub async fn with_retries<T, E, Fut>(
    op: &str,
    attempts: u32,
    is_transient: impl Fn(&E) -> bool,
    mut f: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts && is_transient(&error) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt - 1));
                tracing::warn!(op, attempt, error = %error, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
