//! Async test utilities

use std::future::Future;
use std::time::Duration;

/// Poll `condition` every `interval` until it returns `true` or `timeout`
/// elapses.
///
/// Uses tokio's clock, so it cooperates with `start_paused` tests.
///
/// ```no_run
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use syncloop_common::testing::poll_until;
///
/// # async fn example() {
/// let flag = Arc::new(AtomicBool::new(false));
/// let ready = poll_until(Duration::from_secs(1), Duration::from_millis(10), || {
///     let flag = flag.clone();
///     async move { flag.load(Ordering::SeqCst) }
/// })
/// .await;
/// # let _ = ready;
/// # }
/// ```
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;

    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }

    condition().await
}
