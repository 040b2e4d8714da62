use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Per-call context handed to the handler
///
/// The token is cancelled when the owning controller stops. Handlers doing
/// long operations should select on [`cancelled`](Self::cancelled).
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub cancellation: CancellationToken,
    pub worker_id: usize,
}

impl SyncContext {
    pub fn new(cancellation: CancellationToken, worker_id: usize) -> Self {
        Self { cancellation, worker_id }
    }

    /// Context with a fresh token that nobody cancels
    pub fn detached(worker_id: usize) -> Self {
        Self::new(CancellationToken::new(), worker_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }
}
