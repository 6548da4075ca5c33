//! Cancellation and timeouts for network-bound calls

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::TransferError;

/// Cloneable cancellation handle shared between a caller and in-flight operations.
///
/// Tokens from one `new()` share a generation counter. `cancel` bumps it and so
/// cancels every token of the family taken before the bump. `renew` hands out a
/// token for the current generation: components renew once per operation, so a
/// cancel stops the calls in flight and leaves later calls untouched.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<u64>>,
    generation: u64,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            generation: 0,
        }
    }

    /// Cancel this token and every token of its family issued so far
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow() > self.generation
    }

    /// Fresh token of the same family, live until the next `cancel`
    pub fn renew(&self) -> CancelToken {
        Self {
            tx: Arc::clone(&self.tx),
            generation: *self.tx.borrow(),
        }
    }

    /// Resolves once `cancel` has been called on the family after this token was issued
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        let issued = self.generation;
        // Sender lives in self, so wait_for only errors if it is dropped
        let _ = rx.wait_for(|generation| *generation > issued).await;
    }
}

/// Run `fut` bounded by `timeout` and `cancel`
pub async fn guarded<T, F>(timeout: Duration, cancel: &CancelToken, fut: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(TransferError::Timeout(timeout.as_secs())),
        },
    }
}
