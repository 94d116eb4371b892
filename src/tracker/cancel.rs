//! Cancel handles handed to the tracker, and the signal side the transport awaits.

use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Anything the tracker can cancel. The reason is surfaced to whoever owns
/// the in-flight operation.
pub trait Cancel: Send + Sync {
    fn cancel(&self, reason: &str);
}

impl<F> Cancel for F
where
    F: Fn(&str) + Send + Sync,
{
    fn cancel(&self, reason: &str) {
        self(reason)
    }
}

#[derive(Debug, Default)]
struct Shared {
    token: CancellationToken,
    reason: Mutex<Option<String>>,
}

/// Producer side: registered with the tracker.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

/// Consumer side: raced against the in-flight request.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    shared: Arc<Shared>,
}

/// Create a linked handle/signal pair for one request.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let shared = Arc::new(Shared::default());
    (
        CancelHandle {
            shared: shared.clone(),
        },
        CancelSignal { shared },
    )
}

impl Cancel for CancelHandle {
    /// The first reason wins; later calls are no-ops.
    fn cancel(&self, reason: &str) {
        {
            let mut slot = self
                .shared
                .reason
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(reason.to_string());
            }
        }
        self.shared.token.cancel();
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.shared
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolves with the cancellation reason once the paired handle fires.
    pub async fn cancelled(&self) -> String {
        self.shared.token.cancelled().await;
        self.reason().unwrap_or_default()
    }
}
