//! Run-scoped cancellation signal.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable flag that, once set, stays set.
///
/// All clones observe the same flag. Used to stop retry loops and to tell
/// workers not to claim further batches.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancellationToken {
    /// Create an unset token.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Set the token.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    /// Whether the token is set.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the token is set.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives as long as any clone of this token.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
