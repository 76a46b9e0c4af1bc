//! Admission gate: bounds the number of concurrent session handlers.
//!
//! A counting semaphore is the cleaner expression of this than the
//! mutex+condvar+counter the original proxy used — the permit simply
//! releases the slot when it is dropped, at the end of a session, in any
//! exit path (normal close, error, or panic unwind).

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const MAX_CONCURRENT_SESSIONS: usize = 5;

#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
}

impl AdmissionGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Blocks until a slot is available, then holds it until the returned
    /// permit is dropped.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed")
    }

    #[cfg(test)]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
