//! In-flight submission guard.
//!
//! Each checkout may have at most one payment or order submission running.
//! A second submission for the same checkout id is rejected until the first
//! permit is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// Process-wide set of checkout ids with a submission in flight.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl SubmissionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the submission slot for a checkout.
    ///
    /// Returns `None` if a submission for `checkout_id` is already running.
    #[must_use]
    pub fn try_acquire(&self, checkout_id: Uuid) -> Option<SubmissionPermit> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(checkout_id);

        inserted.then(|| SubmissionPermit {
            in_flight: Arc::clone(&self.in_flight),
            checkout_id,
        })
    }

    /// Whether a submission is running for a checkout.
    #[must_use]
    pub fn is_in_flight(&self, checkout_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&checkout_id)
    }
}

/// Held for the duration of a submission. Releases the slot on drop.
#[derive(Debug)]
pub struct SubmissionPermit {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    checkout_id: Uuid,
}

impl Drop for SubmissionPermit {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.checkout_id);
    }
}
