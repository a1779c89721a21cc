//! External funds-transfer seam.
//!
//! Withdrawals leave the core's trust boundary: the collected balance is
//! paid out through whatever rail the deployment wires in. The core only
//! sees this trait; a refusal here must leave the ledger untouched, which
//! the service guarantees by transferring between decision and state
//! evolution.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use marketplace_core::Identity;

/// The external rail refused or failed to move funds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransferError(pub String);

impl TransferError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Moves funds out of the marketplace to an identity.
///
/// One blocking call per withdrawal; no retries, no queuing. Implementations
/// must be safe to call from multiple threads.
pub trait FundsTransfer: Send + Sync {
    fn transfer(&self, to: &Identity, amount: u64) -> Result<(), TransferError>;
}

impl<T> FundsTransfer for std::sync::Arc<T>
where
    T: FundsTransfer + ?Sized,
{
    fn transfer(&self, to: &Identity, amount: u64) -> Result<(), TransferError> {
        (**self).transfer(to, amount)
    }
}

/// In-memory transfer rail for tests/dev.
///
/// Records every completed transfer; can be switched into a refusing mode to
/// exercise rollback paths.
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    completed: Mutex<Vec<(Identity, u64)>>,
    refuse: AtomicBool,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent transfer fail (or succeed again).
    pub fn set_refusing(&self, refusing: bool) {
        self.refuse.store(refusing, Ordering::SeqCst);
    }

    /// Every completed transfer, in order.
    pub fn completed(&self) -> Vec<(Identity, u64)> {
        self.completed.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Total amount transferred to one identity.
    pub fn total_to(&self, identity: &Identity) -> u64 {
        self.completed()
            .iter()
            .filter(|(to, _)| to == identity)
            .map(|(_, amount)| amount)
            .sum()
    }
}

impl FundsTransfer for RecordingTransfer {
    fn transfer(&self, to: &Identity, amount: u64) -> Result<(), TransferError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransferError::new("rail unavailable"));
        }
        self.completed
            .lock()
            .map_err(|_| TransferError::new("recorder poisoned"))?
            .push((*to, amount));
        Ok(())
    }
}
