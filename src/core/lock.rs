//! Bounded lock acquisition
//!
//! Every row lock in the engine (accounts, fund requests, payouts) is a
//! `tokio::sync::Mutex` behind an `Arc`, taken with an owned guard so it can be
//! held across await points. Waits are bounded by the configured lock timeout.

use crate::types::LedgerError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Run `acquire` with a deadline
///
/// On timeout the future is dropped, which releases every guard it had already
/// taken, and `LockTimeout` is returned for `resource`.
pub(crate) async fn with_timeout<F, T>(
    timeout: Duration,
    resource: impl FnOnce() -> String,
    acquire: F,
) -> Result<T, LedgerError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, acquire)
        .await
        .map_err(|_| LedgerError::lock_timeout(resource(), timeout.as_millis() as u64))
}

/// Lock a single workflow row
pub(crate) async fn lock_row<T>(
    row: Arc<Mutex<T>>,
    timeout: Duration,
    resource: impl FnOnce() -> String,
) -> Result<OwnedMutexGuard<T>, LedgerError> {
    with_timeout(timeout, resource, row.lock_owned()).await
}
