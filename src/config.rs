//! Engine configuration
//!
//! Tunables shared by every component of the platform. The CLI builds an
//! [`EngineConfig`] from its arguments; library users start from `Default`.

use crate::types::CommissionTable;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::warn;

/// Default bound on every lock wait
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling on the sum of a user's payout amounts per calendar day (UTC)
pub const DEFAULT_DAILY_PAYOUT_LIMIT: Decimal = Decimal::from_parts(2_500_000, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on the time spent waiting for row locks in one operation
    pub lock_timeout: Duration,

    /// Per-user, per-day ceiling on payout principal
    pub daily_payout_limit: Decimal,

    /// Commission table used when a distributor has no override
    pub commission_table: CommissionTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            daily_payout_limit: DEFAULT_DAILY_PAYOUT_LIMIT,
            commission_table: CommissionTable::default(),
        }
    }
}

impl EngineConfig {
    /// Create a config with custom values
    ///
    /// A zero lock timeout or a non-positive daily limit falls back to the default.
    pub fn new(lock_timeout: Duration, daily_payout_limit: Decimal) -> Self {
        let default = Self::default();

        let lock_timeout = if lock_timeout.is_zero() {
            warn!(
                default_ms = default.lock_timeout.as_millis() as u64,
                "zero lock timeout, using default"
            );
            default.lock_timeout
        } else {
            lock_timeout
        };

        let daily_payout_limit = if daily_payout_limit <= Decimal::ZERO {
            warn!(
                limit = %daily_payout_limit,
                default = %default.daily_payout_limit,
                "non-positive daily payout limit, using default"
            );
            default.daily_payout_limit
        } else {
            daily_payout_limit
        };

        Self {
            lock_timeout,
            daily_payout_limit,
            commission_table: default.commission_table,
        }
    }

    pub fn with_commission_table(mut self, table: CommissionTable) -> Self {
        self.commission_table = table;
        self
    }
}
