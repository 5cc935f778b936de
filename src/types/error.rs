//! Error types for the wallet ledger engine
//!
//! This module defines every error the engine can return. All of them are
//! all-or-nothing: when an operation returns an error, no balance, ledger row or
//! workflow state has been changed.
//!
//! # Error Categories
//!
//! - **Validation**: bad amount, unknown account or request, wrong tier, duplicate UTR.
//!   Rejected before any lock is taken and never worth retrying as-is.
//! - **Balance**: `InsufficientBalance`. Terminal for the attempt; the caller has to re-quote.
//! - **State**: `StateConflict` for operator actions on a workflow that already left `Pending`.
//! - **Contention**: `LockTimeout`. Transient, nothing was mutated, safe to retry with backoff.
//! - **Replay I/O**: file and CSV errors raised by the command replay driver.

use super::account::AccountId;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for the ledger engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading commands or writing balances
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Malformed command record
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },

    /// No account with this id exists
    #[error("Account {account} not found")]
    AccountNotFound { account: AccountId },

    /// An account with this id was already onboarded
    #[error("Account {account} already exists")]
    AccountExists { account: AccountId },

    /// An operation touched an account it had not locked
    #[error("Account {account} is not part of the locked set")]
    AccountNotLocked { account: AccountId },

    /// Amount is zero or negative
    #[error("Amount {amount} must be positive")]
    AmountNonPositive { amount: Decimal },

    /// Amount has more than two fractional digits
    #[error("Amount {amount} has more than two decimal places")]
    InvalidAmountPrecision { amount: Decimal },

    /// Source and destination are the same wallet
    #[error("Cannot transfer from account {account} to itself")]
    SameAccount { account: AccountId },

    /// The account's tier or parent does not allow the operation
    #[error("Invalid hierarchy for account {account}: {reason}")]
    InvalidHierarchy { account: AccountId, reason: String },

    /// Balance too low for the requested debit
    #[error("Insufficient balance in account {account}: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// A row lock could not be acquired in time
    #[error("Timed out after {timeout_ms}ms waiting for {resource}")]
    LockTimeout { resource: String, timeout_ms: u64 },

    /// The workflow already left the state the operation requires
    #[error("{entity} {id} is {status}")]
    StateConflict {
        entity: String,
        id: String,
        status: String,
    },

    /// Fund request id is unknown
    #[error("Fund request {request} not found")]
    FundRequestNotFound { request: Uuid },

    /// Fund request belongs to a different approver
    #[error("Fund request {request} must be approved by account {expected}, not {actual}")]
    ApproverMismatch {
        request: Uuid,
        expected: AccountId,
        actual: AccountId,
    },

    /// Fund request submitted without a UTR
    #[error("Fund request requires a UTR")]
    MissingUtr,

    /// UTR already used by another fund request
    #[error("UTR '{utr}' was already submitted")]
    DuplicateUtr { utr: String },

    /// Correlation id is unknown
    #[error("Payout {correlation_id} not found")]
    PayoutNotFound { correlation_id: Uuid },

    /// Secondary authorization factor rejected
    #[error("Authorization failed for account {account}")]
    AuthorizationFailed { account: AccountId },

    /// Payout would exceed the user's daily ceiling
    #[error("Daily payout limit {limit} exceeded for account {account}: attempted {attempted}")]
    DailyLimitExceeded {
        account: AccountId,
        limit: Decimal,
        attempted: Decimal,
    },

    /// Commission table is malformed
    #[error("Invalid commission table: {reason}")]
    InvalidCommissionTable { reason: String },

    /// Rounded tier shares exceed the commission they are split from
    #[error("Commission {total} over-allocated: tiers claim {allocated}")]
    CommissionOverallocated { total: Decimal, allocated: Decimal },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow { operation: String, account: AccountId },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    pub fn account_exists(account: AccountId) -> Self {
        LedgerError::AccountExists { account }
    }

    pub fn account_not_locked(account: AccountId) -> Self {
        LedgerError::AccountNotLocked { account }
    }

    pub fn amount_non_positive(amount: Decimal) -> Self {
        LedgerError::AmountNonPositive { amount }
    }

    pub fn invalid_amount_precision(amount: Decimal) -> Self {
        LedgerError::InvalidAmountPrecision { amount }
    }

    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    pub fn invalid_hierarchy(account: AccountId, reason: impl Into<String>) -> Self {
        LedgerError::InvalidHierarchy {
            account,
            reason: reason.into(),
        }
    }

    pub fn insufficient_balance(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientBalance {
            account,
            available,
            requested,
        }
    }

    pub fn lock_timeout(resource: impl Into<String>, timeout_ms: u64) -> Self {
        LedgerError::LockTimeout {
            resource: resource.into(),
            timeout_ms,
        }
    }

    pub fn state_conflict(
        entity: &str,
        id: impl std::fmt::Display,
        status: impl std::fmt::Display,
    ) -> Self {
        LedgerError::StateConflict {
            entity: entity.to_string(),
            id: id.to_string(),
            status: status.to_string(),
        }
    }

    pub fn fund_request_not_found(request: Uuid) -> Self {
        LedgerError::FundRequestNotFound { request }
    }

    pub fn approver_mismatch(request: Uuid, expected: AccountId, actual: AccountId) -> Self {
        LedgerError::ApproverMismatch {
            request,
            expected,
            actual,
        }
    }

    pub fn duplicate_utr(utr: &str) -> Self {
        LedgerError::DuplicateUtr {
            utr: utr.to_string(),
        }
    }

    pub fn payout_not_found(correlation_id: Uuid) -> Self {
        LedgerError::PayoutNotFound { correlation_id }
    }

    pub fn authorization_failed(account: AccountId) -> Self {
        LedgerError::AuthorizationFailed { account }
    }

    pub fn daily_limit_exceeded(account: AccountId, limit: Decimal, attempted: Decimal) -> Self {
        LedgerError::DailyLimitExceeded {
            account,
            limit,
            attempted,
        }
    }

    pub fn invalid_commission_table(reason: impl Into<String>) -> Self {
        LedgerError::InvalidCommissionTable {
            reason: reason.into(),
        }
    }

    pub fn commission_overallocated(total: Decimal, allocated: Decimal) -> Self {
        LedgerError::CommissionOverallocated { total, allocated }
    }

    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Contention only; retrying later can succeed without any change by the caller
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::LockTimeout { .. })
    }

    /// Rejected on input alone, before any lock was taken
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound { .. }
                | LedgerError::AccountExists { .. }
                | LedgerError::AmountNonPositive { .. }
                | LedgerError::InvalidAmountPrecision { .. }
                | LedgerError::SameAccount { .. }
                | LedgerError::InvalidHierarchy { .. }
                | LedgerError::FundRequestNotFound { .. }
                | LedgerError::MissingUtr
                | LedgerError::DuplicateUtr { .. }
                | LedgerError::PayoutNotFound { .. }
                | LedgerError::InvalidCommissionTable { .. }
        )
    }
}
