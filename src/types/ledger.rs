//! Ledger-related types
//!
//! A [`LedgerEntry`] is one leg of a logical transaction. Legs are write-once;
//! a normal transfer produces exactly two of them (a debit and a credit) that
//! share a [`TransactionId`].

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier shared by every leg of one logical transaction
pub type TransactionId = Uuid;

/// Idempotency key shared with the payout provider
pub type CorrelationId = Uuid;

/// Direction of a leg, seen from the transactor's wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

/// Business service a leg belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Service {
    /// Admin wallet funded from outside the system
    TopUp,
    /// Parent funds a direct child
    FundTransfer,
    /// Approved fund request
    FundRequest,
    /// Admin pulls funds back from a downstream wallet
    Revert,
    /// Reservation of a payout's principal and commission
    Payout,
    /// Commission share settled on a successful payout
    PayoutCommission,
    /// Reservation released after a failed payout
    PayoutReversal,
    /// Manual reversal of a successful payout
    PayoutRefund,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::TopUp => "TOPUP",
            Service::FundTransfer => "FUND_TRANSFER",
            Service::FundRequest => "FUND_REQUEST",
            Service::Revert => "REVERT",
            Service::Payout => "PAYOUT",
            Service::PayoutCommission => "PAYOUT_COMMISSION",
            Service::PayoutReversal => "PAYOUT_REVERSAL",
            Service::PayoutRefund => "PAYOUT_REFUND",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded on a leg
///
/// Only committed legs ever reach the ledger, so every stored leg is `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Success,
}

/// The other side of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counterparty {
    /// Another wallet inside the system
    Account(AccountId),
    /// Funds held for, or released by, the payout with this correlation id
    Payout(CorrelationId),
    /// Money entering from outside the system (top-ups)
    External,
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterparty::Account(id) => write!(f, "account:{}", id),
            Counterparty::Payout(correlation_id) => write!(f, "payout:{}", correlation_id),
            Counterparty::External => f.write_str("external"),
        }
    }
}

/// One immutable leg of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: Uuid,

    pub transaction_id: TransactionId,

    /// Wallet whose balance this leg moves
    pub transactor: AccountId,

    pub receiver: Counterparty,

    /// Always positive; direction is given by `entry_type`
    pub amount: Decimal,

    pub entry_type: EntryType,

    pub service: Service,

    pub status: EntryStatus,

    pub remarks: String,

    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// True when the leg moves money across the system boundary
    ///
    /// Legs between two wallets always come in balanced pairs; only legs whose
    /// counterparty is not a wallet change the sum of all balances.
    pub fn crosses_boundary(&self) -> bool {
        !matches!(self.receiver, Counterparty::Account(_))
    }

    /// Amount with the sign of its effect on the transactor's balance
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

/// A request to move money between two wallets
#[derive(Debug, Clone, PartialEq)]
pub struct TransferIntent {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Decimal,
    pub service_tag: Service,
    pub remarks: String,
}

impl TransferIntent {
    pub fn new(
        from_account: AccountId,
        to_account: AccountId,
        amount: Decimal,
        service_tag: Service,
    ) -> Self {
        Self {
            from_account,
            to_account,
            amount,
            service_tag,
            remarks: String::new(),
        }
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = remarks.into();
        self
    }
}
