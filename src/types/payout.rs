//! Payout types
//!
//! A payout sends a user's money to an external bank account through the payout
//! rail. Its lifecycle is `Pending -> Success | Failed`, and a `Success` may
//! later be reversed into `Refund` by an operator.

use super::account::AccountId;
use super::commission::CommissionSplit;
use super::ledger::{CorrelationId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type PayoutId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutStatus {
    /// Funds reserved, waiting for the rail
    Pending,
    /// Principal sent, commission settled across the hierarchy
    Success,
    /// Reservation released back to the user
    Failed,
    /// Successful payout manually reversed
    Refund,
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Success => "SUCCESS",
            PayoutStatus::Failed => "FAILED",
            PayoutStatus::Refund => "REFUND",
        })
    }
}

/// Bank transfer scheme used by the rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferType {
    #[default]
    Imps,
    Neft,
}

impl FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMPS" | "5" => Ok(TransferType::Imps),
            "NEFT" | "6" => Ok(TransferType::Neft),
            other => Err(format!("Unknown transfer type '{}'", other)),
        }
    }
}

/// Destination bank account, supplied by the beneficiary reference data
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Beneficiary {
    pub account_number: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub beneficiary_name: String,
    pub mobile_number: String,
}

/// Input for initiating a payout
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutIntent {
    pub user: AccountId,
    pub amount: Decimal,
    pub commission: Decimal,
    pub beneficiary: Beneficiary,
    pub transfer_type: TransferType,
    /// Secondary authorization factor, checked by the `MpinVerifier`
    pub mpin: String,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub correlation_id: CorrelationId,
    pub user: AccountId,
    pub beneficiary: Beneficiary,
    pub amount: Decimal,
    pub commission: Decimal,
    /// `amount + commission`, debited from the user at initiation
    pub reserved: Decimal,
    pub transfer_type: TransferType,
    pub status: PayoutStatus,
    pub operator_reference: Option<String>,
    pub order_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Fixed at initiation; settlement credits and a refund gives back exactly these shares
    pub split: CommissionSplit,
    pub reservation_tx: TransactionId,
    pub settlement_tx: Option<TransactionId>,
    pub refund_tx: Option<TransactionId>,
    pub remarks: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What `initiate_payout` hands back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutReceipt {
    pub payout_id: PayoutId,
    pub correlation_id: CorrelationId,
    pub reservation_tx: TransactionId,
    /// Status after the provider's synchronous acknowledgement was applied
    pub status: PayoutStatus,
}

/// Result of applying a provider callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The callback moved the payout out of `Pending`
    Applied { transaction_id: TransactionId },
    /// The payout had already left `Pending`; nothing was changed
    AlreadySettled { status: PayoutStatus },
}

/// Payload sent to the payout rail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutInstruction {
    pub correlation_id: CorrelationId,
    pub beneficiary: Beneficiary,
    pub amount: Decimal,
    pub transfer_type: TransferType,
}

/// Synchronous answer of the rail to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAck {
    /// Settled immediately (typical for IMPS)
    Settled {
        operator_reference: String,
        order_id: Option<String>,
    },
    /// Accepted; the outcome will arrive by callback (typical for NEFT)
    Accepted { order_id: Option<String> },
    /// Refused outright
    Rejected { reason: String },
}

/// Answer of the rail's status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Success {
        operator_reference: String,
        order_id: Option<String>,
    },
    Failed {
        reason: String,
    },
    Pending,
    /// The rail has no record of the correlation id
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("payout provider unavailable: {0}")]
    Unavailable(String),

    #[error("payout provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Summary of one reconciliation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub examined: usize,
    pub settled: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}
