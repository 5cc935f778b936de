//! Fund request types
//!
//! A fund request asks an admin to move money into the requester's wallet. It is
//! created `Pending` and moves exactly once to `Approved` or `Rejected`.

use super::account::{AccountId, OwnerType};
use super::ledger::TransactionId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type FundRequestId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FundRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl FundRequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, FundRequestStatus::Pending)
    }
}

impl fmt::Display for FundRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FundRequestStatus::Pending => "PENDING",
            FundRequestStatus::Approved => "APPROVED",
            FundRequestStatus::Rejected => "REJECTED",
        })
    }
}

/// Input for creating a fund request
#[derive(Debug, Clone, PartialEq)]
pub struct NewFundRequest {
    pub requester: AccountId,
    pub approver: AccountId,
    pub amount: Decimal,
    /// Bank reference of the deposit backing the request; unique across all requests
    pub utr: String,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRequest {
    pub id: FundRequestId,
    pub requester: AccountId,
    pub requester_type: OwnerType,
    pub approver: AccountId,
    pub amount: Decimal,
    pub utr: String,
    pub remarks: String,
    pub status: FundRequestStatus,
    /// Set once the request is approved
    pub transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
