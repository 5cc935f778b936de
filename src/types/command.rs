//! Ledger commands replayed from a command file
//!
//! A [`Command`] is the typed form of one row of the replay input. Payouts are
//! referred to by an alias chosen in the file, because their correlation ids are
//! only generated when the payout is initiated.

use super::account::{AccountId, OwnerType};
use super::commission::CommissionTable;
use super::payout::TransferType;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Onboard a wallet
    Open {
        account: AccountId,
        owner_type: OwnerType,
        parent: Option<AccountId>,
    },
    TopUp {
        admin: AccountId,
        amount: Decimal,
        remarks: String,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        remarks: String,
    },
    Revert {
        from: AccountId,
        admin: AccountId,
        amount: Decimal,
        remarks: String,
    },
    FundRequest {
        requester: AccountId,
        approver: AccountId,
        amount: Decimal,
        utr: String,
        remarks: String,
    },
    Accept {
        approver: AccountId,
        utr: String,
    },
    Reject {
        utr: String,
    },
    Payout {
        user: AccountId,
        amount: Decimal,
        commission: Decimal,
        alias: String,
        mpin: String,
        transfer_type: TransferType,
    },
    PayoutSuccess {
        alias: String,
        operator_reference: String,
    },
    PayoutFailure {
        alias: String,
        reason: String,
    },
    PayoutRefund {
        alias: String,
    },
    CommissionOverride {
        distributor: AccountId,
        table: CommissionTable,
    },
}

impl Command {
    /// Short name used in log lines
    pub fn op(&self) -> &'static str {
        match self {
            Command::Open { .. } => "open",
            Command::TopUp { .. } => "topup",
            Command::Transfer { .. } => "transfer",
            Command::Revert { .. } => "revert",
            Command::FundRequest { .. } => "fund_request",
            Command::Accept { .. } => "accept",
            Command::Reject { .. } => "reject",
            Command::Payout { .. } => "payout",
            Command::PayoutSuccess { .. } => "payout_success",
            Command::PayoutFailure { .. } => "payout_failure",
            Command::PayoutRefund { .. } => "payout_refund",
            Command::CommissionOverride { .. } => "commission_override",
        }
    }
}
