//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Wallets and the hierarchy tiers that own them
//! - `money`: Fixed-point amount validation and rounding
//! - `ledger`: Ledger legs, service tags and transfer intents
//! - `commission`: Commission tables and per-tier splits
//! - `fund_request`: Fund request workflow records
//! - `payout`: Payout workflow records and provider messages
//! - `command`: Commands accepted by the replay driver
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod command;
pub mod commission;
pub mod error;
pub mod fund_request;
pub mod ledger;
pub mod money;
pub mod payout;

pub use account::{Account, AccountId, OwnerType};
pub use command::Command;
pub use commission::{CommissionSplit, CommissionTable};
pub use error::LedgerError;
pub use fund_request::{FundRequest, FundRequestId, FundRequestStatus, NewFundRequest};
pub use ledger::{
    CorrelationId, Counterparty, EntryStatus, EntryType, LedgerEntry, Service, TransactionId,
    TransferIntent,
};
pub use money::MONEY_SCALE;
pub use payout::{
    Beneficiary, CallbackOutcome, PayoutId, PayoutInstruction, PayoutIntent, PayoutReceipt,
    PayoutRequest, PayoutStatus, ProviderAck, ProviderError, ProviderStatus, ReconcileReport,
    TransferType,
};
