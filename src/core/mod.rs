//! Core business logic module
//!
//! This module contains the ledger components, leaf-first:
//! - `account_registry` - Wallets, hierarchy placement and row-scoped locks
//! - `ledger` - Append-only record of every committed leg
//! - `posting` - Unit of work that stages balance changes and legs
//! - `commission` - Pure commission splitting
//! - `transfer_engine` - Two-leg transfers, top-ups and reverts
//! - `fund_request` - Fund request approval workflow
//! - `payout` - Payouts and settlement reconciliation
//! - `traits` - Collaborator traits for the payout rail and MPIN checks
//! - `platform` - All of the above behind one handle

pub mod account_registry;
pub mod commission;
pub mod fund_request;
pub mod ledger;
mod lock;
pub mod payout;
pub mod platform;
pub mod posting;
pub mod traits;
pub mod transfer_engine;

pub use account_registry::{AccountRegistry, Hierarchy, LockedAccounts};
pub use commission::split_commission;
pub use fund_request::FundRequestWorkflow;
pub use ledger::TransactionLedger;
pub use payout::{PayoutReconciler, ScriptedProvider, StaticMpinVerifier};
pub use platform::Platform;
pub use posting::Posting;
pub use traits::{MpinVerifier, PayoutProvider};
pub use transfer_engine::TransferEngine;
