//! Wallet Ledger Engine Library
//! # Overview
//!
//! A concurrency-safe ledger for a four-tier distribution hierarchy
//! (admin, master distributor, distributor, user). Money moves between wallets
//! only through double-entry postings, payouts leave through an external rail,
//! and commissions are split across the hierarchy once a payout settles.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, LedgerEntry, FundRequest, PayoutRequest, etc.)
//! - [`config`] - Engine tunables (lock timeout, daily payout limit, commission table)
//! - [`core`] - Business logic components:
//!   - [`core::account_registry`] - Wallets, hierarchy and ordered row locks
//!   - [`core::ledger`] - Append-only transaction ledger
//!   - [`core::transfer_engine`] - Top-ups, hierarchy transfers and reverts
//!   - [`core::commission`] - Exact commission splitting
//!   - [`core::fund_request`] - Fund request approval workflow
//!   - [`core::payout`] - Payouts, provider callbacks, refunds and reconciliation
//!   - [`core::platform`] - All components behind one cloneable handle
//! - [`io`] - CSV command parsing and wallet output
//! - [`replay`] - Replays a command file against a fresh platform
//! - [`cli`] - CLI arguments parsing
//! - [`logging`] - Tracing subscriber setup
//!
//! # Invariants
//!
//! - No wallet balance is ever negative after a committed operation.
//! - The sum of all balances equals the net of the ledger legs that cross the
//!   system boundary (top-ups in, settled payouts out).
//! - Every failed operation leaves balances, ledger and workflow rows untouched.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod replay;
pub mod types;

pub use config::EngineConfig;
pub use crate::core::{
    AccountRegistry, FundRequestWorkflow, MpinVerifier, PayoutProvider, PayoutReconciler,
    Platform, TransactionLedger, TransferEngine,
};
pub use io::write_accounts_csv;
pub use replay::{run_replay, ReplayConfig, Replayer};
pub use types::{
    Account, AccountId, Command, LedgerEntry, LedgerError, OwnerType, TransactionId,
};
