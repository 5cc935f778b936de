//! Wiring of the ledger components behind one handle
//!
//! ```text
//! Platform
//!     ├── Arc<AccountRegistry>       (wallets + row locks)
//!     ├── Arc<TransactionLedger>     (append-only legs)
//!     ├── TransferEngine             (two-leg transfers, top-up, revert)
//!     ├── Arc<FundRequestWorkflow>   (approval gate)
//!     └── Arc<PayoutReconciler>      (payouts + provider callbacks)
//! ```
//!
//! `Platform` is cheap to clone; clones share all state.

use crate::config::EngineConfig;
use crate::core::account_registry::AccountRegistry;
use crate::core::fund_request::FundRequestWorkflow;
use crate::core::ledger::TransactionLedger;
use crate::core::payout::PayoutReconciler;
use crate::core::traits::{MpinVerifier, PayoutProvider};
use crate::core::transfer_engine::TransferEngine;
use crate::types::LedgerError;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Platform {
    config: EngineConfig,
    registry: Arc<AccountRegistry>,
    ledger: Arc<TransactionLedger>,
    transfers: TransferEngine,
    fund_requests: Arc<FundRequestWorkflow>,
    payouts: Arc<PayoutReconciler>,
}

impl Platform {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn PayoutProvider>,
        verifier: Arc<dyn MpinVerifier>,
    ) -> Self {
        let registry = Arc::new(AccountRegistry::new(config.lock_timeout));
        let ledger = Arc::new(TransactionLedger::new());
        let transfers = TransferEngine::new(Arc::clone(&registry), Arc::clone(&ledger));
        let fund_requests = Arc::new(FundRequestWorkflow::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
        ));
        let payouts = Arc::new(PayoutReconciler::new(
            Arc::clone(&registry),
            Arc::clone(&ledger),
            provider,
            verifier,
            &config,
        ));

        Self {
            config,
            registry,
            ledger,
            transfers,
            fund_requests,
            payouts,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AccountRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn transfers(&self) -> &TransferEngine {
        &self.transfers
    }

    pub fn fund_requests(&self) -> &FundRequestWorkflow {
        &self.fund_requests
    }

    pub fn payouts(&self) -> &PayoutReconciler {
        &self.payouts
    }

    /// Sum of all committed wallet balances
    ///
    /// At rest this equals `ledger().boundary_net()`.
    pub async fn total_balance(&self) -> Result<Decimal, LedgerError> {
        Ok(self
            .registry
            .all_accounts()
            .await?
            .iter()
            .map(|account| account.balance)
            .sum())
    }
}
