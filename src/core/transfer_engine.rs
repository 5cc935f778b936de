//! Atomic wallet-to-wallet transfers
//!
//! The `TransferEngine` validates a [`TransferIntent`], locks both wallets in
//! ascending id order, and commits a two-leg posting. Validation happens before
//! any lock is taken; a failure after locking drops the posting, so no balance
//! or ledger row is ever half-written.
//!
//! # Architecture
//!
//! ```text
//! TransferEngine
//!     ├── Arc<AccountRegistry>    (wallets + row locks)
//!     └── Arc<TransactionLedger>  (append-only legs)
//! ```

use crate::core::account_registry::AccountRegistry;
use crate::core::ledger::TransactionLedger;
use crate::core::posting::Posting;
use crate::types::money::validate_amount;
use crate::types::{
    AccountId, Counterparty, LedgerError, OwnerType, Service, TransactionId, TransferIntent,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TransferEngine {
    registry: Arc<AccountRegistry>,
    ledger: Arc<TransactionLedger>,
}

impl TransferEngine {
    pub fn new(registry: Arc<AccountRegistry>, ledger: Arc<TransactionLedger>) -> Self {
        Self { registry, ledger }
    }

    /// Move `intent.amount` from one wallet to another
    ///
    /// Writes one DEBIT and one CREDIT leg sharing the returned transaction id,
    /// both tagged with `intent.service_tag`.
    ///
    /// # Errors
    ///
    /// * `AmountNonPositive` / `InvalidAmountPrecision` - bad amount
    /// * `SameAccount` - source and destination are equal
    /// * `AccountNotFound` - either wallet is unknown
    /// * `InsufficientBalance` - the source cannot cover the amount
    /// * `LockTimeout` - the wallets stayed busy beyond the lock timeout
    pub async fn execute(&self, intent: TransferIntent) -> Result<TransactionId, LedgerError> {
        let result = self.apply_transfer(&intent).await;
        Self::log_result(&intent, &result);
        result
    }

    async fn apply_transfer(&self, intent: &TransferIntent) -> Result<TransactionId, LedgerError> {
        let amount = validate_amount(intent.amount)?;
        if intent.from_account == intent.to_account {
            return Err(LedgerError::same_account(intent.from_account));
        }
        self.registry.owner_type(intent.from_account)?;
        self.registry.owner_type(intent.to_account)?;

        let locked = self
            .registry
            .lock(&[intent.from_account, intent.to_account])
            .await?;
        let mut posting = Posting::new(&self.ledger, locked);
        posting.transfer(
            intent.from_account,
            intent.to_account,
            amount,
            intent.service_tag,
            &intent.remarks,
        )?;
        Ok(posting.commit())
    }

    /// Credit an admin wallet with money entering from outside the system
    pub async fn top_up(
        &self,
        admin: AccountId,
        amount: Decimal,
        remarks: &str,
    ) -> Result<TransactionId, LedgerError> {
        let amount = validate_amount(amount)?;
        let tier = self.registry.owner_type(admin)?;
        if tier != OwnerType::Admin {
            return Err(LedgerError::invalid_hierarchy(
                admin,
                format!("only ADMIN wallets can be topped up, found {}", tier),
            ));
        }

        let locked = self.registry.lock(&[admin]).await?;
        let mut posting = Posting::new(&self.ledger, locked);
        posting.credit(admin, amount, Counterparty::External, Service::TopUp, remarks)?;
        let transaction_id = posting.commit();

        info!(admin = admin, amount = %amount, tx = %transaction_id, "top-up applied");
        Ok(transaction_id)
    }

    /// Fund a wallet further down the hierarchy
    ///
    /// Admins may fund any non-admin wallet; other tiers only wallets below them.
    pub async fn fund_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        remarks: &str,
    ) -> Result<TransactionId, LedgerError> {
        if from != to {
            let from_tier = self.registry.owner_type(from)?;
            let to_tier = self.registry.owner_type(to)?;
            let allowed = if from_tier == OwnerType::Admin {
                to_tier != OwnerType::Admin
            } else {
                self.registry.is_ancestor(from, to)?
            };
            if !allowed {
                return Err(LedgerError::invalid_hierarchy(
                    to,
                    format!("{} {} cannot fund {} {}", from_tier, from, to_tier, to),
                ));
            }
        }

        self.execute(TransferIntent::new(from, to, amount, Service::FundTransfer).with_remarks(remarks))
            .await
    }

    /// Pull funds back from a downstream wallet into an admin wallet
    ///
    /// The revert history is `TransactionLedger::entries_by_service(Service::Revert)`.
    pub async fn revert(
        &self,
        from: AccountId,
        admin: AccountId,
        amount: Decimal,
        remarks: &str,
    ) -> Result<TransactionId, LedgerError> {
        let admin_tier = self.registry.owner_type(admin)?;
        if admin_tier != OwnerType::Admin {
            return Err(LedgerError::invalid_hierarchy(
                admin,
                format!("reverts go to an ADMIN wallet, found {}", admin_tier),
            ));
        }
        if self.registry.owner_type(from)? == OwnerType::Admin {
            return Err(LedgerError::invalid_hierarchy(
                from,
                "cannot revert from an ADMIN wallet",
            ));
        }

        self.execute(TransferIntent::new(from, admin, amount, Service::Revert).with_remarks(remarks))
            .await
    }

    fn log_result(intent: &TransferIntent, result: &Result<TransactionId, LedgerError>) {
        match result {
            Ok(tx) => info!(
                from = intent.from_account,
                to = intent.to_account,
                amount = %intent.amount,
                service = %intent.service_tag,
                tx = %tx,
                "transfer committed"
            ),
            Err(e) => warn!(
                from = intent.from_account,
                to = intent.to_account,
                amount = %intent.amount,
                service = %intent.service_tag,
                error = %e,
                "transfer rejected"
            ),
        }
    }
}
