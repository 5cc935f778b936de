//! Payouts and settlement reconciliation
//!
//! A payout sends a user's money to an external bank account. The outcome comes
//! back asynchronously from the rail, so funds are reserved up front and the
//! payout waits in `Pending` until a callback (or a status query) settles it.
//!
//! ```text
//!            initiate_payout
//!                  │  debit amount + commission (PAYOUT)
//!                  ▼
//!              PENDING ──on_provider_failure──► FAILED   (reservation credited back)
//!                  │
//!          on_provider_success                 commission split credited
//!                  ▼                           to the four tiers (PAYOUT_COMMISSION)
//!              SUCCESS ──refund──► REFUND      shares taken back, user re-credited
//! ```
//!
//! # Idempotency
//!
//! Callbacks are delivered at least once and in any order. Each payout is a row
//! behind its own mutex; a callback that finds the row outside `Pending` returns
//! [`CallbackOutcome::AlreadySettled`] without touching any balance.
//!
//! # Settlement
//!
//! The commission split is fixed when the payout is initiated, so a payout
//! that reaches `Pending` can always settle.
//!
//! # Locking
//!
//! The payout row is always taken before any wallet. `initiate_payout` only
//! locks the user's wallet; the row does not exist until the reservation
//! commits.

pub mod scripted;

use crate::config::EngineConfig;
use crate::core::account_registry::{AccountRegistry, Hierarchy};
use crate::core::commission::split_commission;
use crate::core::ledger::TransactionLedger;
use crate::core::lock::lock_row;
use crate::core::posting::Posting;
use crate::core::traits::{MpinVerifier, PayoutProvider};
use crate::types::money::{checked_add, validate_amount, validate_commission};
use crate::types::{
    AccountId, CallbackOutcome, CommissionSplit, CommissionTable, CorrelationId, Counterparty,
    LedgerError, OwnerType, PayoutInstruction, PayoutIntent, PayoutReceipt, PayoutRequest,
    PayoutStatus, ProviderAck, ProviderStatus, ReconcileReport, Service, TransactionId,
};
use chrono::{Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use scripted::{ScriptedProvider, StaticMpinVerifier};

pub struct PayoutReconciler {
    registry: Arc<AccountRegistry>,
    ledger: Arc<TransactionLedger>,
    provider: Arc<dyn PayoutProvider>,
    verifier: Arc<dyn MpinVerifier>,

    payouts: DashMap<CorrelationId, Arc<Mutex<PayoutRequest>>>,
    /// Correlation ids per user, in creation order
    by_user: DashMap<AccountId, Vec<CorrelationId>>,

    /// Payout principal initiated per user and UTC day; past days are pruned
    daily_totals: DashMap<(AccountId, NaiveDate), Decimal>,
    /// Latest day seen by `roll_daily_totals`, as days since 0001-01-01
    totals_day: AtomicI32,
    daily_limit: Decimal,

    default_table: CommissionTable,
    /// Per-distributor commission tables
    overrides: DashMap<AccountId, CommissionTable>,
}

impl PayoutReconciler {
    pub fn new(
        registry: Arc<AccountRegistry>,
        ledger: Arc<TransactionLedger>,
        provider: Arc<dyn PayoutProvider>,
        verifier: Arc<dyn MpinVerifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            provider,
            verifier,
            payouts: DashMap::new(),
            by_user: DashMap::new(),
            daily_totals: DashMap::new(),
            totals_day: AtomicI32::new(0),
            daily_limit: config.daily_payout_limit,
            default_table: config.commission_table,
            overrides: DashMap::new(),
        }
    }

    /// Reserve funds for a payout and hand it to the rail
    ///
    /// The reservation (one PAYOUT debit of `amount + commission`) commits before
    /// the provider is called. The provider's synchronous answer is then applied:
    /// settled and rejected payouts go through the same path as callbacks, while
    /// an accepted payout, or a provider that could not be reached, stays `Pending`.
    ///
    /// # Errors
    ///
    /// * `AmountNonPositive` / `InvalidAmountPrecision` - bad amount or commission
    /// * `InvalidHierarchy` - the account is not a user with a complete hierarchy
    /// * `CommissionOverallocated` - the distributor's table cannot split this commission
    /// * `AuthorizationFailed` - the MPIN was rejected
    /// * `InsufficientBalance` - the balance does not cover amount plus commission
    /// * `DailyLimitExceeded` - today's payouts plus this one exceed the daily limit
    /// * `LockTimeout` - the user's wallet stayed busy
    pub async fn initiate_payout(&self, intent: PayoutIntent) -> Result<PayoutReceipt, LedgerError> {
        let user = intent.user;
        let amount = validate_amount(intent.amount)?;
        let commission = validate_commission(intent.commission)?;
        let hierarchy = self.registry.hierarchy_of(user)?;
        let table = self.commission_table_for(hierarchy.distributor);
        let split = split_commission(commission, &table)?;
        let reserved = checked_add(amount, commission, user)?;

        if !self.verifier.verify(user, &intent.mpin).await {
            warn!(user = user, "payout authorization failed");
            return Err(LedgerError::authorization_failed(user));
        }

        let today = Utc::now().date_naive();
        self.roll_daily_totals(today);

        // Advisory; both checks are repeated under the wallet lock
        let available = self.registry.get_balance(user).await?;
        if available < reserved {
            return Err(LedgerError::insufficient_balance(user, available, reserved));
        }
        self.check_daily_limit(user, today, amount)?;

        let correlation_id = Uuid::new_v4();
        let locked = self.registry.lock(&[user]).await?;
        self.check_daily_limit(user, today, amount)?;
        let mut posting = Posting::new(&self.ledger, locked);
        posting.debit(
            user,
            reserved,
            Counterparty::Payout(correlation_id),
            Service::Payout,
            &intent.remarks,
        )?;
        *self
            .daily_totals
            .entry((user, today))
            .or_insert(Decimal::ZERO) += amount;
        let reservation_tx = posting.commit();

        let now = Utc::now();
        let request = PayoutRequest {
            id: Uuid::new_v4(),
            correlation_id,
            user,
            beneficiary: intent.beneficiary,
            amount,
            commission,
            reserved,
            transfer_type: intent.transfer_type,
            status: PayoutStatus::Pending,
            operator_reference: None,
            order_id: None,
            failure_reason: None,
            split,
            reservation_tx,
            settlement_tx: None,
            refund_tx: None,
            remarks: intent.remarks,
            created_at: now,
            updated_at: now,
        };
        let payout_id = request.id;
        let instruction = PayoutInstruction {
            correlation_id,
            beneficiary: request.beneficiary.clone(),
            amount,
            transfer_type: request.transfer_type,
        };
        self.payouts
            .insert(correlation_id, Arc::new(Mutex::new(request)));
        self.by_user.entry(user).or_default().push(correlation_id);

        info!(
            user = user,
            correlation_id = %correlation_id,
            amount = %amount,
            commission = %commission,
            tx = %reservation_tx,
            "payout reserved"
        );

        let status = self.submit(&instruction).await;

        Ok(PayoutReceipt {
            payout_id,
            correlation_id,
            reservation_tx,
            status,
        })
    }

    fn check_daily_limit(
        &self,
        user: AccountId,
        day: NaiveDate,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let attempted = self.daily_total(user, day) + amount;
        if attempted > self.daily_limit {
            return Err(LedgerError::daily_limit_exceeded(user, self.daily_limit, attempted));
        }
        Ok(())
    }

    /// Drop the totals of days before `today` the first time `today` is seen
    fn roll_daily_totals(&self, today: NaiveDate) {
        let day = today.num_days_from_ce();
        if self.totals_day.fetch_max(day, Ordering::AcqRel) < day {
            let before = self.daily_totals.len();
            self.daily_totals.retain(|(_, total_day), _| *total_day >= today);
            debug!(
                day = %today,
                pruned = before.saturating_sub(self.daily_totals.len()),
                "daily payout totals rolled over"
            );
        }
    }

    /// Sum of payout principal initiated by `user` on `day`
    pub fn daily_total(&self, user: AccountId, day: NaiveDate) -> Decimal {
        self.daily_totals
            .get(&(user, day))
            .map(|total| *total)
            .unwrap_or(Decimal::ZERO)
    }

    /// Send the instruction and apply the synchronous answer, returning the resulting status
    async fn submit(&self, instruction: &PayoutInstruction) -> PayoutStatus {
        let correlation_id = instruction.correlation_id;
        let applied = match self.provider.submit(instruction).await {
            Ok(ProviderAck::Settled {
                operator_reference,
                order_id,
            }) => self
                .on_provider_success(correlation_id, &operator_reference, order_id)
                .await
                .map(|outcome| Self::status_after(outcome, PayoutStatus::Success)),
            Ok(ProviderAck::Rejected { reason }) => self
                .on_provider_failure(correlation_id, &reason)
                .await
                .map(|outcome| Self::status_after(outcome, PayoutStatus::Failed)),
            Ok(ProviderAck::Accepted { order_id }) => {
                self.record_order_id(correlation_id, order_id).await;
                Ok(PayoutStatus::Pending)
            }
            Err(e) => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "payout provider unreachable, payout left pending"
                );
                Ok(PayoutStatus::Pending)
            }
        };

        applied.unwrap_or_else(|e| {
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "provider acknowledgement not applied, payout left pending"
            );
            PayoutStatus::Pending
        })
    }

    fn status_after(outcome: CallbackOutcome, applied: PayoutStatus) -> PayoutStatus {
        match outcome {
            CallbackOutcome::Applied { .. } => applied,
            CallbackOutcome::AlreadySettled { status } => status,
        }
    }

    async fn record_order_id(&self, correlation_id: CorrelationId, order_id: Option<String>) {
        let Some(order_id) = order_id else {
            return;
        };
        match self.lock_payout(correlation_id).await {
            Ok(mut payout) if payout.status == PayoutStatus::Pending => {
                payout.order_id = Some(order_id);
                payout.updated_at = Utc::now();
            }
            Ok(_) => {}
            Err(e) => warn!(correlation_id = %correlation_id, error = %e, "order id not recorded"),
        }
    }

    async fn lock_payout(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<OwnedMutexGuard<PayoutRequest>, LedgerError> {
        let row = self
            .payouts
            .get(&correlation_id)
            .map(|row| Arc::clone(row.value()))
            .ok_or_else(|| LedgerError::payout_not_found(correlation_id))?;
        lock_row(row, self.registry.lock_timeout(), || {
            format!("payout {}", correlation_id)
        })
        .await
    }

    /// The rail confirmed the payout: settle the commission across the hierarchy
    ///
    /// Each non-zero tier share of the split fixed at initiation becomes one
    /// PAYOUT_COMMISSION credit. The principal has left the system and is not
    /// credited anywhere.
    pub async fn on_provider_success(
        &self,
        correlation_id: CorrelationId,
        operator_reference: &str,
        order_id: Option<String>,
    ) -> Result<CallbackOutcome, LedgerError> {
        let mut payout = self.lock_payout(correlation_id).await?;
        if payout.status != PayoutStatus::Pending {
            debug!(correlation_id = %correlation_id, status = %payout.status, "duplicate success callback ignored");
            return Ok(CallbackOutcome::AlreadySettled {
                status: payout.status,
            });
        }

        let hierarchy = self.registry.hierarchy_of(payout.user)?;
        let split = payout.split;

        let locked = self.registry.lock(&hierarchy.accounts()).await?;
        let mut posting = Posting::new(&self.ledger, locked);
        for (account, share) in Self::shares(&hierarchy, &split) {
            if share > Decimal::ZERO {
                posting.credit(
                    account,
                    share,
                    Counterparty::Payout(correlation_id),
                    Service::PayoutCommission,
                    &payout.remarks,
                )?;
            }
        }
        let transaction_id = posting.commit();

        payout.status = PayoutStatus::Success;
        payout.operator_reference = Some(operator_reference.to_string());
        if order_id.is_some() {
            payout.order_id = order_id;
        }
        payout.settlement_tx = Some(transaction_id);
        payout.updated_at = Utc::now();

        info!(
            correlation_id = %correlation_id,
            operator_reference = %operator_reference,
            commission = %split.total,
            tx = %transaction_id,
            "payout settled"
        );
        Ok(CallbackOutcome::Applied { transaction_id })
    }

    /// The rail rejected the payout: release the whole reservation back to the user
    pub async fn on_provider_failure(
        &self,
        correlation_id: CorrelationId,
        reason: &str,
    ) -> Result<CallbackOutcome, LedgerError> {
        let mut payout = self.lock_payout(correlation_id).await?;
        if payout.status != PayoutStatus::Pending {
            debug!(correlation_id = %correlation_id, status = %payout.status, "duplicate failure callback ignored");
            return Ok(CallbackOutcome::AlreadySettled {
                status: payout.status,
            });
        }

        let locked = self.registry.lock(&[payout.user]).await?;
        let mut posting = Posting::new(&self.ledger, locked);
        posting.credit(
            payout.user,
            payout.reserved,
            Counterparty::Payout(correlation_id),
            Service::PayoutReversal,
            reason,
        )?;
        let transaction_id = posting.commit();

        payout.status = PayoutStatus::Failed;
        payout.failure_reason = Some(reason.to_string());
        payout.settlement_tx = Some(transaction_id);
        payout.updated_at = Utc::now();

        info!(
            correlation_id = %correlation_id,
            reason = %reason,
            released = %payout.reserved,
            tx = %transaction_id,
            "payout failed, reservation released"
        );
        Ok(CallbackOutcome::Applied { transaction_id })
    }

    /// Reverse a successful payout
    ///
    /// Every tier gives back the share it received and the user is credited
    /// `amount + commission`. Either all of it happens or none of it does.
    ///
    /// # Errors
    ///
    /// * `PayoutNotFound` - unknown correlation id
    /// * `StateConflict` - the payout is not `Success`
    /// * `InsufficientBalance` - a tier has already spent its share; nothing changes
    /// * `LockTimeout` - the payout row or a wallet stayed busy
    pub async fn refund(&self, correlation_id: CorrelationId) -> Result<TransactionId, LedgerError> {
        let mut payout = self.lock_payout(correlation_id).await?;
        if payout.status != PayoutStatus::Success {
            return Err(LedgerError::state_conflict("Payout", correlation_id, payout.status));
        }
        let split = payout.split;

        let hierarchy = self.registry.hierarchy_of(payout.user)?;
        let locked = self.registry.lock(&hierarchy.accounts()).await?;
        let mut posting = Posting::new(&self.ledger, locked);
        let remarks = format!("refund of payout {}", correlation_id);

        for (account, share) in Self::shares(&hierarchy, &split) {
            if share > Decimal::ZERO {
                if let Err(e) = posting.debit(
                    account,
                    share,
                    Counterparty::Payout(correlation_id),
                    Service::PayoutRefund,
                    &remarks,
                ) {
                    warn!(correlation_id = %correlation_id, error = %e, "payout refund aborted");
                    return Err(e);
                }
            }
        }
        posting.credit(
            payout.user,
            payout.reserved,
            Counterparty::Payout(correlation_id),
            Service::PayoutRefund,
            &remarks,
        )?;
        let transaction_id = posting.commit();

        payout.status = PayoutStatus::Refund;
        payout.refund_tx = Some(transaction_id);
        payout.updated_at = Utc::now();

        info!(
            correlation_id = %correlation_id,
            user = payout.user,
            credited = %payout.reserved,
            tx = %transaction_id,
            "payout refunded"
        );
        Ok(transaction_id)
    }

    fn shares(hierarchy: &Hierarchy, split: &CommissionSplit) -> [(AccountId, Decimal); 4] {
        [
            (hierarchy.user, split.retailer_share),
            (hierarchy.distributor, split.distributor_share),
            (hierarchy.master_distributor, split.master_distributor_share),
            (hierarchy.admin, split.admin_share),
        ]
    }

    /// Settle `Pending` payouts older than `older_than` from the rail's status query
    ///
    /// Payouts the rail reports as pending or unknown, or whose query fails, are
    /// left `Pending`. Nothing is ever failed without the rail saying so.
    pub async fn reconcile_pending(&self, older_than: chrono::Duration) -> ReconcileReport {
        let cutoff = Utc::now() - older_than;
        let mut report = ReconcileReport::default();

        for correlation_id in self.stale_pending(cutoff).await {
            report.examined += 1;
            let status = match self.provider.query_status(correlation_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(correlation_id = %correlation_id, error = %e, "status query failed");
                    report.errors += 1;
                    continue;
                }
            };

            let (applied, counter) = match status {
                ProviderStatus::Success {
                    operator_reference,
                    order_id,
                } => (
                    self.on_provider_success(correlation_id, &operator_reference, order_id)
                        .await,
                    &mut report.settled,
                ),
                ProviderStatus::Failed { reason } => (
                    self.on_provider_failure(correlation_id, &reason).await,
                    &mut report.failed,
                ),
                ProviderStatus::Pending | ProviderStatus::Unknown => {
                    report.still_pending += 1;
                    continue;
                }
            };

            match applied {
                Ok(CallbackOutcome::Applied { .. }) => *counter += 1,
                // a callback got there first
                Ok(CallbackOutcome::AlreadySettled { .. }) => {}
                Err(e) => {
                    warn!(correlation_id = %correlation_id, error = %e, "reconciliation not applied");
                    report.errors += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            settled = report.settled,
            failed = report.failed,
            still_pending = report.still_pending,
            errors = report.errors,
            "pending payouts reconciled"
        );
        report
    }

    async fn stale_pending(&self, cutoff: chrono::DateTime<Utc>) -> Vec<CorrelationId> {
        let rows: Vec<(CorrelationId, Arc<Mutex<PayoutRequest>>)> = self
            .payouts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut stale = Vec::new();
        for (correlation_id, row) in rows {
            // a busy row is being settled right now
            if let Ok(payout) = row.try_lock() {
                if payout.status == PayoutStatus::Pending && payout.created_at <= cutoff {
                    stale.push((payout.created_at, correlation_id));
                }
            }
        }
        stale.sort_unstable();
        stale.into_iter().map(|(_, id)| id).collect()
    }

    /// Use `table` instead of the default for payouts of users under `distributor`
    pub fn set_commission_override(
        &self,
        distributor: AccountId,
        table: CommissionTable,
    ) -> Result<(), LedgerError> {
        let tier = self.registry.owner_type(distributor)?;
        if tier != OwnerType::Distributor {
            return Err(LedgerError::invalid_hierarchy(
                distributor,
                format!("commission overrides belong to a DISTRIBUTOR, found {}", tier),
            ));
        }
        table.validate()?;
        self.overrides.insert(distributor, table);
        info!(distributor = distributor, table = ?table, "commission override set");
        Ok(())
    }

    pub fn clear_commission_override(&self, distributor: AccountId) -> Option<CommissionTable> {
        self.overrides.remove(&distributor).map(|(_, table)| table)
    }

    pub fn commission_table_for(&self, distributor: AccountId) -> CommissionTable {
        self.overrides
            .get(&distributor)
            .map(|table| *table)
            .unwrap_or(self.default_table)
    }

    pub async fn get_payout(&self, correlation_id: CorrelationId) -> Result<PayoutRequest, LedgerError> {
        Ok(self.lock_payout(correlation_id).await?.clone())
    }

    /// Payouts of `user`, newest first
    pub async fn list_payouts(&self, user: AccountId) -> Result<Vec<PayoutRequest>, LedgerError> {
        let ids: Vec<CorrelationId> = self
            .by_user
            .get(&user)
            .map(|ids| ids.iter().rev().copied().collect())
            .unwrap_or_default();

        let mut payouts = Vec::with_capacity(ids.len());
        for id in ids {
            payouts.push(self.get_payout(id).await?);
        }
        Ok(payouts)
    }
}

impl std::fmt::Debug for PayoutReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutReconciler")
            .field("payouts", &self.payouts.len())
            .field("daily_limit", &self.daily_limit)
            .field("default_table", &self.default_table)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transfer_engine::TransferEngine;
    use crate::types::{Beneficiary, EntryType, ProviderError, TransferType};
    use std::str::FromStr;
    use std::time::Duration;

    const ADMIN: AccountId = 1;
    const MD: AccountId = 2;
    const DIST: AccountId = 3;
    const USER: AccountId = 4;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct Fixture {
        registry: Arc<AccountRegistry>,
        ledger: Arc<TransactionLedger>,
        provider: Arc<ScriptedProvider>,
        reconciler: PayoutReconciler,
    }

    impl Fixture {
        async fn balance(&self, id: AccountId) -> Decimal {
            self.registry.get_balance(id).await.unwrap()
        }

        async fn total(&self) -> Decimal {
            self.registry
                .all_accounts()
                .await
                .unwrap()
                .iter()
                .map(|a| a.balance)
                .sum()
        }
    }

    /// admin 1 -> md 2 -> distributor 3 -> user 4 holding `user_balance`
    async fn fixture(user_balance: &str) -> Fixture {
        let registry = Arc::new(AccountRegistry::new(Duration::from_millis(200)));
        registry.open_account_with_id(ADMIN, OwnerType::Admin, None).unwrap();
        registry
            .open_account_with_id(MD, OwnerType::MasterDistributor, Some(ADMIN))
            .unwrap();
        registry
            .open_account_with_id(DIST, OwnerType::Distributor, Some(MD))
            .unwrap();
        registry.open_account_with_id(USER, OwnerType::User, Some(DIST)).unwrap();

        let ledger = Arc::new(TransactionLedger::new());
        let engine = TransferEngine::new(registry.clone(), ledger.clone());
        engine.top_up(ADMIN, dec(user_balance), "seed").await.unwrap();
        engine
            .fund_transfer(ADMIN, USER, dec(user_balance), "float")
            .await
            .unwrap();

        let provider = Arc::new(ScriptedProvider::pending());
        let verifier = Arc::new(StaticMpinVerifier::new().with_mpin(USER, "1234"));
        let reconciler = PayoutReconciler::new(
            registry.clone(),
            ledger.clone(),
            provider.clone(),
            verifier,
            &EngineConfig::default(),
        );

        Fixture {
            registry,
            ledger,
            provider,
            reconciler,
        }
    }

    fn intent(amount: &str, commission: &str) -> PayoutIntent {
        PayoutIntent {
            user: USER,
            amount: dec(amount),
            commission: dec(commission),
            beneficiary: Beneficiary {
                account_number: "001100220033".to_string(),
                ifsc_code: "HDFC0000001".to_string(),
                bank_name: "HDFC".to_string(),
                beneficiary_name: "A Retailer".to_string(),
                mobile_number: "9000000000".to_string(),
            },
            transfer_type: TransferType::Imps,
            mpin: "1234".to_string(),
            remarks: "payout".to_string(),
        }
    }

    #[tokio::test]
    async fn test_initiate_reserves_funds_and_submits() {
        let f = fixture("6000").await;

        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        assert_eq!(receipt.status, PayoutStatus::Pending);
        assert_eq!(f.balance(USER).await, dec("880"));

        let legs = f.ledger.entries_for_transaction(receipt.reservation_tx);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].entry_type, EntryType::Debit);
        assert_eq!(legs[0].service, Service::Payout);
        assert_eq!(legs[0].amount, dec("5120"));
        assert_eq!(legs[0].receiver, Counterparty::Payout(receipt.correlation_id));

        let sent = f.provider.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].correlation_id, receipt.correlation_id);
        assert_eq!(sent[0].amount, dec("5000"));
    }

    #[tokio::test]
    async fn test_success_splits_commission_across_tiers() {
        let f = fixture("5120").await;
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        let outcome = f
            .reconciler
            .on_provider_success(receipt.correlation_id, "OPREF1", Some("ORD1".into()))
            .await
            .unwrap();

        assert!(matches!(outcome, CallbackOutcome::Applied { .. }));
        assert_eq!(f.balance(USER).await, dec("60.00"));
        assert_eq!(f.balance(DIST).await, dec("20.00"));
        assert_eq!(f.balance(MD).await, dec("5.00"));
        assert_eq!(f.balance(ADMIN).await, dec("35.00"));

        let payout = f.reconciler.get_payout(receipt.correlation_id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Success);
        assert_eq!(payout.operator_reference.as_deref(), Some("OPREF1"));
        assert_eq!(payout.order_id.as_deref(), Some("ORD1"));
        assert_eq!(payout.split.sum(), dec("120"));

        // principal left the system
        assert_eq!(f.total().await, dec("120"));
        assert_eq!(f.total().await, f.ledger.boundary_net());
    }

    #[tokio::test]
    async fn test_duplicate_success_callback_applies_once() {
        let f = fixture("5120").await;
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OPREF1", None)
            .await
            .unwrap();
        let legs = f.ledger.len();

        let again = f
            .reconciler
            .on_provider_success(receipt.correlation_id, "OPREF1", None)
            .await
            .unwrap();
        let late_failure = f
            .reconciler
            .on_provider_failure(receipt.correlation_id, "timeout")
            .await
            .unwrap();

        assert_eq!(again, CallbackOutcome::AlreadySettled { status: PayoutStatus::Success });
        assert_eq!(late_failure, CallbackOutcome::AlreadySettled { status: PayoutStatus::Success });
        assert_eq!(f.ledger.len(), legs);
        assert_eq!(f.balance(ADMIN).await, dec("35.00"));
    }

    #[tokio::test]
    async fn test_concurrent_success_callbacks_apply_once() {
        let f = Arc::new(fixture("5120").await);
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                f.reconciler
                    .on_provider_success(receipt.correlation_id, "OPREF", None)
                    .await
                    .unwrap()
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), CallbackOutcome::Applied { .. }) {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(f.ledger.entries_by_service(Service::PayoutCommission).len(), 4);
        assert_eq!(f.balance(USER).await, dec("60.00"));
    }

    #[tokio::test]
    async fn test_failure_releases_full_reservation() {
        let f = fixture("5120").await;
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();
        assert_eq!(f.balance(USER).await, Decimal::ZERO);

        f.reconciler
            .on_provider_failure(receipt.correlation_id, "beneficiary bank down")
            .await
            .unwrap();

        assert_eq!(f.balance(USER).await, dec("5120"));
        assert_eq!(f.balance(ADMIN).await, Decimal::ZERO);
        let payout = f.reconciler.get_payout(receipt.correlation_id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Failed);
        assert_eq!(payout.failure_reason.as_deref(), Some("beneficiary bank down"));
        assert!(f.ledger.entries_by_service(Service::PayoutCommission).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_correlation_id() {
        let f = fixture("100").await;
        let unknown = Uuid::new_v4();
        assert_eq!(
            f.reconciler.on_provider_success(unknown, "X", None).await,
            Err(LedgerError::payout_not_found(unknown))
        );
        assert_eq!(
            f.reconciler.refund(unknown).await,
            Err(LedgerError::payout_not_found(unknown))
        );
    }

    #[tokio::test]
    async fn test_initiate_rejections_leave_balance_untouched() {
        let f = fixture("1000").await;

        let mut bad_mpin = intent("100", "2");
        bad_mpin.mpin = "0000".to_string();
        assert_eq!(
            f.reconciler.initiate_payout(bad_mpin).await,
            Err(LedgerError::authorization_failed(USER))
        );

        assert!(matches!(
            f.reconciler.initiate_payout(intent("999", "2")).await,
            Err(LedgerError::InsufficientBalance { .. })
        ));

        let mut from_distributor = intent("10", "0");
        from_distributor.user = DIST;
        assert!(matches!(
            f.reconciler.initiate_payout(from_distributor).await,
            Err(LedgerError::InvalidHierarchy { .. })
        ));

        assert_eq!(f.balance(USER).await, dec("1000"));
        assert_eq!(f.provider.submit_count(), 0);
    }

    #[tokio::test]
    async fn test_daily_limit_counts_every_payout_of_the_day() {
        let f = fixture("30000").await;

        let first = f.reconciler.initiate_payout(intent("20000", "0")).await.unwrap();
        f.reconciler
            .on_provider_failure(first.correlation_id, "rejected")
            .await
            .unwrap();

        assert_eq!(
            f.reconciler.initiate_payout(intent("5000.01", "0")).await,
            Err(LedgerError::daily_limit_exceeded(
                USER,
                dec("25000"),
                dec("25000.01")
            ))
        );
        assert!(f.reconciler.initiate_payout(intent("5000", "0")).await.is_ok());
        assert_eq!(
            f.reconciler.daily_total(USER, Utc::now().date_naive()),
            dec("25000")
        );
    }

    #[tokio::test]
    async fn test_settled_ack_applies_success_immediately() {
        let f = fixture("5120").await;
        f.provider.set_ack(Ok(ProviderAck::Settled {
            operator_reference: "IMPS123".to_string(),
            order_id: Some("ORD9".to_string()),
        }));

        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        assert_eq!(receipt.status, PayoutStatus::Success);
        assert_eq!(f.balance(ADMIN).await, dec("35.00"));
    }

    #[tokio::test]
    async fn test_rejected_ack_applies_failure_immediately() {
        let f = fixture("5120").await;
        f.provider.set_ack(Ok(ProviderAck::Rejected {
            reason: "invalid IFSC".to_string(),
        }));

        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        assert_eq!(receipt.status, PayoutStatus::Failed);
        assert_eq!(f.balance(USER).await, dec("5120"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_leaves_payout_pending() {
        let f = fixture("5120").await;
        f.provider
            .set_ack(Err(ProviderError::Unavailable("connection reset".to_string())));

        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();

        assert_eq!(receipt.status, PayoutStatus::Pending);
        assert_eq!(f.balance(USER).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_accepted_ack_records_order_id() {
        let f = fixture("100").await;
        f.provider.set_ack(Ok(ProviderAck::Accepted {
            order_id: Some("NEFT42".to_string()),
        }));

        let receipt = f.reconciler.initiate_payout(intent("50", "1")).await.unwrap();
        let payout = f.reconciler.get_payout(receipt.correlation_id).await.unwrap();

        assert_eq!(payout.status, PayoutStatus::Pending);
        assert_eq!(payout.order_id.as_deref(), Some("NEFT42"));
    }

    #[tokio::test]
    async fn test_refund_reverses_successful_payout() {
        let f = fixture("5120").await;
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OP", None)
            .await
            .unwrap();

        let tx = f.reconciler.refund(receipt.correlation_id).await.unwrap();

        assert_eq!(f.balance(USER).await, dec("5120"));
        assert_eq!(f.balance(DIST).await, Decimal::ZERO);
        assert_eq!(f.balance(MD).await, Decimal::ZERO);
        assert_eq!(f.balance(ADMIN).await, Decimal::ZERO);
        assert!(f
            .ledger
            .entries_for_transaction(tx)
            .iter()
            .all(|leg| leg.service == Service::PayoutRefund));
        assert_eq!(f.total().await, f.ledger.boundary_net());

        let payout = f.reconciler.get_payout(receipt.correlation_id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Refund);
        assert_eq!(payout.refund_tx, Some(tx));

        assert_eq!(
            f.reconciler.refund(receipt.correlation_id).await,
            Err(LedgerError::state_conflict("Payout", receipt.correlation_id, "REFUND"))
        );
    }

    #[tokio::test]
    async fn test_refund_is_all_or_nothing() {
        let f = fixture("5120").await;
        let receipt = f.reconciler.initiate_payout(intent("5000", "120")).await.unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OP", None)
            .await
            .unwrap();

        // the master distributor spends its 5.00 share
        TransferEngine::new(f.registry.clone(), f.ledger.clone())
            .fund_transfer(MD, DIST, dec("5"), "")
            .await
            .unwrap();
        let legs = f.ledger.len();

        assert!(matches!(
            f.reconciler.refund(receipt.correlation_id).await,
            Err(LedgerError::InsufficientBalance { account: MD, .. })
        ));

        assert_eq!(f.balance(USER).await, dec("60.00"));
        assert_eq!(f.balance(DIST).await, dec("25.00"));
        assert_eq!(f.balance(ADMIN).await, dec("35.00"));
        assert_eq!(f.ledger.len(), legs);
        assert_eq!(
            f.reconciler.get_payout(receipt.correlation_id).await.unwrap().status,
            PayoutStatus::Success
        );
    }

    #[tokio::test]
    async fn test_refund_of_pending_payout_is_a_conflict() {
        let f = fixture("100").await;
        let receipt = f.reconciler.initiate_payout(intent("50", "1")).await.unwrap();
        assert!(matches!(
            f.reconciler.refund(receipt.correlation_id).await,
            Err(LedgerError::StateConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_commission_override_applies_to_distributor_users() {
        let f = fixture("1100").await;
        f.reconciler
            .set_commission_override(DIST, "70/10/15/5".parse().unwrap())
            .unwrap();
        assert!(f
            .reconciler
            .set_commission_override(MD, CommissionTable::default())
            .is_err());

        let receipt = f.reconciler.initiate_payout(intent("1000", "100")).await.unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OP", None)
            .await
            .unwrap();

        assert_eq!(f.balance(USER).await, dec("70.00"));
        assert_eq!(f.balance(DIST).await, dec("15.00"));
        assert_eq!(f.balance(MD).await, dec("5.00"));
        assert_eq!(f.balance(ADMIN).await, dec("10.00"));

        assert!(f.reconciler.clear_commission_override(DIST).is_some());
        assert_eq!(f.reconciler.commission_table_for(DIST), CommissionTable::default());
    }

    #[tokio::test]
    async fn test_unsplittable_commission_is_rejected_before_reservation() {
        let f = fixture("100").await;
        // each third of 0.05 rounds up to 0.02
        f.reconciler
            .set_commission_override(DIST, "33.34/0/33.33/33.33".parse().unwrap())
            .unwrap();

        assert_eq!(
            f.reconciler.initiate_payout(intent("10", "0.05")).await,
            Err(LedgerError::commission_overallocated(dec("0.05"), dec("0.06")))
        );
        assert_eq!(f.balance(USER).await, dec("100"));
        assert!(f.ledger.entries_by_service(Service::Payout).is_empty());
        assert!(f.provider.submissions().is_empty());
        assert_eq!(
            f.reconciler.daily_total(USER, Utc::now().date_naive()),
            Decimal::ZERO
        );

        // the same table splits a commission it divides cleanly, and that payout settles
        let receipt = f.reconciler.initiate_payout(intent("10", "0.06")).await.unwrap();
        for _ in 0..3 {
            f.reconciler
                .on_provider_success(receipt.correlation_id, "OP", None)
                .await
                .unwrap();
        }
        let payout = f.reconciler.get_payout(receipt.correlation_id).await.unwrap();
        assert_eq!(payout.status, PayoutStatus::Success);
        assert_eq!(payout.split.sum(), dec("0.06"));
    }

    #[tokio::test]
    async fn test_split_is_fixed_at_initiation() {
        let f = fixture("1100").await;
        let receipt = f.reconciler.initiate_payout(intent("1000", "100")).await.unwrap();

        f.reconciler
            .set_commission_override(DIST, "70/10/15/5".parse().unwrap())
            .unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OP", None)
            .await
            .unwrap();

        assert_eq!(f.balance(USER).await, dec("50.00"));
        assert_eq!(f.balance(DIST).await, dec("16.67"));
        assert_eq!(f.balance(MD).await, dec("4.17"));
        assert_eq!(f.balance(ADMIN).await, dec("29.16"));
    }

    #[tokio::test]
    async fn test_past_daily_totals_are_pruned() {
        let f = fixture("100").await;
        let today = Utc::now().date_naive();
        let yesterday = today.pred_opt().unwrap();
        f.reconciler
            .daily_totals
            .insert((USER, yesterday), dec("24000"));
        f.reconciler.daily_totals.insert((ADMIN, yesterday), dec("1"));

        f.reconciler.initiate_payout(intent("10", "0")).await.unwrap();

        assert_eq!(f.reconciler.daily_total(USER, yesterday), Decimal::ZERO);
        assert_eq!(f.reconciler.daily_total(USER, today), dec("10"));
        assert_eq!(f.reconciler.daily_totals.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_commission_writes_no_commission_legs() {
        let f = fixture("100").await;
        let receipt = f.reconciler.initiate_payout(intent("100", "0")).await.unwrap();
        f.reconciler
            .on_provider_success(receipt.correlation_id, "OP", None)
            .await
            .unwrap();
        assert!(f.ledger.entries_by_service(Service::PayoutCommission).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_pending_applies_provider_status() {
        let f = fixture("3000").await;
        let settled = f.reconciler.initiate_payout(intent("1000", "0")).await.unwrap();
        let failed = f.reconciler.initiate_payout(intent("1000", "0")).await.unwrap();
        let waiting = f.reconciler.initiate_payout(intent("1000", "0")).await.unwrap();

        f.provider.set_status(
            settled.correlation_id,
            ProviderStatus::Success {
                operator_reference: "OP".to_string(),
                order_id: None,
            },
        );
        f.provider.set_status(
            failed.correlation_id,
            ProviderStatus::Failed {
                reason: "closed account".to_string(),
            },
        );

        let report = f.reconciler.reconcile_pending(chrono::Duration::zero()).await;

        assert_eq!(
            report,
            ReconcileReport {
                examined: 3,
                settled: 1,
                failed: 1,
                still_pending: 1,
                errors: 0,
            }
        );
        assert_eq!(
            f.reconciler.get_payout(waiting.correlation_id).await.unwrap().status,
            PayoutStatus::Pending
        );
        assert_eq!(f.balance(USER).await, dec("1000"));
    }

    #[tokio::test]
    async fn test_reconcile_pending_skips_recent_and_survives_query_errors() {
        let f = fixture("1000").await;
        f.reconciler.initiate_payout(intent("100", "0")).await.unwrap();

        let report = f.reconciler.reconcile_pending(chrono::Duration::hours(1)).await;
        assert_eq!(report.examined, 0);

        f.provider
            .set_query_error(Some(ProviderError::Unavailable("down".to_string())));
        let report = f.reconciler.reconcile_pending(chrono::Duration::zero()).await;
        assert_eq!(report.examined, 1);
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn test_list_payouts_newest_first() {
        let f = fixture("1000").await;
        let first = f.reconciler.initiate_payout(intent("10", "0")).await.unwrap();
        let second = f.reconciler.initiate_payout(intent("10", "0")).await.unwrap();

        let ids: Vec<_> = f
            .reconciler
            .list_payouts(USER)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.correlation_id)
            .collect();
        assert_eq!(ids, vec![second.correlation_id, first.correlation_id]);
    }
}
