//! Fund request approval workflow
//!
//! A downstream wallet asks an admin for funds, quoting the UTR of the bank
//! deposit that backs the request. The admin later accepts (funds move, request
//! becomes `Approved`) or rejects it (`Rejected`). Both outcomes are final.
//!
//! # Locking
//!
//! Each request is a row behind its own `tokio::sync::Mutex`. `accept` takes the
//! request row first and only then the two wallets, so the workflow row always
//! precedes account locks.

use crate::core::account_registry::AccountRegistry;
use crate::core::ledger::TransactionLedger;
use crate::core::lock::lock_row;
use crate::core::posting::Posting;
use crate::types::money::validate_amount;
use crate::types::{
    AccountId, FundRequest, FundRequestId, FundRequestStatus, LedgerError, NewFundRequest,
    OwnerType, Service, TransactionId,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct FundRequestWorkflow {
    registry: Arc<AccountRegistry>,
    ledger: Arc<TransactionLedger>,

    requests: DashMap<FundRequestId, Arc<Mutex<FundRequest>>>,

    /// UTR -> request; an entry here is what makes a UTR unique
    utrs: DashMap<String, FundRequestId>,

    /// Request ids per requester and per approver, in creation order
    by_requester: DashMap<AccountId, Vec<FundRequestId>>,
    by_approver: DashMap<AccountId, Vec<FundRequestId>>,
}

impl FundRequestWorkflow {
    pub fn new(registry: Arc<AccountRegistry>, ledger: Arc<TransactionLedger>) -> Self {
        Self {
            registry,
            ledger,
            requests: DashMap::new(),
            utrs: DashMap::new(),
            by_requester: DashMap::new(),
            by_approver: DashMap::new(),
        }
    }

    /// Submit a new `Pending` request
    ///
    /// # Errors
    ///
    /// * `MissingUtr` / `DuplicateUtr` - the UTR is blank or already used
    /// * `AmountNonPositive` / `InvalidAmountPrecision` - bad amount
    /// * `AccountNotFound` - requester or approver unknown
    /// * `InvalidHierarchy` - requester is an admin, or approver is not one
    pub fn create(&self, request: NewFundRequest) -> Result<FundRequestId, LedgerError> {
        let utr = request.utr.trim().to_string();
        if utr.is_empty() {
            return Err(LedgerError::MissingUtr);
        }
        let amount = validate_amount(request.amount)?;

        let requester_type = self.registry.owner_type(request.requester)?;
        if requester_type == OwnerType::Admin {
            return Err(LedgerError::invalid_hierarchy(
                request.requester,
                "admins cannot raise fund requests",
            ));
        }
        let approver_type = self.registry.owner_type(request.approver)?;
        if approver_type != OwnerType::Admin {
            return Err(LedgerError::invalid_hierarchy(
                request.approver,
                format!("fund requests are approved by an ADMIN, found {}", approver_type),
            ));
        }

        let id = Uuid::new_v4();
        match self.utrs.entry(utr.clone()) {
            Entry::Occupied(_) => {
                warn!(utr = %utr, requester = request.requester, "duplicate UTR rejected");
                return Err(LedgerError::duplicate_utr(&utr));
            }
            Entry::Vacant(slot) => {
                let now = Utc::now();
                self.requests.insert(
                    id,
                    Arc::new(Mutex::new(FundRequest {
                        id,
                        requester: request.requester,
                        requester_type,
                        approver: request.approver,
                        amount,
                        utr: utr.clone(),
                        remarks: request.remarks,
                        status: FundRequestStatus::Pending,
                        transaction_id: None,
                        created_at: now,
                        updated_at: now,
                    })),
                );
                slot.insert(id);
            }
        }
        self.by_requester.entry(request.requester).or_default().push(id);
        self.by_approver.entry(request.approver).or_default().push(id);

        info!(
            request = %id,
            requester = request.requester,
            approver = request.approver,
            amount = %amount,
            utr = %utr,
            "fund request created"
        );
        Ok(id)
    }

    fn row(&self, id: FundRequestId) -> Result<Arc<Mutex<FundRequest>>, LedgerError> {
        self.requests
            .get(&id)
            .map(|row| Arc::clone(row.value()))
            .ok_or_else(|| LedgerError::fund_request_not_found(id))
    }

    /// Approve a pending request and move the funds
    ///
    /// Debit of the approver, credit of the requester, both FUND_REQUEST legs and
    /// the status change commit together or not at all.
    ///
    /// # Errors
    ///
    /// * `FundRequestNotFound` - unknown id
    /// * `StateConflict` - the request is no longer `Pending`
    /// * `ApproverMismatch` - `approver` is not the admin the request was addressed to
    /// * `InsufficientBalance` - the approver cannot cover the amount; the request stays `Pending`
    /// * `LockTimeout` - the request row or a wallet stayed busy
    pub async fn accept(
        &self,
        id: FundRequestId,
        approver: AccountId,
    ) -> Result<TransactionId, LedgerError> {
        let timeout = self.registry.lock_timeout();
        let mut request = lock_row(self.row(id)?, timeout, || format!("fund request {}", id)).await?;

        if request.status != FundRequestStatus::Pending {
            return Err(LedgerError::state_conflict("Fund request", id, request.status));
        }
        if request.approver != approver {
            return Err(LedgerError::approver_mismatch(id, request.approver, approver));
        }

        let locked = self.registry.lock(&[request.approver, request.requester]).await?;
        let mut posting = Posting::new(&self.ledger, locked);
        if let Err(e) = posting.transfer(
            request.approver,
            request.requester,
            request.amount,
            Service::FundRequest,
            &request.remarks,
        ) {
            warn!(request = %id, error = %e, "fund request approval failed");
            return Err(e);
        }
        let transaction_id = posting.commit();

        request.status = FundRequestStatus::Approved;
        request.transaction_id = Some(transaction_id);
        request.updated_at = Utc::now();

        info!(
            request = %id,
            approver = request.approver,
            requester = request.requester,
            amount = %request.amount,
            tx = %transaction_id,
            "fund request approved"
        );
        Ok(transaction_id)
    }

    /// Reject a pending request
    ///
    /// Rejecting a request that is already final changes nothing and returns its
    /// current status.
    pub async fn reject(&self, id: FundRequestId) -> Result<FundRequestStatus, LedgerError> {
        let timeout = self.registry.lock_timeout();
        let mut request = lock_row(self.row(id)?, timeout, || format!("fund request {}", id)).await?;

        if request.status == FundRequestStatus::Pending {
            request.status = FundRequestStatus::Rejected;
            request.updated_at = Utc::now();
            info!(request = %id, "fund request rejected");
        }
        Ok(request.status)
    }

    pub async fn get(&self, id: FundRequestId) -> Result<FundRequest, LedgerError> {
        let timeout = self.registry.lock_timeout();
        let request = lock_row(self.row(id)?, timeout, || format!("fund request {}", id)).await?;
        Ok(request.clone())
    }

    pub fn find_by_utr(&self, utr: &str) -> Option<FundRequestId> {
        self.utrs.get(utr.trim()).map(|id| *id.value())
    }

    /// Requests raised by `account`, newest first
    pub async fn list_by_requester(
        &self,
        account: AccountId,
    ) -> Result<Vec<FundRequest>, LedgerError> {
        let ids = self.ids_from(&self.by_requester, account);
        self.collect(ids).await
    }

    /// Requests addressed to `admin`, newest first
    pub async fn list_by_approver(&self, admin: AccountId) -> Result<Vec<FundRequest>, LedgerError> {
        let ids = self.ids_from(&self.by_approver, admin);
        self.collect(ids).await
    }

    fn ids_from(
        &self,
        index: &DashMap<AccountId, Vec<FundRequestId>>,
        account: AccountId,
    ) -> Vec<FundRequestId> {
        index
            .get(&account)
            .map(|ids| ids.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    async fn collect(&self, ids: Vec<FundRequestId>) -> Result<Vec<FundRequest>, LedgerError> {
        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            requests.push(self.get(id).await?);
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transfer_engine::TransferEngine;
    use rust_decimal::Decimal;
    use std::time::Duration;

    struct Fixture {
        registry: Arc<AccountRegistry>,
        ledger: Arc<TransactionLedger>,
        workflow: Arc<FundRequestWorkflow>,
    }

    /// admin 1 funded with `admin_balance`, md 2, distributor 3
    async fn fixture(admin_balance: i64) -> Fixture {
        let registry = Arc::new(AccountRegistry::new(Duration::from_millis(200)));
        registry.open_account_with_id(1, OwnerType::Admin, None).unwrap();
        registry
            .open_account_with_id(2, OwnerType::MasterDistributor, Some(1))
            .unwrap();
        registry
            .open_account_with_id(3, OwnerType::Distributor, Some(2))
            .unwrap();
        let ledger = Arc::new(TransactionLedger::new());
        TransferEngine::new(registry.clone(), ledger.clone())
            .top_up(1, Decimal::new(admin_balance, 0), "seed")
            .await
            .unwrap();

        Fixture {
            workflow: Arc::new(FundRequestWorkflow::new(registry.clone(), ledger.clone())),
            registry,
            ledger,
        }
    }

    fn new_request(amount: i64, utr: &str) -> NewFundRequest {
        NewFundRequest {
            requester: 3,
            approver: 1,
            amount: Decimal::new(amount, 0),
            utr: utr.to_string(),
            remarks: "float".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accept_moves_funds_once() {
        let f = fixture(10000).await;
        let id = f.workflow.create(new_request(2000, "UTR1")).unwrap();
        let legs_before = f.ledger.len();

        let tx = f.workflow.accept(id, 1).await.unwrap();

        assert_eq!(f.registry.get_balance(1).await.unwrap(), Decimal::new(8000, 0));
        assert_eq!(f.registry.get_balance(3).await.unwrap(), Decimal::new(2000, 0));
        assert_eq!(f.ledger.len(), legs_before + 2);
        assert!(f
            .ledger
            .entries_for_transaction(tx)
            .iter()
            .all(|leg| leg.service == Service::FundRequest));

        let request = f.workflow.get(id).await.unwrap();
        assert_eq!(request.status, FundRequestStatus::Approved);
        assert_eq!(request.transaction_id, Some(tx));

        assert_eq!(
            f.workflow.accept(id, 1).await,
            Err(LedgerError::state_conflict("Fund request", id, "APPROVED"))
        );
        assert_eq!(f.registry.get_balance(1).await.unwrap(), Decimal::new(8000, 0));
        assert_eq!(f.ledger.len(), legs_before + 2);
    }

    #[tokio::test]
    async fn test_accept_insufficient_balance_keeps_request_pending() {
        let f = fixture(500).await;
        let id = f.workflow.create(new_request(2000, "UTR1")).unwrap();

        assert!(matches!(
            f.workflow.accept(id, 1).await,
            Err(LedgerError::InsufficientBalance { account: 1, .. })
        ));

        assert_eq!(f.registry.get_balance(1).await.unwrap(), Decimal::new(500, 0));
        assert_eq!(f.registry.get_balance(3).await.unwrap(), Decimal::ZERO);
        assert_eq!(
            f.workflow.get(id).await.unwrap().status,
            FundRequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_accept_by_other_admin_is_rejected() {
        let f = fixture(10000).await;
        f.registry.open_account_with_id(9, OwnerType::Admin, None).unwrap();
        let id = f.workflow.create(new_request(100, "UTR1")).unwrap();

        assert_eq!(
            f.workflow.accept(id, 9).await,
            Err(LedgerError::approver_mismatch(id, 1, 9))
        );
    }

    #[tokio::test]
    async fn test_reject_is_terminal_and_idempotent() {
        let f = fixture(10000).await;
        let id = f.workflow.create(new_request(100, "UTR1")).unwrap();

        assert_eq!(f.workflow.reject(id).await.unwrap(), FundRequestStatus::Rejected);
        assert_eq!(f.workflow.reject(id).await.unwrap(), FundRequestStatus::Rejected);
        assert!(matches!(
            f.workflow.accept(id, 1).await,
            Err(LedgerError::StateConflict { .. })
        ));

        let approved = f.workflow.create(new_request(100, "UTR2")).unwrap();
        f.workflow.accept(approved, 1).await.unwrap();
        assert_eq!(
            f.workflow.reject(approved).await.unwrap(),
            FundRequestStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_duplicate_utr_is_rejected() {
        let f = fixture(10000).await;
        f.workflow.create(new_request(100, "UTR1")).unwrap();

        assert_eq!(
            f.workflow.create(new_request(200, " UTR1 ")),
            Err(LedgerError::duplicate_utr("UTR1"))
        );
        assert_eq!(
            f.workflow.create(new_request(200, "  ")),
            Err(LedgerError::MissingUtr)
        );
    }

    #[tokio::test]
    async fn test_concurrent_submissions_with_same_utr() {
        let f = fixture(10000).await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let workflow = f.workflow.clone();
            handles.push(tokio::spawn(async move {
                workflow.create(new_request(100, "SAME"))
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_create_validates_parties() {
        let f = fixture(10000).await;
        let mut from_admin = new_request(100, "U1");
        from_admin.requester = 1;
        assert!(matches!(
            f.workflow.create(from_admin),
            Err(LedgerError::InvalidHierarchy { .. })
        ));

        let mut to_md = new_request(100, "U2");
        to_md.approver = 2;
        assert!(matches!(
            f.workflow.create(to_md),
            Err(LedgerError::InvalidHierarchy { .. })
        ));
    }

    #[tokio::test]
    async fn test_lists_newest_first() {
        let f = fixture(10000).await;
        let first = f.workflow.create(new_request(100, "U1")).unwrap();
        let second = f.workflow.create(new_request(200, "U2")).unwrap();

        let by_requester: Vec<_> = f
            .workflow
            .list_by_requester(3)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(by_requester, vec![second, first]);
        assert_eq!(f.workflow.list_by_approver(1).await.unwrap().len(), 2);
        assert_eq!(f.workflow.find_by_utr("U2"), Some(second));
        assert!(f.workflow.list_by_requester(2).await.unwrap().is_empty());
    }
}
