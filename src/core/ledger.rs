//! Append-only transaction ledger
//!
//! Every committed leg is stored twice: once under the wallet it moved and once
//! under its transaction id. Both indexes are `DashMap`s, so postings on
//! unrelated wallets append without contending with each other.
//!
//! Legs are only appended by a committing posting, while it still holds the
//! locks of every wallet it touched. Per wallet, the index is therefore in
//! commit order.

use crate::types::{AccountId, LedgerEntry, Service, TransactionId};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TransactionLedger {
    /// Legs by transactor, in commit order, tagged with a global sequence number
    by_account: DashMap<AccountId, Vec<(u64, LedgerEntry)>>,

    by_transaction: DashMap<TransactionId, Vec<LedgerEntry>>,

    sequence: AtomicU64,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the legs of one committed transaction
    pub(crate) fn append(&self, legs: Vec<LedgerEntry>) {
        for leg in &legs {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            self.by_account
                .entry(leg.transactor)
                .or_default()
                .push((seq, leg.clone()));
        }
        if let Some(first) = legs.first() {
            self.by_transaction
                .entry(first.transaction_id)
                .or_default()
                .extend(legs);
        }
    }

    /// Legs that moved `account`, newest first
    pub fn entries_for_account(&self, account: AccountId) -> Vec<LedgerEntry> {
        self.by_account
            .get(&account)
            .map(|legs| legs.iter().rev().map(|(_, leg)| leg.clone()).collect())
            .unwrap_or_default()
    }

    /// Every leg of one transaction, in the order they were staged
    pub fn entries_for_transaction(&self, transaction_id: TransactionId) -> Vec<LedgerEntry> {
        self.by_transaction
            .get(&transaction_id)
            .map(|legs| legs.clone())
            .unwrap_or_default()
    }

    /// Legs tagged with `service`, oldest first (e.g. the revert history)
    pub fn entries_by_service(&self, service: Service) -> Vec<LedgerEntry> {
        let mut legs: Vec<(u64, LedgerEntry)> = self
            .by_account
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|(_, leg)| leg.service == service)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        legs.sort_unstable_by_key(|(seq, _)| *seq);
        legs.into_iter().map(|(_, leg)| leg).collect()
    }

    /// Number of legs recorded
    pub fn len(&self) -> usize {
        self.sequence.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Net money that entered the system through boundary legs
    ///
    /// Top-ups and refunds add, payout reservations subtract. At rest, the sum
    /// of all wallet balances equals this value.
    pub fn boundary_net(&self) -> Decimal {
        self.by_account
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|(_, leg)| leg.crosses_boundary())
                    .map(|(_, leg)| leg.signed_amount())
                    .collect::<Vec<_>>()
            })
            .sum()
    }
}
