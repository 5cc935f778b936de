//! Atomic unit of work over a set of locked wallets
//!
//! A [`Posting`] stages balance changes on a [`LockedAccounts`] set together
//! with the ledger legs that describe them. `commit` is synchronous: it writes
//! the balances and appends the legs with no await point in between, while
//! the wallet locks are still held. A posting dropped before `commit` (error,
//! early return, cancelled future) leaves no trace.

use crate::core::account_registry::LockedAccounts;
use crate::core::ledger::TransactionLedger;
use crate::types::{
    AccountId, Counterparty, EntryStatus, EntryType, LedgerEntry, LedgerError, Service,
    TransactionId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Posting<'a> {
    ledger: &'a TransactionLedger,
    accounts: LockedAccounts,
    transaction_id: TransactionId,
    legs: Vec<LedgerEntry>,
}

impl<'a> Posting<'a> {
    pub fn new(ledger: &'a TransactionLedger, accounts: LockedAccounts) -> Self {
        Self {
            ledger,
            accounts,
            transaction_id: Uuid::new_v4(),
            legs: Vec::new(),
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn accounts(&self) -> &LockedAccounts {
        &self.accounts
    }

    /// Take `amount` from `account`, failing if its staged balance does not cover it
    pub fn debit(
        &mut self,
        account: AccountId,
        amount: Decimal,
        receiver: Counterparty,
        service: Service,
        remarks: &str,
    ) -> Result<(), LedgerError> {
        if !self.accounts.reserve(account, amount)? {
            return Err(LedgerError::insufficient_balance(
                account,
                self.accounts.balance(account)?,
                amount,
            ));
        }
        self.push(account, receiver, amount, EntryType::Debit, service, remarks);
        Ok(())
    }

    pub fn credit(
        &mut self,
        account: AccountId,
        amount: Decimal,
        receiver: Counterparty,
        service: Service,
        remarks: &str,
    ) -> Result<(), LedgerError> {
        self.accounts.credit(account, amount)?;
        self.push(account, receiver, amount, EntryType::Credit, service, remarks);
        Ok(())
    }

    /// Debit `from` and credit `to`, writing the two linked legs
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        service: Service,
        remarks: &str,
    ) -> Result<(), LedgerError> {
        self.debit(from, amount, Counterparty::Account(to), service, remarks)?;
        self.credit(to, amount, Counterparty::Account(from), service, remarks)
    }

    fn push(
        &mut self,
        transactor: AccountId,
        receiver: Counterparty,
        amount: Decimal,
        entry_type: EntryType,
        service: Service,
        remarks: &str,
    ) {
        self.legs.push(LedgerEntry {
            entry_id: Uuid::new_v4(),
            transaction_id: self.transaction_id,
            transactor,
            receiver,
            amount,
            entry_type,
            service,
            status: EntryStatus::Success,
            remarks: remarks.to_string(),
            created_at: Utc::now(),
        });
    }

    /// Apply every staged change and record the legs, then release the locks
    pub fn commit(mut self) -> TransactionId {
        self.accounts.apply();
        self.ledger.append(std::mem::take(&mut self.legs));
        self.transaction_id
    }
}
