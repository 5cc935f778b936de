//! Wallet storage and row-scoped locking
//!
//! The `AccountRegistry` owns one wallet per hierarchy entity. Each wallet sits
//! behind its own `tokio::sync::Mutex`; the mutexes live in a `DashMap` so that
//! lookups of unrelated accounts never contend.
//!
//! # Locking
//!
//! Balances are only ever changed through [`LockedAccounts`], obtained from
//! [`AccountRegistry::lock`]. The lock set is sorted and de-duplicated before
//! acquisition, so any two operations that share accounts take them in the same
//! global order and cannot deadlock. The whole acquisition is bounded by the
//! registry's lock timeout.
//!
//! # Staging
//!
//! `reserve` and `credit` only stage new balances. Nothing is visible to other
//! tasks until the owning posting commits; dropping the lock set without a
//! commit discards the staged changes.

use crate::core::lock::with_timeout;
use crate::types::money::checked_add;
use crate::types::{Account, AccountId, LedgerError, OwnerType};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Tier and parent of an account, fixed at onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    owner_type: OwnerType,
    parent: Option<AccountId>,
}

/// The chain of wallets above a user, as used by commission settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hierarchy {
    pub user: AccountId,
    pub distributor: AccountId,
    pub master_distributor: AccountId,
    pub admin: AccountId,
}

impl Hierarchy {
    /// All four wallets, user first
    pub fn accounts(&self) -> [AccountId; 4] {
        [self.user, self.distributor, self.master_distributor, self.admin]
    }
}

#[derive(Debug)]
pub struct AccountRegistry {
    /// One mutex per wallet
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,

    /// Immutable placement data, readable without taking the wallet lock
    placements: DashMap<AccountId, Placement>,

    next_id: AtomicU32,

    lock_timeout: Duration,
}

impl AccountRegistry {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            placements: DashMap::new(),
            next_id: AtomicU32::new(1),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Onboard a wallet under `parent` and return its generated id
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - the parent does not exist
    /// * `InvalidHierarchy` - the parent has the wrong tier, or an admin was given a parent
    pub fn open_account(
        &self,
        owner_type: OwnerType,
        parent: Option<AccountId>,
    ) -> Result<AccountId, LedgerError> {
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            match self.open_account_with_id(id, owner_type, parent) {
                // an explicit id took this slot already
                Err(LedgerError::AccountExists { .. }) => continue,
                other => return other,
            }
        }
    }

    /// Onboard a wallet with a caller-chosen id
    pub fn open_account_with_id(
        &self,
        id: AccountId,
        owner_type: OwnerType,
        parent: Option<AccountId>,
    ) -> Result<AccountId, LedgerError> {
        self.check_placement(id, owner_type, parent)?;

        match self.placements.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::account_exists(id)),
            Entry::Vacant(slot) => {
                self.accounts
                    .insert(id, Arc::new(Mutex::new(Account::new(id, owner_type, parent))));
                slot.insert(Placement { owner_type, parent });
                self.next_id.fetch_max(id.saturating_add(1), Ordering::Relaxed);
                debug!(account = id, tier = %owner_type, parent = ?parent, "account opened");
                Ok(id)
            }
        }
    }

    fn check_placement(
        &self,
        id: AccountId,
        owner_type: OwnerType,
        parent: Option<AccountId>,
    ) -> Result<(), LedgerError> {
        match (owner_type.expected_parent(), parent) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(LedgerError::invalid_hierarchy(
                id,
                "an admin account cannot have a parent",
            )),
            (Some(expected), None) => Err(LedgerError::invalid_hierarchy(
                id,
                format!("a {} account needs a {} parent", owner_type, expected),
            )),
            (Some(expected), Some(parent)) => {
                let actual = self.owner_type(parent)?;
                if actual != expected {
                    return Err(LedgerError::invalid_hierarchy(
                        id,
                        format!(
                            "parent {} is {}, a {} account needs a {} parent",
                            parent, actual, owner_type, expected
                        ),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.placements.contains_key(&id)
    }

    pub fn owner_type(&self, id: AccountId) -> Result<OwnerType, LedgerError> {
        self.placements
            .get(&id)
            .map(|p| p.owner_type)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    pub fn parent(&self, id: AccountId) -> Result<Option<AccountId>, LedgerError> {
        self.placements
            .get(&id)
            .map(|p| p.parent)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// True when `ancestor` sits strictly above `descendant` in the hierarchy
    pub fn is_ancestor(
        &self,
        ancestor: AccountId,
        descendant: AccountId,
    ) -> Result<bool, LedgerError> {
        let mut current = self.parent(descendant)?;
        while let Some(id) = current {
            if id == ancestor {
                return Ok(true);
            }
            current = self.parent(id)?;
        }
        Ok(false)
    }

    /// Resolve the distributor, master distributor and admin above a user
    pub fn hierarchy_of(&self, user: AccountId) -> Result<Hierarchy, LedgerError> {
        let tier = self.owner_type(user)?;
        if tier != OwnerType::User {
            return Err(LedgerError::invalid_hierarchy(
                user,
                format!("expected a USER account, found {}", tier),
            ));
        }

        let broken = |id| LedgerError::invalid_hierarchy(id, "hierarchy chain is incomplete");
        let distributor = self.parent(user)?.ok_or_else(|| broken(user))?;
        let master_distributor = self.parent(distributor)?.ok_or_else(|| broken(distributor))?;
        let admin = self
            .parent(master_distributor)?
            .ok_or_else(|| broken(master_distributor))?;

        Ok(Hierarchy {
            user,
            distributor,
            master_distributor,
            admin,
        })
    }

    fn row(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|row| Arc::clone(row.value()))
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// Current committed state of one wallet
    pub async fn snapshot(&self, id: AccountId) -> Result<Account, LedgerError> {
        let row = self.row(id)?;
        let guard = with_timeout(
            self.lock_timeout,
            || format!("account {}", id),
            row.lock_owned(),
        )
        .await?;
        Ok(guard.clone())
    }

    pub async fn get_balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.snapshot(id).await?.balance)
    }

    /// Committed state of every wallet, sorted by id
    pub async fn all_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut rows: Vec<(AccountId, Arc<Mutex<Account>>)> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        rows.sort_unstable_by_key(|(id, _)| *id);

        let mut accounts = Vec::with_capacity(rows.len());
        for (id, row) in rows {
            let guard = with_timeout(
                self.lock_timeout,
                || format!("account {}", id),
                row.lock_owned(),
            )
            .await?;
            accounts.push(guard.clone());
        }
        Ok(accounts)
    }

    /// Lock a set of wallets in ascending id order
    ///
    /// Duplicate ids are collapsed. Every id must exist; unknown ids fail before
    /// any lock is taken.
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` - an id is unknown
    /// * `LockTimeout` - the locks were not all acquired within the lock timeout;
    ///   the ones already taken are released
    pub async fn lock(&self, ids: &[AccountId]) -> Result<LockedAccounts, LedgerError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let rows = ids
            .iter()
            .map(|id| self.row(*id).map(|row| (*id, row)))
            .collect::<Result<Vec<_>, _>>()?;

        let acquire = async move {
            let mut guards = BTreeMap::new();
            for (id, row) in rows {
                guards.insert(id, row.lock_owned().await);
            }
            guards
        };

        let guards = with_timeout(
            self.lock_timeout,
            || format!("accounts {:?}", ids),
            acquire,
        )
        .await?;

        Ok(LockedAccounts {
            guards,
            staged: BTreeMap::new(),
        })
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOCK_TIMEOUT)
    }
}

/// Exclusive hold on a set of wallets
///
/// Balance changes are staged and only applied by the posting that owns this
/// set. Dropping it releases every lock and discards staged changes.
#[derive(Debug)]
pub struct LockedAccounts {
    guards: BTreeMap<AccountId, OwnedMutexGuard<Account>>,
    staged: BTreeMap<AccountId, Decimal>,
}

impl LockedAccounts {
    pub fn ids(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.guards.keys().copied()
    }

    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.guards
            .get(&id)
            .map(|guard| &**guard)
            .ok_or_else(|| LedgerError::account_not_locked(id))
    }

    /// Balance including changes staged so far
    pub fn balance(&self, id: AccountId) -> Result<Decimal, LedgerError> {
        match self.staged.get(&id) {
            Some(balance) => Ok(*balance),
            None => Ok(self.account(id)?.balance),
        }
    }

    /// Decrease the balance by `amount` if and only if it covers it
    ///
    /// Returns `false`, leaving the balance untouched, when it does not.
    pub fn reserve(&mut self, id: AccountId, amount: Decimal) -> Result<bool, LedgerError> {
        let balance = self.balance(id)?;
        if balance < amount {
            return Ok(false);
        }
        self.staged.insert(id, balance - amount);
        Ok(true)
    }

    pub fn credit(&mut self, id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
        let balance = checked_add(self.balance(id)?, amount, id)?;
        self.staged.insert(id, balance);
        Ok(())
    }

    /// Write staged balances through to the wallets, bumping each touched version
    pub(crate) fn apply(&mut self) {
        for (id, balance) in std::mem::take(&mut self.staged) {
            if let Some(guard) = self.guards.get_mut(&id) {
                guard.balance = balance;
                guard.version += 1;
            }
        }
    }
}
