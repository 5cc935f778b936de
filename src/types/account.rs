//! Account-related types for the wallet ledger
//!
//! Every tier of the hierarchy (admin, master distributor, distributor, user)
//! owns exactly one wallet. All tiers share the single [`Account`] type and are
//! told apart by [`OwnerType`], so each wallet operation is written once.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account identifier
///
/// Locks are always acquired in ascending `AccountId` order.
pub type AccountId = u32;

/// Tier of the entity owning a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    /// Root of the hierarchy; the only tier that can be topped up
    Admin,
    MasterDistributor,
    Distributor,
    /// End user (retailer); the only tier that can initiate payouts
    User,
}

impl OwnerType {
    /// All tiers, top of the hierarchy first
    pub const ALL: [OwnerType; 4] = [
        OwnerType::Admin,
        OwnerType::MasterDistributor,
        OwnerType::Distributor,
        OwnerType::User,
    ];

    /// The tier a parent account must have, or `None` for the root tier
    pub fn expected_parent(self) -> Option<OwnerType> {
        match self {
            OwnerType::Admin => None,
            OwnerType::MasterDistributor => Some(OwnerType::Admin),
            OwnerType::Distributor => Some(OwnerType::MasterDistributor),
            OwnerType::User => Some(OwnerType::Distributor),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OwnerType::Admin => "ADMIN",
            OwnerType::MasterDistributor => "MASTER_DISTRIBUTOR",
            OwnerType::Distributor => "DISTRIBUTOR",
            OwnerType::User => "USER",
        }
    }
}

impl fmt::Display for OwnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(OwnerType::Admin),
            "master_distributor" | "md" => Ok(OwnerType::MasterDistributor),
            "distributor" => Ok(OwnerType::Distributor),
            "user" | "retailer" => Ok(OwnerType::User),
            other => Err(format!("Unknown owner type '{}'", other)),
        }
    }
}

/// Wallet state of a single hierarchy entity
///
/// `owner_type` and `parent` are fixed at onboarding. `balance` and `version`
/// change only when a posting commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub owner_type: OwnerType,

    /// Hierarchy foreign key; `None` only for admins
    pub parent: Option<AccountId>,

    /// Current balance, never negative after a committed operation
    pub balance: Decimal,

    /// Incremented on every committed mutation
    pub version: u64,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(id: AccountId, owner_type: OwnerType, parent: Option<AccountId>) -> Self {
        Account {
            id,
            owner_type,
            parent,
            balance: Decimal::ZERO,
            version: 0,
        }
    }
}
