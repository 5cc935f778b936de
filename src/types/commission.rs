//! Commission tables and splits

use super::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Percentage of a payout commission owed to each tier
///
/// The admin percentage is informational: the admin share always absorbs the
/// rounding remainder, so it ends up as whatever the other three tiers leave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionTable {
    pub retailer: Decimal,
    pub admin: Decimal,
    pub distributor: Decimal,
    pub master_distributor: Decimal,
}

impl Default for CommissionTable {
    /// 50% retailer, 29.17% admin, 16.67% distributor, 4.17% master distributor
    fn default() -> Self {
        Self {
            retailer: Decimal::new(50, 0),
            admin: Decimal::new(2917, 2),
            distributor: Decimal::new(1667, 2),
            master_distributor: Decimal::new(417, 2),
        }
    }
}

impl CommissionTable {
    /// Build a validated table
    pub fn new(
        retailer: Decimal,
        admin: Decimal,
        distributor: Decimal,
        master_distributor: Decimal,
    ) -> Result<Self, LedgerError> {
        let table = Self {
            retailer,
            admin,
            distributor,
            master_distributor,
        };
        table.validate()?;
        Ok(table)
    }

    /// Every percentage must lie in [0, 100] and the non-admin tiers may not claim more than 100
    pub fn validate(&self) -> Result<(), LedgerError> {
        let hundred = Decimal::ONE_HUNDRED;
        for (tier, pct) in [
            ("retailer", self.retailer),
            ("admin", self.admin),
            ("distributor", self.distributor),
            ("master_distributor", self.master_distributor),
        ] {
            if pct < Decimal::ZERO || pct > hundred {
                return Err(LedgerError::invalid_commission_table(format!(
                    "{} percentage {} is outside 0..=100",
                    tier, pct
                )));
            }
        }

        let non_admin = self.retailer + self.distributor + self.master_distributor;
        if non_admin > hundred {
            return Err(LedgerError::invalid_commission_table(format!(
                "retailer, distributor and master distributor claim {}%",
                non_admin
            )));
        }
        Ok(())
    }
}

impl FromStr for CommissionTable {
    type Err = LedgerError;

    /// Parse `retailer/admin/distributor/master_distributor`, e.g. `50/29.17/16.67/4.17`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(LedgerError::invalid_commission_table(format!(
                "expected 4 percentages separated by '/', got '{}'",
                s
            )));
        }

        let mut values = [Decimal::ZERO; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = Decimal::from_str(part).map_err(|_| {
                LedgerError::invalid_commission_table(format!("'{}' is not a percentage", part))
            })?;
        }

        Self::new(values[0], values[1], values[2], values[3])
    }
}

/// A commission divided across the four tiers
///
/// The four shares always sum exactly to `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    pub total: Decimal,
    pub admin_share: Decimal,
    pub master_distributor_share: Decimal,
    pub distributor_share: Decimal,
    pub retailer_share: Decimal,
}

impl CommissionSplit {
    pub fn sum(&self) -> Decimal {
        self.admin_share + self.master_distributor_share + self.distributor_share + self.retailer_share
    }
}
