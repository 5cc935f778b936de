//! Commission splitting
//!
//! Pure arithmetic, no I/O. The retailer, distributor and master distributor
//! shares are rounded half-up to two decimals; the admin share is whatever is
//! left, so the four shares always add up to the total exactly.

use crate::types::money::{round_money, validate_commission};
use crate::types::{CommissionSplit, CommissionTable, LedgerError};
use rust_decimal::Decimal;

/// Split `total` across the hierarchy according to `table`
///
/// # Errors
///
/// * `AmountNonPositive` / `InvalidAmountPrecision` - `total` is negative or finer than 0.01
/// * `InvalidCommissionTable` - `table` fails validation
/// * `CommissionOverallocated` - rounding pushed the non-admin shares above `total`
pub fn split_commission(
    total: Decimal,
    table: &CommissionTable,
) -> Result<CommissionSplit, LedgerError> {
    validate_commission(total)?;
    table.validate()?;

    let share = |pct: Decimal| round_money(total * pct / Decimal::ONE_HUNDRED);

    let retailer_share = share(table.retailer);
    let distributor_share = share(table.distributor);
    let master_distributor_share = share(table.master_distributor);

    let allocated = retailer_share + distributor_share + master_distributor_share;
    let admin_share = total - allocated;
    if admin_share < Decimal::ZERO {
        return Err(LedgerError::commission_overallocated(total, allocated));
    }

    Ok(CommissionSplit {
        total,
        admin_share,
        master_distributor_share,
        distributor_share,
        retailer_share,
    })
}
