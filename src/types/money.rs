//! Fixed-point money helpers
//!
//! Amounts are `rust_decimal::Decimal` everywhere. Wallet money carries at most
//! [`MONEY_SCALE`] fractional digits; anything finer is rejected instead of being
//! rounded, so every committed balance stays exactly representable.

use super::account::AccountId;
use super::error::LedgerError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits carried by wallet money
pub const MONEY_SCALE: u32 = 2;

/// Validate an amount that moves between wallets: strictly positive, at most two decimals
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::amount_non_positive(amount));
    }
    check_scale(amount)
}

/// Validate a commission: zero is allowed, negative is not
pub fn validate_commission(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::amount_non_positive(amount));
    }
    check_scale(amount)
}

fn check_scale(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LedgerError::invalid_amount_precision(amount));
    }
    Ok(amount)
}

/// Round half-up (away from zero on a tie) to two decimals
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `a + b`, reporting overflow against the account being credited
pub fn checked_add(a: Decimal, b: Decimal, account: AccountId) -> Result<Decimal, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow("credit", account))
}
