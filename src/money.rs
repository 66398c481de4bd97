//! Conversions between decimal amounts and the integer minor units (cents)
//! stored in the database.
//!
//! Balances are adjusted with integer arithmetic in SQL, so money never
//! passes through a binary float.

use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::Error;

/// The number of decimal places kept for monetary amounts.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Convert `amount` to cents.
///
/// # Errors
/// Returns [Error::ValidationFailed] if `amount` has more than two decimal
/// places or does not fit in an `i64` number of cents.
pub fn to_cents(amount: Decimal) -> Result<i64, Error> {
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(Error::ValidationFailed(format!(
            "{amount} has more than {MINOR_UNIT_SCALE} decimal places"
        )));
    }

    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| Error::ValidationFailed(format!("{amount} is out of range")))
}

/// Convert `cents` to a decimal amount with two decimal places.
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, MINOR_UNIT_SCALE)
}
