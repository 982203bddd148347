//! Advance/remaining amount policy.
//!
//! Every place that derives one amount from another goes through this
//! module so the split can be audited or replaced in one spot.

use rust_decimal::Decimal;

use crate::error::OrderingError;

/// Largest amount a `NUMERIC(12,2)` money column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Money values carry at most two decimal places.
pub const AMOUNT_SCALE: u32 = 2;

/// Derive the full order total from the advance amount submitted by the
/// client.
///
/// The client submits the 50% advance and the total is taken to be twice
/// that. The total is therefore client-controlled; callers that need a
/// server-side price must compute it from menu prices instead.
pub fn total_from_advance(advance: Decimal) -> Result<Decimal, OrderingError> {
    advance
        .checked_mul(Decimal::TWO)
        .ok_or_else(|| OrderingError::validation("amount", "max"))
}

/// Whether `amount` fits a money column: non-negative, at most two decimal
/// places and no larger than [`MAX_AMOUNT`].
pub fn is_storable_amount(amount: Decimal) -> bool {
    !amount.is_sign_negative() && amount.scale() <= AMOUNT_SCALE && amount <= MAX_AMOUNT
}

/// Online advance share of `total`.
pub fn advance_portion(total: Decimal) -> Decimal {
    total / Decimal::TWO
}

/// Share of `total` settled at the restaurant.
pub fn remaining_portion(total: Decimal) -> Decimal {
    total - advance_portion(total)
}
