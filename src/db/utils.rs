use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::StoreError;

// cents per display unit
const MINOR_UNIT_SCALE: u32 = 2;

/// Converts a display amount (e.g. `100.00`) into minor units (`10000`).
///
/// Returns `None` for amounts with sub-cent precision or that overflow `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let normalized = amount.normalize();
    if normalized.scale() > MINOR_UNIT_SCALE {
        return None;
    }
    normalized
        .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))?
        .to_i64()
}

pub fn to_display_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// Maps a failed insert onto the store taxonomy, surfacing unique-constraint
/// collisions through `on_conflict`.
pub fn map_insert_error(err: sqlx::Error, on_conflict: impl FnOnce() -> StoreError) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => on_conflict(),
        _ => StoreError::Database(err),
    }
}
