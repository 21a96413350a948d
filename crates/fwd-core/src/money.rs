//! # Money and Percentage Arithmetic
//!
//! Amounts and rates are [`Decimal`] from the wire to the `NUMERIC` columns,
//! so sums of cents stay exact at every magnitude. Every calculation goes
//! through the helpers here:
//!
//! - [`round_money`] rounds to [`MONEY_SCALE`] places, half away from zero.
//! - [`percent_of`] applies a percentage without overflowing.
//! - [`approx_gte`] compares against [`MONEY_EPSILON`], the tolerance of the
//!   "fully paid" check.
//! - [`check_magnitude`] / [`check_rate`] bound inputs at the boundary so
//!   no product can leave the 96-bit range.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationError;

/// Decimal places kept on every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Tolerance for "fully paid" comparisons (`0.000001`).
pub const MONEY_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Largest accepted magnitude for amounts, quantities and unit rates (`10^12`).
pub const MAX_MAGNITUDE: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Largest accepted magnitude for a percentage rate.
pub const MAX_RATE: Decimal = Decimal::from_parts(1_000, 0, 0, false, 0);

/// Round to [`MONEY_SCALE`] places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    let rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    // No "-0" in serialized output.
    if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    }
}

/// `base * pct / 100`, saturating at the representable range.
pub fn percent_of(base: Decimal, pct: Decimal) -> Decimal {
    base.saturating_mul(pct) / Decimal::ONE_HUNDRED
}

/// `a >= b` within [`MONEY_EPSILON`].
pub fn approx_gte(a: Decimal, b: Decimal) -> bool {
    a >= b.saturating_sub(MONEY_EPSILON)
}

/// Accept a value with `|value| <= MAX_MAGNITUDE`.
pub fn check_magnitude(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value.abs() <= MAX_MAGNITUDE {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            max: MAX_MAGNITUDE,
        })
    }
}

/// Accept a percentage with `|value| <= MAX_RATE`.
pub fn check_rate(field: &'static str, value: Decimal) -> Result<Decimal, ValidationError> {
    if value.abs() <= MAX_RATE {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            max: MAX_RATE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn constants_hold_their_values() {
        assert_eq!(MONEY_EPSILON, dec!(0.000001));
        assert_eq!(MAX_MAGNITUDE, dec!(1000000000000));
        assert_eq!(MAX_RATE, dec!(1000));
    }

    #[test]
    fn round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_money(dec!(10)), dec!(10));
        assert_eq!(round_money(dec!(0.004)), dec!(0));
    }

    #[test]
    fn round_money_exact_at_large_magnitudes() {
        assert_eq!(round_money(dec!(18000000000.315)), dec!(18000000000.32));
        assert_eq!(round_money(dec!(999999999999.995)), dec!(1000000000000.00));
    }

    #[test]
    fn round_money_never_negative_zero() {
        let r = round_money(dec!(-0.001));
        assert_eq!(r, Decimal::ZERO);
        assert!(r.is_sign_positive());
    }

    #[test]
    fn percent_of_basic() {
        assert_eq!(percent_of(dec!(200), dec!(10)), dec!(20));
        assert_eq!(percent_of(dec!(200), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percent_of(dec!(0.1), dec!(18)), dec!(0.018));
    }

    #[test]
    fn percent_of_saturates_instead_of_panicking() {
        let out = percent_of(Decimal::MAX, dec!(500));
        assert_eq!(out, Decimal::MAX / Decimal::ONE_HUNDRED);
    }

    #[test]
    fn approx_gte_tolerates_sub_epsilon_shortfall() {
        assert!(approx_gte(dec!(219.9999995), dec!(220)));
        assert!(!approx_gte(dec!(219.99), dec!(220)));
        assert!(approx_gte(dec!(220), dec!(220)));
    }

    #[test]
    fn bounds_reject_oversized_inputs() {
        assert!(check_magnitude("amount", dec!(1000000000000)).is_ok());
        assert!(check_magnitude("amount", dec!(-1000000000000)).is_ok());
        let err = check_magnitude("amount", dec!(1000000000000.01)).unwrap_err();
        assert!(err.to_string().contains("amount"));
        assert!(check_rate("taxRate", dec!(18)).is_ok());
        assert!(check_rate("taxRate", dec!(1000.5)).is_err());
    }

    fn cents() -> impl Strategy<Value = Decimal> {
        (-100_000_000_000_000i64..100_000_000_000_000i64).prop_map(|c| Decimal::new(c, 2))
    }

    proptest! {
        #[test]
        fn round_money_is_identity_on_cents(x in cents()) {
            prop_assert_eq!(round_money(x), x);
        }

        #[test]
        fn round_money_stays_within_half_cent(
            micro in -100_000_000_000_000_000i64..100_000_000_000_000_000i64,
        ) {
            let x = Decimal::new(micro, 6);
            let r = round_money(x);
            prop_assert_eq!(round_money(r), r);
            prop_assert!((r - x).abs() <= dec!(0.005));
        }

        #[test]
        fn percent_matches_integer_cent_math(c in 0i64..100_000_000_000_000, pct in 0i64..100) {
            let exact = round_money(Decimal::new(c * pct, 4));
            prop_assert_eq!(round_money(percent_of(Decimal::new(c, 2), Decimal::from(pct))), exact);
        }
    }
}
