//! [`Percent`]-related definitions.

use std::str::FromStr;

use derive_more::Display;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;

use crate::Money;

/// Percentage in the `[0, 100]` range.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Percent(Decimal);

impl Percent {
    /// Creates a new [`Percent`] by checking the provided value is in the
    /// `[0, 100]` range.
    #[must_use]
    pub fn new(val: Decimal) -> Option<Self> {
        (Decimal::ZERO..=Decimal::ONE_HUNDRED)
            .contains(&val)
            .then_some(Self(val))
    }

    /// Returns the underlying value of this [`Percent`].
    #[must_use]
    pub fn value(self) -> Decimal {
        self.0
    }

    /// Calculates this [`Percent`] of the provided `amount`, rounded to cents.
    ///
    /// Never exceeds the `amount` itself.
    #[must_use]
    pub fn of(self, amount: Money) -> Money {
        let share = amount
            .amount()
            .checked_mul(self.0 / Decimal::ONE_HUNDRED)
            .unwrap_or(amount.amount());
        Money::new(share)
            .map_or(Money::ZERO, Money::round)
            .clamp_to(amount)
    }
}

impl FromStr for Percent {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s)
            .ok()
            .and_then(Self::new)
            .ok_or("invalid percent value")
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use crate::Money;

    use super::Percent;

    #[test]
    fn from_str() {
        assert!(Percent::from_str("0").is_ok());
        assert!(Percent::from_str("12.5").is_ok());
        assert!(Percent::from_str("100").is_ok());

        assert!(Percent::from_str("-1").is_err());
        assert!(Percent::from_str("100.01").is_err());
        assert!(Percent::from_str("ten").is_err());
    }

    #[test]
    fn of_amount() {
        let amount = Money::from_str("80.00").unwrap();

        assert_eq!(
            Percent::from_str("15").unwrap().of(amount),
            Money::from_str("12").unwrap(),
        );
        assert_eq!(
            Percent::from_str("100").unwrap().of(amount),
            amount,
        );
        assert_eq!(Percent::from_str("0").unwrap().of(amount), Money::ZERO);
        assert_eq!(
            Percent::from_str("33.333").unwrap().of(
                Money::from_str("10").unwrap(),
            ),
            Money::from_str("3.33").unwrap(),
        );
    }

    #[test]
    fn of_largest_amount() {
        assert_eq!(Percent::from_str("100").unwrap().of(Money::MAX), Money::MAX);
        assert!(Percent::from_str("50").unwrap().of(Money::MAX) < Money::MAX);
    }
}
