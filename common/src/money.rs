//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::{Decimal, RoundingStrategy};

/// Non-negative amount of money in the marketplace currency.
///
/// Arithmetic never produces a negative [`Money`]: subtraction saturates at
/// [`Money::ZERO`], so any "debt" must be expressed as a plain [`Decimal`].
/// Addition and multiplication are checked, as [`Decimal`] panics on
/// overflow.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(try_from = "Decimal", into = "Decimal")
)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest representable amount.
    pub const MAX: Self = Self(Decimal::MAX);

    /// Number of fractional digits (cents) amounts are rounded to.
    pub const SCALE: u32 = 2;

    /// Creates a new [`Money`] out of the provided `amount`.
    ///
    /// [`None`] is returned if the `amount` is negative.
    #[must_use]
    pub fn new(amount: Decimal) -> Option<Self> {
        (amount >= Decimal::ZERO).then_some(Self(amount))
    }

    /// Creates a new [`Money`] out of the provided number of cents.
    #[must_use]
    pub fn from_cents(cents: u32) -> Self {
        Self(Decimal::new(i64::from(cents), Self::SCALE))
    }

    /// Returns the underlying amount.
    #[must_use]
    pub fn amount(self) -> Decimal {
        self.0
    }

    /// Indicates whether this [`Money`] is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Rounds this [`Money`] to whole cents, half away from zero.
    #[must_use]
    pub fn round(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(
                    Self::SCALE,
                    RoundingStrategy::MidpointAwayFromZero,
                ),
        )
    }

    /// Adds `rhs`, returning [`None`] on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Adds `rhs`, stopping at [`Money::MAX`].
    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        self.checked_add(rhs).unwrap_or(Self::MAX)
    }

    /// Multiplies by `rhs`, returning [`None`] on overflow.
    #[must_use]
    pub fn checked_mul(self, rhs: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(rhs)).map(Self)
    }

    /// Sums the provided amounts, returning [`None`] on overflow.
    #[must_use]
    pub fn checked_sum<I>(iter: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        iter.into_iter()
            .try_fold(Self::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Subtracts `rhs`, stopping at [`Money::ZERO`].
    #[must_use]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0.min(self.0))
    }

    /// Subtracts `rhs`, returning [`None`] if the result would be negative.
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        Self::new(self.0 - rhs.0)
    }

    /// Clamps this [`Money`] into the `[ZERO, max]` range.
    #[must_use]
    pub fn clamp_to(self, max: Self) -> Self {
        self.min(max)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| "invalid amount")?;
        Self::new(amount).ok_or("negative amount")
    }
}

impl TryFrom<Decimal> for Money {
    type Error = &'static str;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount).ok_or("negative amount")
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}
