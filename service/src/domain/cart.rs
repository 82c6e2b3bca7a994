//! [`Cart`] definitions.

use std::num::NonZeroU32;

use common::Money;
use derive_more::{Display, Error as StdError, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::restaurant;

/// ID of a catalog item.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random [`ItemId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Positive quantity of a [`Line`].
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Creates a new [`Quantity`], if the provided value is positive.
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Returns the underlying value of this [`Quantity`].
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Single line of a [`Cart`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Line {
    /// ID of the ordered catalog item.
    pub item_id: ItemId,

    /// ID of the restaurant selling the item.
    pub restaurant_id: restaurant::Id,

    /// Displayed price of a single item, with the per-item service surcharge
    /// already included.
    pub unit_price: Money,

    /// Number of ordered items.
    pub quantity: Quantity,
}

impl Line {
    /// Returns the price of this [`Line`], unless it overflows.
    #[must_use]
    pub fn amount(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity.get())
    }
}

/// Non-empty collection of [`Line`]s, all from a single restaurant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cart {
    /// ID of the restaurant all the [`Line`]s belong to.
    restaurant_id: restaurant::Id,

    /// [`Line`]s of this [`Cart`].
    lines: Vec<Line>,

    /// Total number of items in the [`Line`]s.
    item_count: u32,

    /// Sum of [`Line::amount`]s.
    subtotal: Money,
}

impl Cart {
    /// Validates the provided [`Line`]s into a [`Cart`].
    ///
    /// # Errors
    ///
    /// - If no [`Line`]s are provided.
    /// - If [`Line`]s belong to different restaurants.
    /// - If the item count or the subtotal overflows.
    pub fn new(lines: Vec<Line>) -> Result<Self, Error> {
        let restaurant_id =
            lines.first().ok_or(Error::Empty)?.restaurant_id;
        if let Some(line) =
            lines.iter().find(|l| l.restaurant_id != restaurant_id)
        {
            return Err(Error::MixedRestaurants {
                expected: restaurant_id,
                found: line.restaurant_id,
            });
        }
        let item_count = lines
            .iter()
            .try_fold(0_u32, |acc, l| acc.checked_add(l.quantity.get()))
            .ok_or(Error::AmountOverflow)?;
        let subtotal = lines
            .iter()
            .map(Line::amount)
            .try_fold(Money::ZERO, |acc, a| acc.checked_add(a?))
            .ok_or(Error::AmountOverflow)?;
        Ok(Self {
            restaurant_id,
            lines,
            item_count,
            subtotal,
        })
    }

    /// Returns ID of the restaurant this [`Cart`] is ordered from.
    #[must_use]
    pub fn restaurant_id(&self) -> restaurant::Id {
        self.restaurant_id
    }

    /// Returns [`Line`]s of this [`Cart`].
    #[must_use]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Consumes this [`Cart`] returning its [`Line`]s.
    #[must_use]
    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }

    /// Returns the total number of items in this [`Cart`].
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Returns the sum of [`Line::amount`]s.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }
}

/// Error of validating a [`Cart`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum Error {
    /// [`Cart`] has no [`Line`]s.
    #[display("`Cart` is empty")]
    Empty,

    /// [`Cart`] contains items of several restaurants.
    #[display(
        "`Cart` mixes items of `Restaurant(id: {expected})` and \
         `Restaurant(id: {found})`"
    )]
    MixedRestaurants {
        /// Restaurant of the first [`Line`].
        expected: restaurant::Id,

        /// Restaurant of the offending [`Line`].
        found: restaurant::Id,
    },

    /// [`Cart`] amounts exceed the representable range.
    #[display("`Cart` amounts overflow")]
    AmountOverflow,
}

#[cfg(test)]
pub(crate) mod spec {
    use std::str::FromStr as _;

    use common::Money;
    use rust_decimal::Decimal;

    use crate::domain::restaurant;

    use super::{Cart, Error, ItemId, Line, Quantity};

    /// Creates a [`Line`] of the provided restaurant.
    pub(crate) fn line(
        restaurant_id: restaurant::Id,
        price: &str,
        quantity: u32,
    ) -> Line {
        Line {
            item_id: ItemId::new(),
            restaurant_id,
            unit_price: Money::from_str(price).unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[test]
    fn sums_lines() {
        let rid = restaurant::Id::new();
        let cart =
            Cart::new(vec![line(rid, "20.00", 3), line(rid, "10.00", 2)])
                .unwrap();

        assert_eq!(cart.restaurant_id(), rid);
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.subtotal(), Money::from_str("80.00").unwrap());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Cart::new(vec![]), Err(Error::Empty));
    }

    #[test]
    fn rejects_mixed_restaurants() {
        let (a, b) = (restaurant::Id::new(), restaurant::Id::new());

        assert_eq!(
            Cart::new(vec![line(a, "1", 1), line(b, "1", 1)]),
            Err(Error::MixedRestaurants {
                expected: a,
                found: b,
            }),
        );
    }

    #[test]
    fn rejects_overflowing_amounts() {
        let rid = restaurant::Id::new();
        let mut huge = line(rid, "1", 3);
        huge.unit_price = Money::new(Decimal::MAX / Decimal::TWO).unwrap();
        assert_eq!(Cart::new(vec![huge]), Err(Error::AmountOverflow));

        let mut many = line(rid, "1", 1);
        many.quantity = Quantity::new(u32::MAX).unwrap();
        assert_eq!(
            Cart::new(vec![many, line(rid, "1", 1)]),
            Err(Error::AmountOverflow),
        );

        huge.quantity = Quantity::new(1).unwrap();
        assert_eq!(
            Cart::new(vec![huge, huge, huge]),
            Err(Error::AmountOverflow),
        );
    }

    #[test]
    fn quantity_is_positive() {
        assert!(Quantity::new(0).is_none());
        assert_eq!(Quantity::new(3).map(Quantity::get), Some(3));
    }
}
