//! Monetary [`Totals`] of an [`Order`].

use common::Money;
use derive_more::{Display, Error as StdError, From};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[cfg(doc)]
use crate::domain::Order;
use crate::domain::{offer, restaurant::Attribution, Cart, Offer};

/// Per-item rates every [`Order`] is charged and distributed by.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, SmartDefault,
)]
#[serde(default)]
pub struct FeeSchedule {
    /// Surcharge already included into every displayed item price.
    #[default(Money::from_cents(175))]
    pub service_surcharge_per_item: Money,

    /// Fee the platform charges per ordered item.
    #[default(Money::from_cents(100))]
    pub platform_rate_per_item: Money,

    /// Commission a referral supervisor earns per ordered item.
    ///
    /// Kept by the platform for restaurants without a supervisor.
    #[default(Money::from_cents(75))]
    pub supervisor_rate_per_item: Money,

    /// Additional [`AppFee`] for expensive items, if enabled.
    #[default(None)]
    pub app_fee: Option<AppFee>,
}

/// Additional platform fee charged for every item priced at or above the
/// `threshold`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppFee {
    /// Minimal item price the fee is charged for.
    pub threshold: Money,

    /// Fee charged per such item.
    pub per_item: Money,
}

/// Shares of an [`Order`] owed to its parties.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Earnings {
    /// Share of the restaurant.
    pub restaurant: Money,

    /// Share of the platform.
    pub platform: Money,

    /// Commission of the referral supervisor.
    pub supervisor: Money,
}

/// Authoritative monetary totals of an [`Order`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Totals {
    /// Sum of the displayed prices of all the items.
    pub subtotal: Money,

    /// [`Totals::subtotal`] without the service surcharge.
    pub original_subtotal: Money,

    /// Number of ordered items.
    pub item_count: u32,

    /// Fee charged by the platform.
    pub platform_fee: Money,

    /// Discount of the applied [`Offer`], within `[0, subtotal]`.
    pub discount: Money,

    /// Amount due before any delivery fee.
    pub total: Money,

    /// [`Earnings`] of the parties.
    pub earnings: Earnings,
}

impl Totals {
    /// Computes [`Totals`] of the provided [`Cart`] with an optional
    /// [`Offer`] applied.
    ///
    /// # Errors
    ///
    /// - If the [`Offer`]'s discount cannot be computed.
    /// - If any of the amounts overflows.
    pub fn compute(
        cart: &Cart,
        offer: Option<&Offer>,
        schedule: &FeeSchedule,
        attribution: &Attribution,
    ) -> Result<Self, Error> {
        let subtotal = cart.subtotal();
        let item_count = cart.item_count();
        let per_item = |rate: Money| {
            rate.checked_mul(item_count).ok_or(Error::AmountOverflow)
        };

        let original_subtotal = subtotal
            .saturating_sub(per_item(schedule.service_surcharge_per_item)?);

        let app_fee = match schedule.app_fee {
            None => Money::ZERO,
            Some(fee) => Money::checked_sum(
                cart.lines()
                    .iter()
                    .filter(|l| l.unit_price >= fee.threshold)
                    .map(|l| fee.per_item.checked_mul(l.quantity.get()))
                    .collect::<Option<Vec<_>>>()
                    .ok_or(Error::AmountOverflow)?,
            )
            .ok_or(Error::AmountOverflow)?,
        };
        let platform_fee = per_item(schedule.platform_rate_per_item)?
            .checked_add(app_fee)
            .ok_or(Error::AmountOverflow)?;

        let discount = offer
            .map(|o| o.discount_for(subtotal))
            .transpose()?
            .unwrap_or(Money::ZERO)
            .clamp_to(subtotal);

        let supervisor_share = per_item(schedule.supervisor_rate_per_item)?;
        let restaurant = original_subtotal.saturating_sub(discount);
        let earnings = if attribution.supervisor_id().is_some() {
            Earnings {
                restaurant,
                platform: platform_fee,
                supervisor: supervisor_share,
            }
        } else {
            Earnings {
                restaurant,
                platform: platform_fee
                    .checked_add(supervisor_share)
                    .ok_or(Error::AmountOverflow)?,
                supervisor: Money::ZERO,
            }
        };

        let total = subtotal
            .checked_add(platform_fee)
            .ok_or(Error::AmountOverflow)?
            .saturating_sub(discount);

        Ok(Self {
            subtotal,
            original_subtotal,
            item_count,
            platform_fee,
            discount,
            total,
            earnings,
        })
    }
}

/// Error of computing [`Totals`].
#[derive(Clone, Copy, Debug, Display, Eq, From, PartialEq, StdError)]
pub enum Error {
    /// [`Offer`]'s discount cannot be computed.
    #[display("{_0}")]
    Unsupported(offer::Unsupported),

    /// Amounts exceed the representable range.
    #[display("`Order` amounts overflow")]
    #[from(ignore)]
    AmountOverflow,
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{DateTime, Money, Percent};

    use crate::domain::{
        cart::spec::line,
        offer::{self, spec::offer},
        restaurant::{self, Attribution, Referrer},
        user, Cart,
    };

    use super::{AppFee, Earnings, Error, FeeSchedule, Totals};

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn attribution(referrer: Option<Referrer>) -> Attribution {
        Attribution {
            restaurant_id: restaurant::Id::new(),
            referrer,
            registered_at: DateTime::now().coerce(),
        }
    }

    /// [`Cart`] of 5 items worth `80.00`.
    fn cart(rid: restaurant::Id) -> Cart {
        Cart::new(vec![line(rid, "20.00", 3), line(rid, "10.00", 2)]).unwrap()
    }

    #[test]
    fn supervisor_referred() {
        let rid = restaurant::Id::new();
        let totals = Totals::compute(
            &cart(rid),
            None,
            &FeeSchedule::default(),
            &attribution(Some(Referrer::Supervisor(user::Id::new()))),
        )
        .unwrap();

        assert_eq!(totals.subtotal, money("80.00"));
        assert_eq!(totals.item_count, 5);
        assert_eq!(totals.platform_fee, money("5.00"));
        assert_eq!(totals.discount, Money::ZERO);
        assert_eq!(totals.total, money("85.00"));
        assert_eq!(
            totals.earnings,
            Earnings {
                restaurant: money("71.25"),
                platform: money("5.00"),
                supervisor: money("3.75"),
            },
        );
    }

    #[test]
    fn platform_keeps_unreferred_commission() {
        let rid = restaurant::Id::new();
        for referrer in
            [None, Some(Referrer::PlatformOperator(user::Id::new()))]
        {
            let totals = Totals::compute(
                &cart(rid),
                None,
                &FeeSchedule::default(),
                &attribution(referrer),
            )
            .unwrap();

            assert_eq!(totals.platform_fee, money("5.00"));
            assert_eq!(totals.earnings.supervisor, Money::ZERO);
            assert_eq!(totals.earnings.platform, money("8.75"));
            assert_eq!(totals.earnings.restaurant, money("71.25"));
        }
    }

    #[test]
    fn total_accounts_discount() {
        let rid = restaurant::Id::new();
        let pct = offer(
            rid,
            offer::Discount::Percent(Percent::from_str("10").unwrap()),
        );
        let totals = Totals::compute(
            &cart(rid),
            Some(&pct),
            &FeeSchedule::default(),
            &attribution(None),
        )
        .unwrap();

        assert_eq!(totals.discount, money("8.00"));
        assert_eq!(
            totals.total.amount(),
            totals.subtotal.amount() + totals.platform_fee.amount()
                - totals.discount.amount(),
        );
        assert_eq!(totals.earnings.restaurant, money("63.25"));
    }

    #[test]
    fn oversized_fixed_discount_clamps_to_subtotal() {
        let rid = restaurant::Id::new();
        let fixed = offer(rid, offer::Discount::Fixed(money("500")));
        let totals = Totals::compute(
            &cart(rid),
            Some(&fixed),
            &FeeSchedule::default(),
            &attribution(None),
        )
        .unwrap();

        assert_eq!(totals.discount, totals.subtotal);
        assert_eq!(totals.total, totals.platform_fee);
        assert_eq!(totals.earnings.restaurant, Money::ZERO);
    }

    #[test]
    fn app_fee_applies_to_expensive_items_only() {
        let rid = restaurant::Id::new();
        let schedule = FeeSchedule {
            app_fee: Some(AppFee {
                threshold: money("15.00"),
                per_item: money("0.50"),
            }),
            ..FeeSchedule::default()
        };
        let totals =
            Totals::compute(&cart(rid), None, &schedule, &attribution(None))
                .unwrap();

        assert_eq!(totals.platform_fee, money("6.50"));
        assert_eq!(totals.total, money("86.50"));
        assert_eq!(totals.earnings.platform, money("10.25"));
    }

    #[test]
    fn rejects_unsupported_offer() {
        let rid = restaurant::Id::new();
        let bxgy = offer(rid, offer::Discount::BuyXGetY { buy: 1, get: 1 });

        assert!(Totals::compute(
            &cart(rid),
            Some(&bxgy),
            &FeeSchedule::default(),
            &attribution(None),
        )
        .is_err());
    }

    #[test]
    fn rejects_overflowing_total() {
        let rid = restaurant::Id::new();
        let mut expensive = line(rid, "1", 1);
        expensive.unit_price = Money::MAX;
        let cart = Cart::new(vec![expensive]).unwrap();

        assert_eq!(
            Totals::compute(
                &cart,
                None,
                &FeeSchedule::default(),
                &attribution(None),
            ),
            Err(Error::AmountOverflow),
        );
    }
}
