//! [`Offer`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf, Money, Percent};
use derive_more::{Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{order, restaurant};

/// Promotional offer of a restaurant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Offer {
    /// ID of this [`Offer`].
    pub id: Id,

    /// ID of the restaurant this [`Offer`] belongs to.
    pub restaurant_id: restaurant::Id,

    /// [`Discount`] granted by this [`Offer`].
    pub discount: Discount,

    /// Minimal subtotal for this [`Offer`] to apply, if any.
    pub min_order_amount: Option<Money>,

    /// [`DateTime`] when this [`Offer`] starts, if limited.
    pub starts_at: Option<StartDateTime>,

    /// [`DateTime`] when this [`Offer`] expires, if limited.
    pub expires_at: Option<ExpirationDateTime>,

    /// Indicator whether this [`Offer`] is switched on by the restaurant.
    pub is_active: bool,

    /// Number of orders this [`Offer`] was applied to.
    pub usage_count: u32,

    /// [`DateTime`] when this [`Offer`] was created.
    pub created_at: CreationDateTime,
}

impl Offer {
    /// Checks whether this [`Offer`] applies to an order of the provided
    /// restaurant with the provided `subtotal` at the provided moment.
    ///
    /// [`Discount::BuyXGetY`] never applies, as its discount cannot be
    /// computed from order-level amounts.
    #[must_use]
    pub fn is_applicable(
        &self,
        restaurant_id: restaurant::Id,
        subtotal: Money,
        now: DateTime,
    ) -> bool {
        self.restaurant_id == restaurant_id
            && self.is_active
            && self.discount.is_computable()
            && now.is_within(self.starts_at, self.expires_at)
            && self.min_order_amount.map_or(true, |min| subtotal >= min)
    }

    /// Computes the discount this [`Offer`] grants for the provided
    /// `subtotal`.
    ///
    /// The result is always within `[0, subtotal]`.
    ///
    /// # Errors
    ///
    /// If the [`Discount`] of this [`Offer`] cannot be computed from an
    /// order-level `subtotal`.
    pub fn discount_for(&self, subtotal: Money) -> Result<Money, Unsupported> {
        let amount = match self.discount {
            Discount::Percent(pct) => pct.of(subtotal),
            Discount::Fixed(amount) => amount,
            Discount::Bundle {
                price,
                original_price,
            } => original_price.saturating_sub(price),
            Discount::BuyXGetY { .. } => {
                return Err(Unsupported {
                    offer_id: self.id,
                    kind: self.discount.kind(),
                })
            }
        };
        Ok(amount.round().clamp_to(subtotal))
    }
}

/// Filters the [`Offer`]s applicable to an order of the provided restaurant
/// with the provided `subtotal` at the provided moment.
#[must_use]
pub fn applicable(
    offers: impl IntoIterator<Item = Offer>,
    restaurant_id: restaurant::Id,
    subtotal: Money,
    now: DateTime,
) -> Vec<Offer> {
    offers
        .into_iter()
        .filter(|o| o.is_applicable(restaurant_id, subtotal, now))
        .collect()
}

/// ID of an [`Offer`].
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
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Discount granted by an [`Offer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Discount {
    /// Percentage of the subtotal.
    Percent(Percent),

    /// Fixed amount off the subtotal.
    Fixed(Money),

    /// Bundle sold for a `price` lower than its `original_price`.
    Bundle {
        /// Price of the bundle.
        price: Money,

        /// Price of the bundled items bought separately.
        original_price: Money,
    },

    /// Buying `buy` items gives `get` more for free.
    BuyXGetY {
        /// Number of items to buy.
        buy: u32,

        /// Number of free items.
        get: u32,
    },
}

impl Discount {
    /// Returns [`Kind`] of this [`Discount`].
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Percent(_) => Kind::Percent,
            Self::Fixed(_) => Kind::Fixed,
            Self::Bundle { .. } => Kind::Bundle,
            Self::BuyXGetY { .. } => Kind::BuyXGetY,
        }
    }

    /// Indicates whether this [`Discount`] can be computed out of an order
    /// subtotal.
    #[must_use]
    pub fn is_computable(&self) -> bool {
        !matches!(self, Self::BuyXGetY { .. })
    }

    /// Validates parameters of this [`Discount`].
    ///
    /// # Errors
    ///
    /// - If a bundle costs more than its items bought separately.
    /// - If a buy-X-get-Y quantity is zero.
    pub fn validate(&self) -> Result<(), Invalid> {
        match *self {
            Self::Percent(_) | Self::Fixed(_) => Ok(()),
            Self::Bundle {
                price,
                original_price,
            } => {
                if price > original_price {
                    return Err(Invalid::BundleOverpriced {
                        price,
                        original_price,
                    });
                }
                Ok(())
            }
            Self::BuyXGetY { buy, get } => {
                if buy == 0 || get == 0 {
                    return Err(Invalid::ZeroQuantity);
                }
                Ok(())
            }
        }
    }
}

define_kind! {
    #[doc = "Kind of a [`Discount`]."]
    enum Kind {
        #[doc = "[`Discount::Percent`]."]
        Percent = 1,

        #[doc = "[`Discount::Fixed`]."]
        Fixed = 2,

        #[doc = "[`Discount::Bundle`]."]
        Bundle = 3,

        #[doc = "[`Discount::BuyXGetY`]."]
        BuyXGetY = 4,
    }
}

/// Error of an [`Offer`] with parameters not making sense.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum Invalid {
    /// Bundle costs more than its items.
    #[display(
        "bundle `price` ({price}) exceeds its `original_price` \
         ({original_price})"
    )]
    BundleOverpriced {
        /// Price of the bundle.
        price: Money,

        /// Price of the bundled items bought separately.
        original_price: Money,
    },

    /// Buy-X-get-Y quantity is zero.
    #[display("buy-X-get-Y quantities must be positive")]
    ZeroQuantity,

    /// [`Offer`] expires before it starts.
    #[display("`Offer` expires before it starts")]
    InvertedWindow,
}

/// Error of computing a [`Discount`] not expressible at order level.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[display("`Offer(id: {offer_id})` of `{kind}` kind is not supported")]
pub struct Unsupported {
    /// ID of the [`Offer`].
    pub offer_id: Id,

    /// [`Kind`] of the [`Offer`]'s [`Discount`].
    pub kind: Kind,
}

/// Choice of an [`Offer`] made at checkout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Selection {
    /// Use the only applicable [`Offer`], if there is exactly one.
    #[default]
    Auto,

    /// Use the [`Offer`] with the provided ID.
    Chosen(Id),

    /// Use no [`Offer`].
    Declined,
}

impl Selection {
    /// Resolves this [`Selection`] against all the `offers` of the restaurant.
    ///
    /// # Errors
    ///
    /// If a [`Selection::Chosen`] [`Offer`] doesn't exist, doesn't apply or
    /// isn't supported.
    pub fn resolve(
        self,
        offers: &[Offer],
        restaurant_id: restaurant::Id,
        subtotal: Money,
        now: DateTime,
    ) -> Result<Option<Offer>, SelectionError> {
        match self {
            Self::Declined => Ok(None),
            Self::Auto => {
                let mut found = offers
                    .iter()
                    .filter(|o| o.is_applicable(restaurant_id, subtotal, now));
                Ok(match (found.next(), found.next()) {
                    (Some(offer), None) => Some(*offer),
                    _ => None,
                })
            }
            Self::Chosen(id) => {
                let offer = offers
                    .iter()
                    .find(|o| o.id == id)
                    .ok_or(SelectionError::NotExists(id))?;
                if !offer.discount.is_computable() {
                    return Err(SelectionError::Unsupported(Unsupported {
                        offer_id: id,
                        kind: offer.discount.kind(),
                    }));
                }
                if !offer.is_applicable(restaurant_id, subtotal, now) {
                    return Err(SelectionError::NotApplicable(id));
                }
                Ok(Some(*offer))
            }
        }
    }
}

/// Error of resolving a [`Selection`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum SelectionError {
    /// Chosen [`Offer`] doesn't exist for the restaurant.
    #[display("`Offer(id: {_0})` does not exist")]
    NotExists(#[error(not(source))] Id),

    /// Chosen [`Offer`] doesn't apply to the order.
    #[display("`Offer(id: {_0})` is not applicable")]
    NotApplicable(#[error(not(source))] Id),

    /// Chosen [`Offer`] is not supported.
    #[display("{_0}")]
    Unsupported(#[error(not(source))] Unsupported),
}

/// Record of an [`Offer`] applied to an order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Usage {
    /// ID of the applied [`Offer`].
    pub offer_id: Id,

    /// ID of the order the [`Offer`] was applied to.
    pub order_id: order::Id,
}

/// [`DateTime`] when an [`Offer`] starts.
pub type StartDateTime = DateTimeOf<(Offer, unit::Start)>;

/// [`DateTime`] when an [`Offer`] expires.
pub type ExpirationDateTime = DateTimeOf<(Offer, unit::Expiration)>;

/// [`DateTime`] when an [`Offer`] was created.
pub type CreationDateTime = DateTimeOf<(Offer, unit::Creation)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::{str::FromStr as _, time::Duration};

    use common::{DateTime, Money, Percent};

    use crate::domain::restaurant;

    use super::{
        applicable, Discount, Id, Invalid, Kind, Offer, Selection,
        SelectionError, Unsupported,
    };

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    /// Creates an active unbounded [`Offer`] of the provided restaurant.
    pub(crate) fn offer(
        restaurant_id: restaurant::Id,
        discount: Discount,
    ) -> Offer {
        Offer {
            id: Id::new(),
            restaurant_id,
            discount,
            min_order_amount: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
            usage_count: 0,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn min_order_amount_is_inclusive() {
        let rid = restaurant::Id::new();
        let mut o = offer(rid, Discount::Fixed(money("5")));
        o.min_order_amount = Some(money("50"));
        let now = DateTime::now();

        assert!(applicable([o], rid, money("49.99"), now).is_empty());
        assert_eq!(applicable([o], rid, money("50.00"), now), vec![o]);
    }

    #[test]
    fn filters_by_restaurant_activity_and_window() {
        let rid = restaurant::Id::new();
        let now = DateTime::now();
        let hour = Duration::from_secs(3600);

        let foreign = offer(restaurant::Id::new(), Discount::Fixed(money("1")));
        let mut inactive = offer(rid, Discount::Fixed(money("1")));
        inactive.is_active = false;
        let mut future = offer(rid, Discount::Fixed(money("1")));
        future.starts_at = Some((now + hour).coerce());
        let mut expired = offer(rid, Discount::Fixed(money("1")));
        expired.expires_at = Some((now - hour).coerce());
        let mut running = offer(rid, Discount::Fixed(money("1")));
        running.starts_at = Some((now - hour).coerce());
        running.expires_at = Some((now + hour).coerce());
        let bxgy = offer(rid, Discount::BuyXGetY { buy: 2, get: 1 });

        assert_eq!(
            applicable(
                [foreign, inactive, future, expired, running, bxgy],
                rid,
                money("10"),
                now,
            ),
            vec![running],
        );
    }

    #[test]
    fn discount_stays_within_subtotal() {
        let rid = restaurant::Id::new();
        let subtotal = money("30.00");

        let fixed = offer(rid, Discount::Fixed(money("45.00")));
        assert_eq!(fixed.discount_for(subtotal), Ok(subtotal));

        let pct = offer(
            rid,
            Discount::Percent(Percent::from_str("12.5").unwrap()),
        );
        assert_eq!(pct.discount_for(subtotal), Ok(money("3.75")));

        let bundle = offer(
            rid,
            Discount::Bundle {
                price: money("20"),
                original_price: money("26.50"),
            },
        );
        assert_eq!(bundle.discount_for(subtotal), Ok(money("6.50")));
        assert_eq!(bundle.discount_for(money("4")), Ok(money("4")));
    }

    #[test]
    fn buy_x_get_y_is_rejected() {
        let o = offer(
            restaurant::Id::new(),
            Discount::BuyXGetY { buy: 2, get: 1 },
        );

        assert_eq!(
            o.discount_for(money("10")),
            Err(Unsupported {
                offer_id: o.id,
                kind: Kind::BuyXGetY,
            }),
        );
    }

    #[test]
    fn auto_selection_needs_single_candidate() {
        let rid = restaurant::Id::new();
        let now = DateTime::now();
        let a = offer(rid, Discount::Fixed(money("1")));
        let b = offer(rid, Discount::Fixed(money("2")));

        assert_eq!(
            Selection::Auto.resolve(&[a], rid, money("10"), now),
            Ok(Some(a)),
        );
        assert_eq!(
            Selection::Auto.resolve(&[a, b], rid, money("10"), now),
            Ok(None),
        );
        assert_eq!(
            Selection::Chosen(b.id).resolve(&[a, b], rid, money("10"), now),
            Ok(Some(b)),
        );
        assert_eq!(
            Selection::Declined.resolve(&[a], rid, money("10"), now),
            Ok(None),
        );
    }

    #[test]
    fn chosen_selection_is_checked() {
        let rid = restaurant::Id::new();
        let now = DateTime::now();
        let mut limited = offer(rid, Discount::Fixed(money("1")));
        limited.min_order_amount = Some(money("100"));
        let bxgy = offer(rid, Discount::BuyXGetY { buy: 1, get: 1 });
        let missing = Id::new();

        assert_eq!(
            Selection::Chosen(missing).resolve(&[], rid, money("10"), now),
            Err(SelectionError::NotExists(missing)),
        );
        assert_eq!(
            Selection::Chosen(limited.id).resolve(
                &[limited],
                rid,
                money("10"),
                now,
            ),
            Err(SelectionError::NotApplicable(limited.id)),
        );
        assert!(matches!(
            Selection::Chosen(bxgy.id).resolve(&[bxgy], rid, money("10"), now),
            Err(SelectionError::Unsupported(_)),
        ));
    }

    #[test]
    fn validates_discount() {
        assert_eq!(
            Discount::Bundle {
                price: money("30"),
                original_price: money("25"),
            }
            .validate(),
            Err(Invalid::BundleOverpriced {
                price: money("30"),
                original_price: money("25"),
            }),
        );
        assert_eq!(
            Discount::BuyXGetY { buy: 0, get: 1 }.validate(),
            Err(Invalid::ZeroQuantity),
        );
        assert_eq!(Discount::Fixed(money("3")).validate(), Ok(()));
    }
}
