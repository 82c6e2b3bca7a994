//! [`Order`] definitions.

pub mod lifecycle;
pub mod totals;

use common::{define_kind, unit, DateTime, DateTimeOf, Money};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{cart, offer, restaurant, user, Cart};

pub use self::{
    lifecycle::{Actor, Role, TransitionError},
    totals::{AppFee, Earnings, FeeSchedule, Totals},
};

/// Order placed by a customer.
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    /// ID of this [`Order`].
    ///
    /// Generated by the customer's client, so retried checkouts resolve to
    /// the same [`Order`].
    pub id: Id,

    /// ID of the customer who placed this [`Order`].
    pub customer_id: user::Id,

    /// ID of the restaurant fulfilling this [`Order`].
    pub restaurant_id: restaurant::Id,

    /// Ordered [`cart::Line`]s.
    pub lines: Vec<cart::Line>,

    /// Sum of the ordered [`cart::Line`]s.
    pub subtotal: Money,

    /// Fee charged by the platform.
    pub platform_fee: Money,

    /// Discount granted by the applied [`offer::Offer`].
    pub discount: Money,

    /// ID of the applied [`offer::Offer`], if any.
    pub applied_offer_id: Option<offer::Id>,

    /// [`Payment`] of this [`Order`].
    pub payment: Payment,

    /// [`Delivery`] of this [`Order`].
    pub delivery: Delivery,

    /// [`Earnings`] distributed by this [`Order`].
    pub earnings: Earnings,

    /// Current [`Status`] of this [`Order`].
    pub status: Status,

    /// Delivery fee, zero until set.
    pub delivery_fee: Money,

    /// [`Role`] of the actor who set the [`Order::delivery_fee`], if set.
    pub delivery_fee_set_by: Option<Role>,

    /// [`DateTime`] when the [`Order::delivery_fee`] was set, if set.
    pub delivery_fee_set_at: Option<DeliveryFeeDateTime>,

    /// ID of the courier who claimed this [`Order`], if any.
    pub courier_id: Option<user::Id>,

    /// Amount due for this [`Order`].
    pub total: Money,

    /// [`Version`] of this [`Order`].
    pub version: Version,

    /// [`DateTime`] when this [`Order`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Order`] was modified last time.
    pub updated_at: ModificationDateTime,
}

impl Order {
    /// Places a new [`Status::Pending`] [`Order`] out of the provided
    /// [`Draft`] and its [`Totals`].
    #[must_use]
    pub fn place(
        draft: Draft,
        totals: &Totals,
        now: DateTime,
    ) -> Self {
        let Draft {
            id,
            customer_id,
            cart,
            payment,
            delivery,
            applied_offer_id,
        } = draft;

        Self {
            id,
            customer_id,
            restaurant_id: cart.restaurant_id(),
            lines: cart.into_lines(),
            subtotal: totals.subtotal,
            platform_fee: totals.platform_fee,
            discount: totals.discount,
            applied_offer_id,
            payment,
            delivery,
            earnings: totals.earnings,
            status: Status::Pending,
            delivery_fee: Money::ZERO,
            delivery_fee_set_by: None,
            delivery_fee_set_at: None,
            courier_id: None,
            total: totals.total,
            version: Version::INITIAL,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        }
    }
}

/// Validated input for placing an [`Order`].
#[derive(Clone, Debug)]
pub struct Draft {
    /// ID of the [`Order`] to place.
    pub id: Id,

    /// ID of the customer placing the [`Order`].
    pub customer_id: user::Id,

    /// Ordered [`Cart`].
    pub cart: Cart,

    /// [`Payment`] of the [`Order`].
    pub payment: Payment,

    /// [`Delivery`] of the [`Order`].
    pub delivery: Delivery,

    /// ID of the [`offer::Offer`] applied to the [`Order`], if any.
    pub applied_offer_id: Option<offer::Id>,
}

/// ID of an [`Order`].
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

/// Revision of an [`Order`], increased by every modification.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Version(i32);

impl Version {
    /// [`Version`] of a just placed [`Order`].
    pub const INITIAL: Self = Self(1);

    /// Returns the [`Version`] following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

define_kind! {
    #[doc = "Status of an [`Order`]."]
    enum Status {
        #[doc = "Placed, awaiting the restaurant."]
        Pending = 1,

        #[doc = "Accepted by the restaurant."]
        Accepted = 2,

        #[doc = "Being prepared by the restaurant."]
        Preparing = 3,

        #[doc = "Ready for a pickup."]
        Ready = 4,

        #[doc = "Claimed by a courier and on its way."]
        OutForDelivery = 5,

        #[doc = "Delivered to the customer."]
        Delivered = 6,

        #[doc = "Cancelled."]
        Cancelled = 7,
    }
}

impl Status {
    /// Indicates whether no transition is possible out of this [`Status`].
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Way an [`Order`] is paid.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Payment {
    /// Paid in cash to the courier or at the counter.
    OnDelivery,

    /// Debited from the customer's stored balance.
    Balance,

    /// Captured by the external payment processor beforehand.
    ExternalCapture(CaptureReceipt),
}

impl Payment {
    /// Constructs a [`Payment`] out of its parts.
    ///
    /// # Errors
    ///
    /// If an [`PaymentMethod::ExternalCapture`] comes without a
    /// [`CaptureReceipt`].
    pub fn from_parts(
        method: PaymentMethod,
        receipt: Option<CaptureReceipt>,
    ) -> Result<Self, PaymentNotCaptured> {
        Ok(match method {
            PaymentMethod::OnDelivery => Self::OnDelivery,
            PaymentMethod::Balance => Self::Balance,
            PaymentMethod::ExternalCapture => {
                Self::ExternalCapture(receipt.ok_or(PaymentNotCaptured)?)
            }
        })
    }

    /// Returns [`PaymentMethod`] of this [`Payment`].
    #[must_use]
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::OnDelivery => PaymentMethod::OnDelivery,
            Self::Balance => PaymentMethod::Balance,
            Self::ExternalCapture(_) => PaymentMethod::ExternalCapture,
        }
    }

    /// Returns [`CaptureReceipt`] of this [`Payment`], if any.
    #[must_use]
    pub fn receipt(&self) -> Option<&CaptureReceipt> {
        match self {
            Self::ExternalCapture(r) => Some(r),
            Self::OnDelivery | Self::Balance => None,
        }
    }
}

define_kind! {
    #[doc = "Method of a [`Payment`]."]
    enum PaymentMethod {
        #[doc = "[`Payment::OnDelivery`]."]
        OnDelivery = 1,

        #[doc = "[`Payment::Balance`]."]
        Balance = 2,

        #[doc = "[`Payment::ExternalCapture`]."]
        ExternalCapture = 3,
    }
}

/// ID of a payment captured by the external payment processor.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(forward)]
pub struct CaptureReceipt(String);

impl CaptureReceipt {
    /// Creates a new [`CaptureReceipt`], if the provided value is not blank.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_owned()))
    }
}

/// Error of an external [`Payment`] lacking a capture confirmation.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
#[display("external payment is not captured")]
pub struct PaymentNotCaptured;

/// Way an [`Order`] reaches the customer.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    /// Customer picks the [`Order`] up.
    Pickup,

    /// Courier brings the [`Order`] to the customer.
    Courier {
        /// Delivery [`Address`].
        address: Address,

        /// Geographical [`Location`] of the [`Address`].
        location: Location,
    },
}

impl Delivery {
    /// Constructs a [`Delivery`] out of its parts.
    ///
    /// # Errors
    ///
    /// If a [`DeliveryType::Courier`] misses its [`Address`] or [`Location`].
    pub fn from_parts(
        kind: DeliveryType,
        address: Option<Address>,
        location: Option<Location>,
    ) -> Result<Self, DeliveryError> {
        Ok(match kind {
            DeliveryType::Pickup => Self::Pickup,
            DeliveryType::Courier => Self::Courier {
                address: address.ok_or(DeliveryError::NoAddress)?,
                location: location.ok_or(DeliveryError::NoLocation)?,
            },
        })
    }

    /// Returns [`DeliveryType`] of this [`Delivery`].
    #[must_use]
    pub fn kind(&self) -> DeliveryType {
        match self {
            Self::Pickup => DeliveryType::Pickup,
            Self::Courier { .. } => DeliveryType::Courier,
        }
    }

    /// Returns [`Address`] of this [`Delivery`], if any.
    #[must_use]
    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::Courier { address, .. } => Some(address),
            Self::Pickup => None,
        }
    }

    /// Returns [`Location`] of this [`Delivery`], if any.
    #[must_use]
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::Courier { location, .. } => Some(*location),
            Self::Pickup => None,
        }
    }
}

define_kind! {
    #[doc = "Type of a [`Delivery`]."]
    enum DeliveryType {
        #[doc = "[`Delivery::Pickup`]."]
        Pickup = 1,

        #[doc = "[`Delivery::Courier`]."]
        Courier = 2,
    }
}

/// Error of constructing a [`Delivery`].
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum DeliveryError {
    /// No [`Address`] provided.
    #[display("delivery `Address` is missing")]
    NoAddress,

    /// No [`Location`] provided.
    #[display("delivery `Location` is missing")]
    NoLocation,
}

/// Delivery address.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(forward)]
pub struct Address(String);

impl Address {
    /// Creates a new [`Address`], if the provided value is not blank.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_owned()))
    }
}

/// Geographical location in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    /// Latitude in the `[-90, 90]` range.
    latitude: f64,

    /// Longitude in the `[-180, 180]` range.
    longitude: f64,
}

impl Location {
    /// Creates a new [`Location`] if the provided coordinates are in range.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        ((-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude))
        .then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Returns latitude of this [`Location`].
    #[must_use]
    pub fn latitude(self) -> f64 {
        self.latitude
    }

    /// Returns longitude of this [`Location`].
    #[must_use]
    pub fn longitude(self) -> f64 {
        self.longitude
    }
}

/// [`DateTime`] when an [`Order`] was created.
pub type CreationDateTime = DateTimeOf<(Order, unit::Creation)>;

/// [`DateTime`] when an [`Order`] was modified last time.
pub type ModificationDateTime = DateTimeOf<(Order, unit::Modification)>;

/// [`DateTime`] when the delivery fee of an [`Order`] was set.
pub type DeliveryFeeDateTime = DateTimeOf<(Order, unit::Amendment)>;

#[cfg(test)]
pub(crate) mod spec {
    use std::str::FromStr as _;

    use common::{DateTime, Money};

    use crate::domain::{cart::spec::line, restaurant, user, Cart};

    use super::{
        Address, CaptureReceipt, Delivery, DeliveryError, DeliveryType,
        Draft, Id, Location, Order, Payment, PaymentMethod,
        PaymentNotCaptured, Status, Totals,
    };

    /// Courier [`Delivery`] to a fixed address.
    pub(crate) fn courier_delivery() -> Delivery {
        Delivery::Courier {
            address: Address::new("221B Baker Street").unwrap(),
            location: Location::new(51.523_8, -0.158_5).unwrap(),
        }
    }

    /// Places a [`Status::Pending`] [`Order`] of 5 items worth `80.00`.
    pub(crate) fn order(
        restaurant_id: restaurant::Id,
        delivery: Delivery,
    ) -> Order {
        let cart = Cart::new(vec![
            line(restaurant_id, "20.00", 3),
            line(restaurant_id, "10.00", 2),
        ])
        .unwrap();
        let totals = Totals {
            subtotal: cart.subtotal(),
            original_subtotal: Money::from_str("71.25").unwrap(),
            item_count: cart.item_count(),
            platform_fee: Money::from_str("5.00").unwrap(),
            discount: Money::ZERO,
            total: Money::from_str("85.00").unwrap(),
            earnings: super::Earnings::default(),
        };
        Order::place(
            Draft {
                id: Id::new(),
                customer_id: user::Id::new(),
                cart,
                payment: Payment::OnDelivery,
                delivery,
                applied_offer_id: None,
            },
            &totals,
            DateTime::now(),
        )
    }

    #[test]
    fn places_pending_order() {
        let rid = restaurant::Id::new();
        let o = order(rid, Delivery::Pickup);

        assert_eq!(o.status, Status::Pending);
        assert_eq!(o.restaurant_id, rid);
        assert_eq!(o.lines.len(), 2);
        assert_eq!(o.delivery_fee, Money::ZERO);
        assert_eq!(o.delivery_fee_set_by, None);
        assert_eq!(o.total, Money::from_str("85.00").unwrap());
        assert_eq!(o.created_at.coerce::<()>(), o.updated_at.coerce());
    }

    #[test]
    fn courier_delivery_needs_address_and_location() {
        let address = Address::new("Main st. 1");
        let location = Location::new(10.0, 20.0);

        assert_eq!(
            Delivery::from_parts(DeliveryType::Courier, None, location),
            Err(DeliveryError::NoAddress),
        );
        assert_eq!(
            Delivery::from_parts(DeliveryType::Courier, address.clone(), None),
            Err(DeliveryError::NoLocation),
        );
        assert!(Delivery::from_parts(DeliveryType::Courier, address, location)
            .is_ok());
        assert_eq!(
            Delivery::from_parts(DeliveryType::Pickup, None, None),
            Ok(Delivery::Pickup),
        );
    }

    #[test]
    fn validates_inputs() {
        assert!(Address::new("   ").is_none());
        assert!(CaptureReceipt::new("").is_none());
        assert!(Location::new(91.0, 0.0).is_none());
        assert!(Location::new(0.0, -180.5).is_none());
        assert!(Location::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn external_capture_needs_receipt() {
        assert_eq!(
            Payment::from_parts(PaymentMethod::ExternalCapture, None),
            Err(PaymentNotCaptured),
        );

        let receipt = CaptureReceipt::new("pi_3Nq").unwrap();
        let payment = Payment::from_parts(
            PaymentMethod::ExternalCapture,
            Some(receipt.clone()),
        )
        .unwrap();
        assert_eq!(payment.method(), PaymentMethod::ExternalCapture);
        assert_eq!(payment.receipt(), Some(&receipt));
    }

    #[test]
    fn terminal_statuses() {
        let terminal = Status::ALL
            .iter()
            .copied()
            .filter(|s| s.is_terminal())
            .collect::<Vec<_>>();

        assert_eq!(terminal, [Status::Delivered, Status::Cancelled]);
    }
}
