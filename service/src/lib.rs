//! Service contains the order settlement business logic.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod error;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use std::error::Error;

use common::operations::{By, Start};

#[cfg(doc)]
use infra::Database;

pub use self::{
    command::Command,
    domain::order::FeeSchedule,
    error::{Categorize, Category},
    query::Query,
    task::Task,
};

/// [`Service`] configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// [`FeeSchedule`] applied to every placed order.
    pub fee_schedule: FeeSchedule,

    /// [`task::CompleteSettlements`] configuration.
    pub complete_settlements: task::complete_settlements::Config,

    /// [`task::PurgeOrders`] configuration.
    pub purge_orders: task::purge_orders::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters, along with the
    /// [`task::Background`] running its [`Task`]s.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::CompleteSettlements<Self>,
                        task::complete_settlements::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<
                    By<task::PurgeOrders<Self>, task::purge_orders::Config>,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Self::without_tasks(config, database);

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().complete_settlements)))
                .await
        });
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().purge_orders))).await
        });

        (this, bg)
    }

    /// Creates a new [`Service`] without running any of its [`Task`]s.
    #[must_use]
    pub fn without_tasks(config: Config, database: Db) -> Self {
        Self { config, database }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }
}

#[cfg(test)]
pub(crate) mod spec {
    //! Helpers for testing [`Service`] over the [`Memory`] database.

    use common::{
        operations::{By, Insert, Select},
        DateTime, Money,
    };
    use rust_decimal::Decimal;

    use crate::{
        command::CreateOrder,
        domain::{
            cart::{self, Cart, ItemId, Quantity},
            offer,
            order::{self, Delivery, DeliveryType, Payment, PaymentMethod, Totals},
            restaurant::{self, Attribution, Referrer},
            user,
            wallet::Owner,
            Order, Settlement, Wallet,
        },
        infra::{Database as _, Memory},
        Config, Service,
    };

    /// Creates a new [`Service`] over an empty [`Memory`] database.
    pub(crate) fn service() -> Service<Memory> {
        Service::without_tasks(Config::default(), Memory::new())
    }

    /// Registers a new restaurant with the provided [`Referrer`].
    pub(crate) async fn register(
        svc: &Service<Memory>,
        referrer: Option<Referrer>,
    ) -> restaurant::Id {
        let restaurant_id = restaurant::Id::new();
        svc.database()
            .execute(Insert(Attribution {
                restaurant_id,
                referrer,
                registered_at: DateTime::now().coerce(),
            }))
            .await
            .unwrap();
        restaurant_id
    }

    /// Creates a new [`cart::Line`] of the provided restaurant.
    pub(crate) fn line(
        restaurant_id: restaurant::Id,
        unit_price: &str,
        quantity: u32,
    ) -> cart::Line {
        cart::Line {
            item_id: ItemId::new(),
            restaurant_id,
            unit_price: unit_price.parse().unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    /// Creates a pickup [`CreateOrder`] paid on delivery, with no
    /// [`offer::Offer`] applied.
    pub(crate) fn checkout(lines: Vec<cart::Line>) -> CreateOrder {
        CreateOrder {
            order_id: order::Id::new(),
            customer_id: user::Id::new(),
            lines,
            delivery_type: DeliveryType::Pickup,
            address: None,
            location: None,
            payment_method: PaymentMethod::OnDelivery,
            capture_receipt: None,
            offer: offer::Selection::Declined,
        }
    }

    /// Places a new two-item [`Order`] at the provided restaurant.
    pub(crate) async fn place(
        svc: &Service<Memory>,
        restaurant_id: restaurant::Id,
    ) -> Order {
        svc.execute(checkout(vec![line(restaurant_id, "10.00", 2)]))
            .await
            .unwrap()
    }

    /// Builds a new two-item [`Order`] with its [`Settlement`] without
    /// persisting them.
    pub(crate) async fn order_draft(
        svc: &Service<Memory>,
        restaurant_id: restaurant::Id,
    ) -> (Order, Settlement) {
        let attribution = svc
            .database()
            .execute(Select(By::<Option<Attribution>, _>::new(restaurant_id)))
            .await
            .unwrap()
            .unwrap();
        let cart = Cart::new(vec![line(restaurant_id, "10.00", 2)]).unwrap();
        let totals = Totals::compute(
            &cart,
            None,
            &svc.config().fee_schedule,
            &attribution,
        )
        .unwrap();
        let now = DateTime::now();
        let order = Order::place(
            order::Draft {
                id: order::Id::new(),
                customer_id: user::Id::new(),
                cart,
                payment: Payment::OnDelivery,
                delivery: Delivery::Pickup,
                applied_offer_id: None,
            },
            &totals,
            now,
        );
        let settlement = Settlement::new(&order, &attribution, now);
        assert_eq!(totals.total, order.total);
        assert!(order.total > Money::ZERO);
        (order, settlement)
    }

    /// Returns the [`Wallet`] of the provided [`Owner`], empty if nothing was
    /// posted to it.
    pub(crate) async fn wallet(svc: &Service<Memory>, owner: Owner) -> Wallet {
        svc.database()
            .execute(Select(By::<Option<Wallet>, _>::new(owner)))
            .await
            .unwrap()
            .unwrap_or_else(|| Wallet::empty(owner, DateTime::now()))
    }

    /// Parses the provided [`Decimal`].
    pub(crate) fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }
}
