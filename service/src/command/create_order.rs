//! [`Command`] for creating a new [`Order`].

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        cart::{self, Cart},
        offer::{self, Offer},
        order::{
            self, Address, CaptureReceipt, Delivery, DeliveryError,
            DeliveryType, Location, Payment, PaymentMethod, PaymentNotCaptured,
            totals, Totals,
        },
        restaurant::{self, Attribution},
        user,
        wallet::Posting,
        Order, Settlement,
    },
    error::{Categorize, Category},
    infra::{database, Database},
    read, Service,
};

use super::{post_order_earnings, Command, PostOrderEarnings};

/// [`Command`] for creating a new [`Order`] at checkout.
///
/// Repeating it with the same [`order::Id`] and customer returns the already
/// created [`Order`] without any writes.
#[derive(Clone, Debug)]
pub struct CreateOrder {
    /// Caller-supplied ID of the new [`Order`].
    pub order_id: order::Id,

    /// ID of the customer placing the [`Order`].
    pub customer_id: user::Id,

    /// Ordered [`cart::Line`]s.
    pub lines: Vec<cart::Line>,

    /// Requested [`DeliveryType`].
    pub delivery_type: DeliveryType,

    /// [`Address`] to deliver to, required for [`DeliveryType::Courier`].
    pub address: Option<Address>,

    /// [`Location`] to deliver to, required for [`DeliveryType::Courier`].
    pub location: Option<Location>,

    /// Chosen [`PaymentMethod`].
    pub payment_method: PaymentMethod,

    /// [`CaptureReceipt`] of an externally captured payment.
    pub capture_receipt: Option<CaptureReceipt>,

    /// [`offer::Selection`] made at checkout.
    pub offer: offer::Selection,
}

impl<Db> Command<CreateOrder> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Attribution>, restaurant::Id>>,
            Ok = Option<Attribution>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Vec<Offer>, restaurant::Id>>,
            Ok = Vec<Offer>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<offer::Usage>,
            Ok = read::offer::Recorded,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<Posting>,
            Ok = read::wallet::Applied,
            Err = Traced<database::Error>,
        > + Database<Insert<Order>, Err = Traced<database::Error>>
        + Database<Insert<Settlement>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Self: Command<
        PostOrderEarnings,
        Err = Traced<post_order_earnings::ExecutionError>,
    >,
{
    type Ok = Order;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(
            customer.id = %cmd.customer_id,
            order.id = %cmd.order_id,
            payment = %cmd.payment_method,
        ),
    )]
    async fn execute(&self, cmd: CreateOrder) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateOrder {
            order_id,
            customer_id,
            lines,
            delivery_type,
            address,
            location,
            payment_method,
            capture_receipt,
            offer,
        } = cmd;

        let existing = self
            .database()
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(order) = existing {
            return replay(order, customer_id);
        }

        let cart = Cart::new(lines)
            .map_err(E::Cart)
            .map_err(tracerr::wrap!())?;
        let delivery = Delivery::from_parts(delivery_type, address, location)
            .map_err(E::Delivery)
            .map_err(tracerr::wrap!())?;
        let payment = Payment::from_parts(payment_method, capture_receipt)
            .map_err(E::PaymentNotCaptured)
            .map_err(tracerr::wrap!())?;

        let restaurant_id = cart.restaurant_id();
        let attribution = self
            .database()
            .execute(Select(By::<Option<Attribution>, _>::new(restaurant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RestaurantNotRegistered(restaurant_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        let offers = self
            .database()
            .execute(Select(By::<Vec<Offer>, _>::new(restaurant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let offer = offer
            .resolve(&offers, restaurant_id, cart.subtotal(), now)
            .map_err(E::Offer)
            .map_err(tracerr::wrap!())?;

        let totals = Totals::compute(
            &cart,
            offer.as_ref(),
            &self.config().fee_schedule,
            &attribution,
        )
        .map_err(|e| match e {
            totals::Error::Unsupported(e) => {
                E::Offer(offer::SelectionError::Unsupported(e))
            }
            totals::Error::AmountOverflow => E::AmountOverflow,
        })
        .map_err(tracerr::wrap!())?;

        let order = Order::place(
            order::Draft {
                id: order_id,
                customer_id,
                cart,
                payment,
                delivery,
                applied_offer_id: offer.map(|o| o.id),
            },
            &totals,
            now,
        );
        let settlement = Settlement::new(&order, &attribution, now);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent creation of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let existing = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if let Some(order) = existing {
            return replay(order, customer_id);
        }

        if let Some(debit) = settlement.debit(now) {
            let applied = tx
                .execute(Insert(debit))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if !*applied {
                return Err(tracerr::new!(E::InsufficientFunds(customer_id)));
            }
        }

        tx.execute(Insert(order.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(settlement))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!("`Order(id: {order_id})` created, total: {}", order.total);

        // Settlement stays pending and is completed by the background task.
        if let Err(e) = self.execute(PostOrderEarnings { order_id }).await {
            log::error!(
                "failed to post earnings of `Order(id: {order_id})`: {e}",
            );
        }

        if let Some(offer_id) = order.applied_offer_id {
            if let Err(e) = self
                .database()
                .execute(Insert(offer::Usage { offer_id, order_id }))
                .await
            {
                log::warn!(
                    "failed to record usage of `Offer(id: {offer_id})` by \
                     `Order(id: {order_id})`: {e}",
                );
            }
        }

        Ok(order)
    }
}

/// Returns the already created [`Order`] if it belongs to the same customer.
fn replay(
    order: Order,
    customer_id: user::Id,
) -> Result<Order, Traced<ExecutionError>> {
    if order.customer_id != customer_id {
        return Err(tracerr::new!(ExecutionError::OrderIdOccupied(order.id)));
    }
    log::debug!("`Order(id: {})` exists already", order.id);
    Ok(order)
}

/// Error of [`CreateOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Cart`] is invalid.
    #[display("Invalid cart: {_0}")]
    Cart(cart::Error),

    /// [`Delivery`] details are incomplete.
    #[display("Invalid delivery: {_0}")]
    Delivery(DeliveryError),

    /// Externally captured [`Payment`] is not confirmed.
    #[display("{_0}")]
    PaymentNotCaptured(PaymentNotCaptured),

    /// Restaurant has no [`Attribution`] registered.
    #[display("`Restaurant(id: {_0})` is not registered")]
    RestaurantNotRegistered(#[error(not(source))] restaurant::Id),

    /// [`offer::Selection`] cannot be applied.
    #[display("{_0}")]
    Offer(offer::SelectionError),

    /// [`order::Id`] is taken by an [`Order`] of another customer.
    #[display("`Order(id: {_0})` belongs to another customer")]
    OrderIdOccupied(#[error(not(source))] order::Id),

    /// Customer's stored balance doesn't cover the [`Order`] total.
    #[display("`Customer(id: {_0})` has insufficient balance")]
    InsufficientFunds(#[error(not(source))] user::Id),

    /// [`Order`] amounts exceed the representable range.
    #[display("`Order` amounts overflow")]
    AmountOverflow,
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::Cart(_)
            | Self::Delivery(_)
            | Self::RestaurantNotRegistered(_)
            | Self::Offer(_)
            | Self::OrderIdOccupied(_)
            | Self::AmountOverflow => Category::Validation,
            Self::PaymentNotCaptured(_) => Category::ExternalPaymentFailure,
            Self::InsufficientFunds(_) => Category::InsufficientFunds,
        }
    }
}
