//! [`Command`] for moving an [`Order`] through its lifecycle.

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Swap, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Wallet;
use crate::{
    domain::{
        order::{self, Actor, Status, TransitionError},
        wallet::{Posting, PostingKind},
        Order, Settlement,
    },
    error::{Categorize, Category},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for moving an [`Order`] to another [`Status`].
///
/// Entering [`Status::Delivered`] releases the restaurant earnings, while
/// entering [`Status::Cancelled`] reverses the already posted ones.
#[derive(Clone, Copy, Debug)]
pub struct TransitionOrder {
    /// ID of the [`Order`] to move.
    pub order_id: order::Id,

    /// [`Actor`] moving the [`Order`].
    pub actor: Actor,

    /// [`Status`] to move the [`Order`] to.
    pub to: Status,
}

/// Requested lifecycle step of an [`Order`].
#[derive(Clone, Copy, Debug)]
pub(super) enum Step {
    /// Move to the provided [`Status`] without setting a delivery fee.
    To(Status),

    /// Take the fee-setting transition of the [`Actor`] with the provided
    /// delivery fee.
    Fee(Decimal),
}

impl<Db> Command<TransitionOrder> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Swap<Order>,
            Ok = read::order::Swapped,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Settlement>, order::Id>>,
            Ok = Option<Settlement>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<Posting>,
            Ok = read::wallet::Applied,
            Err = Traced<database::Error>,
        > + Database<Update<Settlement>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Order;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(
            actor = %cmd.actor.role(),
            order.id = %cmd.order_id,
            to = %cmd.to,
        ),
    )]
    async fn execute(
        &self,
        cmd: TransitionOrder,
    ) -> Result<Self::Ok, Self::Err> {
        let TransitionOrder {
            order_id,
            actor,
            to,
        } = cmd;
        self.advance(order_id, actor, Step::To(to)).await
    }
}

impl<Db> Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Swap<Order>,
            Ok = read::order::Swapped,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Settlement>, order::Id>>,
            Ok = Option<Settlement>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<Posting>,
            Ok = read::wallet::Applied,
            Err = Traced<database::Error>,
        > + Database<Update<Settlement>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    /// Performs the provided [`Step`] of an [`Order`] and settles its
    /// outcome in the same transaction.
    pub(super) async fn advance(
        &self,
        order_id: order::Id,
        actor: Actor,
        step: Step,
    ) -> Result<Order, Traced<ExecutionError>> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent actions upon the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OrderNotExists(order_id))
            .map_err(tracerr::wrap!())?;

        let (to, fee) = match step {
            Step::To(to) => (to, None),
            Step::Fee(fee) => {
                let role = actor.role();
                let to = order
                    .fee_transition(role)
                    .ok_or(E::Transition(TransitionError::NoFeeTransition {
                        role,
                        status: order.status,
                    }))
                    .map_err(tracerr::wrap!())?;
                (to, Some(fee))
            }
        };

        let now = DateTime::now();
        let updated = order
            .advance(actor, to, fee, now)
            .map_err(E::Transition)
            .map_err(tracerr::wrap!())?;

        let swapped = tx
            .execute(Swap(updated.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !*swapped {
            return Err(tracerr::new!(E::ConcurrentModification(order_id)));
        }

        if updated.status.is_terminal() {
            let settlement = tx
                .execute(Select(By::<Option<Settlement>, _>::new(order_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if let Some(mut settlement) = settlement {
                let status = settlement.status;
                let postings = if updated.status == Status::Cancelled {
                    settlement.cancel(now)
                } else {
                    settlement.release(now)
                };
                for posting in postings {
                    let applied = tx
                        .execute(Insert(posting))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))?;
                    if !*applied {
                        return Err(tracerr::new!(E::PostingRejected(
                            posting.kind,
                        )));
                    }
                }
                if settlement.status != status {
                    tx.execute(Update(settlement))
                        .await
                        .map_err(tracerr::map_from_and_wrap!(=> E))
                        .map(drop)?;
                    log::info!(
                        "`Settlement(order_id: {order_id})` moved from \
                         `{status}` to `{}`",
                        settlement.status,
                    );
                }
            }
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Order(id: {order_id})` moved from `{}` to `{}` by `{}`",
            order.status,
            updated.status,
            actor.role(),
        );
        Ok(updated)
    }
}

/// Error of [`TransitionOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Order`] with the provided ID doesn't exist.
    #[display("`Order(id: {_0})` does not exist")]
    OrderNotExists(#[error(not(source))] order::Id),

    /// [`Order`] cannot be moved as requested.
    #[display("{_0}")]
    Transition(TransitionError),

    /// [`Order`] has been modified concurrently.
    #[display("`Order(id: {_0})` has been modified concurrently")]
    ConcurrentModification(#[error(not(source))] order::Id),

    /// [`Posting`] is rejected by its [`Wallet`].
    #[display("`{_0}` posting is rejected")]
    PostingRejected(#[error(not(source))] PostingKind),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::OrderNotExists(_) => Category::Validation,
            Self::Transition(e) => e.category(),
            Self::ConcurrentModification(_) => {
                Category::ConcurrentModification
            }
            Self::PostingRejected(_) => Category::InsufficientFunds,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::operations::{By, Select};

    use crate::{
        command::TopUpBalance,
        domain::{
            order::{Actor, PaymentMethod, Status, TransitionError},
            restaurant, settlement, user,
            wallet::Owner,
            Settlement,
        },
        infra::Database as _,
        spec::{checkout, dec, line, place, register, service, wallet},
        Categorize as _, Category,
    };

    use super::{ExecutionError, TransitionOrder};

    async fn settlement_status(
        svc: &crate::Service<crate::infra::Memory>,
        order_id: crate::domain::order::Id,
    ) -> settlement::Status {
        svc.database()
            .execute(Select(By::<Option<Settlement>, _>::new(order_id)))
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn releases_earnings_on_delivery() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let order = place(&svc, restaurant_id).await;

        let restaurant = Actor::Restaurant(restaurant_id);
        for (actor, to) in [
            (restaurant, Status::Accepted),
            (restaurant, Status::Preparing),
            (restaurant, Status::Ready),
            (Actor::Operator(user::Id::new()), Status::Delivered),
        ] {
            let moved = svc
                .execute(TransitionOrder {
                    order_id: order.id,
                    actor,
                    to,
                })
                .await
                .unwrap();
            assert_eq!(moved.status, to);
        }

        assert_eq!(
            settlement_status(&svc, order.id).await,
            settlement::Status::Released,
        );
        let w = wallet(&svc, Owner::Restaurant(restaurant_id)).await;
        assert_eq!(w.pending_balance, dec("0"));
        assert_eq!(w.balance, dec("16.50"));
        assert_eq!(w.total_earnings, dec("16.50"));
    }

    #[tokio::test]
    async fn reverses_earnings_on_cancellation() {
        let svc = service();
        let supervisor_id = user::Id::new();
        let restaurant_id = register(
            &svc,
            Some(restaurant::Referrer::Supervisor(supervisor_id)),
        )
        .await;
        let customer_id = user::Id::new();
        _ = svc
            .execute(TopUpBalance {
                customer_id,
                amount: "30".parse().unwrap(),
            })
            .await
            .unwrap();
        let mut cmd = checkout(vec![line(restaurant_id, "10.00", 2)]);
        cmd.customer_id = customer_id;
        cmd.payment_method = PaymentMethod::Balance;
        let order = svc.execute(cmd).await.unwrap();
        assert_eq!(
            wallet(&svc, Owner::Customer(customer_id)).await.balance,
            dec("8.00"),
        );

        let cancelled = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Restaurant(restaurant_id),
                to: Status::Cancelled,
            })
            .await
            .unwrap();
        assert_eq!(cancelled.status, Status::Cancelled);
        assert_eq!(cancelled.total, order.total);

        assert_eq!(
            settlement_status(&svc, order.id).await,
            settlement::Status::Reversed,
        );
        let restaurant = wallet(&svc, Owner::Restaurant(restaurant_id)).await;
        assert_eq!(restaurant.pending_balance, dec("0"));
        let supervisor = wallet(&svc, Owner::Supervisor(supervisor_id)).await;
        assert_eq!(supervisor.balance, dec("0"));
        assert_eq!(supervisor.total_earnings, dec("0"));
        let platform = wallet(&svc, Owner::Platform).await;
        assert_eq!(platform.balance, dec("0"));
        let customer = wallet(&svc, Owner::Customer(customer_id)).await;
        assert_eq!(customer.balance, dec("30"));
    }

    #[tokio::test]
    async fn rejects_disallowed_transitions() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let order = place(&svc, restaurant_id).await;

        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Restaurant(restaurant_id),
                to: Status::Delivered,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::NotAllowed { .. }),
        ));
        assert_eq!(err.category(), Category::InvalidTransition);

        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Courier(user::Id::new()),
                to: Status::OutForDelivery,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::InvalidTransition);

        _ = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Restaurant(restaurant_id),
                to: Status::Accepted,
            })
            .await
            .unwrap();
        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Courier(user::Id::new()),
                to: Status::Preparing,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::InvalidTransition);

        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Restaurant(restaurant::Id::new()),
                to: Status::Preparing,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Transition(TransitionError::NotParty(_)),
        ));

        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Customer(order.customer_id),
                to: Status::Cancelled,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::InvalidTransition);
    }

    #[tokio::test]
    async fn terminal_orders_stay_put() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let order = place(&svc, restaurant_id).await;
        let operator = Actor::Operator(user::Id::new());

        _ = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: operator,
                to: Status::Cancelled,
            })
            .await
            .unwrap();
        let err = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: operator,
                to: Status::Accepted,
            })
            .await
            .unwrap_err();
        assert_eq!(err.category(), Category::InvalidTransition);
    }

    #[tokio::test]
    async fn rejects_unknown_order() {
        let svc = service();
        let order_id = crate::domain::order::Id::new();

        let err = svc
            .execute(TransitionOrder {
                order_id,
                actor: Actor::Operator(user::Id::new()),
                to: Status::Cancelled,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::OrderNotExists(id) if *id == order_id,
        ));
    }
}
