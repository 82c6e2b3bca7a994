//! [`Command`] for setting the delivery fee of an [`Order`].

use common::operations::{
    By, Commit, Insert, Lock, Select, Swap, Transact, Transacted, Update,
};
use rust_decimal::Decimal;
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::order::Status;
use crate::{
    domain::{
        order::{self, Actor},
        wallet::Posting,
        Order, Settlement,
    },
    infra::{database, Database},
    read, Service,
};

use super::{transition_order::Step, Command};

pub use super::transition_order::ExecutionError;

/// [`Command`] for setting the delivery fee of a courier-delivered [`Order`].
///
/// Takes the fee-setting transition of the [`Actor`]: a restaurant accepts the
/// [`Order`], while a courier claims it into [`Status::OutForDelivery`]. Only
/// the first of them sets the fee, and this is the only way to change the
/// [`Order::total`] after creation.
#[derive(Clone, Copy, Debug)]
pub struct AmendDeliveryFee {
    /// ID of the [`Order`] to set the fee of.
    pub order_id: order::Id,

    /// [`Actor`] setting the fee.
    pub actor: Actor,

    /// Delivery fee to set.
    pub fee: Decimal,
}

impl<Db> Command<AmendDeliveryFee> for Service<Db>
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
            fee = %cmd.fee,
            order.id = %cmd.order_id,
        ),
    )]
    async fn execute(
        &self,
        cmd: AmendDeliveryFee,
    ) -> Result<Self::Ok, Self::Err> {
        let AmendDeliveryFee {
            order_id,
            actor,
            fee,
        } = cmd;
        self.advance(order_id, actor, Step::Fee(fee)).await
    }
}
