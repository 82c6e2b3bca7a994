//! [`Command`] for posting [`Order`] earnings to [`Wallet`]s.

use common::{
    operations::{
        By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Wallet;
use crate::{
    domain::{
        order, settlement,
        wallet::{Posting, PostingKind},
        Order, Settlement,
    },
    error::{Categorize, Category},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for posting [`Order`] earnings to [`Wallet`]s.
///
/// Posts only a [`settlement::Status::Pending`] [`Settlement`], so repeating
/// it changes nothing.
#[derive(Clone, Copy, Debug)]
pub struct PostOrderEarnings {
    /// ID of the [`Order`] to post earnings of.
    pub order_id: order::Id,
}

impl<Db> Command<PostOrderEarnings> for Service<Db>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Order, order::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Settlement>, order::Id>>,
            Ok = Option<Settlement>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Order>, order::Id>>,
            Ok = Option<Order>,
            Err = Traced<database::Error>,
        > + Database<
            Insert<Posting>,
            Ok = read::wallet::Applied,
            Err = Traced<database::Error>,
        > + Database<Update<Settlement>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Settlement;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(order.id = %cmd.order_id),
    )]
    async fn execute(
        &self,
        cmd: PostOrderEarnings,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let PostOrderEarnings { order_id } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid racing with a status change of the same `Order`.
        tx.execute(Lock(By::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut settlement = tx
            .execute(Select(By::<Option<Settlement>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SettlementNotExists(order_id))
            .map_err(tracerr::wrap!())?;
        if settlement.status != settlement::Status::Pending {
            log::debug!(
                "`Settlement(order_id: {order_id})` is `{}` already",
                settlement.status,
            );
            return Ok(settlement);
        }

        let order = tx
            .execute(Select(By::<Option<Order>, _>::new(order_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::OrderNotExists(order_id))
            .map_err(tracerr::wrap!())?;

        for posting in settlement.post(order.status, DateTime::now()) {
            let applied = tx
                .execute(Insert(posting))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if !*applied {
                return Err(tracerr::new!(E::PostingRejected(posting.kind)));
            }
        }

        tx.execute(Update(settlement))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::info!(
            "`Settlement(order_id: {order_id})` moved to `{}`",
            settlement.status,
        );
        Ok(settlement)
    }
}

/// Error of [`PostOrderEarnings`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Settlement`] of the [`Order`] doesn't exist.
    #[display("`Settlement(order_id: {_0})` does not exist")]
    SettlementNotExists(#[error(not(source))] order::Id),

    /// [`Order`] with the provided ID doesn't exist.
    #[display("`Order(id: {_0})` does not exist")]
    OrderNotExists(#[error(not(source))] order::Id),

    /// [`Posting`] is rejected by its [`Wallet`].
    #[display("`{_0}` posting is rejected")]
    PostingRejected(#[error(not(source))] PostingKind),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::SettlementNotExists(_) | Self::OrderNotExists(_) => {
                Category::Validation
            }
            Self::PostingRejected(_) => Category::InsufficientFunds,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{order, settlement, wallet::Owner},
        spec::{dec, place, register, service, wallet},
        Categorize as _, Category, Command as _,
    };

    use super::{ExecutionError, PostOrderEarnings};

    #[tokio::test]
    async fn posts_only_once() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let order = place(&svc, restaurant_id).await;

        let before = (
            wallet(&svc, Owner::Restaurant(restaurant_id)).await,
            wallet(&svc, Owner::Platform).await,
        );
        assert_eq!(before.0.pending_balance, dec("16.50"));
        assert_eq!(before.1.balance, dec("3.50"));

        let settlement = svc
            .execute(PostOrderEarnings { order_id: order.id })
            .await
            .unwrap();
        assert_eq!(settlement.status, settlement::Status::Posted);

        let after = (
            wallet(&svc, Owner::Restaurant(restaurant_id)).await,
            wallet(&svc, Owner::Platform).await,
        );
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn requires_settlement() {
        let svc = service();

        let err = svc
            .execute(PostOrderEarnings {
                order_id: order::Id::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::SettlementNotExists(_),
        ));
        assert_eq!(err.category(), Category::Validation);
    }
}
