//! [`CompleteSettlements`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{settlement::Status, Settlement};
use crate::{
    command::{post_order_earnings, PostOrderEarnings},
    domain::order,
    infra::{database, Database},
    read::settlement::Backlog,
    Command, Service,
};

use super::Task;

/// Configuration for [`CompleteSettlements`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between backlog checks.
    #[default(time::Duration::from_secs(30))]
    pub interval: time::Duration,

    /// Maximum number of [`Settlement`]s completed per check.
    #[default(100)]
    pub batch: u32,
}

/// [`Task`] for completing [`Status::Pending`] [`Settlement`]s whose earnings
/// weren't posted right after their orders creation.
#[derive(Clone, Copy, Debug)]
pub struct CompleteSettlements<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<CompleteSettlements<Self>, Config>>> for Service<Db>
where
    CompleteSettlements<Service<Db>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CompleteSettlements<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = CompleteSettlements {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::CompleteSettlements` failed: {e}");
            });
        }
    }
}

impl<Db> Task<Perform<()>> for CompleteSettlements<Service<Db>>
where
    Db: Database<
        Select<By<Vec<order::Id>, Backlog>>,
        Ok = Vec<order::Id>,
        Err = Traced<database::Error>,
    >,
    Service<Db>: Command<
        PostOrderEarnings,
        Err = Traced<post_order_earnings::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let backlog = self
            .service
            .database()
            .execute(Select(By::<Vec<order::Id>, _>::new(Backlog {
                limit: self.config.batch,
            })))
            .await
            .map_err(tracerr::wrap!())?;
        if backlog.is_empty() {
            return Ok(());
        }

        log::debug!("completing {} pending settlements", backlog.len());
        for order_id in backlog {
            // A single failed `Settlement` must not block the others.
            if let Err(e) =
                self.service.execute(PostOrderEarnings { order_id }).await
            {
                log::error!(
                    "failed to complete `Settlement(order_id: {order_id})`: \
                     {e}",
                );
            }
        }
        Ok(())
    }
}

/// Error of [`CompleteSettlements`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use common::operations::{By, Commit, Insert, Perform, Select, Transact};

    use crate::{
        domain::{order, settlement, wallet::Owner, Settlement, Wallet},
        infra::Database as _,
        read::settlement::Backlog,
        spec::{order_draft, register, service},
    };

    use super::{CompleteSettlements, Config};

    #[tokio::test]
    async fn completes_pending_settlements() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let (order, settlement) = order_draft(&svc, restaurant_id).await;

        // Persist as if the process crashed right after the commit.
        let tx = svc.database().execute(Transact).await.unwrap();
        tx.execute(Insert(order.clone())).await.unwrap();
        tx.execute(Insert(settlement)).await.unwrap();
        tx.execute(Commit).await.unwrap();

        let task = CompleteSettlements {
            config: Config::default(),
            service: svc.clone(),
        };
        task.execute(Perform(())).await.unwrap();

        let settlement = svc
            .database()
            .execute(Select(By::<Option<Settlement>, _>::new(order.id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(settlement.status, settlement::Status::Posted);

        let wallet = svc
            .database()
            .execute(Select(By::<Option<Wallet>, _>::new(Owner::Restaurant(
                restaurant_id,
            ))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            wallet.pending_balance,
            order.earnings.restaurant.amount(),
        );

        // Nothing is left to complete.
        let backlog = svc
            .database()
            .execute(Select(By::<Vec<order::Id>, _>::new(Backlog {
                limit: 10,
            })))
            .await
            .unwrap();
        assert!(backlog.is_empty());
    }
}
