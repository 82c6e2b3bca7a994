//! [`PurgeOrders`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Delete, Perform, Start};
use smart_default::SmartDefault;
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{Order, Settlement};
use crate::{
    domain::order,
    infra::{database, Database},
    read, Service,
};

use super::Task;

/// Configuration for [`PurgeOrders`] [`Task`].
#[derive(Clone, Copy, Debug, SmartDefault)]
pub struct Config {
    /// Interval between purges.
    #[default(time::Duration::from_secs(60 * 60))]
    pub interval: time::Duration,

    /// Time a finished [`Order`] is retained for after its last modification.
    #[default(time::Duration::from_secs(60 * 60 * 24 * 30))]
    pub retention: time::Duration,
}

/// [`Task`] for purging finished [`Order`]s along with their [`Settlement`]s.
///
/// [`Order`]s with earnings not posted yet are never purged.
#[derive(Clone, Copy, Debug)]
pub struct PurgeOrders<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<PurgeOrders<Self>, Config>>> for Service<Db>
where
    PurgeOrders<Service<Db>>:
        Task<Perform<()>, Ok = read::order::Purged, Err: Error>
            + Send
            + Sync
            + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<PurgeOrders<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = PurgeOrders {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(purged) if *purged > 0 => {
                    log::info!("purged {} finished orders", *purged);
                }
                Ok(_) => {}
                Err(e) => log::error!("`task::PurgeOrders` failed: {e}"),
            }
        }
    }
}

impl<Db> Task<Perform<()>> for PurgeOrders<Service<Db>>
where
    Db: Database<
        Delete<By<read::order::Purged, order::ModificationDateTime>>,
        Ok = read::order::Purged,
        Err = Traced<database::Error>,
    >,
{
    type Ok = read::order::Purged;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline =
            order::ModificationDateTime::now() - self.config.retention;
        self.service
            .database()
            .execute(Delete(By::new(deadline)))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`PurgeOrders`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time;

    use common::operations::{By, Insert, Perform, Select};

    use crate::{
        command::{CreateOffer, TransitionOrder},
        domain::{
            offer::{self, Discount},
            order::{Actor, Status},
            Order,
        },
        infra::Database as _,
        spec::{checkout, line, place, register, service},
    };

    use super::{Config, PurgeOrders};

    #[tokio::test]
    async fn purges_only_finished_orders() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let finished = place(&svc, restaurant_id).await;
        let active = place(&svc, restaurant_id).await;

        _ = svc
            .execute(TransitionOrder {
                order_id: finished.id,
                actor: Actor::Restaurant(restaurant_id),
                to: Status::Cancelled,
            })
            .await
            .unwrap();
        tokio::time::sleep(time::Duration::from_millis(5)).await;

        let task = PurgeOrders {
            config: Config {
                interval: time::Duration::from_secs(1),
                retention: time::Duration::ZERO,
            },
            service: svc.clone(),
        };
        let purged = task.execute(Perform(())).await.unwrap();
        assert_eq!(*purged, 1);

        for (id, kept) in [(finished.id, false), (active.id, true)] {
            let order = svc
                .database()
                .execute(Select(By::<Option<Order>, _>::new(id)))
                .await
                .unwrap();
            assert_eq!(order.is_some(), kept);
        }
    }

    #[tokio::test]
    async fn purges_offer_usages_of_orders() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let offer = svc
            .execute(CreateOffer {
                restaurant_id,
                discount: Discount::Fixed("1.00".parse().unwrap()),
                min_order_amount: None,
                starts_at: None,
                expires_at: None,
                is_active: true,
            })
            .await
            .unwrap();
        let mut cmd = checkout(vec![line(restaurant_id, "10.00", 1)]);
        cmd.offer = offer::Selection::Auto;
        let order = svc.execute(cmd).await.unwrap();
        assert_eq!(order.applied_offer_id, Some(offer.id));

        let usage = offer::Usage {
            offer_id: offer.id,
            order_id: order.id,
        };
        let recorded = svc.database().execute(Insert(usage)).await.unwrap();
        assert!(!*recorded);

        _ = svc
            .execute(TransitionOrder {
                order_id: order.id,
                actor: Actor::Restaurant(restaurant_id),
                to: Status::Cancelled,
            })
            .await
            .unwrap();
        tokio::time::sleep(time::Duration::from_millis(5)).await;

        let task = PurgeOrders {
            config: Config {
                interval: time::Duration::from_secs(1),
                retention: time::Duration::ZERO,
            },
            service: svc.clone(),
        };
        assert_eq!(*task.execute(Perform(())).await.unwrap(), 1);

        let recorded = svc.database().execute(Insert(usage)).await.unwrap();
        assert!(*recorded);
    }
}
