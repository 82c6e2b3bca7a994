//! [`Command`] for registering a restaurant on the marketplace.

use common::{
    operations::{By, Insert, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::restaurant::{self, Attribution, Referrer},
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for registering a restaurant along with its [`Attribution`].
///
/// The [`Attribution`] is stored exactly once and never changes afterwards.
#[derive(Clone, Copy, Debug)]
pub struct RegisterRestaurant {
    /// ID of the restaurant to register.
    pub restaurant_id: restaurant::Id,

    /// [`Referrer`] who registers the restaurant, if any.
    pub referrer: Option<Referrer>,
}

impl<Db> Command<RegisterRestaurant> for Service<Db>
where
    Db: Database<
            Select<By<Option<Attribution>, restaurant::Id>>,
            Ok = Option<Attribution>,
            Err = Traced<database::Error>,
        > + Database<Insert<Attribution>, Err = Traced<database::Error>>,
{
    type Ok = Attribution;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(
            referrer = ?cmd.referrer.map(Referrer::kind),
            restaurant.id = %cmd.restaurant_id,
        ),
    )]
    async fn execute(
        &self,
        cmd: RegisterRestaurant,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RegisterRestaurant {
            restaurant_id,
            referrer,
        } = cmd;

        if self
            .database()
            .execute(Select(By::<Option<Attribution>, _>::new(restaurant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .is_some()
        {
            return Err(tracerr::new!(E::AlreadyRegistered(restaurant_id)));
        }

        let attribution = Attribution {
            restaurant_id,
            referrer,
            registered_at: DateTime::now().coerce(),
        };
        // Concurrent registration is caught by the storage uniqueness.
        self.database()
            .execute(Insert(attribution))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map_err(|e| {
                if matches!(e.as_ref(), E::Db(db) if db.is_unique_violation()) {
                    tracerr::new!(E::AlreadyRegistered(restaurant_id))
                } else {
                    e
                }
            })
            .map(drop)?;

        log::info!("`Restaurant(id: {restaurant_id})` registered");
        Ok(attribution)
    }
}

/// Error of [`RegisterRestaurant`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Restaurant is registered already.
    #[display("`Restaurant(id: {_0})` is registered already")]
    AlreadyRegistered(#[error(not(source))] restaurant::Id),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::AlreadyRegistered(_) => Category::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{
            restaurant::{self, Referrer},
            user,
        },
        spec::service,
        Command as _,
    };

    use super::{ExecutionError, RegisterRestaurant};

    #[tokio::test]
    async fn registers_once() {
        let svc = service();
        let restaurant_id = restaurant::Id::new();
        let supervisor_id = user::Id::new();

        let attribution = svc
            .execute(RegisterRestaurant {
                restaurant_id,
                referrer: Some(Referrer::Supervisor(supervisor_id)),
            })
            .await
            .unwrap();
        assert_eq!(attribution.supervisor_id(), Some(supervisor_id));

        let err = svc
            .execute(RegisterRestaurant {
                restaurant_id,
                referrer: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::AlreadyRegistered(id) if *id == restaurant_id,
        ));
    }

    #[tokio::test]
    async fn operator_referral_earns_no_commission() {
        let svc = service();

        let attribution = svc
            .execute(RegisterRestaurant {
                restaurant_id: restaurant::Id::new(),
                referrer: Some(Referrer::PlatformOperator(user::Id::new())),
            })
            .await
            .unwrap();
        assert_eq!(attribution.supervisor_id(), None);
    }
}
