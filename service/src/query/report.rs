//! [`Finance`] report definition.

use common::{
    operations::{By, Select},
    DateTime,
};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Order;
use crate::{
    domain::{wallet::Owner, Wallet},
    infra::{database, Database},
    read::report::{Period, Summary},
    Query, Service,
};

/// [`Query`] of the platform finances over the [`Order`]s placed within a
/// period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Finance {
    /// Start of the period.
    pub start: DateTime,

    /// End of the period.
    pub end: DateTime,
}

/// Output of the [`Finance`] [`Query`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Output {
    /// [`Summary`] of the [`Order`]s placed within the period.
    pub summary: Summary,

    /// Current [`Owner::Platform`] [`Wallet`], if anything was posted to it.
    pub platform: Option<Wallet>,
}

impl<Db> Query<Finance> for Service<Db>
where
    Db: Database<
            Select<By<Summary, Period>>,
            Ok = Summary,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Wallet>, Owner>>,
            Ok = Option<Wallet>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Finance { start, end }: Finance,
    ) -> Result<Self::Ok, Self::Err> {
        let period = Period {
            start: start.coerce(),
            end: end.coerce(),
        };
        let summary = self
            .database()
            .execute(Select(By::<Summary, _>::new(period)))
            .await
            .map_err(tracerr::wrap!())?;
        let platform = self
            .database()
            .execute(Select(By::<Option<Wallet>, _>::new(Owner::Platform)))
            .await
            .map_err(tracerr::wrap!())?;
        Ok(Output { summary, platform })
    }
}
