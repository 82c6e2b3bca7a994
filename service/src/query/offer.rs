//! [`Query`] collection related to [`Offer`]s.

use common::{
    operations::{By, Select},
    DateTime, Money,
};
use tracerr::Traced;

use crate::{
    domain::{offer, restaurant, Offer},
    infra::{database, Database},
    Query, Service,
};

/// [`Query`] of the [`Offer`]s a customer may choose from at checkout.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Applicable {
    /// ID of the restaurant being ordered from.
    pub restaurant_id: restaurant::Id,

    /// Subtotal of the order being placed.
    pub subtotal: Money,
}

impl<Db> Query<Applicable> for Service<Db>
where
    Db: Database<
        Select<By<Vec<Offer>, restaurant::Id>>,
        Ok = Vec<Offer>,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Vec<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Applicable {
            restaurant_id,
            subtotal,
        }: Applicable,
    ) -> Result<Self::Ok, Self::Err> {
        let offers = self
            .database()
            .execute(Select(By::<Vec<Offer>, _>::new(restaurant_id)))
            .await
            .map_err(tracerr::wrap!())?;
        Ok(offer::applicable(
            offers,
            restaurant_id,
            subtotal,
            DateTime::now(),
        ))
    }
}
