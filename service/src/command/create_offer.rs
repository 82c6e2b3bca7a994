//! [`Command`] for creating a new [`Offer`].

use common::{
    operations::{By, Insert, Select},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        offer::{self, Discount, Offer},
        restaurant::{self, Attribution},
    },
    error::{Categorize, Category},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Offer`] of a registered restaurant.
#[derive(Clone, Copy, Debug)]
pub struct CreateOffer {
    /// ID of the restaurant creating the [`Offer`].
    pub restaurant_id: restaurant::Id,

    /// [`Discount`] granted by the [`Offer`].
    pub discount: Discount,

    /// Minimal subtotal for the [`Offer`] to apply, if any.
    pub min_order_amount: Option<Money>,

    /// [`DateTime`] when the [`Offer`] starts, if limited.
    pub starts_at: Option<offer::StartDateTime>,

    /// [`DateTime`] when the [`Offer`] expires, if limited.
    pub expires_at: Option<offer::ExpirationDateTime>,

    /// Indicator whether the [`Offer`] is switched on right away.
    pub is_active: bool,
}

impl<Db> Command<CreateOffer> for Service<Db>
where
    Db: Database<
            Select<By<Option<Attribution>, restaurant::Id>>,
            Ok = Option<Attribution>,
            Err = Traced<database::Error>,
        > + Database<Insert<Offer>, Err = Traced<database::Error>>,
{
    type Ok = Offer;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(
            kind = %cmd.discount.kind(),
            restaurant.id = %cmd.restaurant_id,
        ),
    )]
    async fn execute(&self, cmd: CreateOffer) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateOffer {
            restaurant_id,
            discount,
            min_order_amount,
            starts_at,
            expires_at,
            is_active,
        } = cmd;

        discount
            .validate()
            .map_err(E::Invalid)
            .map_err(tracerr::wrap!())?;
        if let (Some(start), Some(end)) = (starts_at, expires_at) {
            if start.coerce::<()>() > end.coerce::<()>() {
                return Err(tracerr::new!(E::Invalid(
                    offer::Invalid::InvertedWindow,
                )));
            }
        }

        _ = self
            .database()
            .execute(Select(By::<Option<Attribution>, _>::new(restaurant_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RestaurantNotRegistered(restaurant_id))
            .map_err(tracerr::wrap!())?;

        let offer = Offer {
            id: offer::Id::new(),
            restaurant_id,
            discount,
            min_order_amount,
            starts_at,
            expires_at,
            is_active,
            usage_count: 0,
            created_at: DateTime::now().coerce(),
        };
        self.database()
            .execute(Insert(offer))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(offer)
    }
}

/// Error of [`CreateOffer`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Offer`] parameters are invalid.
    #[display("Invalid `Offer`: {_0}")]
    Invalid(offer::Invalid),

    /// Restaurant has no [`Attribution`] registered.
    #[display("`Restaurant(id: {_0})` is not registered")]
    RestaurantNotRegistered(#[error(not(source))] restaurant::Id),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::Invalid(_) | Self::RestaurantNotRegistered(_) => {
                Category::Validation
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use common::DateTime;

    use crate::{
        domain::{
            offer::{Discount, Invalid},
            restaurant,
        },
        spec::{register, service},
        Categorize as _, Category, Command as _,
    };

    use super::{CreateOffer, ExecutionError};

    fn fixed(restaurant_id: restaurant::Id) -> CreateOffer {
        CreateOffer {
            restaurant_id,
            discount: Discount::Fixed("5.00".parse().unwrap()),
            min_order_amount: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn creates_unused_offer() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;

        let offer = svc.execute(fixed(restaurant_id)).await.unwrap();
        assert_eq!(offer.restaurant_id, restaurant_id);
        assert_eq!(offer.usage_count, 0);
    }

    #[tokio::test]
    async fn rejects_inverted_window() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        let now = DateTime::now();

        let err = svc
            .execute(CreateOffer {
                starts_at: Some(now.coerce()),
                expires_at: Some((now - std::time::Duration::from_secs(60))
                    .coerce()),
                ..fixed(restaurant_id)
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Invalid(Invalid::InvertedWindow),
        ));
        assert_eq!(err.category(), Category::Validation);
    }

    #[tokio::test]
    async fn rejects_overpriced_bundle() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;

        let err = svc
            .execute(CreateOffer {
                discount: Discount::Bundle {
                    price: "12.00".parse().unwrap(),
                    original_price: "10.00".parse().unwrap(),
                },
                ..fixed(restaurant_id)
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::Invalid(Invalid::BundleOverpriced { .. }),
        ));
    }

    #[tokio::test]
    async fn requires_registered_restaurant() {
        let svc = service();

        let err = svc
            .execute(fixed(restaurant::Id::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::RestaurantNotRegistered(_),
        ));
    }
}
