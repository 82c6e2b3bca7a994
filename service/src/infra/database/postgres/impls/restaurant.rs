//! [`restaurant::Attribution`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{
        restaurant::{self, Attribution, Referrer, ReferrerKind},
        user,
    },
    infra::{
        database::{
            self,
            postgres::{Connection, CorruptedRow},
            Postgres,
        },
        Database,
    },
};

impl<C> Database<Select<By<Option<Attribution>, restaurant::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Attribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Attribution>, restaurant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: restaurant::Id = by.into_inner();

        const SQL: &str = "\
            SELECT restaurant_id, referrer_kind, referrer_id, registered_at \
            FROM attributions \
            WHERE restaurant_id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        let referrer = match (
            row.get::<_, Option<ReferrerKind>>("referrer_kind"),
            row.get::<_, Option<user::Id>>("referrer_id"),
        ) {
            (Some(kind), Some(id)) => Some(Referrer::from_parts(kind, id)),
            (None, None) => None,
            (_, _) => {
                return Err(CorruptedRow {
                    table: "attributions",
                    reason: "`referrer_kind`/`referrer_id` mismatch",
                }
                .into_traced());
            }
        };
        Ok(Some(Attribution {
            restaurant_id: row.get("restaurant_id"),
            referrer,
            registered_at: row.get("registered_at"),
        }))
    }
}

impl<C> Database<Insert<Attribution>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(attribution): Insert<Attribution>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO attributions ( \
                restaurant_id, referrer_kind, referrer_id, registered_at \
            ) VALUES ( \
                $1::UUID, $2::INT2, $3::UUID, $4::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &attribution.restaurant_id,
                &attribution.referrer.map(Referrer::kind),
                &attribution.referrer.map(Referrer::user_id),
                &attribution.registered_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
