//! [`Settlement`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        order::{self, Earnings},
        settlement, Settlement,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::settlement::Backlog,
};

/// Decodes a [`Settlement`] out of the provided `settlements` [`Row`].
fn decode(row: &Row) -> Settlement {
    Settlement {
        order_id: row.get("order_id"),
        restaurant_id: row.get("restaurant_id"),
        customer_id: row.get("customer_id"),
        supervisor_id: row.get("supervisor_id"),
        earnings: Earnings {
            restaurant: row.get("restaurant_earnings"),
            platform: row.get("platform_earnings"),
            supervisor: row.get("supervisor_commission"),
        },
        customer_debit: row.get("customer_debit"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl<C> Database<Insert<Settlement>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(s): Insert<Settlement>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO settlements ( \
                order_id, restaurant_id, customer_id, supervisor_id, \
                restaurant_earnings, platform_earnings, \
                supervisor_commission, customer_debit, \
                status, created_at, updated_at \
            ) VALUES ( \
                $1::UUID, $2::UUID, $3::UUID, $4::UUID, \
                $5::NUMERIC, $6::NUMERIC, \
                $7::NUMERIC, $8::NUMERIC, \
                $9::INT2, $10::TIMESTAMPTZ, $11::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &s.order_id,
                &s.restaurant_id,
                &s.customer_id,
                &s.supervisor_id,
                &s.earnings.restaurant,
                &s.earnings.platform,
                &s.earnings.supervisor,
                &s.customer_debit,
                &s.status,
                &s.created_at,
                &s.updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Settlement>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(s): Update<Settlement>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE settlements \
            SET status = $2::INT2, \
                updated_at = $3::TIMESTAMPTZ \
            WHERE order_id = $1::UUID";
        self.exec(SQL, &[&s.order_id, &s.status, &s.updated_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<Settlement>, order::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Settlement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Settlement>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: order::Id = by.into_inner();

        const SQL: &str = "\
            SELECT order_id, restaurant_id, customer_id, supervisor_id, \
                   restaurant_earnings, platform_earnings, \
                   supervisor_commission, customer_debit, \
                   status, created_at, updated_at \
            FROM settlements \
            WHERE order_id = $1::UUID";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(decode))
    }
}

impl<C> Database<Select<By<Vec<order::Id>, Backlog>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<order::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<order::Id>, Backlog>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Backlog { limit } = by.into_inner();

        const SQL: &str = "\
            SELECT order_id \
            FROM settlements \
            WHERE status = $1::INT2 \
            ORDER BY created_at \
            LIMIT $2::INT8";
        self.query(
            SQL,
            &[&settlement::Status::Pending, &i64::from(limit)],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows.iter().map(|r| r.get("order_id")).collect())
    }
}
