//! [`Offer`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select},
    Money, Percent,
};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        offer::{self, Discount, Kind},
        restaurant, Offer,
    },
    infra::{
        database::{
            self,
            postgres::{Connection, CorruptedRow},
            Postgres,
        },
        Database,
    },
    read,
};

/// Rejects a corrupted `offers` row.
const fn corrupted(reason: &'static str) -> CorruptedRow {
    CorruptedRow {
        table: "offers",
        reason,
    }
}

/// Decodes a [`Discount`] out of the kind-specific columns of the provided
/// `offers` [`Row`].
fn decode_discount(row: &Row) -> Result<Discount, CorruptedRow> {
    let quantity = |col| {
        row.get::<_, Option<i32>>(col)
            .and_then(|q| u32::try_from(q).ok())
            .ok_or(corrupted("buy/get quantity is missing or negative"))
    };
    Ok(match row.get::<_, Kind>("kind") {
        Kind::Percent => Discount::Percent(
            row.get::<_, Option<Decimal>>("discount_percent")
                .and_then(Percent::new)
                .ok_or(corrupted("`discount_percent` is invalid"))?,
        ),
        Kind::Fixed => Discount::Fixed(
            row.get::<_, Option<Decimal>>("discount_amount")
                .and_then(Money::new)
                .ok_or(corrupted("`discount_amount` is invalid"))?,
        ),
        Kind::Bundle => Discount::Bundle {
            price: row
                .get::<_, Option<Money>>("bundle_price")
                .ok_or(corrupted("`bundle_price` is missing"))?,
            original_price: row
                .get::<_, Option<Money>>("bundle_original_price")
                .ok_or(corrupted("`bundle_original_price` is missing"))?,
        },
        Kind::BuyXGetY => Discount::BuyXGetY {
            buy: quantity("buy_quantity")?,
            get: quantity("get_quantity")?,
        },
    })
}

impl<C> Database<Select<By<Vec<Offer>, restaurant::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Offer>, restaurant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let restaurant_id: restaurant::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, restaurant_id, kind, \
                   discount_percent, discount_amount, \
                   bundle_price, bundle_original_price, \
                   buy_quantity, get_quantity, \
                   min_order_amount, starts_at, expires_at, \
                   is_active, usage_count, created_at \
            FROM offers \
            WHERE restaurant_id = $1::UUID \
            ORDER BY created_at, id";
        self.query(SQL, &[&restaurant_id])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                Ok(Offer {
                    id: row.get("id"),
                    restaurant_id: row.get("restaurant_id"),
                    discount: decode_discount(row)?,
                    min_order_amount: row.get("min_order_amount"),
                    starts_at: row.get("starts_at"),
                    expires_at: row.get("expires_at"),
                    is_active: row.get("is_active"),
                    usage_count: u32::try_from(
                        row.get::<_, i32>("usage_count"),
                    )
                    .map_err(|_| corrupted("`usage_count` is negative"))?,
                    created_at: row.get("created_at"),
                })
            })
            .collect::<Result<_, CorruptedRow>>()
            .map_err(CorruptedRow::into_traced)
    }
}

impl<C> Database<Insert<Offer>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(offer): Insert<Offer>,
    ) -> Result<Self::Ok, Self::Err> {
        let overflow = || {
            corrupted("quantity or `usage_count` overflows `INT4`")
                .into_traced()
        };

        let (mut percent, mut amount) = (None, None);
        let (mut bundle_price, mut bundle_original_price) = (None, None);
        let (mut buy, mut get) = (None::<i32>, None::<i32>);
        match offer.discount {
            Discount::Percent(p) => percent = Some(p),
            Discount::Fixed(a) => amount = Some(a),
            Discount::Bundle {
                price,
                original_price,
            } => {
                bundle_price = Some(price);
                bundle_original_price = Some(original_price);
            }
            Discount::BuyXGetY { buy: b, get: g } => {
                buy = Some(i32::try_from(b).map_err(|_| overflow())?);
                get = Some(i32::try_from(g).map_err(|_| overflow())?);
            }
        }
        let usage_count =
            i32::try_from(offer.usage_count).map_err(|_| overflow())?;

        const SQL: &str = "\
            INSERT INTO offers ( \
                id, restaurant_id, kind, \
                discount_percent, discount_amount, \
                bundle_price, bundle_original_price, \
                buy_quantity, get_quantity, \
                min_order_amount, starts_at, expires_at, \
                is_active, usage_count, created_at \
            ) VALUES ( \
                $1::UUID, $2::UUID, $3::INT2, \
                $4::NUMERIC, $5::NUMERIC, \
                $6::NUMERIC, $7::NUMERIC, \
                $8::INT4, $9::INT4, \
                $10::NUMERIC, $11::TIMESTAMPTZ, $12::TIMESTAMPTZ, \
                $13::BOOLEAN, $14::INT4, $15::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &offer.id,
                &offer.restaurant_id,
                &offer.discount.kind(),
                &percent,
                &amount,
                &bundle_price,
                &bundle_original_price,
                &buy,
                &get,
                &offer.min_order_amount,
                &offer.starts_at,
                &offer.expires_at,
                &offer.is_active,
                &usage_count,
                &offer.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Insert<offer::Usage>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::offer::Recorded;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(usage): Insert<offer::Usage>,
    ) -> Result<Self::Ok, Self::Err> {
        // Counter is bumped only along with a newly recorded usage.
        const SQL: &str = "\
            WITH recorded AS ( \
                INSERT INTO offer_usages (order_id, offer_id) \
                VALUES ($1::UUID, $2::UUID) \
                ON CONFLICT (order_id) DO NOTHING \
                RETURNING offer_id \
            ) \
            UPDATE offers \
            SET usage_count = usage_count + 1 \
            WHERE id IN (SELECT offer_id FROM recorded)";
        self.exec(SQL, &[&usage.order_id, &usage.offer_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|n| read::offer::Recorded(n == 1))
    }
}
