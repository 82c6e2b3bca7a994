//! [`Order`]-related [`Database`] implementations.

use common::{
    operations::{By, Delete, Insert, Lock, Select, Swap},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        cart,
        order::{
            self, Address, CaptureReceipt, Delivery, DeliveryType, Earnings,
            Location, Payment, PaymentMethod,
        },
        settlement, Order,
    },
    infra::{
        database::{
            self,
            postgres::{Connection, CorruptedRow},
            Postgres,
        },
        Database,
    },
    read::{self, report::Period},
};

/// Rejects a corrupted `orders` row.
const fn corrupted(reason: &'static str) -> CorruptedRow {
    CorruptedRow {
        table: "orders",
        reason,
    }
}

/// Decodes an [`Order`] out of the provided `orders` [`Row`] and its lines.
fn decode(row: &Row, lines: &[Row]) -> Result<Order, CorruptedRow> {
    let restaurant_id = row.get("restaurant_id");

    let lines = lines
        .iter()
        .map(|l| {
            let quantity = u32::try_from(l.get::<_, i32>("quantity"))
                .ok()
                .and_then(cart::Quantity::new)
                .ok_or(CorruptedRow {
                    table: "order_lines",
                    reason: "`quantity` is not positive",
                })?;
            Ok(cart::Line {
                item_id: l.get("item_id"),
                restaurant_id,
                unit_price: l.get("unit_price"),
                quantity,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if lines.is_empty() {
        return Err(corrupted("no lines"));
    }

    let payment = Payment::from_parts(
        row.get::<_, PaymentMethod>("payment_method"),
        row.get::<_, Option<String>>("capture_receipt")
            .and_then(CaptureReceipt::new),
    )
    .map_err(|_| corrupted("`capture_receipt` is missing"))?;

    let location = match (
        row.get::<_, Option<f64>>("latitude"),
        row.get::<_, Option<f64>>("longitude"),
    ) {
        (Some(lat), Some(lon)) => Some(
            Location::new(lat, lon)
                .ok_or(corrupted("`latitude`/`longitude` out of range"))?,
        ),
        (None, None) => None,
        (_, _) => return Err(corrupted("`latitude`/`longitude` mismatch")),
    };
    let delivery = Delivery::from_parts(
        row.get::<_, DeliveryType>("delivery_type"),
        row.get::<_, Option<String>>("address").and_then(Address::new),
        location,
    )
    .map_err(|_| corrupted("`address` or location is missing"))?;

    Ok(Order {
        id: row.get("id"),
        customer_id: row.get("customer_id"),
        restaurant_id,
        lines,
        subtotal: row.get("subtotal"),
        platform_fee: row.get("platform_fee"),
        discount: row.get("discount"),
        applied_offer_id: row.get("applied_offer_id"),
        payment,
        delivery,
        earnings: Earnings {
            restaurant: row.get("restaurant_earnings"),
            platform: row.get("platform_earnings"),
            supervisor: row.get("supervisor_commission"),
        },
        status: row.get("status"),
        delivery_fee: row.get("delivery_fee"),
        delivery_fee_set_by: row.get("delivery_fee_set_by"),
        delivery_fee_set_at: row.get("delivery_fee_set_at"),
        courier_id: row.get("courier_id"),
        total: row.get("total"),
        version: row.get("version"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl<C> Database<Select<By<Option<Order>, order::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Order>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: order::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, customer_id, restaurant_id, \
                   subtotal, platform_fee, discount, applied_offer_id, \
                   payment_method, capture_receipt, \
                   delivery_type, address, latitude, longitude, \
                   restaurant_earnings, platform_earnings, \
                   supervisor_commission, \
                   status, delivery_fee, delivery_fee_set_by, \
                   delivery_fee_set_at, courier_id, total, version, \
                   created_at, updated_at \
            FROM orders \
            WHERE id = $1::UUID";
        let Some(row) = self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(None);
        };

        const LINES_SQL: &str = "\
            SELECT item_id, unit_price, quantity \
            FROM order_lines \
            WHERE order_id = $1::UUID \
            ORDER BY position";
        let lines = self
            .query(LINES_SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?;

        decode(&row, &lines).map(Some).map_err(CorruptedRow::into_traced)
    }
}

impl<C> Database<Insert<Order>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(order): Insert<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        let Order {
            id,
            customer_id,
            restaurant_id,
            lines,
            subtotal,
            platform_fee,
            discount,
            applied_offer_id,
            payment,
            delivery,
            earnings,
            status,
            delivery_fee,
            delivery_fee_set_by,
            delivery_fee_set_at,
            courier_id,
            total,
            version,
            created_at,
            updated_at,
        } = order;

        let overflow = || {
            CorruptedRow {
                table: "order_lines",
                reason: "`position` or `quantity` overflows `INT4`",
            }
            .into_traced()
        };
        let mut positions = Vec::with_capacity(lines.len());
        let mut quantities = Vec::with_capacity(lines.len());
        for (n, l) in lines.iter().enumerate() {
            positions.push(i32::try_from(n).map_err(|_| overflow())?);
            quantities.push(
                i32::try_from(l.quantity.get()).map_err(|_| overflow())?,
            );
        }
        let item_ids = lines.iter().map(|l| l.item_id).collect::<Vec<_>>();
        let prices = lines.iter().map(|l| l.unit_price).collect::<Vec<_>>();

        let receipt = payment.receipt().map(AsRef::<str>::as_ref);
        let address = delivery.address().map(AsRef::<str>::as_ref);
        let location = delivery.location();

        const SQL: &str = "\
            WITH placed AS ( \
                INSERT INTO orders ( \
                    id, customer_id, restaurant_id, \
                    subtotal, platform_fee, discount, applied_offer_id, \
                    payment_method, capture_receipt, \
                    delivery_type, address, latitude, longitude, \
                    restaurant_earnings, platform_earnings, \
                    supervisor_commission, \
                    status, delivery_fee, delivery_fee_set_by, \
                    delivery_fee_set_at, courier_id, total, version, \
                    created_at, updated_at \
                ) VALUES ( \
                    $1::UUID, $2::UUID, $3::UUID, \
                    $4::NUMERIC, $5::NUMERIC, $6::NUMERIC, $7::UUID, \
                    $8::INT2, $9::VARCHAR, \
                    $10::INT2, $11::VARCHAR, $12::FLOAT8, $13::FLOAT8, \
                    $14::NUMERIC, $15::NUMERIC, $16::NUMERIC, \
                    $17::INT2, $18::NUMERIC, $19::INT2, \
                    $20::TIMESTAMPTZ, $21::UUID, $22::NUMERIC, $23::INT4, \
                    $24::TIMESTAMPTZ, $25::TIMESTAMPTZ \
                ) \
                RETURNING id \
            ) \
            INSERT INTO order_lines \
                (order_id, position, item_id, unit_price, quantity) \
            SELECT placed.id, l.position, l.item_id, l.unit_price, l.quantity \
            FROM placed, \
                 unnest($26::INT4[], $27::UUID[], $28::NUMERIC[], \
                        $29::INT4[]) \
                 AS l(position, item_id, unit_price, quantity)";
        self.exec(
            SQL,
            &[
                &id,
                &customer_id,
                &restaurant_id,
                &subtotal,
                &platform_fee,
                &discount,
                &applied_offer_id,
                &payment.method(),
                &receipt,
                &delivery.kind(),
                &address,
                &location.map(Location::latitude),
                &location.map(Location::longitude),
                &earnings.restaurant,
                &earnings.platform,
                &earnings.supervisor,
                &status,
                &delivery_fee,
                &delivery_fee_set_by,
                &delivery_fee_set_at,
                &courier_id,
                &total,
                &version,
                &created_at,
                &updated_at,
                &positions,
                &item_ids,
                &prices,
                &quantities,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Swap<Order>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::order::Swapped;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Swap(order): Swap<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        // Only the lifecycle part of an `Order` is mutable.
        const SQL: &str = "\
            UPDATE orders \
            SET status = $3::INT2, \
                delivery_fee = $4::NUMERIC, \
                delivery_fee_set_by = $5::INT2, \
                delivery_fee_set_at = $6::TIMESTAMPTZ, \
                courier_id = $7::UUID, \
                total = $8::NUMERIC, \
                version = $2::INT4, \
                updated_at = $9::TIMESTAMPTZ \
            WHERE id = $1::UUID \
              AND version + 1 = $2::INT4";
        self.exec(
            SQL,
            &[
                &order.id,
                &order.version,
                &order.status,
                &order.delivery_fee,
                &order.delivery_fee_set_by,
                &order.delivery_fee_set_at,
                &order.courier_id,
                &order.total,
                &order.updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|n| read::order::Swapped(n == 1))
    }
}

impl<C> Database<Lock<By<Order, order::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Order, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: order::Id = by.into_inner();

        // `DO UPDATE` row-locks an already existing lock entry as well, while
        // a concurrent insertion of a new one waits for this transaction.
        const SQL: &str = "\
            INSERT INTO orders_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id";
        self.exec(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<read::order::Purged, order::ModificationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::order::Purged;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<read::order::Purged, order::ModificationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let deadline: order::ModificationDateTime = by.into_inner();

        const SQL: &str = "\
            WITH purged AS ( \
                DELETE FROM orders AS o \
                WHERE o.status IN ($1::INT2, $2::INT2) \
                  AND o.updated_at < $3::TIMESTAMPTZ \
                  AND NOT EXISTS ( \
                      SELECT 1 FROM settlements AS s \
                      WHERE s.order_id = o.id \
                        AND s.status = $4::INT2 \
                  ) \
                RETURNING o.id \
            ), \
            settlements_purged AS ( \
                DELETE FROM settlements \
                WHERE order_id IN (SELECT id FROM purged) \
            ), \
            locks_purged AS ( \
                DELETE FROM orders_lock \
                WHERE id IN (SELECT id FROM purged) \
            ), \
            usages_purged AS ( \
                DELETE FROM offer_usages \
                WHERE order_id IN (SELECT id FROM purged) \
            ) \
            SELECT COUNT(*)::INT8 AS purged FROM purged";
        let row = self
            .query_opt(
                SQL,
                &[
                    &order::Status::Delivered,
                    &order::Status::Cancelled,
                    &deadline,
                    &settlement::Status::Pending,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?;
        let purged = row.map_or(0, |r| r.get::<_, i64>("purged"));
        Ok(read::order::Purged(u64::try_from(purged).unwrap_or_default()))
    }
}

impl<C> Database<Select<By<read::report::Summary, Period>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::report::Summary;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::report::Summary, Period>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Period { start, end } = by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*)::INT8 AS orders, \
                   COUNT(*) FILTER (WHERE status = $3::INT2)::INT8 \
                       AS delivered, \
                   COUNT(*) FILTER (WHERE status = $4::INT2)::INT8 \
                       AS cancelled, \
                   COALESCE(SUM(total) \
                       FILTER (WHERE status <> $4::INT2), 0) AS gross, \
                   COALESCE(SUM(platform_fee) \
                       FILTER (WHERE status <> $4::INT2), 0) \
                       AS platform_fees, \
                   COALESCE(SUM(discount) \
                       FILTER (WHERE status <> $4::INT2), 0) AS discounts, \
                   COALESCE(SUM(delivery_fee) \
                       FILTER (WHERE status <> $4::INT2), 0) \
                       AS delivery_fees, \
                   COALESCE(SUM(restaurant_earnings) \
                       FILTER (WHERE status <> $4::INT2), 0) \
                       AS restaurant_earnings, \
                   COALESCE(SUM(platform_earnings) \
                       FILTER (WHERE status <> $4::INT2), 0) \
                       AS platform_earnings, \
                   COALESCE(SUM(supervisor_commission) \
                       FILTER (WHERE status <> $4::INT2), 0) \
                       AS supervisor_commission \
            FROM orders \
            WHERE created_at >= $1::TIMESTAMPTZ \
              AND created_at <= $2::TIMESTAMPTZ";
        let Some(row) = self
            .query_opt(
                SQL,
                &[
                    &start,
                    &end,
                    &order::Status::Delivered,
                    &order::Status::Cancelled,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
        else {
            return Ok(read::report::Summary::default());
        };

        let count = |col| {
            u64::try_from(row.get::<_, i64>(col)).unwrap_or_default()
        };
        let sum = |col| row.get::<_, Money>(col);
        Ok(read::report::Summary {
            orders: count("orders"),
            delivered: count("delivered"),
            cancelled: count("cancelled"),
            gross: sum("gross"),
            platform_fees: sum("platform_fees"),
            discounts: sum("discounts"),
            delivery_fees: sum("delivery_fees"),
            earnings: Earnings {
                restaurant: sum("restaurant_earnings"),
                platform: sum("platform_earnings"),
                supervisor: sum("supervisor_commission"),
            },
        })
    }
}
