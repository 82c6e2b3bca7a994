//! [`Wallet`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;
use uuid::Uuid;

use crate::{
    domain::{
        wallet::{Owner, OwnerKind, Posting},
        Wallet,
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

/// Decodes an [`Owner`] out of the provided [`Row`].
fn decode_owner(row: &Row, table: &'static str) -> Result<Owner, CorruptedRow> {
    Owner::from_parts(
        row.get::<_, OwnerKind>("owner_kind"),
        row.get::<_, Uuid>("owner_id"),
    )
    .ok_or(CorruptedRow {
        table,
        reason: "platform owner has non-nil `owner_id`",
    })
}

impl<C> Database<Insert<Posting>> for Postgres<C>
where
    C: Connection,
{
    type Ok = read::wallet::Applied;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(posting): Insert<Posting>,
    ) -> Result<Self::Ok, Self::Err> {
        let owner_kind = posting.owner.kind();
        let owner_id = posting.owner.id();
        let delta = posting.delta();

        const ENSURE_SQL: &str = "\
            INSERT INTO wallets (owner_kind, owner_id, updated_at) \
            VALUES ($1::INT2, $2::UUID, $3::TIMESTAMPTZ) \
            ON CONFLICT (owner_kind, owner_id) DO NOTHING";
        _ = self
            .exec(ENSURE_SQL, &[&owner_kind, &owner_id, &posting.created_at])
            .await
            .map_err(tracerr::wrap!())?;

        // Updating the wallet row serializes concurrent postings to it, so the
        // guard is checked against the latest balance.
        const SQL: &str = "\
            WITH applied AS ( \
                UPDATE wallets \
                SET balance = balance + $4::NUMERIC, \
                    pending_balance = pending_balance + $5::NUMERIC, \
                    total_earnings = total_earnings + $6::NUMERIC, \
                    total_withdrawn = total_withdrawn + $7::NUMERIC, \
                    updated_at = $11::TIMESTAMPTZ \
                WHERE owner_kind = $1::INT2 \
                  AND owner_id = $2::UUID \
                  AND (NOT $8::BOOLEAN OR balance + $4::NUMERIC >= 0) \
                  AND abs(balance + $4::NUMERIC) <= $13::NUMERIC \
                  AND abs(pending_balance + $5::NUMERIC) <= $13::NUMERIC \
                  AND total_earnings + $6::NUMERIC <= $13::NUMERIC \
                  AND total_withdrawn + $7::NUMERIC <= $13::NUMERIC \
                RETURNING owner_kind, owner_id \
            ) \
            INSERT INTO wallet_transactions ( \
                id, owner_kind, owner_id, order_id, kind, amount, created_at \
            ) \
            SELECT $3::UUID, owner_kind, owner_id, $9::UUID, $10::INT2, \
                   $12::NUMERIC, $11::TIMESTAMPTZ \
            FROM applied";
        self.exec(
            SQL,
            &[
                &owner_kind,
                &owner_id,
                &posting.id,
                &delta.balance,
                &delta.pending,
                &delta.earnings,
                &delta.withdrawn,
                &delta.guarded,
                &posting.order_id,
                &posting.kind,
                &posting.created_at,
                &posting.amount,
                &Decimal::MAX,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|n| read::wallet::Applied(n == 1))
    }
}

impl<C> Database<Select<By<Option<Wallet>, Owner>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Wallet>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Wallet>, Owner>>,
    ) -> Result<Self::Ok, Self::Err> {
        let owner: Owner = by.into_inner();

        const SQL: &str = "\
            SELECT balance, pending_balance, total_earnings, \
                   total_withdrawn, updated_at \
            FROM wallets \
            WHERE owner_kind = $1::INT2 \
              AND owner_id = $2::UUID";
        self.query_opt(SQL, &[&owner.kind(), &owner.id()])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| Wallet {
                    owner,
                    balance: row.get("balance"),
                    pending_balance: row.get("pending_balance"),
                    total_earnings: row.get("total_earnings"),
                    total_withdrawn: row.get("total_withdrawn"),
                    updated_at: row.get("updated_at"),
                })
            })
    }
}

impl<C> Database<Select<By<Vec<Posting>, Owner>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Posting>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Posting>, Owner>>,
    ) -> Result<Self::Ok, Self::Err> {
        let owner: Owner = by.into_inner();

        const SQL: &str = "\
            SELECT id, owner_kind, owner_id, order_id, kind, amount, \
                   created_at \
            FROM wallet_transactions \
            WHERE owner_kind = $1::INT2 \
              AND owner_id = $2::UUID \
            ORDER BY created_at, id";
        self.query(SQL, &[&owner.kind(), &owner.id()])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(|row| {
                Ok(Posting {
                    id: row.get("id"),
                    owner: decode_owner(row, "wallet_transactions")?,
                    order_id: row.get("order_id"),
                    kind: row.get("kind"),
                    amount: row.get("amount"),
                    created_at: row.get("created_at"),
                })
            })
            .collect::<Result<_, CorruptedRow>>()
            .map_err(CorruptedRow::into_traced)
    }
}
