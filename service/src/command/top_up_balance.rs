//! [`Command`] for funding a customer's stored balance.

use common::{operations::Insert, DateTime, Money};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{order::Payment, Wallet};
use crate::{
    domain::{
        user,
        wallet::{Owner, Posting, PostingKind},
    },
    error::{Categorize, Category},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for depositing funds to a customer's [`Wallet`], so orders can
/// be paid with [`Payment::Balance`].
#[derive(Clone, Copy, Debug)]
pub struct TopUpBalance {
    /// ID of the customer to fund.
    pub customer_id: user::Id,

    /// Deposited amount.
    pub amount: Money,
}

impl<Db> Command<TopUpBalance> for Service<Db>
where
    Db: Database<
        Insert<Posting>,
        Ok = read::wallet::Applied,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Posting;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: TopUpBalance) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let TopUpBalance {
            customer_id,
            amount,
        } = cmd;

        if amount.is_zero() {
            return Err(tracerr::new!(E::ZeroAmount));
        }

        let posting = Posting::new(
            Owner::Customer(customer_id),
            None,
            PostingKind::Deposit,
            amount,
            DateTime::now(),
        );
        // Deposits are never guarded, so only an overflow rejects them.
        let applied = self
            .database()
            .execute(Insert(posting))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !*applied {
            return Err(tracerr::new!(E::AmountOverflow));
        }

        Ok(posting)
    }
}

/// Error of [`TopUpBalance`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Deposited amount is zero.
    #[display("Deposit amount must be positive")]
    ZeroAmount,

    /// Deposit makes the balance overflow.
    #[display("Deposit overflows the balance")]
    AmountOverflow,
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::ZeroAmount | Self::AmountOverflow => Category::Validation,
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        domain::{
            user,
            wallet::{Owner, PostingKind},
        },
        query,
        spec::{dec, service, wallet},
        Command as _,
    };

    use super::{ExecutionError, TopUpBalance};

    #[tokio::test]
    async fn deposits_to_customer_wallet() {
        let svc = service();
        let customer_id = user::Id::new();

        for amount in ["10.00", "2.50"] {
            _ = svc
                .execute(TopUpBalance {
                    customer_id,
                    amount: amount.parse().unwrap(),
                })
                .await
                .unwrap();
        }

        let owner = Owner::Customer(customer_id);
        assert_eq!(wallet(&svc, owner).await.balance, dec("12.50"));

        let history = svc
            .execute(query::wallet::Transactions::by(owner))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|p| p.kind == PostingKind::Deposit));
    }

    #[tokio::test]
    async fn rejects_zero_amount() {
        let svc = service();

        let err = svc
            .execute(TopUpBalance {
                customer_id: user::Id::new(),
                amount: Money::ZERO,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::ZeroAmount));
    }

    #[tokio::test]
    async fn rejects_overflowing_balance() {
        let svc = service();
        let customer_id = user::Id::new();
        _ = svc
            .execute(TopUpBalance {
                customer_id,
                amount: Money::MAX,
            })
            .await
            .unwrap();

        let err = svc
            .execute(TopUpBalance {
                customer_id,
                amount: Money::from_cents(100),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::AmountOverflow));

        let owner = Owner::Customer(customer_id);
        assert_eq!(wallet(&svc, owner).await.balance, Money::MAX.amount());
    }
}
