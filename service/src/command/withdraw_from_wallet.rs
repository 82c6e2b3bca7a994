//! [`Command`] for withdrawing from a [`Wallet`].

use common::{operations::Insert, DateTime, Money};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Wallet;
use crate::{
    domain::wallet::{Owner, Posting, PostingKind},
    error::{Categorize, Category},
    infra::{database, Database},
    read, Service,
};

use super::Command;

/// [`Command`] for withdrawing earnings from a [`Wallet`].
///
/// The [`Wallet::balance`] is checked and decremented atomically, so it never
/// goes negative because of a withdrawal.
#[derive(Clone, Copy, Debug)]
pub struct WithdrawFromWallet {
    /// [`Owner`] of the [`Wallet`] to withdraw from.
    pub owner: Owner,

    /// Amount to withdraw.
    pub amount: Money,
}

impl<Db> Command<WithdrawFromWallet> for Service<Db>
where
    Db: Database<
        Insert<Posting>,
        Ok = read::wallet::Applied,
        Err = Traced<database::Error>,
    >,
{
    type Ok = Posting;
    type Err = Traced<ExecutionError>;

    #[tracing::instrument(
        skip_all,
        fields(
            amount = %cmd.amount,
            owner.id = %cmd.owner.id(),
            owner.kind = %cmd.owner.kind(),
        ),
    )]
    async fn execute(
        &self,
        cmd: WithdrawFromWallet,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let WithdrawFromWallet { owner, amount } = cmd;

        if matches!(owner, Owner::Customer(_)) {
            return Err(tracerr::new!(E::NotEarning));
        }
        if amount.is_zero() {
            return Err(tracerr::new!(E::ZeroAmount));
        }

        let posting = Posting::new(
            owner,
            None,
            PostingKind::Withdrawal,
            amount,
            DateTime::now(),
        );
        let applied = self
            .database()
            .execute(Insert(posting))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !*applied {
            return Err(tracerr::new!(E::InsufficientFunds(amount)));
        }

        log::info!("withdrawn {amount} from `{}` wallet", owner.kind());
        Ok(posting)
    }
}

/// Error of [`WithdrawFromWallet`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Owner`] has no earnings to withdraw.
    #[display("Only earning wallets can be withdrawn from")]
    NotEarning,

    /// Withdrawal amount is zero.
    #[display("Withdrawal amount must be positive")]
    ZeroAmount,

    /// [`Wallet`] balance doesn't cover the amount.
    #[display("Insufficient balance to withdraw {_0}")]
    InsufficientFunds(#[error(not(source))] Money),
}

impl Categorize for ExecutionError {
    fn category(&self) -> Category {
        match self {
            Self::Db(e) => e.category(),
            Self::NotEarning | Self::ZeroAmount => Category::Validation,
            Self::InsufficientFunds(_) => Category::InsufficientFunds,
        }
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{restaurant::Referrer, user, wallet::Owner},
        spec::{dec, place, register, service, wallet},
        Categorize as _, Category, Command as _,
    };

    use super::{ExecutionError, WithdrawFromWallet};

    #[tokio::test]
    async fn withdraws_within_balance() {
        let svc = service();
        let supervisor_id = user::Id::new();
        let restaurant_id =
            register(&svc, Some(Referrer::Supervisor(supervisor_id))).await;
        _ = place(&svc, restaurant_id).await;
        let owner = Owner::Supervisor(supervisor_id);

        _ = svc
            .execute(WithdrawFromWallet {
                owner,
                amount: "1.00".parse().unwrap(),
            })
            .await
            .unwrap();
        let w = wallet(&svc, owner).await;
        assert_eq!(w.balance, dec("0.50"));
        assert_eq!(w.total_withdrawn, dec("1.00"));

        let err = svc
            .execute(WithdrawFromWallet {
                owner,
                amount: "1.00".parse().unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InsufficientFunds(_)));
        assert_eq!(err.category(), Category::InsufficientFunds);
        assert_eq!(wallet(&svc, owner).await.balance, dec("0.50"));
    }

    #[tokio::test]
    async fn pending_earnings_are_not_withdrawable() {
        let svc = service();
        let restaurant_id = register(&svc, None).await;
        _ = place(&svc, restaurant_id).await;

        let err = svc
            .execute(WithdrawFromWallet {
                owner: Owner::Restaurant(restaurant_id),
                amount: "1.00".parse().unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::InsufficientFunds(_)));
    }

    #[tokio::test]
    async fn rejects_customer_wallets() {
        let svc = service();

        let err = svc
            .execute(WithdrawFromWallet {
                owner: Owner::Customer(user::Id::new()),
                amount: "1.00".parse().unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotEarning));
        assert_eq!(err.category(), Category::Validation);
    }
}
