//! [`Wallet`] definitions.

use common::{define_kind, unit, DateTime, DateTimeOf, Money};
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{order, restaurant, user};

/// Balance record of a marketplace party.
///
/// Only ever changed by applying [`Posting`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Wallet {
    /// [`Owner`] of this [`Wallet`].
    pub owner: Owner,

    /// Spendable balance.
    ///
    /// May go negative when already spent earnings are reversed.
    pub balance: Decimal,

    /// Earnings credited but not confirmed spendable yet.
    pub pending_balance: Decimal,

    /// Earnings confirmed over the whole [`Wallet`] history.
    pub total_earnings: Decimal,

    /// Amount withdrawn over the whole [`Wallet`] history.
    pub total_withdrawn: Decimal,

    /// [`DateTime`] when this [`Wallet`] was modified last time.
    pub updated_at: ModificationDateTime,
}

impl Wallet {
    /// Creates a new empty [`Wallet`] of the provided [`Owner`].
    #[must_use]
    pub fn empty(owner: Owner, now: DateTime) -> Self {
        Self {
            owner,
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            updated_at: now.coerce(),
        }
    }

    /// Applies the provided [`Posting`] to this [`Wallet`].
    ///
    /// Returns `false` and leaves this [`Wallet`] untouched if the [`Posting`]
    /// is guarded and the [`Wallet::balance`] doesn't cover it, or if any of
    /// the balances overflows.
    #[must_use]
    pub fn apply(&mut self, posting: &Posting) -> bool {
        let delta = posting.delta();
        let add = |a: Decimal, b: Decimal| a.checked_add(b);
        let Some(balance) = add(self.balance, delta.balance) else {
            return false;
        };
        if delta.guarded && balance < Decimal::ZERO {
            return false;
        }
        let (Some(pending), Some(earnings), Some(withdrawn)) = (
            add(self.pending_balance, delta.pending),
            add(self.total_earnings, delta.earnings),
            add(self.total_withdrawn, delta.withdrawn),
        ) else {
            return false;
        };
        self.balance = balance;
        self.pending_balance = pending;
        self.total_earnings = earnings;
        self.total_withdrawn = withdrawn;
        self.updated_at = posting.created_at.coerce();
        true
    }
}

/// Owner of a [`Wallet`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Owner {
    /// Restaurant earning from its orders.
    Restaurant(restaurant::Id),

    /// Referral supervisor earning commission.
    Supervisor(user::Id),

    /// Customer paying from the stored balance.
    Customer(user::Id),

    /// Platform operator itself.
    Platform,
}

impl Owner {
    /// Reserved ID of the [`Owner::Platform`].
    pub const PLATFORM_ID: Uuid = Uuid::nil();

    /// Constructs an [`Owner`] out of its stored parts.
    ///
    /// [`None`] is returned for an [`OwnerKind::Platform`] with an ID other
    /// than the [`Owner::PLATFORM_ID`].
    #[must_use]
    pub fn from_parts(kind: OwnerKind, id: Uuid) -> Option<Self> {
        Some(match kind {
            OwnerKind::Restaurant => Self::Restaurant(id.into()),
            OwnerKind::Supervisor => Self::Supervisor(id.into()),
            OwnerKind::Customer => Self::Customer(id.into()),
            OwnerKind::Platform => {
                return (id == Self::PLATFORM_ID).then_some(Self::Platform)
            }
        })
    }

    /// Returns [`OwnerKind`] of this [`Owner`].
    #[must_use]
    pub fn kind(self) -> OwnerKind {
        match self {
            Self::Restaurant(_) => OwnerKind::Restaurant,
            Self::Supervisor(_) => OwnerKind::Supervisor,
            Self::Customer(_) => OwnerKind::Customer,
            Self::Platform => OwnerKind::Platform,
        }
    }

    /// Returns ID of this [`Owner`].
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            Self::Restaurant(id) => id.into(),
            Self::Supervisor(id) | Self::Customer(id) => id.into(),
            Self::Platform => Self::PLATFORM_ID,
        }
    }
}

define_kind! {
    #[doc = "Kind of an [`Owner`]."]
    enum OwnerKind {
        #[doc = "[`Owner::Restaurant`]."]
        Restaurant = 1,

        #[doc = "[`Owner::Supervisor`]."]
        Supervisor = 2,

        #[doc = "[`Owner::Customer`]."]
        Customer = 3,

        #[doc = "[`Owner::Platform`]."]
        Platform = 4,
    }
}

/// Single entry of a [`Wallet`] history.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Posting {
    /// ID of this [`Posting`].
    pub id: PostingId,

    /// [`Owner`] of the [`Wallet`] this [`Posting`] is applied to.
    pub owner: Owner,

    /// ID of the order this [`Posting`] settles, if any.
    ///
    /// There is at most one [`Posting`] of each [`PostingKind`] per order and
    /// [`Owner`].
    pub order_id: Option<order::Id>,

    /// [`PostingKind`] of this [`Posting`].
    pub kind: PostingKind,

    /// Posted amount.
    pub amount: Money,

    /// [`DateTime`] when this [`Posting`] was created.
    pub created_at: PostingDateTime,
}

impl Posting {
    /// Creates a new [`Posting`].
    #[must_use]
    pub fn new(
        owner: Owner,
        order_id: Option<order::Id>,
        kind: PostingKind,
        amount: Money,
        now: DateTime,
    ) -> Self {
        Self {
            id: PostingId::new(),
            owner,
            order_id,
            kind,
            amount,
            created_at: now.coerce(),
        }
    }

    /// Returns the [`Delta`] this [`Posting`] applies to a [`Wallet`].
    #[must_use]
    pub fn delta(&self) -> Delta {
        use PostingKind as K;

        let amount = self.amount.amount();
        let mut delta = Delta::default();
        match self.kind {
            K::Deposit | K::Refund => delta.balance = amount,
            K::Payment => {
                delta.balance = -amount;
                delta.guarded = true;
            }
            K::PendingEarnings => delta.pending = amount,
            K::Release => {
                delta.pending = -amount;
                delta.balance = amount;
                delta.earnings = amount;
            }
            K::Commission | K::PlatformEarnings => {
                delta.balance = amount;
                delta.earnings = amount;
            }
            K::PendingReversal => delta.pending = -amount,
            K::EarningsReversal => {
                delta.balance = -amount;
                delta.earnings = -amount;
            }
            K::Withdrawal => {
                delta.balance = -amount;
                delta.withdrawn = amount;
                delta.guarded = true;
            }
        }
        delta
    }
}

/// ID of a [`Posting`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct PostingId(Uuid);

impl PostingId {
    /// Creates a new random [`PostingId`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

define_kind! {
    #[doc = "Kind of a [`Posting`]."]
    enum PostingKind {
        #[doc = "Customer funds the stored balance."]
        Deposit = 1,

        #[doc = "Customer pays an order from the stored balance."]
        Payment = 2,

        #[doc = "Customer gets a [`PostingKind::Payment`] back."]
        Refund = 3,

        #[doc = "Restaurant earnings held pending."]
        PendingEarnings = 4,

        #[doc = "Restaurant earnings confirmed spendable."]
        Release = 5,

        #[doc = "Supervisor commission."]
        Commission = 6,

        #[doc = "Platform earnings."]
        PlatformEarnings = 7,

        #[doc = "Pending restaurant earnings taken back."]
        PendingReversal = 8,

        #[doc = "Confirmed earnings taken back."]
        EarningsReversal = 9,

        #[doc = "Owner withdraws from the balance."]
        Withdrawal = 10,
    }
}

/// Changes a [`Posting`] applies to a [`Wallet`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Delta {
    /// Change of the [`Wallet::balance`].
    pub balance: Decimal,

    /// Change of the [`Wallet::pending_balance`].
    pub pending: Decimal,

    /// Change of the [`Wallet::total_earnings`].
    pub earnings: Decimal,

    /// Change of the [`Wallet::total_withdrawn`].
    pub withdrawn: Decimal,

    /// Indicator whether the [`Wallet::balance`] must stay non-negative.
    pub guarded: bool,
}

/// [`DateTime`] when a [`Wallet`] was modified last time.
pub type ModificationDateTime = DateTimeOf<(Wallet, unit::Modification)>;

/// [`DateTime`] when a [`Posting`] was created.
pub type PostingDateTime = DateTimeOf<(Posting, unit::Creation)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{DateTime, Money};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::domain::{restaurant, user};

    use super::{Owner, OwnerKind, Posting, PostingKind, Wallet};

    fn posting(owner: Owner, kind: PostingKind, amount: &str) -> Posting {
        Posting::new(
            owner,
            None,
            kind,
            Money::from_str(amount).unwrap(),
            DateTime::now(),
        )
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn guarded_postings_never_overdraw() {
        let owner = Owner::Customer(user::Id::new());
        let mut w = Wallet::empty(owner, DateTime::now());

        assert!(w.apply(&posting(owner, PostingKind::Deposit, "20")));
        assert!(!w.apply(&posting(owner, PostingKind::Payment, "20.01")));
        assert_eq!(w.balance, dec("20"));

        assert!(w.apply(&posting(owner, PostingKind::Payment, "20")));
        assert_eq!(w.balance, Decimal::ZERO);

        assert!(w.apply(&posting(owner, PostingKind::Refund, "20")));
        assert!(w.apply(&posting(owner, PostingKind::Withdrawal, "5")));
        assert_eq!(w.balance, dec("15"));
        assert_eq!(w.total_withdrawn, dec("5"));
    }

    #[test]
    fn overflowing_postings_are_not_applied() {
        let owner = Owner::Customer(user::Id::new());
        let mut w = Wallet::empty(owner, DateTime::now());
        let max = Posting::new(
            owner,
            None,
            PostingKind::Deposit,
            Money::MAX,
            DateTime::now(),
        );

        assert!(w.apply(&max));
        assert!(!w.apply(&posting(owner, PostingKind::Deposit, "1")));
        assert_eq!(w.balance, Decimal::MAX);
    }

    #[test]
    fn release_moves_pending_to_balance() {
        let owner = Owner::Restaurant(restaurant::Id::new());
        let mut w = Wallet::empty(owner, DateTime::now());

        assert!(w.apply(&posting(owner, PostingKind::PendingEarnings, "70")));
        assert_eq!(w.pending_balance, dec("70"));
        assert_eq!(w.balance, Decimal::ZERO);

        assert!(w.apply(&posting(owner, PostingKind::Release, "70")));
        assert_eq!(w.pending_balance, Decimal::ZERO);
        assert_eq!(w.balance, dec("70"));
        assert_eq!(w.total_earnings, dec("70"));
    }

    #[test]
    fn reversal_may_drive_balance_negative() {
        let owner = Owner::Supervisor(user::Id::new());
        let mut w = Wallet::empty(owner, DateTime::now());

        assert!(w.apply(&posting(owner, PostingKind::Commission, "3.75")));
        assert!(w.apply(&posting(owner, PostingKind::Withdrawal, "3.75")));
        assert!(w.apply(&posting(owner, PostingKind::EarningsReversal, "3.75")));

        assert_eq!(w.balance, dec("-3.75"));
        assert_eq!(w.total_earnings, Decimal::ZERO);
    }

    #[test]
    fn platform_owner_is_reserved() {
        assert_eq!(Owner::Platform.id(), Uuid::nil());
        assert_eq!(
            Owner::from_parts(OwnerKind::Platform, Uuid::nil()),
            Some(Owner::Platform),
        );
        assert_eq!(
            Owner::from_parts(OwnerKind::Platform, Uuid::new_v4()),
            None,
        );

        let rid = restaurant::Id::new();
        let owner = Owner::Restaurant(rid);
        assert_eq!(Owner::from_parts(owner.kind(), owner.id()), Some(owner));
    }
}
