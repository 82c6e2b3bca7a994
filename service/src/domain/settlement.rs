//! [`Settlement`] definitions.
//!
//! A [`Settlement`] is written together with its order and only then posted
//! to the [`Wallet`]s, so an interrupted posting is never lost and can be
//! completed later.

use common::{define_kind, unit, DateTime, DateTimeOf, Money};

#[cfg(doc)]
use crate::domain::Wallet;
use crate::domain::{
    order::{self, Earnings, Payment},
    restaurant::{self, Attribution},
    user,
    wallet::{Owner, Posting, PostingKind},
    Order,
};

/// Intent to distribute [`Earnings`] of an order among its parties.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Settlement {
    /// ID of the settled order.
    pub order_id: order::Id,

    /// ID of the restaurant of the settled order.
    pub restaurant_id: restaurant::Id,

    /// ID of the customer of the settled order.
    pub customer_id: user::Id,

    /// ID of the supervisor entitled to commission, if any.
    pub supervisor_id: Option<user::Id>,

    /// [`Earnings`] to distribute.
    pub earnings: Earnings,

    /// Amount debited from the customer's stored balance, if paid that way.
    pub customer_debit: Option<Money>,

    /// [`Status`] of this [`Settlement`].
    pub status: Status,

    /// [`DateTime`] when this [`Settlement`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Settlement`] was modified last time.
    pub updated_at: ModificationDateTime,
}

impl Settlement {
    /// Creates a new [`Status::Pending`] [`Settlement`] of the provided
    /// [`Order`].
    #[must_use]
    pub fn new(order: &Order, attribution: &Attribution, now: DateTime) -> Self {
        Self {
            order_id: order.id,
            restaurant_id: order.restaurant_id,
            customer_id: order.customer_id,
            supervisor_id: attribution.supervisor_id(),
            earnings: order.earnings,
            customer_debit: matches!(order.payment, Payment::Balance)
                .then_some(order.total),
            status: Status::Pending,
            created_at: now.coerce(),
            updated_at: now.coerce(),
        }
    }

    /// Returns the [`Posting`] debiting the customer's stored balance, if
    /// paid that way.
    #[must_use]
    pub fn debit(&self, now: DateTime) -> Option<Posting> {
        self.posting(
            Owner::Customer(self.customer_id),
            PostingKind::Payment,
            self.customer_debit?,
            now,
        )
    }

    /// Posts this [`Status::Pending`] [`Settlement`] for an order being in the
    /// provided [`order::Status`], returning the [`Posting`]s to apply.
    ///
    /// Earnings of an already delivered order are released at once, while a
    /// cancelled order is [`Settlement::cancel`]led instead.
    #[must_use]
    pub fn post(&mut self, order: order::Status, now: DateTime) -> Vec<Posting> {
        if self.status != Status::Pending {
            return vec![];
        }
        if order == order::Status::Cancelled {
            return self.cancel(now);
        }

        let mut postings = [
            self.posting(
                Owner::Restaurant(self.restaurant_id),
                PostingKind::PendingEarnings,
                self.earnings.restaurant,
                now,
            ),
            self.supervisor_id.and_then(|id| {
                self.posting(
                    Owner::Supervisor(id),
                    PostingKind::Commission,
                    self.earnings.supervisor,
                    now,
                )
            }),
            self.posting(
                Owner::Platform,
                PostingKind::PlatformEarnings,
                self.earnings.platform,
                now,
            ),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        self.touch(Status::Posted, now);

        if order == order::Status::Delivered {
            postings.extend(self.release(now));
        }
        postings
    }

    /// Releases restaurant earnings of this [`Status::Posted`] [`Settlement`],
    /// returning the [`Posting`]s to apply.
    #[must_use]
    pub fn release(&mut self, now: DateTime) -> Vec<Posting> {
        if self.status != Status::Posted {
            return vec![];
        }
        let posting = self.posting(
            Owner::Restaurant(self.restaurant_id),
            PostingKind::Release,
            self.earnings.restaurant,
            now,
        );
        self.touch(Status::Released, now);
        posting.into_iter().collect()
    }

    /// Cancels this [`Settlement`], returning the [`Posting`]s reversing
    /// everything posted so far and refunding the customer.
    ///
    /// [`Status::Released`] [`Settlement`]s are final and cannot be cancelled.
    #[must_use]
    pub fn cancel(&mut self, now: DateTime) -> Vec<Posting> {
        let mut postings = match self.status {
            Status::Pending => {
                self.touch(Status::Voided, now);
                vec![]
            }
            Status::Posted => {
                let reversals = [
                    self.posting(
                        Owner::Restaurant(self.restaurant_id),
                        PostingKind::PendingReversal,
                        self.earnings.restaurant,
                        now,
                    ),
                    self.supervisor_id.and_then(|id| {
                        self.posting(
                            Owner::Supervisor(id),
                            PostingKind::EarningsReversal,
                            self.earnings.supervisor,
                            now,
                        )
                    }),
                    self.posting(
                        Owner::Platform,
                        PostingKind::EarningsReversal,
                        self.earnings.platform,
                        now,
                    ),
                ];
                self.touch(Status::Reversed, now);
                reversals.into_iter().flatten().collect()
            }
            Status::Released | Status::Voided | Status::Reversed => {
                return vec![]
            }
        };
        if let Some(debit) = self.customer_debit {
            postings.extend(self.posting(
                Owner::Customer(self.customer_id),
                PostingKind::Refund,
                debit,
                now,
            ));
        }
        postings
    }

    /// Creates a [`Posting`] of this [`Settlement`], unless the `amount` is
    /// zero.
    fn posting(
        &self,
        owner: Owner,
        kind: PostingKind,
        amount: Money,
        now: DateTime,
    ) -> Option<Posting> {
        (!amount.is_zero())
            .then(|| Posting::new(owner, Some(self.order_id), kind, amount, now))
    }

    /// Moves this [`Settlement`] to the provided [`Status`].
    fn touch(&mut self, status: Status, now: DateTime) {
        self.status = status;
        self.updated_at = now.coerce();
    }
}

define_kind! {
    #[doc = "Status of a [`Settlement`]."]
    enum Status {
        #[doc = "Written, but not posted yet."]
        Pending = 1,

        #[doc = "Posted, restaurant earnings are pending."]
        Posted = 2,

        #[doc = "Posted, restaurant earnings are spendable."]
        Released = 3,

        #[doc = "Order cancelled before posting."]
        Voided = 4,

        #[doc = "Order cancelled after posting, postings reversed."]
        Reversed = 5,
    }
}

/// [`DateTime`] when a [`Settlement`] was created.
pub type CreationDateTime = DateTimeOf<(Settlement, unit::Creation)>;

/// [`DateTime`] when a [`Settlement`] was modified last time.
pub type ModificationDateTime = DateTimeOf<(Settlement, unit::Modification)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{DateTime, Money};

    use crate::domain::{
        order::{self, spec::order, Delivery, Payment},
        restaurant::{self, Attribution, Referrer},
        user,
        wallet::{Owner, PostingKind},
        Order,
    };

    use super::{Settlement, Status};

    fn money(s: &str) -> Money {
        Money::from_str(s).unwrap()
    }

    fn settle(order: &Order, referrer: Option<Referrer>) -> Settlement {
        let attribution = Attribution {
            restaurant_id: order.restaurant_id,
            referrer,
            registered_at: DateTime::now().coerce(),
        };
        Settlement::new(order, &attribution, DateTime::now())
    }

    fn balance_order() -> Order {
        let mut o = order(restaurant::Id::new(), Delivery::Pickup);
        o.payment = Payment::Balance;
        o.earnings = order::Earnings {
            restaurant: money("71.25"),
            platform: money("5.00"),
            supervisor: money("3.75"),
        };
        o
    }

    fn kinds(postings: &[crate::domain::wallet::Posting]) -> Vec<(Owner, PostingKind)> {
        postings.iter().map(|p| (p.owner, p.kind)).collect()
    }

    #[test]
    fn posts_each_party_once() {
        let o = balance_order();
        let supervisor = user::Id::new();
        let mut s = settle(&o, Some(Referrer::Supervisor(supervisor)));

        assert_eq!(s.customer_debit, Some(o.total));
        let debit = s.debit(DateTime::now()).unwrap();
        assert_eq!(debit.kind, PostingKind::Payment);
        assert_eq!(debit.amount, o.total);

        let postings = s.post(order::Status::Pending, DateTime::now());
        assert_eq!(
            kinds(&postings),
            [
                (Owner::Restaurant(o.restaurant_id), PostingKind::PendingEarnings),
                (Owner::Supervisor(supervisor), PostingKind::Commission),
                (Owner::Platform, PostingKind::PlatformEarnings),
            ],
        );
        assert!(postings.iter().all(|p| p.order_id == Some(o.id)));
        assert_eq!(s.status, Status::Posted);

        assert!(s.post(order::Status::Pending, DateTime::now()).is_empty());
    }

    #[test]
    fn skips_zero_amounts() {
        let mut o = balance_order();
        o.payment = Payment::OnDelivery;
        o.earnings.supervisor = Money::ZERO;
        o.earnings.restaurant = Money::ZERO;
        let mut s = settle(&o, None);

        assert_eq!(s.debit(DateTime::now()), None);
        assert_eq!(
            kinds(&s.post(order::Status::Pending, DateTime::now())),
            [(Owner::Platform, PostingKind::PlatformEarnings)],
        );
    }

    #[test]
    fn posting_delivered_order_releases() {
        let o = balance_order();
        let mut s = settle(&o, None);

        let postings = s.post(order::Status::Delivered, DateTime::now());

        assert_eq!(
            postings.last().map(|p| (p.kind, p.amount)),
            Some((PostingKind::Release, money("71.25"))),
        );
        assert_eq!(s.status, Status::Released);
        assert!(s.cancel(DateTime::now()).is_empty());
    }

    #[test]
    fn cancel_before_posting_voids_and_refunds() {
        let o = balance_order();
        let mut s = settle(&o, None);

        let postings = s.cancel(DateTime::now());

        assert_eq!(
            kinds(&postings),
            [(Owner::Customer(o.customer_id), PostingKind::Refund)],
        );
        assert_eq!(s.status, Status::Voided);
        assert!(s.post(order::Status::Cancelled, DateTime::now()).is_empty());
    }

    #[test]
    fn cancel_after_posting_reverses_and_refunds() {
        let o = balance_order();
        let supervisor = user::Id::new();
        let mut s = settle(&o, Some(Referrer::Supervisor(supervisor)));
        let _ = s.post(order::Status::Accepted, DateTime::now());

        let postings = s.cancel(DateTime::now());

        assert_eq!(
            kinds(&postings),
            [
                (Owner::Restaurant(o.restaurant_id), PostingKind::PendingReversal),
                (Owner::Supervisor(supervisor), PostingKind::EarningsReversal),
                (Owner::Platform, PostingKind::EarningsReversal),
                (Owner::Customer(o.customer_id), PostingKind::Refund),
            ],
        );
        assert_eq!(s.status, Status::Reversed);
        assert!(s.cancel(DateTime::now()).is_empty());
    }

    #[test]
    fn pending_settlement_of_cancelled_order_is_voided() {
        let o = balance_order();
        let mut s = settle(&o, None);

        let postings = s.post(order::Status::Cancelled, DateTime::now());

        assert_eq!(s.status, Status::Voided);
        assert_eq!(kinds(&postings).len(), 1);
    }
}
