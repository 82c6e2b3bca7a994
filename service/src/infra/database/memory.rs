//! In-memory [`Database`] implementation.
//!
//! Keeps the whole state behind a single lock. A [`Tx`] holds that lock until
//! committed or dropped, working on a draft copy of the state, so dropping a
//! [`Tx`] without committing rolls back everything it did.

use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Swap, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        offer, order, restaurant, settlement,
        wallet::{Owner, Posting},
        Offer, Order, Settlement, Wallet,
    },
    infra::{database, Database},
    read::{self, report::Period, settlement::Backlog},
};

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Stored records.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Placed [`Order`]s.
    orders: HashMap<order::Id, Order>,

    /// Registered [`restaurant::Attribution`]s.
    attributions: HashMap<restaurant::Id, restaurant::Attribution>,

    /// [`Offer`]s in their creation order.
    offers: Vec<Offer>,

    /// Orders which have an [`offer::Usage`] recorded.
    offer_usages: HashSet<order::Id>,

    /// [`Settlement`]s of the placed [`Order`]s.
    settlements: HashMap<order::Id, Settlement>,

    /// [`Wallet`]s of their [`Owner`]s.
    wallets: HashMap<Owner, Wallet>,

    /// Applied [`Posting`]s in their application order.
    postings: Vec<Posting>,
}

/// Non-transactional access to a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// Shared [`State`].
    state: Arc<Mutex<State>>,
}

/// Transactional access to a [`Memory`] database.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`Draft`] of this [`Tx`], taken on commit.
    draft: Arc<Mutex<Option<Draft>>>,
}

/// Uncommitted changes of a [`Tx`].
#[derive(Debug)]
struct Draft {
    /// Exclusive access to the shared [`State`].
    guard: OwnedMutexGuard<State>,

    /// Copy of the shared [`State`] the [`Tx`] works on.
    state: State,
}

/// Access to a [`State`].
pub trait Access {
    /// Calls the provided function on the accessed [`State`].
    fn with<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>;
}

impl Access for NonTx {
    async fn with<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(f(&mut *self.state.lock().await))
    }
}

impl Access for Tx {
    async fn with<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        let mut draft = self.draft.lock().await;
        let draft = draft
            .as_mut()
            .ok_or_else(|| traced(Error::TxFinished))?;
        Ok(f(&mut draft.state))
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, StdError)]
pub enum Error {
    /// [`Tx`] is used after being committed.
    #[display("`Tx` is already committed")]
    TxFinished,

    /// Unique record is stored already.
    #[display("Duplicate `{_0}` record")]
    Conflict(#[error(not(source))] &'static str),
}

/// Wraps the provided [`Error`] into a [`Traced`] [`database::Error`].
fn traced(e: Error) -> Traced<database::Error> {
    tracerr::map_from(tracerr::new!(e))
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let guard = Arc::clone(&self.0.state).lock_owned().await;
        let state = guard.clone();
        Ok(Memory(Tx {
            draft: Arc::new(Mutex::new(Some(Draft { guard, state }))),
        }))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let Draft { mut guard, state } = self
            .0
            .draft
            .lock()
            .await
            .take()
            .ok_or_else(|| traced(Error::TxFinished))?;
        *guard = state;
        Ok(())
    }
}

impl<T: Access> Database<Select<By<Option<Order>, order::Id>>> for Memory<T> {
    type Ok = Option<Order>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Order>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.with(|s| s.orders.get(by.inner()).cloned()).await
    }
}

impl<T: Access> Database<Insert<Order>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(order): Insert<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if s.orders.contains_key(&order.id) {
                    return Err(traced(Error::Conflict("orders")));
                }
                drop(s.orders.insert(order.id, order));
                Ok(())
            })
            .await?
    }
}

impl<T: Access> Database<Swap<Order>> for Memory<T> {
    type Ok = read::order::Swapped;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Swap(order): Swap<Order>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                let Some(stored) = s.orders.get_mut(&order.id) else {
                    return read::order::Swapped(false);
                };
                if stored.version.next() != order.version {
                    return read::order::Swapped(false);
                }
                *stored = order;
                read::order::Swapped(true)
            })
            .await
    }
}

impl<T: Access> Database<Lock<By<Order, order::Id>>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Lock<By<Order, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Any `Tx` is exclusive already.
        Ok(())
    }
}

impl<T: Access>
    Database<Delete<By<read::order::Purged, order::ModificationDateTime>>>
    for Memory<T>
{
    type Ok = read::order::Purged;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<read::order::Purged, order::ModificationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        self.0
            .with(|s| {
                let purged = s
                    .orders
                    .values()
                    .filter(|o| o.status.is_terminal() && o.updated_at < deadline)
                    .filter(|o| {
                        s.settlements.get(&o.id).map_or(true, |st| {
                            st.status
                                != settlement::Status::Pending
                        })
                    })
                    .map(|o| o.id)
                    .collect::<Vec<_>>();
                for id in &purged {
                    drop(s.orders.remove(id));
                    drop(s.settlements.remove(id));
                    _ = s.offer_usages.remove(id);
                }
                read::order::Purged(
                    u64::try_from(purged.len()).unwrap_or(u64::MAX),
                )
            })
            .await
    }
}

impl<T: Access> Database<Select<By<read::report::Summary, Period>>>
    for Memory<T>
{
    type Ok = read::report::Summary;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::report::Summary, Period>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Period { start, end } = by.into_inner();
        self.0
            .with(|s| {
                let mut summary = read::report::Summary::default();
                s.orders
                    .values()
                    .filter(|o| (start..=end).contains(&o.created_at))
                    .for_each(|o| summary.add(o));
                summary
            })
            .await
    }
}

impl<T: Access>
    Database<Select<By<Option<restaurant::Attribution>, restaurant::Id>>>
    for Memory<T>
{
    type Ok = Option<restaurant::Attribution>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<restaurant::Attribution>, restaurant::Id>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| s.attributions.get(by.inner()).copied())
            .await
    }
}

impl<T: Access> Database<Insert<restaurant::Attribution>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(attribution): Insert<restaurant::Attribution>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if s.attributions.contains_key(&attribution.restaurant_id) {
                    return Err(traced(Error::Conflict("attributions")));
                }
                drop(
                    s.attributions
                        .insert(attribution.restaurant_id, attribution),
                );
                Ok(())
            })
            .await?
    }
}

impl<T: Access> Database<Select<By<Vec<Offer>, restaurant::Id>>>
    for Memory<T>
{
    type Ok = Vec<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Offer>, restaurant::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let restaurant_id = by.into_inner();
        self.0
            .with(|s| {
                s.offers
                    .iter()
                    .filter(|o| o.restaurant_id == restaurant_id)
                    .copied()
                    .collect()
            })
            .await
    }
}

impl<T: Access> Database<Insert<Offer>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(offer): Insert<Offer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if s.offers.iter().any(|o| o.id == offer.id) {
                    return Err(traced(Error::Conflict("offers")));
                }
                s.offers.push(offer);
                Ok(())
            })
            .await?
    }
}

impl<T: Access> Database<Insert<offer::Usage>> for Memory<T> {
    type Ok = read::offer::Recorded;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(usage): Insert<offer::Usage>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if s.offer_usages.contains(&usage.order_id) {
                    return read::offer::Recorded(false);
                }
                let Some(offer) =
                    s.offers.iter_mut().find(|o| o.id == usage.offer_id)
                else {
                    return read::offer::Recorded(false);
                };
                offer.usage_count = offer.usage_count.saturating_add(1);
                _ = s.offer_usages.insert(usage.order_id);
                read::offer::Recorded(true)
            })
            .await
    }
}

impl<T: Access> Database<Insert<Settlement>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(settlement): Insert<Settlement>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if s.settlements.contains_key(&settlement.order_id) {
                    return Err(traced(Error::Conflict("settlements")));
                }
                drop(s.settlements.insert(settlement.order_id, settlement));
                Ok(())
            })
            .await?
    }
}

impl<T: Access> Database<Update<Settlement>> for Memory<T> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(settlement): Update<Settlement>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                if let Some(stored) = s.settlements.get_mut(&settlement.order_id)
                {
                    stored.status = settlement.status;
                    stored.updated_at = settlement.updated_at;
                }
            })
            .await
    }
}

impl<T: Access> Database<Select<By<Option<Settlement>, order::Id>>>
    for Memory<T>
{
    type Ok = Option<Settlement>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Settlement>, order::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| s.settlements.get(by.inner()).copied())
            .await
    }
}

impl<T: Access> Database<Select<By<Vec<order::Id>, Backlog>>> for Memory<T> {
    type Ok = Vec<order::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<order::Id>, Backlog>>,
    ) -> Result<Self::Ok, Self::Err> {
        let Backlog { limit } = by.into_inner();
        self.0
            .with(|s| {
                let mut pending = s
                    .settlements
                    .values()
                    .filter(|st| {
                        st.status == settlement::Status::Pending
                    })
                    .collect::<Vec<_>>();
                pending.sort_by_key(|st| st.created_at);
                pending
                    .into_iter()
                    .take(usize::try_from(limit).unwrap_or(usize::MAX))
                    .map(|st| st.order_id)
                    .collect()
            })
            .await
    }
}

impl<T: Access> Database<Insert<Posting>> for Memory<T> {
    type Ok = read::wallet::Applied;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(posting): Insert<Posting>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with(|s| {
                let duplicate = posting.order_id.is_some()
                    && s.postings.iter().any(|p| {
                        p.order_id == posting.order_id
                            && p.owner == posting.owner
                            && p.kind == posting.kind
                    });
                if duplicate {
                    return Err(traced(Error::Conflict("wallet_transactions")));
                }

                let wallet = s.wallets.entry(posting.owner).or_insert_with(|| {
                    Wallet::empty(posting.owner, posting.created_at.coerce())
                });
                if !wallet.apply(&posting) {
                    return Ok(read::wallet::Applied(false));
                }
                s.postings.push(posting);
                Ok(read::wallet::Applied(true))
            })
            .await?
    }
}

impl<T: Access> Database<Select<By<Option<Wallet>, Owner>>> for Memory<T> {
    type Ok = Option<Wallet>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Wallet>, Owner>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.with(|s| s.wallets.get(by.inner()).copied()).await
    }
}

impl<T: Access> Database<Select<By<Vec<Posting>, Owner>>> for Memory<T> {
    type Ok = Vec<Posting>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Posting>, Owner>>,
    ) -> Result<Self::Ok, Self::Err> {
        let owner = by.into_inner();
        self.0
            .with(|s| {
                s.postings
                    .iter()
                    .filter(|p| p.owner == owner)
                    .copied()
                    .collect()
            })
            .await
    }
}
