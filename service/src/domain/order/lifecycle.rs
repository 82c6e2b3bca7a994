//! [`Order`] lifecycle.
//!
//! ```text
//! Pending -> Accepted -> Preparing -> Ready -> OutForDelivery -> Delivered
//!    \___________\___________\__________\___________\______-> Cancelled
//! ```

use common::{define_kind, DateTime, Money};
use derive_more::{Display, Error};
use rust_decimal::Decimal;

use crate::domain::{restaurant, user};

use super::{Order, Status};

/// Authenticated actor performing an [`Order`] transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Actor {
    /// Customer who placed the [`Order`].
    Customer(user::Id),

    /// Restaurant fulfilling the [`Order`].
    Restaurant(restaurant::Id),

    /// Courier delivering the [`Order`].
    Courier(user::Id),

    /// Platform operator resolving support cases.
    Operator(user::Id),
}

impl Actor {
    /// Returns [`Role`] of this [`Actor`].
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Self::Customer(_) => Role::Customer,
            Self::Restaurant(_) => Role::Restaurant,
            Self::Courier(_) => Role::Courier,
            Self::Operator(_) => Role::Operator,
        }
    }
}

define_kind! {
    #[doc = "Role of an [`Actor`]."]
    enum Role {
        #[doc = "[`Actor::Customer`]."]
        Customer = 1,

        #[doc = "[`Actor::Restaurant`]."]
        Restaurant = 2,

        #[doc = "[`Actor::Courier`]."]
        Courier = 3,

        #[doc = "[`Actor::Operator`]."]
        Operator = 4,
    }
}

impl Order {
    /// Returns the [`Status`] the provided [`Role`] moves this [`Order`] to
    /// when setting its delivery fee.
    #[must_use]
    pub fn fee_transition(&self, role: Role) -> Option<Status> {
        match (role, self.status) {
            (Role::Restaurant, _) | (Role::Operator, Status::Pending) => {
                Some(Status::Accepted)
            }
            (Role::Courier, _) | (Role::Operator, Status::Ready) => {
                Some(Status::OutForDelivery)
            }
            (Role::Customer | Role::Operator, _) => None,
        }
    }

    /// Moves this [`Order`] to the provided [`Status`] on behalf of the
    /// provided [`Actor`], returning the next revision of this [`Order`].
    ///
    /// A `delivery_fee` may only be provided when moving a courier-delivered
    /// [`Order`] into [`Status::Accepted`] or [`Status::OutForDelivery`], and
    /// only once per [`Order`]. The first of these transitions requires it,
    /// unless forced by an [`Actor::Operator`].
    ///
    /// # Errors
    ///
    /// See [`TransitionError`] for details.
    pub fn advance(
        &self,
        actor: Actor,
        to: Status,
        delivery_fee: Option<Decimal>,
        now: DateTime,
    ) -> Result<Self, TransitionError> {
        use TransitionError as E;

        let role = actor.role();
        if delivery_fee.is_some() {
            if let Some(by) = self.delivery_fee_set_by {
                return Err(E::FeeAlreadySet { by });
            }
        }
        self.permits(actor, to)?;

        let mut next = self.clone();
        let fee_step = matches!(self.delivery, super::Delivery::Courier { .. })
            && matches!(to, Status::Accepted | Status::OutForDelivery);
        match delivery_fee {
            Some(_) if !fee_step => return Err(E::FeeNotApplicable { to }),
            Some(fee) => {
                let fee = Money::new(fee).ok_or(E::NegativeFee(fee))?;
                next.set_delivery_fee(fee, role, now)?;
            }
            None => {
                if fee_step
                    && self.delivery_fee_set_by.is_none()
                    && role != Role::Operator
                {
                    return Err(E::FeeRequired { to });
                }
            }
        }

        if let (Actor::Courier(id), Status::OutForDelivery) = (actor, to) {
            next.courier_id = Some(id);
        }
        next.status = to;
        next.version = self.version.next();
        next.updated_at = now.coerce();
        Ok(next)
    }

    /// Sets the delivery fee of this [`Order`], the only way the
    /// [`Order::total`] changes after placing.
    fn set_delivery_fee(
        &mut self,
        fee: Money,
        by: Role,
        now: DateTime,
    ) -> Result<(), TransitionError> {
        let fee = fee.round();
        self.total = self
            .total
            .checked_add(fee)
            .ok_or(TransitionError::AmountOverflow)?;
        self.delivery_fee = fee;
        self.delivery_fee_set_by = Some(by);
        self.delivery_fee_set_at = Some(now.coerce());
        Ok(())
    }

    /// Checks whether the provided [`Actor`] may move this [`Order`] to the
    /// provided [`Status`].
    fn permits(&self, actor: Actor, to: Status) -> Result<(), TransitionError> {
        use Status as S;

        let from = self.status;
        let not_allowed = TransitionError::NotAllowed {
            role: actor.role(),
            from,
            to,
        };
        if from.is_terminal() || from == to {
            return Err(not_allowed);
        }

        match actor {
            Actor::Customer(_) => Err(not_allowed),
            Actor::Restaurant(id) => {
                if id != self.restaurant_id {
                    return Err(TransitionError::NotParty(Role::Restaurant));
                }
                match (from, to) {
                    (S::Pending, S::Accepted)
                    | (S::Accepted, S::Preparing)
                    | (S::Preparing, S::Ready)
                    | (_, S::Cancelled) => Ok(()),
                    (_, _) => Err(not_allowed),
                }
            }
            Actor::Courier(id) => match (from, to) {
                (S::Ready, S::OutForDelivery) => {
                    if self.courier_id.is_some_and(|c| c != id) {
                        return Err(TransitionError::NotParty(Role::Courier));
                    }
                    Ok(())
                }
                (S::OutForDelivery, S::Delivered) => {
                    if self.courier_id != Some(id) {
                        return Err(TransitionError::NotParty(Role::Courier));
                    }
                    Ok(())
                }
                (_, _) => Err(not_allowed),
            },
            Actor::Operator(_) => {
                if to == S::Pending {
                    return Err(not_allowed);
                }
                Ok(())
            }
        }
    }
}

/// Error of an [`Order`] transition.
#[derive(Clone, Copy, Debug, Display, Error, Eq, PartialEq)]
pub enum TransitionError {
    /// Transition is not in the table for the [`Role`].
    #[display("`{role}` cannot move `Order` from `{from}` to `{to}`")]
    NotAllowed {
        /// [`Role`] of the [`Actor`].
        role: Role,

        /// Current [`Status`] of the [`Order`].
        from: Status,

        /// Requested [`Status`].
        to: Status,
    },

    /// [`Actor`] is not a party of the [`Order`].
    #[display("`{_0}` is not a party of the `Order`")]
    NotParty(#[error(not(source))] Role),

    /// [`Role`] has no fee-setting transition from the current [`Status`].
    #[display("`{role}` cannot set delivery fee of `{status}` `Order`")]
    NoFeeTransition {
        /// [`Role`] of the [`Actor`].
        role: Role,

        /// Current [`Status`] of the [`Order`].
        status: Status,
    },

    /// Delivery fee is required for the transition.
    #[display("delivery fee is required to move `Order` to `{to}`")]
    FeeRequired {
        /// Requested [`Status`].
        to: Status,
    },

    /// Delivery fee is provided for the transition not taking it.
    #[display("delivery fee is not applicable to move `Order` to `{to}`")]
    FeeNotApplicable {
        /// Requested [`Status`].
        to: Status,
    },

    /// Delivery fee is negative.
    #[display("delivery fee cannot be negative: {_0}")]
    NegativeFee(#[error(not(source))] Decimal),

    /// Delivery fee has been already set.
    #[display("delivery fee has been already set by `{by}`")]
    FeeAlreadySet {
        /// [`Role`] of the [`Actor`] who set the fee.
        by: Role,
    },

    /// Delivery fee makes the [`Order::total`] overflow.
    #[display("delivery fee overflows `Order` total")]
    AmountOverflow,
}
