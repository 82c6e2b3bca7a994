//! Classification of [`Command`] execution errors.
//!
//! [`Command`]: crate::Command

use derive_more::Display;
use tracerr::Traced;

use crate::{domain::order::TransitionError, infra::database};

/// Category of a failed operation, as seen by its caller.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Category {
    /// Input is malformed or refers to something that doesn't exist.
    ///
    /// Detected before any write.
    #[display("VALIDATION")]
    Validation,

    /// Stored balance doesn't cover a debit.
    #[display("INSUFFICIENT_FUNDS")]
    InsufficientFunds,

    /// Order status change is not allowed for the actor.
    #[display("INVALID_TRANSITION")]
    InvalidTransition,

    /// Concurrent modification won the race.
    #[display("CONCURRENT_MODIFICATION")]
    ConcurrentModification,

    /// Externally captured payment is not confirmed.
    #[display("EXTERNAL_PAYMENT_FAILURE")]
    ExternalPaymentFailure,

    /// Storage failed.
    #[display("PERSISTENCE_FAILURE")]
    PersistenceFailure,
}

/// Helper trait for classifying errors into [`Category`]s.
pub trait Categorize {
    /// Returns the [`Category`] of this error.
    fn category(&self) -> Category;
}

impl<E: Categorize> Categorize for Traced<E> {
    fn category(&self) -> Category {
        self.as_ref().category()
    }
}

impl Categorize for database::Error {
    fn category(&self) -> Category {
        Category::PersistenceFailure
    }
}

impl Categorize for TransitionError {
    fn category(&self) -> Category {
        match self {
            Self::NotAllowed { .. }
            | Self::NotParty(_)
            | Self::NoFeeTransition { .. } => Category::InvalidTransition,
            Self::FeeRequired { .. }
            | Self::FeeNotApplicable { .. }
            | Self::NegativeFee(_)
            | Self::AmountOverflow => Category::Validation,
            Self::FeeAlreadySet { .. } => Category::ConcurrentModification,
        }
    }
}
