//! Reporting read definitions.

use common::Money;

#[cfg(doc)]
use crate::domain::order::Status;
use crate::domain::{
    order::{self, Earnings},
    Order,
};

/// Inclusive range of [`Order`] creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Period {
    /// Start of the [`Period`].
    pub start: order::CreationDateTime,

    /// End of the [`Period`].
    pub end: order::CreationDateTime,
}

/// Aggregated amounts of the [`Order`]s placed within a [`Period`].
///
/// Amounts only account [`Order`]s not [`Status::Cancelled`], and saturate at
/// [`Money::MAX`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// Number of all the placed [`Order`]s.
    pub orders: u64,

    /// Number of [`Status::Delivered`] [`Order`]s.
    pub delivered: u64,

    /// Number of [`Status::Cancelled`] [`Order`]s.
    pub cancelled: u64,

    /// Sum of [`Order::total`]s.
    pub gross: Money,

    /// Sum of [`Order::platform_fee`]s.
    pub platform_fees: Money,

    /// Sum of [`Order::discount`]s.
    pub discounts: Money,

    /// Sum of [`Order::delivery_fee`]s.
    pub delivery_fees: Money,

    /// Sum of [`Order::earnings`].
    pub earnings: Earnings,
}

impl Summary {
    /// Accounts the provided [`Order`] in this [`Summary`].
    pub fn add(&mut self, order: &Order) {
        self.orders += 1;
        match order.status {
            order::Status::Cancelled => {
                self.cancelled += 1;
                return;
            }
            order::Status::Delivered => self.delivered += 1,
            order::Status::Pending
            | order::Status::Accepted
            | order::Status::Preparing
            | order::Status::Ready
            | order::Status::OutForDelivery => {}
        }
        let sum = |acc: &mut Money, amount: Money| {
            *acc = acc.saturating_add(amount);
        };
        sum(&mut self.gross, order.total);
        sum(&mut self.platform_fees, order.platform_fee);
        sum(&mut self.discounts, order.discount);
        sum(&mut self.delivery_fees, order.delivery_fee);
        sum(&mut self.earnings.restaurant, order.earnings.restaurant);
        sum(&mut self.earnings.platform, order.earnings.platform);
        sum(&mut self.earnings.supervisor, order.earnings.supervisor);
    }
}
