//! [`Command`] definition.

pub mod amend_delivery_fee;
pub mod create_offer;
pub mod create_order;
pub mod post_order_earnings;
pub mod register_restaurant;
pub mod top_up_balance;
pub mod transition_order;
pub mod withdraw_from_wallet;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    amend_delivery_fee::AmendDeliveryFee, create_offer::CreateOffer,
    create_order::CreateOrder, post_order_earnings::PostOrderEarnings,
    register_restaurant::RegisterRestaurant, top_up_balance::TopUpBalance,
    transition_order::TransitionOrder,
    withdraw_from_wallet::WithdrawFromWallet,
};
