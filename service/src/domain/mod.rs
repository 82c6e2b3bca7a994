//! Domain definitions.

pub mod cart;
pub mod offer;
pub mod order;
pub mod restaurant;
pub mod settlement;
pub mod user;
pub mod wallet;

pub use self::{
    cart::Cart, offer::Offer, order::Order, settlement::Settlement,
    wallet::Wallet,
};
