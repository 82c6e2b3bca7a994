//! Background [`Task`]s definitions.

mod background;
pub mod complete_settlements;
pub mod purge_orders;

pub use common::Handler as Task;

pub use self::{
    background::Background, complete_settlements::CompleteSettlements,
    purge_orders::PurgeOrders,
};
