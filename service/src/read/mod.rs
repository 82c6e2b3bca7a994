//! Read entities definitions.

pub mod offer;
pub mod order;
pub mod report;
pub mod settlement;
pub mod wallet;
