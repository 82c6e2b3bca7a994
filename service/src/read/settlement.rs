//! [`Settlement`]-related read definitions.

#[cfg(doc)]
use crate::domain::{settlement::Status, Settlement};

/// Selector of the oldest [`Status::Pending`] [`Settlement`]s.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Backlog {
    /// Maximum number of [`Settlement`]s to select.
    pub limit: u32,
}
