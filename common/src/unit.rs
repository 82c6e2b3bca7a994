//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing the latest modification of an entity.
#[derive(Clone, Copy, Debug)]
pub struct Modification;

/// Marker type describing a start of an entity validity.
#[derive(Clone, Copy, Debug)]
pub struct Start;

/// Marker type describing an end of an entity validity.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing a one-time amendment of an entity.
#[derive(Clone, Copy, Debug)]
pub struct Amendment;
