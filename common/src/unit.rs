//! Marker types distinguishing [`DateTimeOf`] kinds.
//!
//! [`DateTimeOf`]: crate::DateTimeOf

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing the last modification of an entity.
#[derive(Clone, Copy, Debug)]
pub struct Modification;

/// Marker type describing an entity being sent out.
#[derive(Clone, Copy, Debug)]
pub struct Dispatching;

/// Marker type describing an entity acceptance.
#[derive(Clone, Copy, Debug)]
pub struct Acceptance;

/// Marker type describing an entity rejection.
#[derive(Clone, Copy, Debug)]
pub struct Rejection;

/// Marker type describing an entity expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;

/// Marker type describing a discount redemption.
#[derive(Clone, Copy, Debug)]
pub struct Redemption;
