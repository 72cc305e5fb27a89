//! Session environment.
//!
//! This module defines the environment type for dependency injection
//! in the session reducer.

use crate::providers::IdentityProvider;

/// Session environment.
///
/// Contains the external dependencies needed by the session reducer.
///
/// # Type Parameters
///
/// - `P`: Identity provider
#[derive(Clone, Debug)]
pub struct SessionEnvironment<P>
where
    P: IdentityProvider + Clone,
{
    /// Identity provider.
    pub provider: P,
}

impl<P> SessionEnvironment<P>
where
    P: IdentityProvider + Clone,
{
    /// Create a new session environment.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}
