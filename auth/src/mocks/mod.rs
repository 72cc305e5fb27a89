//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of the provider
//! traits for use in unit tests, integration tests and demos.

pub mod identity;
pub mod navigator;

pub use identity::{MockIdentityProvider, QueryGate};
pub use navigator::RecordingNavigator;
