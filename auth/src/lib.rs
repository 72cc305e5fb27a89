//! # Session Shell Authentication
//!
//! Keeps a UI-facing answer to "is someone signed in, and what is their
//! display profile" consistent with an external OAuth2/OIDC identity
//! provider that signs users in through a full-page redirect.
//!
//! ## Features
//!
//! - **Fail-closed queries**: every lookup failure reads as "not signed in"
//! - **Lifecycle listener**: reacts to redirect success/failure events on the `auth` topic
//! - **Stale-response guard**: only the most recently started query may update the session
//! - **Scoped teardown**: nothing changes after the view is torn down
//! - **Testable**: the reconciliation logic is a reducer, runnable without a runtime
//!
//! ## Architecture
//!
//! The reconciliation logic is a reducer driven by a store:
//!
//! ```text
//! Mount / Hub event / user intent → Reducer → (ShellState, Effects) → Effect Execution → QueryCompleted
//! ```
//!
//! ```text
//! ┌────────────┐  signals   ┌────────────────────┐  queries   ┌──────────────────┐
//! │  Listener  │ ─────────▶ │ SessionController  │ ─────────▶ │ IdentityProvider │
//! │ ("auth")   │            │  (Store + Reducer) │ ◀───────── │                  │
//! └────────────┘            └─────────┬──────────┘  outcomes  └──────────────────┘
//!                                     │ SessionView
//!                                     ▼
//!                             presentation layer
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use session_shell_auth::*;
//!
//! let hub = BroadcastHub::new();
//! let controller = SessionController::mount(SessionEnvironment::new(provider), &hub).await?;
//!
//! match controller.session().await {
//!     SessionState::Authenticated(principal, profile) => { /* render profile */ }
//!     SessionState::Unauthenticated | SessionState::Error(_) => {
//!         controller.initiate_sign_in(SignInProvider::Google, "/").await;
//!     }
//! }
//!
//! let final_state = controller.teardown().await;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

/// Hub topic carrying authentication lifecycle events.
pub const AUTH_TOPIC: &str = "auth";

// Public modules
pub mod actions;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod listener;
pub mod profile;
pub mod providers;
pub mod query;
pub mod reducers;
pub mod state;
pub mod view;

/// Mock providers for tests and demos
#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use actions::SessionAction;
pub use config::AuthConfig;
pub use controller::SessionController;
pub use environment::SessionEnvironment;
pub use error::{AuthError, Result};
pub use listener::{LifecycleEvent, ListenerSignal, Subscription};
pub use query::{SessionQueryOutcome, query_current_session};
pub use state::{AttributeBag, DisplayProfile, Principal, SessionState, ShellState, SignInProvider};
pub use view::SessionView;
