//! Session actions.
//!
//! This module defines every input to the session reducer:
//! - **Commands**: view lifecycle and user intent (`Mount`, `InitiateSignIn`, ...)
//! - **Events**: lifecycle signals and results of async work (`QueryCompleted`, ...)

use crate::error::AuthError;
use crate::listener::ListenerSignal;
pub use crate::query::SessionQueryOutcome;
use crate::state::SignInProvider;

/// Session action.
///
/// Actions are the **only** way to change the session state.
/// The reducer is a pure function: `(State, Action, Env) → (State, Effects)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    // ═══════════════════════════════════════════════════════════════════════
    // View Lifecycle
    // ═══════════════════════════════════════════════════════════════════════
    /// The view was created, or the user navigated back to it.
    ///
    /// Starts a session query. Safe to send any number of times.
    Mount,

    /// The view was torn down. Every later action except `Mount` is ignored.
    Unmount,

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle Signals
    // ═══════════════════════════════════════════════════════════════════════
    /// The redirect sign-in completed; query the session again.
    RedirectSignInCompleted,

    /// The redirect sign-in failed.
    RedirectSignInFailed {
        /// Message shown to the user.
        message: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Session Query
    // ═══════════════════════════════════════════════════════════════════════
    /// A session query finished.
    QueryCompleted {
        /// Generation the query was started with.
        generation: u64,
        /// What the query found.
        outcome: SessionQueryOutcome,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // User Intent
    // ═══════════════════════════════════════════════════════════════════════
    /// Start the redirect sign-in flow.
    InitiateSignIn {
        /// Federated provider to sign in with.
        provider: SignInProvider,
        /// Opaque state returned after the redirect (e.g. the path to return to).
        custom_state: String,
    },

    /// Sign out.
    TerminateSession,

    /// The provider's sign-out finished.
    SessionEnded {
        /// Outcome of the sign-out call.
        result: Result<(), AuthError>,
    },
}

impl From<ListenerSignal> for SessionAction {
    fn from(signal: ListenerSignal) -> Self {
        match signal {
            ListenerSignal::Retry => Self::RedirectSignInCompleted,
            ListenerSignal::Fail(message) => Self::RedirectSignInFailed { message },
        }
    }
}
