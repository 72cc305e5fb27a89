//! Identity-provider collaborators.
//!
//! This module defines traits for the external dependencies of the session
//! shell. The reducer and the query adapter depend on these traits; the
//! application injects concrete implementations.
//!
//! ```text
//! ┌───────────────────┐  current_principal / fetch_attributes  ┌──────────────────┐
//! │ Session reducer    │ ─────────────────────────────────────▶ │ IdentityProvider │
//! │ (effects)          │  begin_redirect_sign_in / end_session  │                  │
//! └───────────────────┘                                         └────────┬─────────┘
//!                                                                         │
//!                                                      ┌──────────────────┼──────────────┐
//!                                                      ▼                  ▼              ▼
//!                                              CredentialSource       Navigator        Clock
//! ```
//!
//! This enables:
//! - **Testing**: `MockIdentityProvider` (in-memory, scriptable, countable)
//! - **Production**: [`HostedUiProvider`] talking to an OAuth2/OIDC hosted UI

use crate::error::Result;
use crate::state::{AttributeBag, Principal, SignInProvider};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};

pub mod hosted_ui;

pub use hosted_ui::{HostedUiProvider, RedirectOutcome};

// ═══════════════════════════════════════════════════════════════════════
// Identity Provider
// ═══════════════════════════════════════════════════════════════════════

/// The identity provider as seen by the session shell.
///
/// Implementations must be cheap to clone and safe to call concurrently:
/// the reducer clones the provider into every effect.
pub trait IdentityProvider: Send + Sync {
    /// Get the currently authenticated principal.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::NotAuthenticated`] when no session exists,
    /// or another error for expired sessions and transport failures.
    fn current_principal(&self) -> impl std::future::Future<Output = Result<Principal>> + Send;

    /// Fetch the attribute bag for `principal`.
    ///
    /// # Errors
    ///
    /// Returns error if the attributes cannot be retrieved.
    fn fetch_attributes(
        &self,
        principal: &Principal,
    ) -> impl std::future::Future<Output = Result<AttributeBag>> + Send;

    /// Start the redirect sign-in flow.
    ///
    /// On success the host navigates away; nothing in the local session
    /// changes until the landing page reports back.
    ///
    /// # Errors
    ///
    /// Returns error if the flow cannot be started.
    fn begin_redirect_sign_in(
        &self,
        provider: SignInProvider,
        custom_state: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// End the provider session.
    ///
    /// # Errors
    ///
    /// Returns error if sign-out fails.
    fn end_session(&self) -> impl std::future::Future<Output = Result<()>> + Send;
}

// ═══════════════════════════════════════════════════════════════════════
// Host Collaborators
// ═══════════════════════════════════════════════════════════════════════

/// Sends the user agent to another URL (a full page navigation in a browser).
pub trait Navigator: Send + Sync {
    /// Navigate to `url`.
    ///
    /// # Errors
    ///
    /// Returns error if the host refuses the navigation.
    fn navigate(&self, url: &str) -> Result<()>;
}

/// Tokens obtained from a completed redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OIDC id token (JWT).
    pub id_token: String,

    /// Access token for the `userInfo` endpoint.
    pub access_token: String,

    /// Refresh token, when the grant returned one.
    pub refresh_token: Option<String>,

    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Storage for tokens and the pending redirect state.
///
/// In a browser this is local storage; it outlives page reloads.
pub trait CredentialSource: Send + Sync {
    /// Currently stored credentials.
    fn load(&self) -> Option<Credentials>;

    /// Replace the stored credentials.
    fn store(&self, credentials: Credentials);

    /// Forget the stored credentials.
    fn clear(&self);

    /// Remember the state parameter of a redirect in progress.
    fn remember_state(&self, state: String);

    /// Take (and forget) the pending state parameter.
    fn take_state(&self) -> Option<String>;
}

#[derive(Debug, Default)]
struct StoredCredentials {
    credentials: Option<Credentials>,
    pending_state: Option<String>,
}

/// Process-local [`CredentialSource`]. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    inner: Arc<Mutex<StoredCredentials>>,
}

impl InMemoryCredentials {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut StoredCredentials) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl CredentialSource for InMemoryCredentials {
    fn load(&self) -> Option<Credentials> {
        self.with(|stored| stored.credentials.clone())
    }

    fn store(&self, credentials: Credentials) {
        self.with(|stored| stored.credentials = Some(credentials));
    }

    fn clear(&self) {
        self.with(|stored| stored.credentials = None);
    }

    fn remember_state(&self, state: String) {
        self.with(|stored| stored.pending_state = Some(state));
    }

    fn take_state(&self) -> Option<String> {
        self.with(|stored| stored.pending_state.take())
    }
}
