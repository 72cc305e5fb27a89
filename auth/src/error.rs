//! Error types for session and identity-provider operations.

use session_shell_core::hub::HubError;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the session shell.
///
/// Most of these never reach the presentation layer: query failures are
/// folded into "not authenticated" by the controller. Only
/// [`AuthError::RedirectFailed`] is shown to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// No active session exists.
    #[error("User is not authenticated")]
    NotAuthenticated,

    /// The stored session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// A stored token could not be decoded.
    #[error("Malformed token: {reason}")]
    MalformedToken {
        /// Reason for failure
        reason: String,
    },

    /// Fetching the principal's attributes failed.
    #[error("Failed to fetch user attributes: {reason}")]
    AttributeFetchFailed {
        /// Reason for failure
        reason: String,
    },

    /// Network or HTTP-level failure talking to the provider.
    #[error("Transport error: {0}")]
    Transport(String),

    // ═══════════════════════════════════════════════════════════
    // Redirect Flow Errors
    // ═══════════════════════════════════════════════════════════

    /// The redirect sign-in flow reported a failure.
    #[error("{message}")]
    RedirectFailed {
        /// Message shown to the user
        message: String,
    },

    /// OAuth state parameter is invalid (CSRF protection).
    #[error("Invalid OAuth state parameter")]
    OAuthStateInvalid,

    /// The provider's sign-out operation failed.
    #[error("Sign-out failed: {reason}")]
    SignOutFailed {
        /// Reason for failure
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════

    /// A required configuration value is missing.
    #[error("Missing configuration value: {name}")]
    MissingConfig {
        /// Environment variable or field name
        name: String,
    },

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Subscribing to or publishing on the hub failed.
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}

impl AuthError {
    /// Returns `true` if this error means "no usable session".
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shell_auth::AuthError;
    ///
    /// assert!(AuthError::NotAuthenticated.is_not_authenticated());
    /// assert!(AuthError::SessionExpired.is_not_authenticated());
    /// assert!(!AuthError::OAuthStateInvalid.is_not_authenticated());
    /// ```
    #[must_use]
    pub const fn is_not_authenticated(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::SessionExpired | Self::MalformedToken { .. }
        )
    }

    /// Returns `true` if the error text may be shown to the user verbatim.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(self, Self::RedirectFailed { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}
