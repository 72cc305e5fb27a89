//! Session query adapter.
//!
//! Combines "who is signed in" and "what are their attributes" into one
//! operation that fails closed: any failure means [`SessionQueryOutcome::NotAuthenticated`].

use crate::providers::IdentityProvider;
use crate::state::{AttributeBag, Principal};
use session_shell_runtime::metrics::SessionMetrics;

/// Result of one session query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionQueryOutcome {
    /// A session exists and its attributes were fetched.
    Authenticated {
        /// The signed-in principal.
        principal: Principal,
        /// The principal's attributes.
        attributes: AttributeBag,
    },

    /// No usable session (including every lookup failure).
    NotAuthenticated,
}

impl SessionQueryOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "authenticated",
            Self::NotAuthenticated => "not_authenticated",
        }
    }
}

/// Query the current session.
///
/// Attributes are only fetched once a principal is known. Failures are logged
/// and reported as [`SessionQueryOutcome::NotAuthenticated`]; this function
/// never fails. It touches no shared state and is safe to run concurrently.
///
/// # Examples
///
/// ```ignore
/// match query_current_session(&provider).await {
///     SessionQueryOutcome::Authenticated { principal, .. } => println!("hi {}", principal.username),
///     SessionQueryOutcome::NotAuthenticated => println!("Not signed in"),
/// }
/// ```
pub async fn query_current_session<P>(provider: &P) -> SessionQueryOutcome
where
    P: IdentityProvider + ?Sized,
{
    let outcome = match provider.current_principal().await {
        Err(error) => {
            if error.is_not_authenticated() {
                tracing::debug!(error = %error, "Not signed in");
            } else {
                tracing::warn!(error = %error, "Principal lookup failed, treating as signed out");
            }
            SessionQueryOutcome::NotAuthenticated
        },
        Ok(principal) => match provider.fetch_attributes(&principal).await {
            Ok(attributes) => SessionQueryOutcome::Authenticated {
                principal,
                attributes,
            },
            Err(error) => {
                tracing::warn!(
                    user_id = %principal.id,
                    error = %error,
                    "Attribute fetch failed, treating as signed out"
                );
                SessionQueryOutcome::NotAuthenticated
            },
        },
    };

    SessionMetrics::record_query(outcome.label());
    outcome
}
