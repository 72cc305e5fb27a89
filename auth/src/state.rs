//! Session state types.
//!
//! This module defines the data model of the session shell: the identity
//! returned by the provider, the raw attribute bag, the display projection
//! and the reconciliation state owned by the controller.
//! All types are `Clone` to support the functional architecture pattern.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// Identity Types
// ═══════════════════════════════════════════════════════════════════════

/// The authenticated identity's minimal descriptor.
///
/// Replaced wholesale on every successful session query, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// Stable unique id issued by the identity provider (the `sub` claim).
    pub id: String,

    /// Human-readable username.
    pub username: String,
}

impl Principal {
    /// Create a principal.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// Federated identity providers offered by the sign-in affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignInProvider {
    /// Google.
    Google,
    /// Facebook.
    Facebook,
    /// Login with Amazon.
    Amazon,
    /// Sign in with Apple.
    Apple,
}

impl SignInProvider {
    /// Name the hosted UI expects in its `identity_provider` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Facebook => "Facebook",
            Self::Amazon => "LoginWithAmazon",
            Self::Apple => "SignInWithApple",
        }
    }
}

impl fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Attributes
// ═══════════════════════════════════════════════════════════════════════

/// Well-known attribute keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKey {
    /// Subject id.
    Sub,
    /// Email address.
    Email,
    /// Whether the email address has been verified.
    EmailVerified,
    /// Given (first) name.
    GivenName,
    /// Family (last) name.
    FamilyName,
    /// Profile picture URL.
    Profile,
    /// Phone number.
    PhoneNumber,
    /// Federated identity descriptor (JSON text).
    Identities,
}

impl AttributeKey {
    /// Every well-known key.
    pub const ALL: [Self; 8] = [
        Self::Sub,
        Self::Email,
        Self::EmailVerified,
        Self::GivenName,
        Self::FamilyName,
        Self::Profile,
        Self::PhoneNumber,
        Self::Identities,
    ];

    /// Wire name of the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sub => "sub",
            Self::Email => "email",
            Self::EmailVerified => "email_verified",
            Self::GivenName => "given_name",
            Self::FamilyName => "family_name",
            Self::Profile => "profile",
            Self::PhoneNumber => "phone_number",
            Self::Identities => "identities",
        }
    }

    /// Parse a wire name; unknown names yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// Raw key/value attributes reported by the identity provider.
///
/// Every value is optional. Keys outside [`AttributeKey`] are kept so that
/// nothing the provider sends is silently lost, but the projector only reads
/// the well-known ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeBag {
    values: BTreeMap<String, String>,
}

impl AttributeBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a well-known attribute.
    #[must_use]
    pub fn with(mut self, key: AttributeKey, value: impl Into<String>) -> Self {
        self.insert(key.as_str(), value);
        self
    }

    /// Insert an attribute by wire name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Look up a well-known attribute.
    #[must_use]
    pub fn get(&self, key: AttributeKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    /// Look up any attribute by wire name.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of attributes present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Display Profile
// ═══════════════════════════════════════════════════════════════════════

/// UI-facing projection of a principal and its attributes.
///
/// Recomputed on every session change; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayProfile {
    /// Subject id (always the principal's id).
    pub sub: String,

    /// Email address.
    pub email: Option<String>,

    /// Given name.
    pub given_name: Option<String>,

    /// Family name.
    pub family_name: Option<String>,

    /// Profile image URL.
    pub profile: Option<String>,

    /// Phone number.
    pub phone_number: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
// Reconciliation State
// ═══════════════════════════════════════════════════════════════════════

/// What the presentation layer renders.
///
/// `Authenticated` is only reachable through a successful session query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    /// Nobody is signed in (also used while the first query is pending).
    #[default]
    Unauthenticated,

    /// A session exists.
    Authenticated(Principal, DisplayProfile),

    /// The redirect sign-in flow failed; the message is shown verbatim.
    Error(String),
}

impl SessionState {
    /// Returns `true` when someone is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(..))
    }

    /// The display profile, if signed in.
    #[must_use]
    pub const fn profile(&self) -> Option<&DisplayProfile> {
        match self {
            Self::Authenticated(_, profile) => Some(profile),
            Self::Unauthenticated | Self::Error(_) => None,
        }
    }

    /// The user-visible error message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            Self::Unauthenticated | Self::Authenticated(..) => None,
        }
    }
}

/// State managed by the session reducer.
///
/// # Examples
///
/// ```
/// use session_shell_auth::state::{SessionState, ShellState};
///
/// let state = ShellState::default();
/// assert_eq!(state.session, SessionState::Unauthenticated);
/// assert!(!state.mounted);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellState {
    /// Current session as shown to the user.
    pub session: SessionState,

    /// Generation of the most recently started query.
    ///
    /// A query result is applied only if it carries this generation.
    pub generation: u64,

    /// Whether the view is alive. Cleared on unmount.
    pub mounted: bool,

    /// Queries started but not yet completed.
    pub pending_queries: u32,
}
