//! Render-ready view of the session.
//!
//! The presentation layer reads a [`SessionView`] and nothing else. Its
//! `Display` impl produces a plain-text card for terminals and logs.

use crate::state::{DisplayProfile, Principal, SessionState};
use std::fmt;

/// Label of the sign-in button.
pub const SIGN_IN_LABEL: &str = "Sign in with Google";

/// Label of the sign-out button.
pub const SIGN_OUT_LABEL: &str = "Sign Out";

/// Profile card contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    /// Given and family name joined by a space (empty if neither is known).
    pub full_name: String,

    /// First letter of the given name followed by first letter of the family name.
    pub initials: String,

    /// Email address.
    pub email: Option<String>,

    /// Phone number.
    pub phone: Option<String>,

    /// Username of the principal.
    pub username: String,

    /// Subject id.
    pub user_id: String,

    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

impl ProfileCard {
    /// Build the card for a signed-in principal.
    #[must_use]
    pub fn new(principal: &Principal, profile: &DisplayProfile) -> Self {
        let names = [profile.given_name.as_deref(), profile.family_name.as_deref()];

        Self {
            full_name: names.iter().flatten().copied().collect::<Vec<_>>().join(" "),
            initials: names
                .iter()
                .flatten()
                .filter_map(|name| name.chars().next())
                .collect(),
            email: profile.email.clone(),
            phone: profile.phone_number.clone(),
            username: principal.username.clone(),
            user_id: profile.sub.clone(),
            avatar_url: profile.profile.clone(),
        }
    }
}

/// What the presentation layer shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionView {
    /// The sign-in affordance, with the redirect error if there was one.
    SignIn {
        /// Button label.
        label: &'static str,
        /// Error text shown under the button.
        error: Option<String>,
    },

    /// The signed-in profile.
    Profile(ProfileCard),
}

impl From<&SessionState> for SessionView {
    fn from(session: &SessionState) -> Self {
        match session {
            SessionState::Unauthenticated => Self::SignIn {
                label: SIGN_IN_LABEL,
                error: None,
            },
            SessionState::Error(message) => Self::SignIn {
                label: SIGN_IN_LABEL,
                error: Some(message.clone()),
            },
            SessionState::Authenticated(principal, profile) => {
                Self::Profile(ProfileCard::new(principal, profile))
            },
        }
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn { label, error } => {
                writeln!(f, "[ {label} ]")?;
                if let Some(error) = error {
                    writeln!(f, "{error}")?;
                }
                Ok(())
            },
            Self::Profile(card) => {
                writeln!(f, "User Profile")?;
                writeln!(f, "({}) {}", card.initials, card.full_name)?;
                if let Some(email) = &card.email {
                    writeln!(f, "{email}")?;
                }
                if let Some(phone) = &card.phone {
                    writeln!(f, "Phone: {phone}")?;
                }
                writeln!(f, "Username: {}", card.username)?;
                writeln!(f, "User ID: {}", card.user_id)?;
                writeln!(f, "[ {SIGN_OUT_LABEL} ]")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(given: Option<&str>, family: Option<&str>) -> DisplayProfile {
        DisplayProfile {
            sub: "u1".to_string(),
            email: Some("a@x.com".to_string()),
            given_name: given.map(ToString::to_string),
            family_name: family.map(ToString::to_string),
            profile: None,
            phone_number: None,
        }
    }

    #[test]
    fn test_unauthenticated_shows_sign_in() {
        assert_eq!(
            SessionView::from(&SessionState::Unauthenticated),
            SessionView::SignIn {
                label: SIGN_IN_LABEL,
                error: None
            }
        );
    }

    #[test]
    fn test_error_shows_sign_in_with_message() {
        let view = SessionView::from(&SessionState::Error("boom".to_string()));
        assert_eq!(view.to_string(), "[ Sign in with Google ]\nboom\n");
    }

    #[test]
    fn test_profile_card_names_and_initials() {
        let principal = Principal::new("u1", "alice");

        let card = ProfileCard::new(&principal, &profile(Some("Alice"), Some("Doe")));
        assert_eq!(card.full_name, "Alice Doe");
        assert_eq!(card.initials, "AD");

        let card = ProfileCard::new(&principal, &profile(None, Some("Doe")));
        assert_eq!(card.full_name, "Doe");
        assert_eq!(card.initials, "D");

        let card = ProfileCard::new(&principal, &profile(None, None));
        assert_eq!(card.full_name, "");
        assert_eq!(card.initials, "");
    }

    #[test]
    fn test_profile_rendering() {
        let session = SessionState::Authenticated(
            Principal::new("u1", "alice"),
            profile(Some("Alice"), Some("Doe")),
        );

        assert_eq!(
            SessionView::from(&session).to_string(),
            "User Profile\n(AD) Alice Doe\na@x.com\nUsername: alice\nUser ID: u1\n[ Sign Out ]\n"
        );
    }
}
