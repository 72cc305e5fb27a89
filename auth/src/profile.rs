//! Profile projection.
//!
//! Turns a principal and its raw attributes into the record the view shows.

use crate::state::{AttributeBag, AttributeKey, DisplayProfile, Principal};

/// Project a principal and its attributes into a [`DisplayProfile`].
///
/// Absent attributes stay absent. The subject id always comes from the
/// principal, never from the bag.
///
/// # Examples
///
/// ```
/// use session_shell_auth::profile::project;
/// use session_shell_auth::state::{AttributeBag, AttributeKey, Principal};
///
/// let principal = Principal::new("u1", "alice");
/// let attributes = AttributeBag::new().with(AttributeKey::GivenName, "Alice");
///
/// let profile = project(&principal, &attributes);
/// assert_eq!(profile.sub, "u1");
/// assert_eq!(profile.given_name.as_deref(), Some("Alice"));
/// assert_eq!(profile.email, None);
/// ```
#[must_use]
pub fn project(principal: &Principal, attributes: &AttributeBag) -> DisplayProfile {
    let field = |key| attributes.get(key).map(ToString::to_string);

    DisplayProfile {
        sub: principal.id.clone(),
        email: field(AttributeKey::Email),
        given_name: field(AttributeKey::GivenName),
        family_name: field(AttributeKey::FamilyName),
        profile: field(AttributeKey::Profile),
        phone_number: field(AttributeKey::PhoneNumber),
    }
}
