//! Identity-provider configuration.
//!
//! The configuration is an explicit value handed to the provider at
//! construction. Nothing here is global; the application decides where the
//! values come from (usually [`AuthConfig::from_env`]).

use crate::error::{AuthError, Result};
use std::env;
use std::fmt;
use std::str::FromStr;

/// Scopes requested when none are configured.
pub const DEFAULT_SCOPES: [&str; 5] = [
    "openid",
    "email",
    "phone",
    "profile",
    "aws.cognito.signin.user.admin",
];

/// Default landing URL after sign-in and sign-out.
pub const DEFAULT_REDIRECT: &str = "http://localhost:3000/";

/// OAuth response type requested from the hosted UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// Implicit grant: tokens arrive in the URL fragment.
    #[default]
    Token,
    /// Authorization code grant.
    Code,
}

impl ResponseType {
    /// Value of the `response_type` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "code" => Ok(Self::Code),
            other => Err(AuthError::InvalidConfig {
                reason: format!("unsupported response type '{other}'"),
            }),
        }
    }
}

/// Hosted-UI OAuth configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// User pool id (e.g. `"eu-west-1_AbCdEf123"`).
    pub user_pool_id: String,

    /// App client id.
    pub client_id: String,

    /// Hosted-UI domain without scheme (e.g. `"auth.example.com"`).
    pub domain: String,

    /// OAuth scopes.
    ///
    /// Default: [`DEFAULT_SCOPES`]
    pub scopes: Vec<String>,

    /// Where the provider sends the browser after sign-in.
    pub redirect_sign_in: String,

    /// Where the provider sends the browser after sign-out.
    pub redirect_sign_out: String,

    /// Requested response type.
    ///
    /// Default: [`ResponseType::Token`]
    pub response_type: ResponseType,
}

impl AuthConfig {
    /// Create a configuration with default scopes, redirects and response type.
    ///
    /// # Arguments
    ///
    /// * `user_pool_id` - User pool id
    /// * `client_id` - App client id
    /// * `domain` - Hosted-UI domain, without scheme
    #[must_use]
    pub fn new(
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            domain: domain.into(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            redirect_sign_in: DEFAULT_REDIRECT.to_string(),
            redirect_sign_out: DEFAULT_REDIRECT.to_string(),
            response_type: ResponseType::default(),
        }
    }

    /// Set the sign-in redirect URL.
    #[must_use]
    pub fn with_redirect_sign_in(mut self, url: impl Into<String>) -> Self {
        self.redirect_sign_in = url.into();
        self
    }

    /// Set the sign-out redirect URL.
    #[must_use]
    pub fn with_redirect_sign_out(mut self, url: impl Into<String>) -> Self {
        self.redirect_sign_out = url.into();
        self
    }

    /// Replace the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the response type.
    #[must_use]
    pub const fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Load configuration from the process environment.
    ///
    /// | Variable | Required | Default |
    /// |---|---|---|
    /// | `AUTH_USER_POOL_ID` | yes | |
    /// | `AUTH_CLIENT_ID` | yes | |
    /// | `AUTH_DOMAIN` | yes | |
    /// | `AUTH_REDIRECT_SIGNIN` | no | `http://localhost:3000/` |
    /// | `AUTH_REDIRECT_SIGNOUT` | no | `http://localhost:3000/` |
    /// | `AUTH_RESPONSE_TYPE` | no | `token` |
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingConfig`] for a missing required variable,
    /// or any error from [`AuthConfig::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AuthConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AuthError::MissingConfig {
                    name: name.to_string(),
                })
        };

        let mut config = Self::new(
            required("AUTH_USER_POOL_ID")?,
            required("AUTH_CLIENT_ID")?,
            required("AUTH_DOMAIN")?,
        );

        if let Some(url) = lookup("AUTH_REDIRECT_SIGNIN") {
            config.redirect_sign_in = url;
        }
        if let Some(url) = lookup("AUTH_REDIRECT_SIGNOUT") {
            config.redirect_sign_out = url;
        }
        if let Some(response_type) = lookup("AUTH_RESPONSE_TYPE") {
            config.response_type = response_type.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if an id is empty, the domain
    /// carries a scheme or path, no scopes are set, or a redirect URL is
    /// not an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(AuthError::InvalidConfig { reason });

        if self.user_pool_id.trim().is_empty() {
            return invalid("user pool id is empty".to_string());
        }
        if self.client_id.trim().is_empty() {
            return invalid("client id is empty".to_string());
        }
        if self.domain.trim().is_empty()
            || self.domain.contains("://")
            || self.domain.contains('/')
        {
            return invalid(format!(
                "domain '{}' must be a bare host name",
                self.domain
            ));
        }
        if self.scopes.is_empty() {
            return invalid("at least one scope is required".to_string());
        }
        for url in [&self.redirect_sign_in, &self.redirect_sign_out] {
            if !is_absolute_http_url(url) {
                return invalid(format!("redirect '{url}' is not an absolute http(s) URL"));
            }
        }
        Ok(())
    }

    /// Space-separated scope list as sent to the provider.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Checks only for an `http://` or `https://` prefix followed by a non-empty
/// host. It does not parse the URL: a malformed host or path passes here and
/// is rejected by the provider when it compares the redirect URI.
fn is_absolute_http_url(url: &str) -> bool {
    ["https://", "http://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_redirect_url_check_is_prefix_only() {
        assert!(is_absolute_http_url("https://app.example.com/"));
        assert!(is_absolute_http_url("http://localhost:3000"));
        // Not a full syntax check
        assert!(is_absolute_http_url("http://a b"));

        assert!(!is_absolute_http_url("ftp://app.example.com/"));
        assert!(!is_absolute_http_url("/callback"));
        assert!(!is_absolute_http_url("https://"));
        assert!(!is_absolute_http_url("https:///path"));
        assert!(!is_absolute_http_url("HTTPS://app.example.com/"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = AuthConfig::new("pool", "client", "auth.example.com")
            .with_redirect_sign_in("https://app.example.com/")
            .with_response_type(ResponseType::Code);

        assert_eq!(config.scopes.len(), 5);
        assert_eq!(config.redirect_sign_out, DEFAULT_REDIRECT);
        assert_eq!(config.response_type.as_str(), "code");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("AUTH_USER_POOL_ID", "eu-west-1_abc"),
            ("AUTH_CLIENT_ID", "client-1"),
            ("AUTH_DOMAIN", "auth.example.com"),
            ("AUTH_REDIRECT_SIGNIN", "https://app.example.com/in"),
            ("AUTH_REDIRECT_SIGNOUT", "https://app.example.com/out"),
            ("AUTH_RESPONSE_TYPE", "CODE"),
        ]))
        .unwrap();

        assert_eq!(config.client_id, "client-1");
        assert_eq!(config.redirect_sign_in, "https://app.example.com/in");
        assert_eq!(config.redirect_sign_out, "https://app.example.com/out");
        assert_eq!(config.response_type, ResponseType::Code);
    }

    #[test]
    fn test_from_lookup_missing_required() {
        let err = AuthConfig::from_lookup(lookup(&[
            ("AUTH_USER_POOL_ID", "pool"),
            ("AUTH_DOMAIN", "auth.example.com"),
        ]))
        .unwrap_err();

        assert_eq!(
            err,
            AuthError::MissingConfig {
                name: "AUTH_CLIENT_ID".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = AuthConfig::new("pool", "client", "auth.example.com");

        assert!(
            AuthConfig::new("pool", "client", "https://auth.example.com")
                .validate()
                .is_err()
        );
        assert!(base.clone().with_redirect_sign_in("/callback").validate().is_err());
        assert!(base.clone().with_scopes(Vec::<String>::new()).validate().is_err());
        assert!(AuthConfig::new(" ", "client", "auth.example.com").validate().is_err());
    }

    #[test]
    fn test_response_type_parse() {
        assert_eq!("token".parse::<ResponseType>().unwrap(), ResponseType::Token);
        assert!("id_token".parse::<ResponseType>().is_err());
    }

    #[test]
    fn test_scope_param() {
        let config = AuthConfig::new("p", "c", "d.example.com").with_scopes(["openid", "email"]);
        assert_eq!(config.scope_param(), "openid email");
    }
}
