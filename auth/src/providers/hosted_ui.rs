//! OAuth2/OIDC hosted-UI identity provider.
//!
//! Implements [`IdentityProvider`] against a hosted sign-in page that
//! federates to social providers (`identity_provider=Google`, ...).
//!
//! # Flow
//!
//! ```text
//! 1. begin_redirect_sign_in → remember state → navigate to /oauth2/authorize
//! 2. User signs in at the provider
//! 3. Browser lands on redirect_sign_in with tokens (fragment) or a code (query)
//! 4. complete_redirect → check state → store tokens → publish on "auth"
//! 5. current_principal / fetch_attributes read the stored tokens
//! ```

use crate::config::{AuthConfig, ResponseType};
use crate::error::{AuthError, Result};
use crate::listener::{SIGN_IN_WITH_REDIRECT, SIGN_IN_WITH_REDIRECT_FAILURE};
use crate::providers::{CredentialSource, Credentials, IdentityProvider, Navigator};
use crate::state::{AttributeBag, Principal, SignInProvider};
use crate::AUTH_TOPIC;
use base64::Engine;
use chrono::Duration;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use session_shell_core::environment::Clock;
use session_shell_core::hub::{Hub, HubEvent};
use std::collections::HashMap;
use std::sync::Arc;

/// What a completed redirect carried back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectOutcome {
    /// Custom state passed to `begin_redirect_sign_in`, if it survived the round trip.
    pub custom_state: Option<String>,
}

/// Claims read from the id token.
///
/// The token arrives directly from the provider over TLS; its signature is
/// not checked here.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(rename = "cognito:username")]
    cognito_username: Option<String>,
    username: Option<String>,
    exp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Hosted-UI identity provider.
///
/// # Type Parameters
///
/// - `C`: Credential storage
/// - `N`: Navigator used for the sign-in and sign-out redirects
/// - `K`: Clock used for token expiry
///
/// # Example
///
/// ```no_run
/// use session_shell_auth::config::AuthConfig;
/// use session_shell_auth::providers::{HostedUiProvider, InMemoryCredentials, Navigator};
/// use session_shell_core::environment::SystemClock;
///
/// struct PrintNavigator;
///
/// impl Navigator for PrintNavigator {
///     fn navigate(&self, url: &str) -> session_shell_auth::Result<()> {
///         println!("open {url}");
///         Ok(())
///     }
/// }
///
/// # fn example() -> session_shell_auth::Result<()> {
/// let provider = HostedUiProvider::new(
///     AuthConfig::from_env()?,
///     InMemoryCredentials::new(),
///     PrintNavigator,
///     SystemClock,
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HostedUiProvider<C, N, K> {
    config: Arc<AuthConfig>,
    endpoint: String,
    credentials: C,
    navigator: N,
    clock: K,
    http_client: Client,
}

impl<C, N, K> HostedUiProvider<C, N, K>
where
    C: CredentialSource,
    N: Navigator,
    K: Clock,
{
    /// Create a provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the configuration does not validate.
    pub fn new(config: AuthConfig, credentials: C, navigator: N, clock: K) -> Result<Self> {
        config.validate()?;
        let endpoint = format!("https://{}", config.domain);

        Ok(Self {
            config: Arc::new(config),
            endpoint,
            credentials,
            navigator,
            clock,
            http_client: Client::new(),
        })
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Point HTTP calls at another base URL (e.g. a local stand-in).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// The configuration this provider was built with.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authorization URL for `provider` carrying `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the query cannot be encoded.
    pub fn authorize_url(&self, provider: SignInProvider, state: &str) -> Result<String> {
        let scope = self.config.scope_param();
        let params = [
            ("identity_provider", provider.as_str()),
            ("redirect_uri", self.config.redirect_sign_in.as_str()),
            ("response_type", self.config.response_type.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
        ];

        Ok(format!("{}/oauth2/authorize?{}", self.endpoint, encode_query(&params)?))
    }

    /// Logout URL that returns to `redirect_sign_out`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the query cannot be encoded.
    pub fn logout_url(&self) -> Result<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("logout_uri", self.config.redirect_sign_out.as_str()),
        ];

        Ok(format!("{}/logout?{}", self.endpoint, encode_query(&params)?))
    }

    /// Finish a redirect sign-in from the URL the browser landed on.
    ///
    /// Publishes `signInWithRedirect` on success and
    /// `signInWithRedirect_failure` (with `{"error": {"message": ..}}`) on
    /// failure, on the `auth` topic of `hub`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RedirectFailed`] if the provider reported an error
    /// - [`AuthError::OAuthStateInvalid`] if the state parameter does not match
    /// - [`AuthError::MalformedToken`] if the response lacks tokens
    /// - [`AuthError::Transport`] if the code exchange fails
    pub async fn complete_redirect<H>(&self, url: &str, hub: &H) -> Result<RedirectOutcome>
    where
        H: Hub + ?Sized,
    {
        match self.finish_redirect(url).await {
            Ok(outcome) => {
                tracing::info!("Redirect sign-in completed");
                let payload = serde_json::json!({ "customState": outcome.custom_state });
                hub.publish(
                    AUTH_TOPIC,
                    HubEvent::new(SIGN_IN_WITH_REDIRECT).with_payload(payload),
                )?;
                Ok(outcome)
            },
            Err(error) => {
                tracing::warn!(error = %error, "Redirect sign-in failed");
                let payload = serde_json::json!({ "error": { "message": error.to_string() } });
                if let Err(publish_error) = hub.publish(
                    AUTH_TOPIC,
                    HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE).with_payload(payload),
                ) {
                    tracing::warn!(error = %publish_error, "Could not publish redirect failure");
                }
                Err(error)
            },
        }
    }

    async fn finish_redirect(&self, url: &str) -> Result<RedirectOutcome> {
        let params = redirect_params(url);

        if let Some(code) = params.get("error") {
            let message = params
                .get("error_description")
                .filter(|description| !description.is_empty())
                .unwrap_or(code);
            return Err(AuthError::RedirectFailed {
                message: message.clone(),
            });
        }

        let expected = self.credentials.take_state().ok_or(AuthError::OAuthStateInvalid)?;
        let received = params.get("state").ok_or(AuthError::OAuthStateInvalid)?;
        if !constant_time_eq::constant_time_eq(expected.as_bytes(), received.as_bytes()) {
            return Err(AuthError::OAuthStateInvalid);
        }

        let credentials = match self.config.response_type {
            ResponseType::Token => self.credentials_from_fragment(&params)?,
            ResponseType::Code => {
                let code = params.get("code").ok_or_else(|| AuthError::MalformedToken {
                    reason: "redirect carries no authorization code".to_string(),
                })?;
                self.exchange_code(code).await?
            },
        };
        self.credentials.store(credentials);

        Ok(RedirectOutcome {
            custom_state: decode_custom_state(received),
        })
    }

    fn credentials_from_fragment(&self, params: &HashMap<String, String>) -> Result<Credentials> {
        let token = |name: &str| {
            params.get(name).cloned().ok_or_else(|| AuthError::MalformedToken {
                reason: format!("redirect carries no {name}"),
            })
        };

        Ok(Credentials {
            id_token: token("id_token")?,
            access_token: token("access_token")?,
            refresh_token: None,
            expires_at: params
                .get("expires_in")
                .and_then(|s| s.parse().ok())
                .map(|seconds| self.clock.now() + Duration::seconds(seconds)),
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<Credentials> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_sign_in.as_str()),
        ];

        let response = self
            .http_client
            .post(format!("{}/oauth2/token", self.endpoint))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Token exchange failed: {}", error_body);
            return Err(AuthError::Transport(format!("token endpoint returned {status}")));
        }

        let tokens: TokenEndpointResponse = response.json().await?;
        Ok(Credentials {
            id_token: tokens.id_token,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens
                .expires_in
                .map(|seconds| self.clock.now() + Duration::seconds(seconds)),
        })
    }

    fn id_claims(&self) -> Result<(Credentials, IdTokenClaims)> {
        let credentials = self.credentials.load().ok_or(AuthError::NotAuthenticated)?;
        let claims = decode_claims(&credentials.id_token)?;

        if let Some(exp) = claims.exp {
            if exp <= self.clock.now().timestamp() {
                return Err(AuthError::SessionExpired);
            }
        }
        Ok((credentials, claims))
    }
}

impl<C, N, K> IdentityProvider for HostedUiProvider<C, N, K>
where
    C: CredentialSource,
    N: Navigator,
    K: Clock,
{
    async fn current_principal(&self) -> Result<Principal> {
        let (_, claims) = self.id_claims()?;
        let username = claims
            .cognito_username
            .or(claims.username)
            .unwrap_or_else(|| claims.sub.clone());

        Ok(Principal::new(claims.sub, username))
    }

    async fn fetch_attributes(&self, principal: &Principal) -> Result<AttributeBag> {
        let (credentials, _) = self.id_claims()?;

        let response = self
            .http_client
            .get(format!("{}/oauth2/userInfo", self.endpoint))
            .bearer_auth(&credentials.access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {},
            StatusCode::UNAUTHORIZED => return Err(AuthError::NotAuthenticated),
            status => {
                return Err(AuthError::AttributeFetchFailed {
                    reason: format!("userInfo returned {status}"),
                });
            },
        }

        let body: serde_json::Map<String, serde_json::Value> = response.json().await?;
        let attributes = attribute_bag(body);

        if attributes.get_raw("sub").is_some_and(|sub| sub != principal.id) {
            return Err(AuthError::AttributeFetchFailed {
                reason: "userInfo subject does not match the current principal".to_string(),
            });
        }
        Ok(attributes)
    }

    async fn begin_redirect_sign_in(&self, provider: SignInProvider, custom_state: &str) -> Result<()> {
        let state = encode_state(&generate_nonce(), custom_state);
        self.credentials.remember_state(state.clone());

        tracing::info!(%provider, "Redirecting to hosted sign-in");
        self.navigator.navigate(&self.authorize_url(provider, &state)?)
    }

    async fn end_session(&self) -> Result<()> {
        self.credentials.clear();
        tracing::info!("Local credentials cleared, redirecting to logout");
        self.navigator
            .navigate(&self.logout_url()?)
            .map_err(|e| AuthError::SignOutFailed {
                reason: e.to_string(),
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════

/// 256-bit random nonce, base64url encoded.
fn generate_nonce() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// `{nonce}.{base64url(custom_state)}`; neither half contains a `.`
fn encode_state(nonce: &str, custom_state: &str) -> String {
    let custom = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(custom_state);
    format!("{nonce}.{custom}")
}

fn decode_custom_state(state: &str) -> Option<String> {
    let (_, custom) = state.split_once('.')?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(custom).ok()?;
    String::from_utf8(bytes).ok()
}

fn encode_query(params: &[(&str, &str)]) -> Result<String> {
    serde_urlencoded::to_string(params).map_err(|e| AuthError::InvalidConfig {
        reason: format!("Failed to build URL: {e}"),
    })
}

/// Query and fragment parameters of `url`; fragment values win.
fn redirect_params(url: &str) -> HashMap<String, String> {
    let (before_fragment, fragment) = url.split_once('#').unwrap_or((url, ""));
    let query = before_fragment.split_once('?').map_or("", |(_, q)| q);

    let mut params = decode_params(query);
    params.extend(decode_params(fragment));
    params
}

fn decode_params(encoded: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str(encoded).unwrap_or_else(|error| {
        tracing::warn!(%error, "Ignoring malformed redirect parameters");
        HashMap::new()
    })
}

fn decode_claims(id_token: &str) -> Result<IdTokenClaims> {
    let malformed = |reason: String| AuthError::MalformedToken { reason };

    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| malformed("id token is not a JWT".to_string()))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| malformed(e.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|e| malformed(e.to_string()))
}

fn attribute_bag(body: serde_json::Map<String, serde_json::Value>) -> AttributeBag {
    body.into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect()
}
