//! Mock identity provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::IdentityProvider;
use crate::state::{AttributeBag, AttributeKey, Principal, SignInProvider};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
struct Script {
    principal: Result<Principal>,
    attributes: Result<AttributeBag>,
    sign_in: Result<()>,
    sign_out: Result<()>,
    last_sign_in: Option<(SignInProvider, String)>,
    gate: Option<QueryGate>,
}

#[derive(Debug, Default)]
struct Counters {
    principal: AtomicUsize,
    attributes: AtomicUsize,
    sign_in: AtomicUsize,
    sign_out: AtomicUsize,
}

/// Mock identity provider.
///
/// Returns scripted results and counts every call. Clones share script
/// and counters, so a test can keep a handle while the controller owns
/// another.
///
/// A successful `end_session` also scripts the principal lookup to fail with
/// [`AuthError::NotAuthenticated`], the way a real provider behaves after
/// sign-out.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    script: Arc<Mutex<Script>>,
    counters: Arc<Counters>,
}

impl MockIdentityProvider {
    /// Create a mock with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                principal: Err(AuthError::NotAuthenticated),
                attributes: Ok(AttributeBag::new()),
                sign_in: Ok(()),
                sign_out: Ok(()),
                last_sign_in: None,
                gate: None,
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a mock where `principal` is signed in with only a `sub` attribute.
    #[must_use]
    pub fn signed_in(principal: Principal) -> Self {
        let mock = Self::new();
        mock.set_attributes(Ok(AttributeBag::new().with(AttributeKey::Sub, principal.id.clone())));
        mock.set_principal(Ok(principal));
        mock
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the result of `current_principal`.
    pub fn set_principal(&self, result: Result<Principal>) {
        self.script().principal = result;
    }

    /// Script the result of `fetch_attributes`.
    pub fn set_attributes(&self, result: Result<AttributeBag>) {
        self.script().attributes = result;
    }

    /// Script the result of `begin_redirect_sign_in`.
    pub fn set_sign_in_result(&self, result: Result<()>) {
        self.script().sign_in = result;
    }

    /// Script the result of `end_session`.
    pub fn set_sign_out_result(&self, result: Result<()>) {
        self.script().sign_out = result;
    }

    /// Hold the next session query open until the returned gate is released.
    ///
    /// The held query captures the scripted results at the moment it starts,
    /// so the script can be changed while it waits.
    #[must_use]
    pub fn hold_next_query(&self) -> QueryGate {
        let gate = QueryGate::new();
        self.script().gate = Some(gate.clone());
        gate
    }

    /// Calls to `current_principal`.
    #[must_use]
    pub fn principal_calls(&self) -> usize {
        self.counters.principal.load(Ordering::SeqCst)
    }

    /// Calls to `fetch_attributes`.
    #[must_use]
    pub fn attribute_calls(&self) -> usize {
        self.counters.attributes.load(Ordering::SeqCst)
    }

    /// Calls to `begin_redirect_sign_in`.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.counters.sign_in.load(Ordering::SeqCst)
    }

    /// Calls to `end_session`.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.counters.sign_out.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent `begin_redirect_sign_in`.
    #[must_use]
    pub fn last_sign_in(&self) -> Option<(SignInProvider, String)> {
        self.script().last_sign_in.clone()
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn current_principal(&self) -> impl Future<Output = Result<Principal>> + Send {
        self.counters.principal.fetch_add(1, Ordering::SeqCst);
        let (result, gate) = {
            let mut script = self.script();
            (script.principal.clone(), script.gate.take())
        };

        async move {
            if let Some(gate) = gate {
                gate.inner.entered.notify_one();
                gate.inner.released.notified().await;
            }
            result
        }
    }

    fn fetch_attributes(
        &self,
        _principal: &Principal,
    ) -> impl Future<Output = Result<AttributeBag>> + Send {
        self.counters.attributes.fetch_add(1, Ordering::SeqCst);
        let result = self.script().attributes.clone();

        async move { result }
    }

    fn begin_redirect_sign_in(
        &self,
        provider: SignInProvider,
        custom_state: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        self.counters.sign_in.fetch_add(1, Ordering::SeqCst);
        let result = {
            let mut script = self.script();
            script.last_sign_in = Some((provider, custom_state.to_string()));
            script.sign_in.clone()
        };

        async move { result }
    }

    fn end_session(&self) -> impl Future<Output = Result<()>> + Send {
        self.counters.sign_out.fetch_add(1, Ordering::SeqCst);
        let result = {
            let mut script = self.script();
            if script.sign_out.is_ok() {
                script.principal = Err(AuthError::NotAuthenticated);
            }
            script.sign_out.clone()
        };

        async move { result }
    }
}

#[derive(Debug, Default)]
struct GateInner {
    entered: Notify,
    released: Notify,
}

/// Handle on a held session query, see [`MockIdentityProvider::hold_next_query`].
#[derive(Debug, Clone, Default)]
pub struct QueryGate {
    inner: Arc<GateInner>,
}

impl QueryGate {
    fn new() -> Self {
        Self::default()
    }

    /// Wait until the held query has started.
    pub async fn entered(&self) {
        self.inner.entered.notified().await;
    }

    /// Let the held query complete.
    pub fn release(&self) {
        self.inner.released.notify_one();
    }
}
