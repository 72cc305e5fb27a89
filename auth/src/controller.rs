//! Session reconciliation controller.
//!
//! Owns the session [`Store`] and the lifecycle [`Subscription`] for the
//! lifetime of one view, and exposes render-ready state plus the sign-in
//! and sign-out triggers to the presentation layer.
//!
//! None of the public operations fail: provider and query errors are folded
//! into [`SessionState`] by the reducer, and store rejections are logged.
//!
//! # Example
//!
//! ```no_run
//! use session_shell_auth::controller::SessionController;
//! use session_shell_auth::environment::SessionEnvironment;
//! use session_shell_auth::mocks::MockIdentityProvider;
//! use session_shell_auth::state::SignInProvider;
//! use session_shell_core::hub::BroadcastHub;
//! use std::time::Duration;
//!
//! # async fn example() -> session_shell_auth::Result<()> {
//! let hub = BroadcastHub::new();
//! let env = SessionEnvironment::new(MockIdentityProvider::new());
//!
//! let controller = SessionController::mount(env, &hub).await?;
//! controller.settle(Duration::from_secs(1)).await;
//! println!("{}", controller.view().await);
//!
//! controller.initiate_sign_in(SignInProvider::Google, "/").await;
//! let final_state = controller.teardown().await;
//! # Ok(())
//! # }
//! ```

use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::error::Result;
use crate::listener::{self, ListenerSignal, Subscription};
use crate::providers::IdentityProvider;
use crate::reducers::SessionReducer;
use crate::state::{SessionState, ShellState, SignInProvider};
use crate::view::SessionView;
use session_shell_core::hub::Hub;
use session_shell_runtime::Store;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Store type driving the session reducer.
pub type SessionStore<P> =
    Store<ShellState, SessionAction, SessionEnvironment<P>, SessionReducer<P>>;

/// Session reconciliation controller.
///
/// # Type Parameters
///
/// - `P`: Identity provider
pub struct SessionController<P>
where
    P: IdentityProvider + Clone + 'static,
{
    store: SessionStore<P>,
    subscription: Option<Subscription>,
    forwarder: Option<JoinHandle<()>>,
    /// Signals received by the listener but not yet reduced.
    signals_in_flight: Arc<AtomicUsize>,
}

impl<P> SessionController<P>
where
    P: IdentityProvider + Clone + 'static,
{
    /// Mount the view.
    ///
    /// Subscribes to lifecycle events first, then dispatches the mount-time
    /// session query, so an event published right after mount is never missed.
    /// Events raised while mounting are reduced after `Mount`, in order.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::Hub`] if the hub refuses the subscription.
    pub async fn mount<H>(env: SessionEnvironment<P>, hub: &H) -> Result<Self>
    where
        H: Hub + ?Sized,
    {
        let store = Store::new(ShellState::default(), SessionReducer::new(), env);
        let signals_in_flight = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel::<ListenerSignal>();

        let subscription = listener::subscribe(hub, {
            let signals_in_flight = Arc::clone(&signals_in_flight);
            move |signal| {
                signals_in_flight.fetch_add(1, Ordering::SeqCst);
                if tx.send(signal).is_err() {
                    signals_in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        })?;

        // Signals raised before this point wait in the channel: the store must
        // be mounted before the forwarder delivers any of them
        let mut controller = Self {
            store,
            subscription: Some(subscription),
            forwarder: None,
            signals_in_flight,
        };
        controller.dispatch(SessionAction::Mount).await;

        // Forward signals one at a time so they are reduced in arrival order
        controller.forwarder = Some(tokio::spawn({
            let store = controller.store.clone();
            let signals_in_flight = Arc::clone(&controller.signals_in_flight);
            async move {
                while let Some(signal) = rx.recv().await {
                    if let Err(error) = store.send(SessionAction::from(signal)).await {
                        tracing::debug!(%error, "Dropped lifecycle signal");
                    }
                    signals_in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }));

        tracing::debug!("Session controller mounted");
        Ok(controller)
    }

    async fn dispatch(&self, action: SessionAction) {
        if let Err(error) = self.store.send(action).await {
            tracing::warn!(%error, "Session action rejected");
        }
    }

    /// Re-run the mount-time query, as when the user navigates back to the view.
    pub async fn remount(&self) {
        self.dispatch(SessionAction::Mount).await;
    }

    /// Start the redirect sign-in flow.
    ///
    /// No local state changes: the landing page re-mounts the view and/or
    /// publishes a lifecycle event.
    pub async fn initiate_sign_in(&self, provider: SignInProvider, custom_state: impl Into<String>) {
        self.dispatch(SessionAction::InitiateSignIn {
            provider,
            custom_state: custom_state.into(),
        })
        .await;
    }

    /// Sign out. The session changes once the follow-up query completes.
    pub async fn terminate_session(&self) {
        self.dispatch(SessionAction::TerminateSession).await;
    }

    /// Current session state.
    pub async fn session(&self) -> SessionState {
        self.store.state(|s| s.session.clone()).await
    }

    /// Render-ready view of the current session.
    pub async fn view(&self) -> SessionView {
        self.store.state(|s| SessionView::from(&s.session)).await
    }

    /// Wait until no query, effect or lifecycle signal is in flight.
    ///
    /// Returns `false` if that did not happen within `timeout`.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let poll_interval = Duration::from_millis(5);
        let start = std::time::Instant::now();

        loop {
            let pending_queries = self.store.state(|s| s.pending_queries).await;
            if pending_queries == 0
                && self.store.pending_effects() == 0
                && self.signals_in_flight.load(Ordering::SeqCst) == 0
            {
                return true;
            }
            if start.elapsed() >= timeout {
                tracing::warn!(pending_queries, "Session did not settle in time");
                return false;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Tear the view down and return the final session state.
    ///
    /// Releases the lifecycle subscription exactly once, then marks the
    /// state unmounted: callbacks, signals and query results arriving later
    /// change nothing.
    pub async fn teardown(mut self) -> SessionState {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.dispatch(SessionAction::Unmount).await;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        tracing::debug!("Session controller torn down");
        self.session().await
    }
}

impl<P> Drop for SessionController<P>
where
    P: IdentityProvider + Clone + 'static,
{
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

impl<P> std::fmt::Debug for SessionController<P>
where
    P: IdentityProvider + Clone + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("subscription", &self.subscription)
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
