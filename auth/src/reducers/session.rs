//! Session reconciliation reducer.
//!
//! This reducer keeps [`ShellState::session`] consistent with the identity
//! provider. It is the only writer of the session state.
//!
//! # Flow
//!
//! ```text
//! Mount ─────────────────────┐
//! RedirectSignInCompleted ───┼─▶ generation += 1 ─▶ query effect ─▶ QueryCompleted { generation }
//! SessionEnded ──────────────┘                                          │
//!                                                                       ▼
//!                                        applied only if generation is still the latest
//!
//! RedirectSignInFailed { message } ─▶ Error(message), generation += 1 (in-flight queries go stale)
//! Unmount ─▶ mounted = false, every later action but Mount is dropped
//! ```
//!
//! # Staleness
//!
//! The session reflects the most recently *started* query. A query that
//! completes after a newer one started is discarded, whatever order the
//! provider answers in.

use crate::actions::{SessionAction, SessionQueryOutcome};
use crate::environment::SessionEnvironment;
use crate::profile::project;
use crate::providers::IdentityProvider;
use crate::query::query_current_session;
use crate::state::{SessionState, ShellState};
use session_shell_core::effect::Effect;
use session_shell_core::reducer::Reducer;
use session_shell_core::{smallvec, SmallVec};
use session_shell_runtime::metrics::SessionMetrics;

/// Session reconciliation reducer.
#[derive(Debug, Clone)]
pub struct SessionReducer<P> {
    /// Phantom data to hold the provider type.
    _phantom: std::marker::PhantomData<P>,
}

impl<P> SessionReducer<P> {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<P> Default for SessionReducer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SessionReducer<P>
where
    P: IdentityProvider + Clone + 'static,
{
    /// Start a new query generation.
    fn start_query(
        state: &mut ShellState,
        env: &SessionEnvironment<P>,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        state.generation += 1;
        state.pending_queries += 1;

        let generation = state.generation;
        let provider = env.provider.clone();
        tracing::debug!(generation, "Starting session query");

        smallvec![Effect::future(async move {
            let outcome = query_current_session(&provider).await;
            Some(SessionAction::QueryCompleted {
                generation,
                outcome,
            })
        })]
    }
}

impl<P> Reducer for SessionReducer<P>
where
    P: IdentityProvider + Clone + 'static,
{
    type State = ShellState;
    type Action = SessionAction;
    type Environment = SessionEnvironment<P>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if !state.mounted && action != SessionAction::Mount {
            tracing::debug!(?action, "View is unmounted, dropping action");
            return smallvec![Effect::None];
        }

        match action {
            // ═══════════════════════════════════════════════════════════════
            // View Lifecycle
            // ═══════════════════════════════════════════════════════════════
            SessionAction::Mount => {
                if state.mounted {
                    tracing::debug!("Remount, re-running session query");
                }
                state.mounted = true;
                Self::start_query(state, env)
            },

            SessionAction::Unmount => {
                state.mounted = false;
                state.generation += 1;
                tracing::debug!("View unmounted");
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Lifecycle Signals
            // ═══════════════════════════════════════════════════════════════
            SessionAction::RedirectSignInCompleted => Self::start_query(state, env),

            SessionAction::RedirectSignInFailed { message } => {
                // Outstanding queries must not replace the error
                state.generation += 1;
                tracing::debug!(%message, "Redirect sign-in failed");
                state.session = SessionState::Error(message);
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Session Query
            // ═══════════════════════════════════════════════════════════════
            SessionAction::QueryCompleted {
                generation,
                outcome,
            } => {
                state.pending_queries = state.pending_queries.saturating_sub(1);

                if generation != state.generation {
                    SessionMetrics::record_stale_discard();
                    tracing::debug!(
                        generation,
                        latest = state.generation,
                        "Discarding stale session query result"
                    );
                    return smallvec![Effect::None];
                }

                state.session = match outcome {
                    SessionQueryOutcome::Authenticated {
                        principal,
                        attributes,
                    } => {
                        let profile = project(&principal, &attributes);
                        tracing::debug!(user_id = %principal.id, "Session authenticated");
                        SessionState::Authenticated(principal, profile)
                    },
                    SessionQueryOutcome::NotAuthenticated => {
                        tracing::debug!("Session unauthenticated");
                        SessionState::Unauthenticated
                    },
                };
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // User Intent
            // ═══════════════════════════════════════════════════════════════
            SessionAction::InitiateSignIn {
                provider,
                custom_state,
            } => {
                tracing::info!(%provider, "Initiating redirect sign-in");
                let identity = env.provider.clone();

                // Only a redirect-failure event may put an error in front of the user
                smallvec![Effect::future(async move {
                    if let Err(error) = identity.begin_redirect_sign_in(provider, &custom_state).await {
                        tracing::warn!(error = %error, "Could not start redirect sign-in");
                    }
                    None
                })]
            },

            SessionAction::TerminateSession => {
                tracing::info!("Signing out");
                let identity = env.provider.clone();

                // The session is left as is until the follow-up query reports back
                smallvec![Effect::future(async move {
                    let result = identity.end_session().await;
                    Some(SessionAction::SessionEnded { result })
                })]
            },

            SessionAction::SessionEnded { result } => {
                if let Err(error) = result {
                    tracing::warn!(error = %error, "Sign-out failed, re-checking session");
                }
                Self::start_query(state, env)
            },
        }
    }
}

#[cfg(all(test, feature = "test-utils"))]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::mocks::MockIdentityProvider;
    use crate::state::{AttributeBag, AttributeKey, Principal, SignInProvider};
    use session_shell_testing::{ReducerTest, assertions};

    type TestReducer = SessionReducer<MockIdentityProvider>;

    fn env() -> SessionEnvironment<MockIdentityProvider> {
        SessionEnvironment::new(MockIdentityProvider::new())
    }

    fn mounted(generation: u64) -> ShellState {
        ShellState {
            mounted: true,
            generation,
            pending_queries: 1,
            ..ShellState::default()
        }
    }

    fn authenticated() -> SessionQueryOutcome {
        SessionQueryOutcome::Authenticated {
            principal: Principal::new("u1", "alice"),
            attributes: AttributeBag::new().with(AttributeKey::GivenName, "Alice"),
        }
    }

    #[test]
    fn test_mount_starts_one_query() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ShellState::default())
            .when_action(SessionAction::Mount)
            .then_state(|state| {
                assert!(state.mounted);
                assert_eq!(state.generation, 1);
                assert_eq!(state.pending_queries, 1);
                assert_eq!(state.session, SessionState::Unauthenticated);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_future_count(effects, 1);
            })
            .run();
    }

    #[test]
    fn test_remount_starts_another_query() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ShellState::default())
            .when_actions([SessionAction::Mount, SessionAction::Mount])
            .then_state(|state| {
                assert_eq!(state.generation, 2);
                assert_eq!(state.pending_queries, 2);
            })
            .then_effects(|effects| assertions::assert_future_count(effects, 1))
            .run();
    }

    #[test]
    fn test_current_query_result_is_projected() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(1))
            .when_action(SessionAction::QueryCompleted {
                generation: 1,
                outcome: authenticated(),
            })
            .then_state(|state| {
                let SessionState::Authenticated(principal, profile) = &state.session else {
                    panic!("expected authenticated, got {:?}", state.session);
                };
                assert_eq!(principal.username, "alice");
                assert_eq!(profile.sub, "u1");
                assert_eq!(profile.given_name.as_deref(), Some("Alice"));
                assert_eq!(state.pending_queries, 0);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_stale_query_result_is_discarded() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(2))
            .when_action(SessionAction::QueryCompleted {
                generation: 1,
                outcome: authenticated(),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Unauthenticated);
                assert_eq!(state.pending_queries, 0);
            })
            .run();
    }

    #[test]
    fn test_failure_sets_error_without_query() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(1))
            .when_action(SessionAction::RedirectSignInFailed {
                message: "boom".to_string(),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Error("boom".to_string()));
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_in_flight_query_cannot_overwrite_error() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(1))
            .when_action(SessionAction::RedirectSignInFailed {
                message: "boom".to_string(),
            })
            .when_action(SessionAction::QueryCompleted {
                generation: 1,
                outcome: authenticated(),
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Error("boom".to_string()));
            })
            .run();
    }

    #[test]
    fn test_retry_then_not_authenticated_clears_error() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ShellState {
                session: SessionState::Error("boom".to_string()),
                ..mounted(1)
            })
            .when_action(SessionAction::RedirectSignInCompleted)
            .when_action(SessionAction::QueryCompleted {
                generation: 2,
                outcome: SessionQueryOutcome::NotAuthenticated,
            })
            .then_state(|state| {
                assert_eq!(state.session, SessionState::Unauthenticated);
            })
            .run();
    }

    #[test]
    fn test_actions_after_unmount_are_dropped() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(1))
            .when_action(SessionAction::Unmount)
            .when_action(SessionAction::RedirectSignInFailed {
                message: "late".to_string(),
            })
            .when_action(SessionAction::QueryCompleted {
                generation: 2,
                outcome: authenticated(),
            })
            .then_state(|state| {
                assert!(!state.mounted);
                assert_eq!(state.session, SessionState::Unauthenticated);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_terminate_session_does_not_clear_optimistically() {
        let session = SessionState::Authenticated(
            Principal::new("u1", "alice"),
            project(&Principal::new("u1", "alice"), &AttributeBag::new()),
        );

        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(ShellState {
                session: session.clone(),
                ..mounted(1)
            })
            .when_action(SessionAction::TerminateSession)
            .then_state(move |state| assert_eq!(state.session, session))
            .then_effects(|effects| assertions::assert_future_count(effects, 1))
            .run();
    }

    #[test]
    fn test_session_ended_requeries_even_on_failure() {
        ReducerTest::new(TestReducer::new())
            .with_env(env())
            .given_state(mounted(1))
            .when_action(SessionAction::SessionEnded {
                result: Err(AuthError::SignOutFailed {
                    reason: "offline".to_string(),
                }),
            })
            .then_state(|state| assert_eq!(state.generation, 2))
            .then_effects(|effects| assertions::assert_future_count(effects, 1))
            .run();
    }

    #[tokio::test]
    async fn test_sign_in_start_failure_leaves_session_unchanged() {
        let env = env();
        env.provider.set_sign_in_result(Err(AuthError::Transport("offline".to_string())));
        let mut state = mounted(1);

        let mut effects = TestReducer::new().reduce(
            &mut state,
            SessionAction::InitiateSignIn {
                provider: SignInProvider::Google,
                custom_state: "/".to_string(),
            },
            &env,
        );
        assert_eq!(state.session, SessionState::Unauthenticated);
        assert_eq!(state.generation, 1);

        let Some(Effect::Future(future)) = effects.pop() else {
            panic!("expected a future effect");
        };
        // Nothing is fed back, so no error can reach the view
        assert_eq!(future.await, None);
        assert_eq!(
            env.provider.last_sign_in(),
            Some((SignInProvider::Google, "/".to_string()))
        );
    }

    #[tokio::test]
    async fn test_query_effect_carries_its_generation() {
        let env = SessionEnvironment::new(MockIdentityProvider::signed_in(Principal::new(
            "u1", "alice",
        )));
        let mut state = ShellState::default();

        let mut effects = TestReducer::new().reduce(&mut state, SessionAction::Mount, &env);

        let Some(Effect::Future(future)) = effects.pop() else {
            panic!("expected a future effect");
        };
        let Some(SessionAction::QueryCompleted { generation, outcome }) = future.await else {
            panic!("expected QueryCompleted");
        };
        assert_eq!(generation, 1);
        assert!(matches!(outcome, SessionQueryOutcome::Authenticated { .. }));
    }
}
