//! Integration tests for Store action broadcasting
//!
//! Observers of [`Store::subscribe_actions`] see every action an effect feeds
//! back, which is how callers wait for the outcome of an asynchronous lookup
//! without polling state.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use session_shell_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use session_shell_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum LookupAction {
    /// Start a lookup; the result arrives after `delay_ms`
    Lookup { id: u64, delay_ms: u64 },
    /// Lookup finished
    Found { id: u64, generation: u64 },
    /// Plain state change without effects
    Reset,
}

#[derive(Debug, Clone, Default)]
struct LookupState {
    generation: u64,
    found: Vec<u64>,
}

#[derive(Clone)]
struct LookupEnvironment;

#[derive(Clone)]
struct LookupReducer;

impl Reducer for LookupReducer {
    type State = LookupState;
    type Action = LookupAction;
    type Environment = LookupEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            LookupAction::Lookup { id, delay_ms } => {
                state.generation += 1;
                let generation = state.generation;
                smallvec![Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Some(LookupAction::Found { id, generation })
                })]
            },
            LookupAction::Found { id, .. } => {
                state.found.push(id);
                smallvec![Effect::None]
            },
            LookupAction::Reset => {
                state.found.clear();
                smallvec![Effect::None]
            },
        }
    }
}

fn lookup_store() -> Store<LookupState, LookupAction, LookupEnvironment, LookupReducer> {
    Store::new(LookupState::default(), LookupReducer, LookupEnvironment)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_send_and_wait_for_result() {
    let store = lookup_store();

    let result = store
        .send_and_wait_for(
            LookupAction::Lookup { id: 7, delay_ms: 5 },
            |action| matches!(action, LookupAction::Found { id: 7, .. }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, LookupAction::Found { id: 7, generation: 1 });
}

#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = lookup_store();

    let result = store
        .send_and_wait_for(
            LookupAction::Lookup { id: 1, delay_ms: 200 },
            |action| matches!(action, LookupAction::Found { .. }),
            Duration::from_millis(20),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}

#[tokio::test]
async fn test_direct_sends_are_not_broadcast() {
    let store = lookup_store();
    let mut rx = store.subscribe_actions();

    let _ = store.send(LookupAction::Reset).await.unwrap();
    let mut handle = store.send(LookupAction::Lookup { id: 3, delay_ms: 0 }).await.unwrap();
    handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

    // Only the effect-produced action is observed
    assert_eq!(
        rx.recv().await.unwrap(),
        LookupAction::Found { id: 3, generation: 1 }
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_results_arrive_in_completion_order() {
    let store = lookup_store();
    let mut rx = store.subscribe_actions();

    let _ = store.send(LookupAction::Lookup { id: 1, delay_ms: 60 }).await.unwrap();
    let _ = store.send(LookupAction::Lookup { id: 2, delay_ms: 0 }).await.unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();

    // The later lookup finishes first; its generation identifies it as newer
    assert_eq!(first, LookupAction::Found { id: 2, generation: 2 });
    assert_eq!(second, LookupAction::Found { id: 1, generation: 1 });
}

#[tokio::test]
async fn test_concurrent_waiters() {
    let store = Arc::new(lookup_store());
    let mut waiters = vec![];

    for id in 1..=5 {
        let store = Arc::clone(&store);
        waiters.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    LookupAction::Lookup { id, delay_ms: 10 * (6 - id) },
                    move |action| matches!(action, LookupAction::Found { id: found, .. } if *found == id),
                    Duration::from_secs(2),
                )
                .await
        }));
    }

    for (index, waiter) in waiters.into_iter().enumerate() {
        let action = waiter.await.unwrap().unwrap();
        let LookupAction::Found { id, .. } = action else {
            panic!("unexpected action: {action:?}");
        };
        assert_eq!(id, index as u64 + 1);
    }

    let mut found = store.state(|s| s.found.clone()).await;
    found.sort_unstable();
    assert_eq!(found, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_effects_settle_before_shutdown_completes() {
    let store = lookup_store();
    let _ = store.send(LookupAction::Lookup { id: 9, delay_ms: 20 }).await.unwrap();
    assert_eq!(store.pending_effects(), 1);

    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.pending_effects(), 0);
}
