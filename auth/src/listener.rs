//! Authentication lifecycle listener.
//!
//! Subscribes to the `auth` topic of a [`Hub`] and turns the two events the
//! session shell cares about into [`ListenerSignal`]s. Every other event is
//! ignored.
//!
//! The returned [`Subscription`] is a scoped resource: once
//! [`Subscription::unsubscribe`] returns (or the subscription is dropped),
//! the callback is never invoked again.

use crate::AUTH_TOPIC;
use crate::error::Result;
use session_shell_core::hub::{Hub, HubEvent};
use session_shell_runtime::metrics::SessionMetrics;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;

/// Event kind published when a redirect sign-in completed.
pub const SIGN_IN_WITH_REDIRECT: &str = "signInWithRedirect";

/// Event kind published when a redirect sign-in failed.
pub const SIGN_IN_WITH_REDIRECT_FAILURE: &str = "signInWithRedirect_failure";

/// Message used when a failure event carries none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "An error has occurred during the OAuth flow.";

/// A lifecycle event as understood by the session shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The redirect sign-in completed.
    RedirectSignInCompleted,

    /// The redirect sign-in failed.
    RedirectSignInFailed {
        /// Message to show the user.
        message: String,
    },

    /// Any other event kind.
    Other(String),
}

impl LifecycleEvent {
    /// Interpret a hub event.
    ///
    /// The failure message is taken from `payload.message`, then
    /// `payload.error.message`, then [`DEFAULT_FAILURE_MESSAGE`].
    ///
    /// # Examples
    ///
    /// ```
    /// use session_shell_auth::listener::LifecycleEvent;
    /// use session_shell_core::hub::HubEvent;
    ///
    /// let event = HubEvent::new("signInWithRedirect_failure")
    ///     .with_payload(serde_json::json!({ "message": "boom" }));
    ///
    /// assert_eq!(
    ///     LifecycleEvent::from_hub(&event),
    ///     LifecycleEvent::RedirectSignInFailed { message: "boom".to_string() }
    /// );
    /// ```
    #[must_use]
    pub fn from_hub(event: &HubEvent) -> Self {
        match event.kind.as_str() {
            SIGN_IN_WITH_REDIRECT => Self::RedirectSignInCompleted,
            SIGN_IN_WITH_REDIRECT_FAILURE => Self::RedirectSignInFailed {
                message: failure_message(event.payload.as_ref()),
            },
            other => Self::Other(other.to_string()),
        }
    }

    /// The signal this event raises, if any.
    #[must_use]
    pub fn signal(self) -> Option<ListenerSignal> {
        match self {
            Self::RedirectSignInCompleted => Some(ListenerSignal::Retry),
            Self::RedirectSignInFailed { message } => Some(ListenerSignal::Fail(message)),
            Self::Other(_) => None,
        }
    }
}

fn failure_message(payload: Option<&serde_json::Value>) -> String {
    payload
        .and_then(|p| {
            p.get("message")
                .or_else(|| p.get("error").and_then(|e| e.get("message")))
        })
        .and_then(serde_json::Value::as_str)
        .filter(|message| !message.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}

/// What the listener asks the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerSignal {
    /// Query the session again.
    Retry,

    /// Show this error.
    Fail(String),
}

type Callback = Box<dyn Fn(ListenerSignal) + Send>;

/// A live listener registration.
///
/// Dropping it has the same effect as [`Subscription::unsubscribe`].
pub struct Subscription {
    topic: String,
    callback: Arc<Mutex<Option<Callback>>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Whether the callback can still fire.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Release the subscription.
    ///
    /// Waits for a callback that is currently running, then guarantees no
    /// further invocation. Consuming `self` makes a second release impossible.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let released = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if let Some(task) = self.task.take() {
            task.abort();
        }
        if released {
            tracing::debug!(topic = %self.topic, "Lifecycle listener released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Listen for lifecycle events on the `auth` topic of `hub`.
///
/// The hub subscription is in place when this function returns, so events
/// published afterwards are never missed. `on_event` runs on a tokio task,
/// one event at a time, in publication order.
///
/// Must be called within a tokio runtime.
///
/// # Errors
///
/// Returns [`crate::AuthError::Hub`] if the hub refuses the subscription.
pub fn subscribe<H, F>(hub: &H, on_event: F) -> Result<Subscription>
where
    H: Hub + ?Sized,
    F: Fn(ListenerSignal) + Send + 'static,
{
    let mut receiver = hub.subscribe(AUTH_TOPIC)?;
    let callback: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(Some(Box::new(on_event))));

    let task = tokio::spawn({
        let callback = Arc::clone(&callback);
        async move {
            while let Some(event) = receiver.recv().await {
                SessionMetrics::record_lifecycle_event(&event.kind);

                let Some(signal) = LifecycleEvent::from_hub(&event).signal() else {
                    tracing::trace!(kind = %event.kind, "Ignoring lifecycle event");
                    continue;
                };

                let guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
                let Some(on_event) = guard.as_ref() else {
                    break;
                };
                tracing::debug!(?signal, "Lifecycle signal");
                on_event(signal);
            }
        }
    });

    tracing::debug!(topic = AUTH_TOPIC, "Lifecycle listener subscribed");
    Ok(Subscription {
        topic: AUTH_TOPIC.to_string(),
        callback,
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_shell_core::hub::BroadcastHub;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn spy() -> (
        impl Fn(ListenerSignal) + Send + 'static,
        mpsc::UnboundedReceiver<ListenerSignal>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |signal| {
                let _ = tx.send(signal);
            },
            rx,
        )
    }

    #[test]
    fn test_failure_message_sources() {
        let direct = HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE)
            .with_payload(serde_json::json!({ "message": "boom" }));
        let nested = HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE)
            .with_payload(serde_json::json!({ "error": { "message": "nested" } }));
        let bare = HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE);

        assert_eq!(
            LifecycleEvent::from_hub(&direct).signal(),
            Some(ListenerSignal::Fail("boom".to_string()))
        );
        assert_eq!(
            LifecycleEvent::from_hub(&nested).signal(),
            Some(ListenerSignal::Fail("nested".to_string()))
        );
        assert_eq!(
            LifecycleEvent::from_hub(&bare).signal(),
            Some(ListenerSignal::Fail(DEFAULT_FAILURE_MESSAGE.to_string()))
        );
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let event = HubEvent::new("tokenRefresh");
        assert_eq!(
            LifecycleEvent::from_hub(&event),
            LifecycleEvent::Other("tokenRefresh".to_string())
        );
        assert_eq!(LifecycleEvent::from_hub(&event).signal(), None);
    }

    #[tokio::test]
    async fn test_signals_delivered_in_order() {
        let hub = BroadcastHub::new();
        let (on_event, mut signals) = spy();
        let _subscription = subscribe(&hub, on_event).unwrap();

        hub.publish(AUTH_TOPIC, HubEvent::new("signedIn")).unwrap();
        hub.publish(AUTH_TOPIC, HubEvent::new(SIGN_IN_WITH_REDIRECT)).unwrap();
        hub.publish(
            AUTH_TOPIC,
            HubEvent::new(SIGN_IN_WITH_REDIRECT_FAILURE)
                .with_payload(serde_json::json!({ "message": "boom" })),
        )
        .unwrap();

        assert_eq!(signals.recv().await, Some(ListenerSignal::Retry));
        assert_eq!(
            signals.recv().await,
            Some(ListenerSignal::Fail("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn test_other_topics_do_not_reach_listener() {
        let hub = BroadcastHub::new();
        let (on_event, mut signals) = spy();
        let _subscription = subscribe(&hub, on_event).unwrap();

        hub.publish("storage", HubEvent::new(SIGN_IN_WITH_REDIRECT)).unwrap();

        let nothing = tokio::time::timeout(Duration::from_millis(50), signals.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_no_callbacks_after_unsubscribe() {
        let hub = BroadcastHub::new();
        let (on_event, mut signals) = spy();
        let subscription = subscribe(&hub, on_event).unwrap();
        assert!(subscription.is_active());

        hub.publish(AUTH_TOPIC, HubEvent::new(SIGN_IN_WITH_REDIRECT)).unwrap();
        assert_eq!(signals.recv().await, Some(ListenerSignal::Retry));

        subscription.unsubscribe();
        hub.publish(AUTH_TOPIC, HubEvent::new(SIGN_IN_WITH_REDIRECT)).unwrap();

        // The spy's sender lives in the released callback; once it is gone the
        // channel closes without having seen the second event.
        assert_eq!(signals.recv().await, None);

        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.subscriber_count(AUTH_TOPIC) > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let hub = BroadcastHub::new();
        let (on_event, mut signals) = spy();
        drop(subscribe(&hub, on_event).unwrap());

        hub.publish(AUTH_TOPIC, HubEvent::new(SIGN_IN_WITH_REDIRECT)).unwrap();
        assert_eq!(signals.recv().await, None);
    }
}
