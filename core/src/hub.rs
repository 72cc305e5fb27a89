//! Topic-scoped broadcast hub for lifecycle notifications.
//!
//! This module provides the [`Hub`] trait for publishing and subscribing to
//! lightweight notifications grouped by topic. Identity providers publish
//! authentication milestones (for example "redirect sign-in completed") on the
//! `auth` topic and views subscribe for as long as they are alive.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   publish("auth", ..)   ┌──────────────┐
//! │ Identity provider │ ──────────────────────▶ │     Hub      │
//! └──────────────────┘                          └──────┬───────┘
//!                                                       │ fan-out
//!                                              ┌────────┴────────┐
//!                                              ▼                 ▼
//!                                        ┌───────────┐     ┌───────────┐
//!                                        │ Listener A │     │ Listener B │
//!                                        └───────────┘     └───────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Explicit**: The hub is a value passed to whoever needs it, never a global
//! - **Fan-out**: Every live subscriber of a topic receives every event
//! - **No replay**: Events published before a subscription exist only for earlier subscribers
//! - **Lossy under pressure**: A subscriber that falls behind skips the events it missed
//!
//! # Example
//!
//! ```
//! use session_shell_core::hub::{BroadcastHub, Hub, HubEvent};
//!
//! # async fn example() -> Result<(), session_shell_core::hub::HubError> {
//! let hub = BroadcastHub::new();
//! let mut receiver = hub.subscribe("auth")?;
//!
//! hub.publish("auth", HubEvent::new("signInWithRedirect"))?;
//!
//! let event = receiver.recv().await;
//! assert_eq!(event.map(|e| e.kind), Some("signInWithRedirect".to_string()));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;

/// Default per-topic buffer size for [`BroadcastHub`].
pub const DEFAULT_TOPIC_CAPACITY: usize = 64;

/// Errors that can occur during hub operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Topic name is empty or otherwise unusable
    #[error("Invalid topic: '{0}'")]
    InvalidTopic(String),

    /// Failed to subscribe to a topic
    #[error("Subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },
}

/// A notification published on a hub topic.
///
/// `kind` identifies the milestone (e.g. `"signInWithRedirect"`); `payload`
/// carries optional provider-defined data such as an error description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Event kind as named by the publisher.
    pub kind: String,

    /// Optional structured payload.
    pub payload: Option<serde_json::Value>,
}

impl HubEvent {
    /// Create an event without payload.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Receiving half of a topic subscription.
///
/// Dropping the receiver ends the subscription.
#[derive(Debug)]
pub struct HubReceiver {
    topic: String,
    inner: broadcast::Receiver<HubEvent>,
}

impl HubReceiver {
    /// Wrap a broadcast receiver for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>, inner: broadcast::Receiver<HubEvent>) -> Self {
        Self {
            topic: topic.into(),
            inner,
        }
    }

    /// Topic this receiver is attached to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once every sender for the topic is gone. If this
    /// receiver lagged behind, the missed events are skipped and the next
    /// retained event is returned.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        topic = %self.topic,
                        skipped,
                        "Hub receiver lagged, skipping missed events"
                    );
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Trait for hub implementations.
///
/// Publishing and subscribing are synchronous: the hub only hands events to
/// in-process receivers, it never performs I/O.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a single hub can be shared by
/// the identity provider, listeners and tests.
pub trait Hub: Send + Sync {
    /// Publish an event to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers the event was handed to. Publishing
    /// to a topic with no subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidTopic`] if `topic` is empty.
    fn publish(&self, topic: &str, event: HubEvent) -> Result<usize, HubError>;

    /// Subscribe to `topic`, receiving every event published from now on.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidTopic`] if `topic` is empty, or
    /// [`HubError::SubscriptionFailed`] if the implementation cannot attach.
    fn subscribe(&self, topic: &str) -> Result<HubReceiver, HubError>;
}

impl<H: Hub + ?Sized> Hub for Arc<H> {
    fn publish(&self, topic: &str, event: HubEvent) -> Result<usize, HubError> {
        (**self).publish(topic, event)
    }

    fn subscribe(&self, topic: &str) -> Result<HubReceiver, HubError> {
        (**self).subscribe(topic)
    }
}

/// In-process hub backed by one `tokio::sync::broadcast` channel per topic.
///
/// Channels are created on first use. Cloning the hub shares its channels.
#[derive(Clone, Debug)]
pub struct BroadcastHub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<HubEvent>>>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Create a hub with [`DEFAULT_TOPIC_CAPACITY`] buffered events per topic.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Create a hub with a custom per-topic buffer size (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn sender(&self, topic: &str) -> Result<broadcast::Sender<HubEvent>, HubError> {
        if topic.trim().is_empty() {
            return Err(HubError::InvalidTopic(topic.to_string()));
        }

        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        Ok(sender.clone())
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub for BroadcastHub {
    fn publish(&self, topic: &str, event: HubEvent) -> Result<usize, HubError> {
        let sender = self.sender(topic)?;
        tracing::trace!(topic, kind = %event.kind, "Publishing hub event");

        // A send error only means nobody is listening right now
        Ok(sender.send(event).unwrap_or(0))
    }

    fn subscribe(&self, topic: &str) -> Result<HubReceiver, HubError> {
        let sender = self.sender(topic)?;
        tracing::trace!(topic, "New hub subscription");
        Ok(HubReceiver::new(topic, sender.subscribe()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let hub = BroadcastHub::new();
        let mut first = hub.subscribe("auth").unwrap();
        let mut second = hub.subscribe("auth").unwrap();

        let delivered = hub
            .publish(
                "auth",
                HubEvent::new("signInWithRedirect").with_payload(serde_json::json!({"a": 1})),
            )
            .unwrap();
        assert_eq!(delivered, 2);

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind, "signInWithRedirect");
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let hub = BroadcastHub::new();
        let mut auth = hub.subscribe("auth").unwrap();

        hub.publish("storage", HubEvent::new("itemSet")).unwrap();
        hub.publish("auth", HubEvent::new("signedOut")).unwrap();

        assert_eq!(auth.recv().await.unwrap().kind, "signedOut");
    }

    #[test]
    fn test_publish_without_subscribers_is_not_an_error() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.publish("auth", HubEvent::new("x")).unwrap(), 0);
    }

    #[test]
    fn test_empty_topic_rejected() {
        let hub = BroadcastHub::new();
        assert!(matches!(hub.subscribe(""), Err(HubError::InvalidTopic(_))));
        assert!(matches!(
            hub.publish("  ", HubEvent::new("x")),
            Err(HubError::InvalidTopic(_))
        ));
    }

    #[test]
    fn test_subscriber_count_tracks_drops() {
        let hub = BroadcastHub::new();
        assert_eq!(hub.subscriber_count("auth"), 0);

        let receiver = hub.subscribe("auth").unwrap();
        assert_eq!(hub.subscriber_count("auth"), 1);

        drop(receiver);
        assert_eq!(hub.subscriber_count("auth"), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver_keeps_going() {
        let hub = BroadcastHub::with_capacity(2);
        let mut receiver = hub.subscribe("auth").unwrap();

        for i in 0..5 {
            hub.publish("auth", HubEvent::new(format!("e{i}"))).unwrap();
        }

        // Oldest events were overwritten; the receiver resumes at the retained ones
        assert_eq!(receiver.recv().await.unwrap().kind, "e3");
        assert_eq!(receiver.recv().await.unwrap().kind, "e4");
    }
}
