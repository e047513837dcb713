//! Versioned fan-out of full-state payloads to live subscribers.
//!
//! Frames travel over a Tokio broadcast channel, so each subscriber reads from a
//! bounded ring that drops its oldest frames when the subscriber falls behind.
//! A subscriber that keeps losing frames is disconnected instead of being fed
//! ever older state.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// Identifier handed to each subscription.
pub type SubscriberId = Uuid;

/// Payload stamped with the hub version it was published under.
#[derive(Debug)]
pub struct Versioned<T> {
    /// Strictly increasing per hub.
    pub version: u64,
    /// Shared payload.
    pub payload: Arc<T>,
    encoded: Arc<OnceLock<ServerEvent>>,
}

impl<T> Versioned<T> {
    /// Wrap a payload under the given version.
    pub fn new(version: u64, payload: T) -> Self {
        Self {
            version,
            payload: Arc::new(payload),
            encoded: Arc::new(OnceLock::new()),
        }
    }

    /// Wire form of this frame, rendered once and shared by every subscriber.
    pub fn encoded_with<E>(
        &self,
        encode: impl FnOnce(&Self) -> Result<ServerEvent, E>,
    ) -> Result<ServerEvent, E> {
        if let Some(event) = self.encoded.get() {
            return Ok(event.clone());
        }
        let event = encode(self)?;
        Ok(self.encoded.get_or_init(|| event).clone())
    }
}

impl<T> Clone for Versioned<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            payload: Arc::clone(&self.payload),
            encoded: Arc::clone(&self.encoded),
        }
    }
}

/// Why a subscription stopped receiving frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The subscriber went away or was unsubscribed.
    Unsubscribed,
    /// The subscriber could not keep pace with publication.
    Lagging,
    /// The hub was shut down.
    HubClosed,
}

struct HubHead<T> {
    version: u64,
    latest: Option<Versioned<T>>,
    sender: Option<broadcast::Sender<Versioned<T>>>,
}

struct HubShared<T> {
    name: &'static str,
    max_dropped: usize,
    head: Mutex<HubHead<T>>,
}

/// Cloneable handle to a broadcast hub.
pub struct BroadcastHub<T> {
    shared: Arc<HubShared<T>>,
}

impl<T> Clone for BroadcastHub<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BroadcastHub<T> {
    /// Create a hub whose subscribers buffer at most `capacity` frames and are
    /// disconnected once they have lost more than `max_dropped` frames without
    /// catching up.
    pub fn new(name: &'static str, capacity: usize, max_dropped: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            shared: Arc::new(HubShared {
                name,
                max_dropped,
                head: Mutex::new(HubHead {
                    version: 0,
                    latest: None,
                    sender: Some(sender),
                }),
            }),
        }
    }

    /// Stamp `payload` with the next version and send it to every subscriber.
    ///
    /// Returns the version assigned. Never waits on a subscriber.
    pub fn publish(&self, payload: T) -> u64 {
        let mut head = lock(&self.shared.head);
        let Some(sender) = head.sender.clone() else {
            return head.version;
        };

        head.version += 1;
        let frame = Versioned::new(head.version, payload);
        head.latest = Some(frame.clone());
        // No receiver is not an error: the frame stays available as `latest`.
        let _ = sender.send(frame);
        head.version
    }

    /// Register a subscriber. Its first frame is the latest published payload, if any.
    pub fn subscribe(&self) -> Subscription<T> {
        let head = lock(&self.shared.head);
        let id = Uuid::new_v4();
        let receiver = head.sender.as_ref().map(broadcast::Sender::subscribe);
        let closed = receiver.is_none().then_some(CloseReason::HubClosed);
        let initial = receiver.as_ref().and(head.latest.clone());
        drop(head);

        debug!(hub = self.shared.name, subscriber = %id, "subscriber registered");
        Subscription {
            id,
            hub: self.shared.name,
            max_dropped: self.shared.max_dropped,
            initial,
            receiver,
            dropped: 0,
            last_version: 0,
            closed,
        }
    }

    /// Most recently published frame.
    pub fn latest(&self) -> Option<Versioned<T>> {
        lock(&self.shared.head).latest.clone()
    }

    /// Version of the most recent publication (0 before the first one).
    pub fn version(&self) -> u64 {
        lock(&self.shared.head).version
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.head)
            .sender
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Close the hub: every subscription ends and later publications are ignored.
    pub fn close(&self) {
        if lock(&self.shared.head).sender.take().is_some() {
            debug!(hub = self.shared.name, "hub closed");
        }
    }
}

/// Receiving side of a hub registration. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: SubscriberId,
    hub: &'static str,
    max_dropped: usize,
    initial: Option<Versioned<T>>,
    receiver: Option<broadcast::Receiver<Versioned<T>>>,
    dropped: usize,
    last_version: u64,
    closed: Option<CloseReason>,
}

impl<T> Subscription<T> {
    /// Identifier of this subscription.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame. Returns `None` once the subscription is closed.
    ///
    /// Delivered versions are strictly increasing.
    pub async fn recv(&mut self) -> Option<Versioned<T>> {
        if let Some(frame) = self.initial.take() {
            self.last_version = frame.version;
            return Some(frame);
        }

        loop {
            let receiver = self.receiver.as_mut()?;
            match receiver.recv().await {
                Ok(frame) => {
                    if frame.version <= self.last_version {
                        continue;
                    }
                    if receiver.is_empty() {
                        self.dropped = 0;
                    }
                    self.last_version = frame.version;
                    return Some(frame);
                }
                Err(RecvError::Lagged(skipped)) => {
                    self.dropped = self
                        .dropped
                        .saturating_add(usize::try_from(skipped).unwrap_or(usize::MAX));
                    if self.dropped > self.max_dropped {
                        warn!(
                            hub = self.hub,
                            subscriber = %self.id,
                            dropped = self.dropped,
                            "disconnecting subscriber that cannot keep pace"
                        );
                        self.finish(CloseReason::Lagging);
                        return None;
                    }
                    debug!(hub = self.hub, subscriber = %self.id, skipped, "subscriber skipped stale frames");
                }
                Err(RecvError::Closed) => {
                    self.finish(CloseReason::HubClosed);
                    return None;
                }
            }
        }
    }

    /// Reason the subscription was closed, if it was.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.closed
    }

    /// Leave the hub and release the queue. Calling it again has no effect.
    pub fn unsubscribe(&mut self) {
        if self.closed.is_none() {
            self.finish(CloseReason::Unsubscribed);
            debug!(hub = self.hub, subscriber = %self.id, "subscriber removed");
        }
    }

    fn finish(&mut self, reason: CloseReason) {
        self.closed.get_or_insert(reason);
        self.initial = None;
        self.receiver = None;
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::time::timeout;

    use super::*;

    async fn next(subscription: &mut Subscription<u32>) -> Option<(u64, u32)> {
        timeout(Duration::from_secs(1), subscription.recv())
            .await
            .expect("recv timed out")
            .map(|frame| (frame.version, *frame.payload))
    }

    #[tokio::test]
    async fn new_subscriber_starts_with_latest_state() {
        let hub = BroadcastHub::new("test", 4, 4);
        hub.publish(1);
        hub.publish(2);

        let mut subscription = hub.subscribe();
        assert_eq!(next(&mut subscription).await, Some((2, 2)));

        hub.publish(3);
        assert_eq!(next(&mut subscription).await, Some((3, 3)));
    }

    #[tokio::test]
    async fn resubscribing_never_regresses_version() {
        let hub = BroadcastHub::new("test", 4, 4);
        hub.publish(10);
        let mut first = hub.subscribe();
        let (held, _) = next(&mut first).await.unwrap();
        drop(first);

        hub.publish(11);
        let mut second = hub.subscribe();
        let (version, _) = next(&mut second).await.unwrap();
        assert!(version >= held);
    }

    #[tokio::test]
    async fn full_queue_drops_oldest_and_keeps_latest() {
        let hub = BroadcastHub::new("test", 2, 100);
        let mut subscription = hub.subscribe();
        for value in 1..=5 {
            hub.publish(value);
        }

        assert_eq!(next(&mut subscription).await, Some((4, 4)));
        assert_eq!(next(&mut subscription).await, Some((5, 5)));
        assert!(subscription.close_reason().is_none());
    }

    #[tokio::test]
    async fn persistent_lag_disconnects_subscriber() {
        let hub = BroadcastHub::new("test", 1, 2);
        let mut slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for value in 1..=4 {
            hub.publish(value);
            assert_eq!(next(&mut fast).await, Some((value as u64, value)));
        }

        assert_eq!(next(&mut slow).await, None);
        assert_eq!(slow.close_reason(), Some(CloseReason::Lagging));
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(5);
        assert_eq!(next(&mut fast).await, Some((5, 5)));
    }

    #[tokio::test]
    async fn catching_up_resets_drop_count() {
        let hub = BroadcastHub::new("test", 1, 1);
        let mut subscription = hub.subscribe();

        hub.publish(1);
        hub.publish(2);
        assert_eq!(next(&mut subscription).await, Some((2, 2)));
        hub.publish(3);
        hub.publish(4);
        assert_eq!(next(&mut subscription).await, Some((4, 4)));
        assert!(subscription.close_reason().is_none());
    }

    #[tokio::test]
    async fn delivered_versions_strictly_increase() {
        let hub = BroadcastHub::new("test", 8, 1_000);
        let mut subscription = hub.subscribe();
        let publisher = hub.clone();
        let handle = tokio::spawn(async move {
            for value in 0..200u32 {
                publisher.publish(value);
                tokio::task::yield_now().await;
            }
        });

        let mut last = 0;
        while last < 200 {
            let (version, _) = next(&mut subscription).await.unwrap();
            assert!(version > last);
            last = version;
        }
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent_and_drop_releases() {
        let hub: BroadcastHub<u32> = BroadcastHub::new("test", 4, 4);
        let mut subscription = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(subscription.close_reason(), Some(CloseReason::Unsubscribed));
        assert_eq!(next(&mut subscription).await, None);

        let other = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(other);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn closing_hub_ends_subscriptions() {
        let hub = BroadcastHub::new("test", 4, 4);
        let mut subscription = hub.subscribe();
        hub.publish(1);
        hub.close();

        assert_eq!(next(&mut subscription).await, Some((1, 1)));
        assert_eq!(next(&mut subscription).await, None);
        assert_eq!(subscription.close_reason(), Some(CloseReason::HubClosed));
        assert_eq!(hub.publish(2), 1);

        let mut late = hub.subscribe();
        assert_eq!(late.close_reason(), Some(CloseReason::HubClosed));
        assert_eq!(next(&mut late).await, None);
    }

    #[test]
    fn publishing_without_subscribers_advances_version() {
        let hub = BroadcastHub::new("test", 4, 4);
        assert_eq!(hub.version(), 0);
        assert!(hub.latest().is_none());
        assert_eq!(hub.publish(7), 1);
        assert_eq!(hub.publish(8), 2);
        assert_eq!(*hub.latest().unwrap().payload, 8);
    }

    #[tokio::test]
    async fn frame_is_encoded_once_for_all_subscribers() {
        let hub = BroadcastHub::new("test", 4, 4);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        hub.publish(9u32);

        let encodes = AtomicUsize::new(0);
        let encode = |frame: &Versioned<u32>| {
            encodes.fetch_add(1, Ordering::SeqCst);
            Ok::<_, serde_json::Error>(ServerEvent {
                event: None,
                data: frame.payload.to_string(),
            })
        };

        let a = first.recv().await.unwrap().encoded_with(encode).unwrap();
        let b = second.recv().await.unwrap().encoded_with(encode).unwrap();
        assert_eq!(a.data, "9");
        assert_eq!(b.data, "9");
        assert_eq!(encodes.load(Ordering::SeqCst), 1);
    }
}
