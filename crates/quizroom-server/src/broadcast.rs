use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use quizroom_core::events::RoomEvent;
use quizroom_core::room::RoomId;

pub type SubscriberId = u64;

/// Outbound queue for one push connection. Bounded so a slow client cannot
/// grow server memory; a full queue drops events for that client only.
pub type EventSender = mpsc::Sender<RoomEvent>;

struct Subscriber {
    id: SubscriberId,
    sender: EventSender,
}

/// Room id -> insertion-ordered subscriber sinks.
pub struct Broadcaster {
    rooms: Mutex<HashMap<RoomId, Vec<Subscriber>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self, room_id: &str) -> (SubscriberId, mpsc::Receiver<RoomEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);
        self.rooms
            .lock()
            .entry(room_id.to_string())
            .or_default()
            .push(Subscriber { id, sender });
        tracing::debug!(room = room_id, subscriber = id, "Subscribed");
        (id, receiver)
    }

    /// Like [`subscribe`](Self::subscribe), but the returned guard
    /// unsubscribes when dropped.
    pub fn subscribe_guarded(
        self: &Arc<Self>,
        room_id: &str,
    ) -> (SubscriptionGuard, mpsc::Receiver<RoomEvent>) {
        let (id, receiver) = self.subscribe(room_id);
        let guard = SubscriptionGuard {
            broadcaster: Arc::clone(self),
            room_id: room_id.to_string(),
            id,
        };
        (guard, receiver)
    }

    /// Remove a sink. The room entry goes away with its last subscriber.
    pub fn unsubscribe(&self, room_id: &str, id: SubscriberId) {
        let mut rooms = self.rooms.lock();
        if let Some(subs) = rooms.get_mut(room_id) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                rooms.remove(room_id);
            }
        }
        tracing::debug!(room = room_id, subscriber = id, "Unsubscribed");
    }

    /// Deliver `event` to every subscriber of the room, in subscription order.
    /// Returns how many sinks accepted it. Closed sinks are removed.
    pub fn broadcast(&self, room_id: &str, event: &RoomEvent) -> usize {
        let mut rooms = self.rooms.lock();
        let Some(subs) = rooms.get_mut(room_id) else {
            return 0;
        };
        let mut delivered = 0;
        subs.retain(|sub| match sub.sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            },
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    room = room_id,
                    subscriber = sub.id,
                    event = event.event_type(),
                    "Skipping broadcast to slow client"
                );
                true
            },
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    room = room_id,
                    subscriber = sub.id,
                    "Dropping disconnected subscriber"
                );
                false
            },
        });
        if subs.is_empty() {
            rooms.remove(room_id);
        }
        delivered
    }

    /// Deliver `event` to one subscriber only.
    pub fn send_to(&self, room_id: &str, id: SubscriberId, event: RoomEvent) -> bool {
        let rooms = self.rooms.lock();
        let Some(sub) = rooms
            .get(room_id)
            .and_then(|subs| subs.iter().find(|s| s.id == id))
        else {
            return false;
        };
        match sub.sender.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(
                    room = room_id, subscriber = id, error = %e,
                    "Failed to send to subscriber (slow or disconnected)"
                );
                false
            },
        }
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.rooms.lock().get(room_id).map_or(0, Vec::len)
    }

    /// (rooms with at least one subscriber, total subscribers)
    pub fn stats(&self) -> (usize, usize) {
        let rooms = self.rooms.lock();
        (rooms.len(), rooms.values().map(Vec::len).sum())
    }
}

/// Owned by a push stream; unsubscribes its sink on drop.
pub struct SubscriptionGuard {
    broadcaster: Arc<Broadcaster>,
    room_id: RoomId,
    id: SubscriberId,
}

impl SubscriptionGuard {
    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(&self.room_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(remaining_time: u32) -> RoomEvent {
        RoomEvent::Timer { remaining_time }
    }

    #[test]
    fn broadcast_reaches_all_subscribers_in_order() {
        let b = Broadcaster::new(8);
        let (_, mut rx1) = b.subscribe("room");
        let (_, mut rx2) = b.subscribe("room");
        let (_, mut other) = b.subscribe("other");

        assert_eq!(b.broadcast("room", &timer(3)), 2);
        assert_eq!(b.broadcast("room", &timer(2)), 2);

        assert_eq!(rx1.try_recv().unwrap(), timer(3));
        assert_eq!(rx1.try_recv().unwrap(), timer(2));
        assert_eq!(rx2.try_recv().unwrap(), timer(3));
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn broadcast_to_unknown_room_is_noop() {
        let b = Broadcaster::new(8);
        assert_eq!(b.broadcast("nobody", &RoomEvent::GameStart), 0);
    }

    #[test]
    fn closed_sink_is_removed() {
        let b = Broadcaster::new(8);
        let (_, rx1) = b.subscribe("room");
        let (_, mut rx2) = b.subscribe("room");
        drop(rx1);

        assert_eq!(b.broadcast("room", &RoomEvent::GameStart), 1);
        assert_eq!(b.subscriber_count("room"), 1);
        assert_eq!(rx2.try_recv().unwrap(), RoomEvent::GameStart);
    }

    #[test]
    fn full_sink_skips_event_but_stays() {
        let b = Broadcaster::new(1);
        let (_, mut rx) = b.subscribe("room");
        assert_eq!(b.broadcast("room", &timer(2)), 1);
        assert_eq!(b.broadcast("room", &timer(1)), 0);
        assert_eq!(b.subscriber_count("room"), 1);

        assert_eq!(rx.try_recv().unwrap(), timer(2));
        assert!(rx.try_recv().is_err());
        assert_eq!(b.broadcast("room", &timer(0)), 1);
    }

    #[test]
    fn send_to_targets_one_subscriber() {
        let b = Broadcaster::new(8);
        let (id1, mut rx1) = b.subscribe("room");
        let (_, mut rx2) = b.subscribe("room");
        assert!(b.send_to("room", id1, RoomEvent::GameStart));
        assert_eq!(rx1.try_recv().unwrap(), RoomEvent::GameStart);
        assert!(rx2.try_recv().is_err());
        assert!(!b.send_to("room", 999, RoomEvent::GameStart));
    }

    #[test]
    fn last_unsubscribe_releases_room() {
        let b = Arc::new(Broadcaster::new(8));
        let (guard1, _rx1) = b.subscribe_guarded("room");
        let (guard2, _rx2) = b.subscribe_guarded("room");
        assert_eq!(b.stats(), (1, 2));

        drop(guard1);
        assert_eq!(b.subscriber_count("room"), 1);
        drop(guard2);
        assert_eq!(b.stats(), (0, 0));
    }
}
