//! Per-room question countdown.
//!
//! At most one timer runs per room. Each tick decrements the remaining
//! seconds and broadcasts `timer { remainingTime }`; reaching zero removes the
//! timer and runs its expiry action. Ticks re-check their generation under
//! the table lock, so an interrupted or replaced timer never broadcasts again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use quizroom_core::events::RoomEvent;
use quizroom_core::room::RoomId;

use crate::broadcast::Broadcaster;

struct TimerEntry {
    generation: u64,
    remaining: u32,
    cancel: CancellationToken,
}

pub struct TimerEngine {
    timers: Mutex<HashMap<RoomId, TimerEntry>>,
    broadcaster: Arc<Broadcaster>,
    tick: Duration,
    next_generation: AtomicU64,
}

impl TimerEngine {
    pub fn new(broadcaster: Arc<Broadcaster>, tick: Duration) -> Self {
        Self {
            timers: Mutex::new(HashMap::new()),
            broadcaster,
            tick,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start a `secs` countdown for the room, replacing any running one.
    /// `on_expire` runs once, after the tick that reaches zero.
    pub fn start_timer<F>(self: &Arc<Self>, room_id: &str, secs: u32, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = self.timers.lock().insert(
            room_id.to_string(),
            TimerEntry {
                generation,
                remaining: secs,
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            tracing::debug!(room = room_id, "Replaced running timer");
        }
        tracing::debug!(room = room_id, secs, "Timer started");

        let engine = Arc::clone(self);
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + engine.tick, engine.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                if engine.tick_once(&room_id, generation) {
                    break;
                }
            }

            tracing::debug!(room = %room_id, "Timer expired");
            on_expire.await;
        });
    }

    /// Decrement and broadcast under the table lock. Returns true when the
    /// countdown reached zero and the entry was removed.
    fn tick_once(&self, room_id: &str, generation: u64) -> bool {
        let mut timers = self.timers.lock();
        let Some(entry) = timers.get_mut(room_id) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        entry.remaining = entry.remaining.saturating_sub(1);
        let remaining = entry.remaining;
        self.broadcaster.broadcast(
            room_id,
            &RoomEvent::Timer {
                remaining_time: remaining,
            },
        );
        if remaining == 0 {
            timers.remove(room_id);
            return true;
        }
        false
    }

    /// Stop the room's timer. Returns false when none was running.
    pub fn interrupt_timer(&self, room_id: &str) -> bool {
        match self.timers.lock().remove(room_id) {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::debug!(room = room_id, remaining = entry.remaining, "Timer interrupted");
                true
            },
            None => false,
        }
    }

    pub fn remaining_time(&self, room_id: &str) -> Option<u32> {
        self.timers.lock().get(room_id).map(|e| e.remaining)
    }

    pub fn is_active(&self, room_id: &str) -> bool {
        self.timers.lock().contains_key(room_id)
    }

    pub fn active_count(&self) -> usize {
        self.timers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn engine() -> (Arc<TimerEngine>, Arc<Broadcaster>) {
        let broadcaster = Arc::new(Broadcaster::new(64));
        let engine = Arc::new(TimerEngine::new(
            Arc::clone(&broadcaster),
            Duration::from_secs(1),
        ));
        (engine, broadcaster)
    }

    fn drain(rx: &mut tokio::sync::mpsc::Receiver<RoomEvent>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RoomEvent::Timer { remaining_time } = event {
                out.push(remaining_time);
            }
        }
        out
    }

    fn counter() -> (Arc<AtomicUsize>, impl Future<Output = ()> + Send + 'static) {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        (fired, async move {
            f.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_then_expires_once() {
        let (engine, broadcaster) = engine();
        let (_, mut rx) = broadcaster.subscribe("room");
        let (fired, on_expire) = counter();

        engine.start_timer("room", 5, on_expire);
        assert!(engine.is_active("room"));
        assert_eq!(engine.remaining_time("room"), Some(5));

        tokio::time::sleep(Duration::from_millis(5500)).await;
        assert_eq!(drain(&mut rx), vec![4, 3, 2, 1, 0]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!engine.is_active("room"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(drain(&mut rx).is_empty(), "no ticks after expiry");
        assert!(!engine.interrupt_timer("room"), "interrupt after expiry is a no-op");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_ticks_and_expiry() {
        let (engine, broadcaster) = engine();
        let (_, mut rx) = broadcaster.subscribe("room");
        let (fired, on_expire) = counter();

        engine.start_timer("room", 5, on_expire);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(drain(&mut rx), vec![4, 3]);
        assert_eq!(engine.remaining_time("room"), Some(3));

        assert!(engine.interrupt_timer("room"));
        assert!(!engine.interrupt_timer("room"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_running_timer() {
        let (engine, broadcaster) = engine();
        let (_, mut rx) = broadcaster.subscribe("room");
        let (first_fired, first) = counter();
        let (second_fired, second) = counter();

        engine.start_timer("room", 10, first);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        engine.start_timer("room", 2, second);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(drain(&mut rx), vec![9, 1, 0]);
        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rooms_tick_independently() {
        let (engine, broadcaster) = engine();
        let (_, mut rx_a) = broadcaster.subscribe("a");
        let (_, mut rx_b) = broadcaster.subscribe("b");

        engine.start_timer("a", 2, async {});
        engine.start_timer("b", 4, async {});
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(engine.interrupt_timer("b"));

        assert_eq!(drain(&mut rx_a), vec![1, 0]);
        assert_eq!(drain(&mut rx_b), vec![3, 2]);
    }
}
