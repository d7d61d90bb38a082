use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::{Event, EventChannel, EventKind};
use crate::sync_ext::MutexExt;

/// Bounded per-subscriber buffer size (spec.md §4.2, "e.g. 256").
const SUBSCRIBER_BUFFER: usize = 256;
/// Heartbeat interval when nothing else has flowed on a channel (spec.md §4.2).
const PING_INTERVAL: Duration = Duration::from_secs(10);

pub type EventReceiver = mpsc::Receiver<Event>;

struct Subscriber {
    sender: mpsc::Sender<Event>,
}

struct ChannelState {
    subscribers: Vec<Subscriber>,
    next_monotonic_id: u64,
    last_published_at: std::time::Instant,
}

impl ChannelState {
    fn new() -> Self {
        ChannelState { subscribers: Vec::new(), next_monotonic_id: 0, last_published_at: std::time::Instant::now() }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_monotonic_id;
        self.next_monotonic_id += 1;
        id
    }
}

/// Publish/subscribe hub, one registry entry per channel scope (spec.md
/// §4.2). Grounded mechanically on the `tokio::sync::broadcast`-per-channel
/// shape used in the retrieval pack's event-bus file, combined with the
/// teacher's in-process listener-registration idiom
/// (`engine/listeners.rs`), but implemented with per-subscriber bounded
/// `mpsc` channels rather than a single `broadcast` channel so that
/// droppable (`job_progress`, `ping`) and non-droppable (`signal`,
/// `job_status`) kinds can be handled with different backpressure policies,
/// as spec.md §4.2 requires.
pub struct EventBus {
    channels: Mutex<HashMap<EventChannel, ChannelState>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus { channels: Mutex::new(HashMap::new()) }
    }

    /// Subscribes to `channel`. `initial_snapshot` must be built by the
    /// caller from the current in-memory state (never from history — "reconnect
    /// is full refetch", spec.md §4.2) immediately before calling this, so the
    /// `initial_state` event reflects a consistent point-in-time view.
    pub fn subscribe(&self, channel: EventChannel, initial_snapshot: serde_json::Value) -> EventReceiver {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut channels = self.channels.lock_unpoisoned();
        let state = channels.entry(channel.clone()).or_insert_with(ChannelState::new);
        let initial = Event {
            channel: channel.clone(),
            kind: EventKind::InitialState { snapshot: initial_snapshot },
            monotonic_id: state.next_id(),
        };
        // The initial event is subscriber-specific, so it bypasses fan-out
        // and is sent directly; the new subscriber is then registered for
        // subsequent broadcasts.
        let _ = tx.try_send(initial);
        state.subscribers.push(Subscriber { sender: tx });
        rx
    }

    /// Publishes `kind` on `channel`. Never blocks on a slow subscriber
    /// (spec.md §4.2, §5): droppable kinds are silently dropped on a full
    /// buffer, non-droppable kinds cause that subscriber to be disconnected
    /// so it must reconnect (which issues a fresh `initial_state`).
    pub fn publish(&self, channel: EventChannel, kind: EventKind) {
        let mut channels = self.channels.lock_unpoisoned();
        let state = match channels.get_mut(&channel) {
            Some(state) => state,
            None => return,
        };
        let monotonic_id = state.next_id();
        state.last_published_at = std::time::Instant::now();
        let droppable = kind.is_droppable();
        let mut i = 0;
        while i < state.subscribers.len() {
            let event = Event { channel: channel.clone(), kind: kind.clone(), monotonic_id };
            match state.subscribers[i].sender.try_send(event) {
                Ok(()) => {
                    i += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    if droppable {
                        i += 1;
                    } else {
                        debug!(?channel, "disconnecting slow subscriber on non-droppable overflow");
                        state.subscribers.remove(i);
                    }
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    state.subscribers.remove(i);
                }
            }
        }
    }

    /// Emits a `ping` on every channel that has gone quiet for longer than
    /// `PING_INTERVAL` (spec.md §4.2: "emitted every 10s if nothing else
    /// flowed"). Intended to be driven by a periodic background task.
    pub fn tick_heartbeat(&self) {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
        let due: Vec<EventChannel> = {
            let channels = self.channels.lock_unpoisoned();
            channels
                .iter()
                .filter(|(_, state)| state.last_published_at.elapsed() >= PING_INTERVAL)
                .map(|(channel, _)| channel.clone())
                .collect()
        };
        for channel in due {
            self.publish(channel, EventKind::Ping { monotonic_ms: now_ms });
        }
    }

    pub fn heartbeat_interval() -> Duration {
        PING_INTERVAL
    }

    /// Drops every subscriber's sender, closing their streams so SSE
    /// handlers see end-of-stream instead of hanging (spec.md §4.10 shutdown
    /// drain).
    pub fn drain(&self) {
        let mut channels = self.channels.lock_unpoisoned();
        channels.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribe_emits_initial_state_first() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventChannel::Global, json!({"queue": []}));
        let event = rx.try_recv().expect("initial event");
        assert!(matches!(event.kind, EventKind::InitialState { .. }));
        assert_eq!(event.monotonic_id, 0);
    }

    #[test]
    fn monotonic_ids_increase_on_same_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventChannel::Global, json!({}));
        let _ = rx.try_recv().unwrap();
        bus.publish(EventChannel::Global, EventKind::Ping { monotonic_ms: 1 });
        bus.publish(EventChannel::Global, EventKind::Ping { monotonic_ms: 2 });
        let e1 = rx.try_recv().unwrap();
        let e2 = rx.try_recv().unwrap();
        assert!(e1.monotonic_id < e2.monotonic_id);
    }

    #[test]
    fn droppable_events_are_dropped_under_backpressure_without_disconnect() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventChannel::Global, json!({}));
        let _ = rx.try_recv().unwrap();
        for i in 0..(SUBSCRIBER_BUFFER as u64 + 10) {
            bus.publish(EventChannel::Global, EventKind::Ping { monotonic_ms: i });
        }
        // Subscriber must still be registered (not disconnected) even though
        // some pings were necessarily dropped.
        bus.publish(EventChannel::Global, EventKind::Ping { monotonic_ms: 999 });
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unknown_channel_publish_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish(EventChannel::Job { job_id: "ghost".into() }, EventKind::Ping { monotonic_ms: 1 });
    }
}
