//! Event log and subscriber broadcast.
//!
//! Every [`EngineEvent`] is wrapped in an [`EventEnvelope`] with a
//! monotonic sequence number, kept in a bounded in-memory log and pushed
//! to subscribers over a [`tokio::sync::broadcast`] channel. A subscriber
//! that falls behind by more than the channel capacity receives
//! [`broadcast::error::RecvError::Lagged`] and can catch up from
//! [`EventBus::since`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use mercator_types::{EngineEvent, EventEnvelope};

/// Bounded event log with broadcast fan-out.
#[derive(Debug)]
pub struct EventBus {
    log: VecDeque<EventEnvelope>,
    retention: usize,
    next_sequence: u64,
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus keeping `retention` events and buffering `capacity`
    /// per subscriber.
    pub fn new(retention: usize, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            log: VecDeque::with_capacity(retention.min(1024)),
            retention,
            next_sequence: 1,
            tx,
        }
    }

    /// Record and broadcast one event. Returns its sequence number.
    pub fn publish(&mut self, event: EngineEvent, now: DateTime<Utc>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        let envelope = EventEnvelope {
            sequence,
            emitted_at: now,
            event,
        };
        tracing::trace!(sequence, event = envelope.event.name(), "event published");
        // No receivers is not an error.
        let _ = self.tx.send(envelope.clone());
        if self.retention > 0 {
            while self.log.len() >= self.retention {
                self.log.pop_front();
            }
            self.log.push_back(envelope);
        }
        sequence
    }

    /// Record and broadcast several events in order.
    pub fn publish_all(&mut self, events: impl IntoIterator<Item = EngineEvent>, now: DateTime<Utc>) {
        for event in events {
            self.publish(event, now);
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Retained events with a sequence number greater than `sequence`.
    pub fn since(&self, sequence: u64) -> impl Iterator<Item = &EventEnvelope> {
        self.log.iter().filter(move |e| e.sequence > sequence)
    }

    /// Every retained event, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &EventEnvelope> {
        self.log.iter()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether no event is retained.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Sequence number of the last published event (0 if none).
    pub const fn last_sequence(&self) -> u64 {
        self.next_sequence.saturating_sub(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercator_types::AgentId;

    fn missed(n: u64) -> EngineEvent {
        EngineEvent::ScheduleMissed {
            generation: n,
            agent_id: AgentId::new(),
            carried_fitness: 0.5,
        }
    }

    #[test]
    fn retention_drops_oldest() {
        let mut bus = EventBus::new(3, 8);
        let now = DateTime::<Utc>::UNIX_EPOCH;
        for n in 0..5 {
            bus.publish(missed(n), now);
        }
        assert_eq!(bus.len(), 3);
        let sequences: Vec<u64> = bus.recent().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 4, 5]);
        assert_eq!(bus.since(4).count(), 1);
        assert_eq!(bus.last_sequence(), 5);
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let mut bus = EventBus::new(10, 8);
        let mut rx = bus.subscribe();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        bus.publish_all([missed(1), missed(2)], now);
        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        assert_eq!(rx.recv().await.unwrap().sequence, 2);
    }
}
