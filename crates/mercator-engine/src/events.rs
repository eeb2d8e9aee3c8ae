//! Structured logging of the engine event stream.

use mercator_types::{EngineEvent, EventEnvelope};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Log every event received on `rx` until the sender side is dropped.
pub async fn log_events(mut rx: broadcast::Receiver<EventEnvelope>) {
    loop {
        match rx.recv().await {
            Ok(envelope) => log_event(&envelope),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event logger lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(envelope: &EventEnvelope) {
    match &envelope.event {
        EngineEvent::EmergentBehavior { behavior } => info!(
            sequence = envelope.sequence,
            signature = %behavior.signature,
            participants = behavior.participant_count,
            "emergent behaviour detected"
        ),
        EngineEvent::PopulationOverflow { discarded, .. } => warn!(
            sequence = envelope.sequence,
            discarded,
            "offspring discarded at the population cap"
        ),
        other => debug!(
            sequence = envelope.sequence,
            event = other.name(),
            "engine event"
        ),
    }
}
