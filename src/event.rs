use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{error, info};

/// Every observable lifecycle transition and failure in the relay.
///
/// Events are created by sessions and listeners at the moment the transition
/// occurs and consumed exactly once by whatever [`EventSink`] is wired in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    SubscriberConnected { addr: String },
    SubscriberDisconnected { addr: String },
    PublisherConnected { addr: String },
    PublisherDisconnected { addr: String },
    PublisherMessage { from: String, content: String },
    /// A failure, attributed to a peer address when one is known (accept
    /// errors have none).
    Error { source: Option<String>, cause: String },
}

/// Consumes [`ServerEvent`]s synchronously.
///
/// Implementations must not panic and must not block session progress for
/// more than negligible time; a slow sink would stall broadcast fan-out.
pub trait EventSink: Send + Sync {
    fn log(&self, event: ServerEvent);
}

/// Logs events through `tracing`: lifecycle at info, errors at error level.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn log(&self, event: ServerEvent) {
        match event {
            ServerEvent::SubscriberConnected { addr } => info!(%addr, "subscriber connected"),
            ServerEvent::SubscriberDisconnected { addr } => info!(%addr, "subscriber disconnected"),
            ServerEvent::PublisherConnected { addr } => info!(%addr, "publisher connected"),
            ServerEvent::PublisherDisconnected { addr } => info!(%addr, "publisher disconnected"),
            ServerEvent::PublisherMessage { from, content } => {
                info!(%from, %content, "publisher message");
            }
            ServerEvent::Error { source, cause } => {
                let source = source.as_deref().unwrap_or("unknown");
                error!(%source, %cause, "relay error");
            }
        }
    }
}

/// Records every event in order so tests can assert on the sequence.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ServerEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<ServerEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of every recorded event, oldest first.
    pub fn events(&self) -> Vec<ServerEvent> {
        self.guard().clone()
    }

    /// Does any recorded event match the predicate?
    pub fn any(&self, predicate: impl Fn(&ServerEvent) -> bool) -> bool {
        self.guard().iter().any(predicate)
    }

    /// How many recorded events match the predicate?
    pub fn count(&self, predicate: impl Fn(&ServerEvent) -> bool) -> usize {
        self.guard().iter().filter(|event| predicate(event)).count()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn log(&self, event: ServerEvent) {
        self.guard().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(source: &str) -> ServerEvent {
        ServerEvent::Error {
            source: Some(source.to_string()),
            cause: "boom".to_string(),
        }
    }

    #[test]
    fn records_events_in_order() {
        let sink = MemoryEventSink::new();
        sink.log(ServerEvent::SubscriberConnected { addr: "a".into() });
        sink.log(ServerEvent::SubscriberDisconnected { addr: "a".into() });

        assert_eq!(
            sink.events(),
            vec![
                ServerEvent::SubscriberConnected { addr: "a".into() },
                ServerEvent::SubscriberDisconnected { addr: "a".into() },
            ]
        );
    }

    #[test]
    fn any_and_count_match_by_predicate() {
        let sink = MemoryEventSink::new();
        sink.log(error("a"));
        sink.log(error("b"));
        sink.log(ServerEvent::PublisherConnected { addr: "c".into() });

        assert!(sink.any(|event| matches!(event, ServerEvent::Error { source: Some(s), .. } if s == "b")));
        assert!(!sink.any(|event| matches!(event, ServerEvent::SubscriberConnected { .. })));
        assert_eq!(sink.count(|event| matches!(event, ServerEvent::Error { .. })), 2);
    }

    #[test]
    fn clear_drops_recorded_events() {
        let sink = MemoryEventSink::new();
        sink.log(error("a"));
        sink.clear();
        assert!(sink.events().is_empty());
    }
}
