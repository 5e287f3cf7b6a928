//! Connectivity event system.
//!
//! The connectivity manager reports its progress through a broadcast channel
//! rather than direct callbacks: any number of subscribers (the upload
//! orchestrator, a presentation layer, tests) can watch the same stream
//! without the manager knowing about them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use speck_types::SpeckConfig;

/// Events emitted by the connectivity manager.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ConnectivityEvent {
    /// A device was found and the connect handshake completed.
    Connected {
        /// Identity the device reported during the handshake.
        config: SpeckConfig,
        /// The port the device is attached to.
        port: String,
    },
    /// The connected device stopped answering pings. Emitted exactly once
    /// per loss; the manager then resumes scanning.
    ConnectionLost,
    /// A scan-and-connect attempt failed; the manager will retry.
    ScanFailed {
        /// 1-based attempt number within the current scan session.
        attempt: u32,
    },
}

/// Sender for connectivity events.
pub type EventSender = broadcast::Sender<ConnectivityEvent>;

/// Receiver for connectivity events.
pub type EventReceiver = broadcast::Receiver<ConnectivityEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: ConnectivityEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers_does_not_panic() {
        let dispatcher = EventDispatcher::default();
        assert_eq!(dispatcher.receiver_count(), 0);
        dispatcher.send(ConnectivityEvent::ConnectionLost);
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_event() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx1 = dispatcher.subscribe();
        let mut rx2 = dispatcher.subscribe();

        dispatcher.send(ConnectivityEvent::ScanFailed { attempt: 3 });

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                ConnectivityEvent::ScanFailed { attempt } => assert_eq!(attempt, 3),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = ConnectivityEvent::Connected {
            config: SpeckConfig {
                id: "a1b2c3".to_string(),
                logging_interval_secs: 1,
            },
            port: "/dev/ttyUSB0".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("a1b2c3"));

        let json = serde_json::to_string(&ConnectivityEvent::ConnectionLost).unwrap();
        assert!(json.contains("connection_lost"));
    }

    #[test]
    fn test_event_round_trip() {
        let event = ConnectivityEvent::ScanFailed { attempt: 7 };
        let json = serde_json::to_string(&event).unwrap();
        let back: ConnectivityEvent = serde_json::from_str(&json).unwrap();
        match back {
            ConnectivityEvent::ScanFailed { attempt } => assert_eq!(attempt, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
