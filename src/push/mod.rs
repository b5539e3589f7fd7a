use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Events pushed to the paired in-office display.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayEvent {
    NewQr {
        qr_svg: String,
        expires_at: DateTime<Utc>,
        landing_url: String,
        first_name: Option<String>,
    },
    QrClear {
        reason: String,
    },
}

/// In-process pub/sub broker for display events. Each subscriber gets its
/// own buffered channel; slow subscribers drop old events rather than block
/// publishers.
#[derive(Clone)]
pub struct DisplayBroker {
    tx: broadcast::Sender<DisplayEvent>,
}

impl DisplayBroker {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn publish(&self, event: DisplayEvent) {
        // Send fails only when no display is connected; that is not an error.
        let receivers = self.tx.send(event).unwrap_or(0);
        log::debug!("Display event published to {} subscriber(s)", receivers);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.tx.subscribe()
    }
}

impl Default for DisplayBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = DisplayBroker::new();
        let mut rx = broker.subscribe();

        broker.publish(DisplayEvent::QrClear {
            reason: "manual".to_string(),
        });

        match rx.recv().await.unwrap() {
            DisplayEvent::QrClear { reason } => assert_eq!(reason, "manual"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let broker = DisplayBroker::new();
        broker.publish(DisplayEvent::QrClear {
            reason: "manual".to_string(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = DisplayEvent::QrClear {
            reason: "scanned".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"qr_clear\""));
        assert!(json.contains("\"reason\":\"scanned\""));
    }
}
