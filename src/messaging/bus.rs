/// Event bus for pub/sub messaging
///
/// The watch loop publishes through its `ControlSurface` impl; the status
/// reporter and tests subscribe. A subscriber leaves by dropping its receiver.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

use super::control::ControlSurface;
use super::events::Event;
use crate::sink::CaptureRecord;

/// Event bus for broadcasting events to subscribers
///
/// Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event published from now on
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = unbounded();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publish an event to all subscribers
    ///
    /// Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, event: Event) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|sender| sender.try_send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl ControlSurface for EventBus {
    fn on_state_changed(&self, state: &str, info: &str) {
        self.publish(Event::StateChanged {
            state: state.to_string(),
            info: info.to_string(),
        });
    }

    fn on_capture_completed(&self, count: u64, record: &CaptureRecord) {
        self.publish(Event::CaptureCompleted {
            count,
            record: record.clone(),
        });
    }

    fn on_warning(&self, message: &str) {
        self.publish(Event::Warning {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use std::path::PathBuf;

    #[test]
    fn test_event_bus_publish() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.publish(Event::Warning {
            message: "frame capture failed".to_string(),
        });

        match rx.try_recv().unwrap() {
            Event::Warning { message } => assert_eq!(message, "frame capture failed"),
            _ => panic!("Wrong event type received"),
        }
    }

    #[test]
    fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(Event::Stopped { captures: 0 });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_receiver_is_removed_on_publish() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(Event::Stopped { captures: 0 });
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_bus_clone_shares_subscribers() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let rx = bus1.subscribe();
        bus2.publish(Event::Stopped { captures: 1 });
        assert!(matches!(rx.try_recv(), Ok(Event::Stopped { captures: 1 })));
    }

    #[test]
    fn test_control_surface_publishes_events() {
        let bus = EventBus::new();
        let rx = bus.subscribe();

        bus.on_state_changed("confirming", "1.5s until capture");
        let record = CaptureRecord {
            sequence: 1,
            timestamp: Local::now(),
            path: PathBuf::from("screenshot_0001_20250101_120000.png"),
        };
        bus.on_capture_completed(1, &record);
        bus.on_state_changed("captured", "waiting for the form to disappear");

        match rx.try_recv().unwrap() {
            Event::StateChanged { state, info } => {
                assert_eq!(state, "confirming");
                assert_eq!(info, "1.5s until capture");
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Event::CaptureCompleted { count, record } => {
                assert_eq!(count, 1);
                assert_eq!(record.sequence, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Event::StateChanged { state, info } => {
                assert_eq!(state, "captured");
                assert_eq!(info, "waiting for the form to disappear");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
