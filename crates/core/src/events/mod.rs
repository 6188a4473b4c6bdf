use std::time::Duration;

use crate::engine::EngineEvent;

/// Session-level notification fanned out to passive collaborators such as
/// the statistics collector and the callout selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionStarted,
    SessionEnded,
    /// The user skipped forward to the next media item.
    MediaSkipped,
    /// The user stepped back to the previous media item.
    MediaRepeated,
    BeatPulse,
    BeatChanged {
        old_frequency: f64,
        new_frequency: f64,
        pattern: String,
    },
    PauseStarted {
        seconds: u64,
    },
    PauseEnded,
}

impl SessionEvent {
    /// Maps an engine event to its session-level counterpart. Countdown
    /// ticks are display detail and have no session event.
    pub fn from_engine(event: &EngineEvent) -> Option<Self> {
        match event {
            EngineEvent::Pulse => Some(Self::BeatPulse),
            EngineEvent::BeatChanged {
                old_frequency,
                new_frequency,
                pattern,
            } => Some(Self::BeatChanged {
                old_frequency: *old_frequency,
                new_frequency: *new_frequency,
                pattern: pattern.clone(),
            }),
            EngineEvent::PauseStarted { seconds } => {
                Some(Self::PauseStarted { seconds: *seconds })
            }
            EngineEvent::PauseEnded => Some(Self::PauseEnded),
            EngineEvent::PauseTick { .. } => None,
        }
    }
}

type Subscriber = Box<dyn FnMut(Duration, &SessionEvent)>;

/// Ordered publish/subscribe registry.
///
/// Subscribers are invoked synchronously, in registration order, with the
/// session time the event occurred at.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(Duration, &SessionEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn publish(&mut self, now: Duration, event: &SessionEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(now, event);
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn publishes_in_registration_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(move |_, _| seen.borrow_mut().push(tag));
        }

        bus.publish(Duration::ZERO, &SessionEvent::SessionStarted);
        assert_eq!(*seen.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn maps_engine_events() {
        assert_eq!(
            SessionEvent::from_engine(&EngineEvent::Pulse),
            Some(SessionEvent::BeatPulse)
        );
        assert_eq!(
            SessionEvent::from_engine(&EngineEvent::PauseTick { remaining: 3 }),
            None
        );
        let mapped = SessionEvent::from_engine(&EngineEvent::BeatChanged {
            old_frequency: 1.0,
            new_frequency: 2.0,
            pattern: "Standard Beat".to_string(),
        });
        assert!(matches!(
            mapped,
            Some(SessionEvent::BeatChanged { new_frequency, .. }) if new_frequency == 2.0
        ));
    }
}
