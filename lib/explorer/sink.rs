use crate::explorer::Event;

/// Receives each distinct event as soon as it is discovered.
pub trait EventSink {
    fn event(&mut self, event: &Event);
}

/// An `EventSink` which keeps every event, in discovery order.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

impl EventSink for EventLog {
    fn event(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

impl<F> EventSink for F
where
    F: FnMut(&Event),
{
    fn event(&mut self, event: &Event) {
        self(event)
    }
}
