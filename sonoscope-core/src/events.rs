//! Typed notifications for the annotation grid and transport UI.

use crate::playback::PlaybackPhase;
use crate::types::SegmentId;

#[derive(Clone, Debug, PartialEq)]
pub enum VisualizerEvent {
    SegmentCreated { id: SegmentId, start_ms: f64, end_ms: f64 },
    SegmentAdjusted { id: SegmentId, start_ms: f64, end_ms: f64 },
    SegmentMouseOver { id: SegmentId },
    SegmentMouseLeave { id: SegmentId },
    PlaybackChanged { phase: PlaybackPhase },
}

impl VisualizerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VisualizerEvent::SegmentCreated { .. } => "segment-created",
            VisualizerEvent::SegmentAdjusted { .. } => "segment-adjusted",
            VisualizerEvent::SegmentMouseOver { .. } => "segment-mouseover",
            VisualizerEvent::SegmentMouseLeave { .. } => "segment-mouseleave",
            VisualizerEvent::PlaybackChanged { .. } => "playback-changed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&VisualizerEvent)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&VisualizerEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    /// Deliver to every handler in subscription order.
    pub fn emit(&mut self, event: &VisualizerEvent) {
        log::debug!("emit {}", event.name());
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let sink = seen.clone();
        let id = bus.subscribe(move |e| sink.borrow_mut().push(e.name()));

        bus.emit(&VisualizerEvent::SegmentMouseOver { id: SegmentId::Persisted(4) });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&VisualizerEvent::SegmentMouseLeave { id: SegmentId::Persisted(4) });

        assert_eq!(*seen.borrow(), vec!["segment-mouseover"]);
        assert!(bus.is_empty());
    }
}
