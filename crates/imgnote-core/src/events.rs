//! Synchronous publish/subscribe hub for selection, hover and popup lifecycle.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use thiserror::Error;

use crate::annotation::{AnnotationId, TemporaryId};
use crate::error::CoreError;
use crate::geometry::Point;
use crate::shape::{DeviceShape, NormalizedShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SelectionStarted,
    SelectionCompleted,
    SelectionCanceled,
    MouseOverAnnotatableItem,
    MouseOutOfAnnotatableItem,
    MouseOverAnnotation,
    MouseOutOfAnnotation,
    AnnotationsClicked,
    AnnotationCreated,
    AnnotationCommitted,
    AnnotationRemoved,
    PopupShown,
    BeforePopupHide,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::SelectionStarted,
        EventKind::SelectionCompleted,
        EventKind::SelectionCanceled,
        EventKind::MouseOverAnnotatableItem,
        EventKind::MouseOutOfAnnotatableItem,
        EventKind::MouseOverAnnotation,
        EventKind::MouseOutOfAnnotation,
        EventKind::AnnotationsClicked,
        EventKind::AnnotationCreated,
        EventKind::AnnotationCommitted,
        EventKind::AnnotationRemoved,
        EventKind::PopupShown,
        EventKind::BeforePopupHide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SelectionStarted => "SELECTION_STARTED",
            EventKind::SelectionCompleted => "SELECTION_COMPLETED",
            EventKind::SelectionCanceled => "SELECTION_CANCELED",
            EventKind::MouseOverAnnotatableItem => "MOUSE_OVER_ANNOTATABLE_ITEM",
            EventKind::MouseOutOfAnnotatableItem => "MOUSE_OUT_OF_ANNOTATABLE_ITEM",
            EventKind::MouseOverAnnotation => "MOUSE_OVER_ANNOTATION",
            EventKind::MouseOutOfAnnotation => "MOUSE_OUT_OF_ANNOTATION",
            EventKind::AnnotationsClicked => "ANNOTATIONS_CLICKED",
            EventKind::AnnotationCreated => "ANNOTATION_CREATED",
            EventKind::AnnotationCommitted => "ANNOTATION_COMMITTED",
            EventKind::AnnotationRemoved => "ANNOTATION_REMOVED",
            EventKind::PopupShown => "POPUP_SHOWN",
            EventKind::BeforePopupHide => "BEFORE_POPUP_HIDE",
        }
    }

    /// The callback-style name hosts register with, e.g. `onSelectionCompleted`.
    pub fn callback_name(&self) -> String {
        let mut name = String::from("on");
        for word in self.as_str().split('_') {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                name.push(first);
                name.extend(chars.map(|c| c.to_ascii_lowercase()));
            }
        }
        name
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    /// Accepts both `SELECTION_COMPLETED` and `onSelectionCompleted`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s || k.callback_name() == s)
            .ok_or_else(|| CoreError::UnknownEventKind(s.to_string()))
    }
}

/// An event and its payload. The kind is implied by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SelectionStarted { anchor: Point },
    /// The finished selection in pixel units.
    SelectionCompleted { shape: DeviceShape },
    SelectionCanceled,
    MouseOverAnnotatableItem,
    MouseOutOfAnnotatableItem,
    MouseOverAnnotation { ids: Vec<AnnotationId> },
    MouseOutOfAnnotation { ids: Vec<AnnotationId> },
    /// A click without drag; ids are smallest shape first.
    AnnotationsClicked { point: Point, ids: Vec<AnnotationId> },
    AnnotationCreated { id: AnnotationId, shape: NormalizedShape },
    AnnotationCommitted { temporary: TemporaryId, id: AnnotationId },
    AnnotationRemoved { id: AnnotationId },
    PopupShown { id: AnnotationId },
    BeforePopupHide { id: AnnotationId },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::SelectionStarted { .. } => EventKind::SelectionStarted,
            Event::SelectionCompleted { .. } => EventKind::SelectionCompleted,
            Event::SelectionCanceled => EventKind::SelectionCanceled,
            Event::MouseOverAnnotatableItem => EventKind::MouseOverAnnotatableItem,
            Event::MouseOutOfAnnotatableItem => EventKind::MouseOutOfAnnotatableItem,
            Event::MouseOverAnnotation { .. } => EventKind::MouseOverAnnotation,
            Event::MouseOutOfAnnotation { .. } => EventKind::MouseOutOfAnnotation,
            Event::AnnotationsClicked { .. } => EventKind::AnnotationsClicked,
            Event::AnnotationCreated { .. } => EventKind::AnnotationCreated,
            Event::AnnotationCommitted { .. } => EventKind::AnnotationCommitted,
            Event::AnnotationRemoved { .. } => EventKind::AnnotationRemoved,
            Event::PopupShown { .. } => EventKind::PopupShown,
            Event::BeforePopupHide { .. } => EventKind::BeforePopupHide,
        }
    }
}

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type HandlerResult = Result<(), BoxError>;

type Handler = Rc<dyn Fn(&Event) -> HandlerResult>;

/// A handler failure, passed through `fire` untouched apart from the kind.
#[derive(Error, Debug)]
#[error("handler for {kind} failed: {source}")]
pub struct HandlerError {
    pub kind: EventKind,
    #[source]
    pub source: BoxError,
}

/// Identity of a registered handler, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
}

/// Handlers run synchronously in registration order. Cloning the broker
/// yields another handle onto the same registry.
///
/// A handler may register or remove handlers, or fire further events, while
/// it runs: `fire` dispatches over a snapshot taken when it starts. Events
/// fired before a handler registers are not replayed.
#[derive(Clone, Default)]
pub struct EventBroker {
    inner: Rc<RefCell<Registry>>,
}

impl fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.borrow();
        let total: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBroker")
            .field("handlers", &format!("<{} handlers>", total))
            .finish()
    }
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that does not keep the registry alive. Handlers that fire
    /// follow-up events hold one of these to avoid a reference cycle.
    pub fn downgrade(&self) -> WeakEventBroker {
        WeakEventBroker {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn add_handler<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&Event) -> HandlerResult + 'static,
    {
        let mut registry = self.inner.borrow_mut();
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Rc::new(handler)));
        log::debug!("Registered handler {:?} for {}", id, kind);
        id
    }

    /// Register by name, as hosts that bind through strings do.
    pub fn add_handler_named<F>(&self, kind: &str, handler: F) -> Result<HandlerId, CoreError>
    where
        F: Fn(&Event) -> HandlerResult + 'static,
    {
        let kind: EventKind = kind.parse()?;
        Ok(self.add_handler(kind, handler))
    }

    /// Returns whether a handler was removed. Unknown ids are a no-op.
    pub fn remove_handler(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut registry = self.inner.borrow_mut();
        let Some(list) = registry.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(h, _)| *h != id);
        before != list.len()
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.inner
            .borrow()
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Invoke every handler registered for the event's kind. The first
    /// handler error stops dispatch and is returned to the caller.
    pub fn fire(&self, event: &Event) -> Result<(), HandlerError> {
        let kind = event.kind();
        let snapshot: Vec<Handler> = self
            .inner
            .borrow()
            .handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default();

        log::debug!("Firing {} to {} handler(s)", kind, snapshot.len());
        for handler in snapshot {
            handler(event).map_err(|source| HandlerError { kind, source })?;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct WeakEventBroker {
    inner: Weak<RefCell<Registry>>,
}

impl WeakEventBroker {
    pub fn upgrade(&self) -> Option<EventBroker> {
        self.inner.upgrade().map(|inner| EventBroker { inner })
    }
}

impl fmt::Debug for WeakEventBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventBroker")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&Event) -> HandlerResult {
        let log = Rc::clone(log);
        move |_| {
            log.borrow_mut().push(tag);
            Ok(())
        }
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let broker = EventBroker::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        broker.add_handler(EventKind::SelectionCanceled, recorder(&log, "A"));
        broker.add_handler(EventKind::SelectionCanceled, recorder(&log, "B"));

        broker.fire(&Event::SelectionCanceled).unwrap();
        assert_eq!(*log.borrow(), vec!["A", "B"]);
    }

    #[test]
    fn test_removed_handler_is_not_called() {
        let broker = EventBroker::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = broker.add_handler(EventKind::SelectionCanceled, recorder(&log, "A"));
        broker.add_handler(EventKind::SelectionCanceled, recorder(&log, "B"));

        assert!(broker.remove_handler(EventKind::SelectionCanceled, a));
        assert!(!broker.remove_handler(EventKind::SelectionCanceled, a));
        broker.fire(&Event::SelectionCanceled).unwrap();
        assert_eq!(*log.borrow(), vec!["B"]);
    }

    #[test]
    fn test_other_kinds_are_untouched() {
        let broker = EventBroker::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        broker.add_handler(EventKind::SelectionStarted, recorder(&log, "started"));
        broker.fire(&Event::SelectionCanceled).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_handler_error_stops_dispatch() {
        let broker = EventBroker::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        broker.add_handler(EventKind::MouseOverAnnotatableItem, |_| Err("boom".into()));
        broker.add_handler(EventKind::MouseOverAnnotatableItem, recorder(&log, "after"));

        let err = broker.fire(&Event::MouseOverAnnotatableItem).unwrap_err();
        assert_eq!(err.kind, EventKind::MouseOverAnnotatableItem);
        assert_eq!(err.source.to_string(), "boom");
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_reentrant_fire_and_registration() {
        let broker = EventBroker::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let inner_broker = broker.clone();
        let inner_log = Rc::clone(&log);
        broker.add_handler(EventKind::SelectionStarted, move |_| {
            inner_log.borrow_mut().push("started");
            // Registering during dispatch must not affect the running fire.
            inner_broker.add_handler(EventKind::SelectionStarted, |_| Ok(()));
            inner_broker.fire(&Event::SelectionCanceled)?;
            Ok(())
        });
        broker.add_handler(EventKind::SelectionCanceled, recorder(&log, "canceled"));

        broker
            .fire(&Event::SelectionStarted {
                anchor: Point::new(1.0, 2.0),
            })
            .unwrap();
        assert_eq!(*log.borrow(), vec!["started", "canceled"]);
        assert_eq!(broker.handler_count(EventKind::SelectionStarted), 2);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(EventKind::SelectionCompleted.callback_name(), "onSelectionCompleted");
        assert_eq!(
            "onMouseOverAnnotatableItem".parse::<EventKind>().unwrap(),
            EventKind::MouseOverAnnotatableItem
        );
        assert_eq!(
            "BEFORE_POPUP_HIDE".parse::<EventKind>().unwrap(),
            EventKind::BeforePopupHide
        );
        let err = "onSomethingElse".parse::<EventKind>().unwrap_err();
        assert_eq!(err, CoreError::UnknownEventKind("onSomethingElse".into()));
    }

    #[test]
    fn test_add_handler_named_rejects_unknown() {
        let broker = EventBroker::new();
        assert!(broker.add_handler_named("onSelectionStarted", |_| Ok(())).is_ok());
        assert!(matches!(
            broker.add_handler_named("SELECTION_FINISHED", |_| Ok(())),
            Err(CoreError::UnknownEventKind(_))
        ));
    }

    #[test]
    fn test_weak_handle_does_not_keep_registry() {
        let broker = EventBroker::new();
        let weak = broker.downgrade();
        assert!(weak.upgrade().is_some());
        drop(broker);
        assert!(weak.upgrade().is_none());
    }
}
