//! Events, listeners and bubbling dispatch.

use std::rc::Rc;

use compact_str::CompactString;

use crate::dom::{Document, DocumentHandle, NodeId, PropValue};

/// Identifier for a registered listener.
pub type ListenerId = u64;

/// A callback invoked when an event reaches a node it is registered on.
pub type EventHandler = Rc<dyn Fn(&mut Event)>;

/// A dispatched event.
#[derive(Debug)]
pub struct Event {
    pub name: CompactString,
    pub target: NodeId,
    pub current_target: NodeId,
    pub detail: Option<PropValue>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    /// Create an event aimed at `target`.
    pub fn new(name: impl Into<CompactString>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: target,
            detail: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: PropValue) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Mark the default action as canceled.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Whether the default action was canceled.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop the event from bubbling further.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

impl Document {
    /// Register a listener for `event` on `node`.
    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        event: impl Into<CompactString>,
        handler: EventHandler,
    ) -> ListenerId {
        self.register_listener(node, event.into(), handler)
    }

    /// Remove a previously registered listener.
    pub fn remove_event_listener(&mut self, id: ListenerId) {
        self.unregister_listener(id);
    }
}

/// Dispatch an event at its target and bubble it through ancestors.
///
/// Handlers run outside any document borrow, so they are free to mutate the
/// document or schedule work; mutations they make do not affect the ancestor
/// path computed at dispatch time.
pub fn dispatch_event(doc: &DocumentHandle, event: &mut Event) {
    let path: Vec<(NodeId, Vec<EventHandler>)> = {
        let borrowed = doc.borrow();
        let mut path = Vec::new();
        let mut current = Some(event.target);
        while let Some(id) = current {
            path.push((id, borrowed.listeners_for(id, &event.name)));
            current = borrowed.parent(id).or_else(|| {
                // Cross the shadow boundary so host listeners still fire
                borrowed.shadow_host(id)
            });
        }
        path
    };
    for (node, handlers) in path {
        if event.propagation_stopped {
            break;
        }
        event.current_target = node;
        for handler in handlers {
            handler(event);
        }
    }
}

/// Dispatch a custom event with a detail payload, returning the event for
/// inspection.
pub fn dispatch_custom(
    doc: &DocumentHandle,
    target: NodeId,
    name: impl Into<CompactString>,
    detail: PropValue,
) -> Event {
    let mut event = Event::new(name, target).with_detail(detail);
    dispatch_event(doc, &mut event);
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_bubbling_order() {
        let doc = Document::shared();
        let (outer, inner) = {
            let mut d = doc.borrow_mut();
            let outer = d.create_element("div");
            let inner = d.create_element("input");
            d.append_child(outer, inner);
            (outer, inner)
        };

        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut d = doc.borrow_mut();
            let o = order.clone();
            d.add_event_listener(inner, "change", Rc::new(move |_| o.borrow_mut().push("inner")));
            let o = order.clone();
            d.add_event_listener(outer, "change", Rc::new(move |_| o.borrow_mut().push("outer")));
        }

        let mut event = Event::new("change", inner);
        dispatch_event(&doc, &mut event);
        assert_eq!(*order.borrow(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_removed_listener_does_not_fire() {
        let doc = Document::shared();
        let node = doc.borrow_mut().create_element("button");
        let fired = Rc::new(RefCell::new(0));
        let id = {
            let f = fired.clone();
            doc.borrow_mut()
                .add_event_listener(node, "click", Rc::new(move |_| *f.borrow_mut() += 1))
        };
        dispatch_event(&doc, &mut Event::new("click", node));
        doc.borrow_mut().remove_event_listener(id);
        dispatch_event(&doc, &mut Event::new("click", node));
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_handler_may_mutate_document() {
        let doc = Document::shared();
        let node = doc.borrow_mut().create_element("form");
        {
            let handle = doc.clone();
            doc.borrow_mut().add_event_listener(
                node,
                "submit",
                Rc::new(move |ev| {
                    ev.prevent_default();
                    let mut d = handle.borrow_mut();
                    let text = d.create_text("done");
                    d.append_child(ev.target, text);
                }),
            );
        }
        let mut event = Event::new("submit", node);
        dispatch_event(&doc, &mut event);
        assert!(event.default_prevented());
        assert_eq!(doc.borrow().children(node).len(), 1);
    }
}
