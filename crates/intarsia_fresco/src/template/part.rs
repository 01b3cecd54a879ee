//! Concrete parts: live bindings between expression slots and DOM locations.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;

use intarsia_armature::{DocumentHandle, Event, ListenerId, NodeId};

use crate::render::RenderContext;
use crate::template::instance::TemplateInstance;
use crate::template::{TemplateError, TemplateResult};
use crate::value::{DirectiveLocation, DirectiveScope, Eventual, Listener, Value};

/// Resolve a value about to be committed. A directive is invoked against the
/// part's location and yields `None`, "no visible change" for this commit.
fn resolve_value(
    doc: &DocumentHandle,
    location: DirectiveLocation,
    value: &Value,
) -> Option<Value> {
    match value {
        Value::Directive(directive) => {
            directive.invoke(&DirectiveScope { doc, location });
            None
        }
        other => Some(other.clone()),
    }
}

fn value_at(values: &[Value], index: usize) -> Value {
    values.get(index).cloned().unwrap_or(Value::Null)
}

/// A bound part. Single-value parts (node, event, boolean) consume exactly
/// one expression; attribute-family parts consume one per interpolation.
pub(crate) enum Part {
    Attribute(AttributePart),
    BooleanAttribute(BooleanAttributePart),
    Property(PropertyPart),
    Event(EventPart),
    Node(NodePart),
}

impl Part {
    pub(crate) fn arity(&self) -> usize {
        match self {
            Part::Attribute(part) => part.size(),
            Part::Property(part) => part.size(),
            Part::BooleanAttribute(_) | Part::Event(_) | Part::Node(_) => 1,
        }
    }

    pub(crate) fn commit(
        &mut self,
        values: &[Value],
        start: usize,
        ctx: &RenderContext,
    ) -> Result<(), TemplateError> {
        match self {
            Part::Attribute(part) => {
                part.set_value(values, start);
                Ok(())
            }
            Part::Property(part) => {
                part.set_value(values, start);
                Ok(())
            }
            Part::BooleanAttribute(part) => {
                part.set_value(&value_at(values, start));
                Ok(())
            }
            Part::Event(part) => {
                part.set_value(&value_at(values, start));
                Ok(())
            }
            Part::Node(part) => part.set_value(&value_at(values, start), ctx),
        }
    }
}

/// Shared machinery for the attribute-family parts: previous-value caching
/// and string interpolation across literal sub-segments.
struct InterpolationCache {
    strings: Rc<Vec<CompactString>>,
    previous: Vec<Value>,
}

impl InterpolationCache {
    fn new(strings: Rc<Vec<CompactString>>) -> Self {
        Self {
            strings,
            previous: Vec::new(),
        }
    }

    fn size(&self) -> usize {
        self.strings.len() - 1
    }

    /// A whole-value expression leaves empty boundary segments.
    fn is_whole_value(&self) -> bool {
        self.strings.len() == 2 && self.strings[0].is_empty() && self.strings[1].is_empty()
    }

    /// Unchanged only when every consumed value is identical AND primitive;
    /// objects and lists always re-commit so mutated structures re-render.
    fn equal_to_previous(&self, values: &[Value], start: usize) -> bool {
        if self.previous.len() != self.size() {
            return false;
        }
        (0..self.size()).all(|i| {
            let value = value_at(values, start + i);
            value.is_primitive() && self.previous[i].same(&value)
        })
    }

    fn remember(&mut self, values: &[Value], start: usize) {
        self.previous = (0..self.size()).map(|i| value_at(values, start + i)).collect();
    }

    fn interpolate(
        &self,
        doc: &DocumentHandle,
        location: impl Fn() -> DirectiveLocation,
        values: &[Value],
        start: usize,
    ) -> CompactString {
        let mut text = CompactString::default();
        for i in 0..self.size() {
            text.push_str(&self.strings[i]);
            if let Some(value) = resolve_value(doc, location(), &value_at(values, start + i)) {
                text.push_str(&value.to_text());
            }
        }
        text.push_str(&self.strings[self.size()]);
        text
    }
}

/// Serialized attribute binding.
pub(crate) struct AttributePart {
    doc: DocumentHandle,
    element: NodeId,
    name: CompactString,
    cache: InterpolationCache,
}

impl AttributePart {
    pub(crate) fn new(
        doc: DocumentHandle,
        element: NodeId,
        name: CompactString,
        strings: Rc<Vec<CompactString>>,
    ) -> Self {
        Self {
            doc,
            element,
            name,
            cache: InterpolationCache::new(strings),
        }
    }

    fn size(&self) -> usize {
        self.cache.size()
    }

    fn location(&self) -> DirectiveLocation {
        DirectiveLocation::Attribute {
            element: self.element,
            name: self.name.clone(),
        }
    }

    fn set_value(&mut self, values: &[Value], start: usize) {
        if self.cache.equal_to_previous(values, start) {
            return;
        }
        let committed = if self.cache.is_whole_value() {
            resolve_value(&self.doc, self.location(), &value_at(values, start))
                .map(|value| value.to_text())
        } else {
            Some(
                self.cache
                    .interpolate(&self.doc, || self.location(), values, start),
            )
        };
        if let Some(text) = committed {
            // No second-level string-equality check: set unconditionally
            self.doc
                .borrow_mut()
                .set_attribute(self.element, self.name.clone(), text);
        }
        self.cache.remember(values, start);
    }
}

/// Boolean attribute binding: present (empty string) when truthy, absent
/// otherwise. Only legal as a whole-value single expression.
pub(crate) struct BooleanAttributePart {
    doc: DocumentHandle,
    element: NodeId,
    name: CompactString,
}

impl BooleanAttributePart {
    pub(crate) fn new(
        doc: DocumentHandle,
        element: NodeId,
        name: CompactString,
        strings: &[CompactString],
    ) -> Result<Self, TemplateError> {
        if !(strings.len() == 2 && strings[0].is_empty() && strings[1].is_empty()) {
            return Err(TemplateError::BooleanAttributeExpressions);
        }
        Ok(Self { doc, element, name })
    }

    fn set_value(&mut self, value: &Value) {
        let location = DirectiveLocation::BooleanAttribute {
            element: self.element,
            name: self.name.clone(),
        };
        let Some(value) = resolve_value(&self.doc, location, value) else {
            return;
        };
        let mut doc = self.doc.borrow_mut();
        if value.is_truthy() {
            doc.set_attribute(self.element, self.name.clone(), "");
        } else {
            doc.remove_attribute(self.element, &self.name);
        }
    }
}

/// Live property binding; same interpolation rule as attributes, but commits
/// into the element's property map and has no removal semantics.
pub(crate) struct PropertyPart {
    doc: DocumentHandle,
    element: NodeId,
    name: CompactString,
    cache: InterpolationCache,
}

impl PropertyPart {
    pub(crate) fn new(
        doc: DocumentHandle,
        element: NodeId,
        name: CompactString,
        strings: Rc<Vec<CompactString>>,
    ) -> Self {
        Self {
            doc,
            element,
            name,
            cache: InterpolationCache::new(strings),
        }
    }

    fn size(&self) -> usize {
        self.cache.size()
    }

    fn location(&self) -> DirectiveLocation {
        DirectiveLocation::Property {
            element: self.element,
            name: self.name.clone(),
        }
    }

    fn set_value(&mut self, values: &[Value], start: usize) {
        if self.cache.equal_to_previous(values, start) {
            return;
        }
        let committed = if self.cache.is_whole_value() {
            resolve_value(&self.doc, self.location(), &value_at(values, start))
        } else {
            Some(Value::Str(self.cache.interpolate(
                &self.doc,
                || self.location(),
                values,
                start,
            )))
        };
        if let Some(value) = committed {
            self.doc
                .borrow_mut()
                .set_property(self.element, self.name.clone(), value.to_prop_value());
        }
        self.cache.remember(values, start);
    }
}

/// Event listener binding. The part itself owns the native subscription and
/// forwards to whichever user listener is current, so swapping listeners
/// never resubscribes.
pub(crate) struct EventPart {
    doc: DocumentHandle,
    element: NodeId,
    event: CompactString,
    current: Rc<RefCell<Option<Listener>>>,
    registration: Option<ListenerId>,
}

impl EventPart {
    pub(crate) fn new(doc: DocumentHandle, element: NodeId, event: CompactString) -> Self {
        Self {
            doc,
            element,
            event,
            current: Rc::new(RefCell::new(None)),
            registration: None,
        }
    }

    fn set_value(&mut self, value: &Value) {
        let location = DirectiveLocation::Event {
            element: self.element,
            event: self.event.clone(),
        };
        let Some(resolved) = resolve_value(&self.doc, location, value) else {
            return;
        };
        let listener = match resolved {
            Value::Listener(listener) => Some(listener),
            _ => None,
        };
        let unchanged = match (&*self.current.borrow(), &listener) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }
        match (&listener, self.registration) {
            (None, Some(id)) => {
                self.doc.borrow_mut().remove_event_listener(id);
                self.registration = None;
            }
            (Some(_), None) => {
                let cell = self.current.clone();
                let forwarder = Rc::new(move |event: &mut Event| {
                    let current = cell.borrow().clone();
                    if let Some(listener) = current {
                        listener.call(event);
                    }
                });
                self.registration = Some(self.doc.borrow_mut().add_event_listener(
                    self.element,
                    self.event.clone(),
                    forwarder,
                ));
            }
            _ => {}
        }
        *self.current.borrow_mut() = listener;
    }
}

/// What a node part committed last.
enum Previous {
    None,
    Primitive(Value),
    Node(NodeId),
    Instance(TemplateInstance),
    Items(Vec<NodePart>),
    Waiting(Eventual),
}

struct NodePartInner {
    start: NodeId,
    end: NodeId,
    previous: Previous,
    /// Bumped on every committed change; an eventual resolution only lands
    /// if the generation it captured is still current.
    generation: u64,
}

/// Child-node range binding, bracketed by a start sentinel and an exclusive
/// end sentinel. Holds zero, one or many nodes, including nested template
/// instances and positional item lists.
#[derive(Clone)]
pub(crate) struct NodePart {
    doc: DocumentHandle,
    inner: Rc<RefCell<NodePartInner>>,
}

impl NodePart {
    pub(crate) fn new(doc: DocumentHandle, start: NodeId, end: NodeId) -> Self {
        Self {
            doc,
            inner: Rc::new(RefCell::new(NodePartInner {
                start,
                end,
                previous: Previous::None,
                generation: 0,
            })),
        }
    }

    fn bounds(&self) -> (NodeId, NodeId) {
        let inner = self.inner.borrow();
        (inner.start, inner.end)
    }

    fn end(&self) -> NodeId {
        self.inner.borrow().end
    }

    fn set_end(&self, end: NodeId) {
        self.inner.borrow_mut().end = end;
    }

    pub(crate) fn set_value(&self, value: &Value, ctx: &RenderContext) -> Result<(), TemplateError> {
        let (start, end) = self.bounds();
        let location = DirectiveLocation::Node { start, end };
        let Some(resolved) = resolve_value(&self.doc, location, value) else {
            return Ok(());
        };
        if resolved.is_primitive() {
            let unchanged = matches!(
                &self.inner.borrow().previous,
                Previous::Primitive(previous) if previous.same(&resolved)
            );
            if unchanged {
                return Ok(());
            }
            self.set_text(resolved.to_text());
            self.commit_previous(Previous::Primitive(resolved));
            return Ok(());
        }
        match resolved {
            Value::Template(result) => self.set_template_result(&result, ctx),
            Value::List(items) => self.set_items(&items, ctx),
            Value::Node(node) => {
                if matches!(&self.inner.borrow().previous, Previous::Node(p) if *p == node) {
                    return Ok(());
                }
                self.set_node(node);
                Ok(())
            }
            Value::Eventual(eventual) => {
                self.await_eventual(eventual, ctx);
                Ok(())
            }
            other => {
                // Fallback: commit the string representation
                self.set_text(other.to_text());
                self.commit_previous(Previous::Primitive(other));
                Ok(())
            }
        }
    }

    fn commit_previous(&self, previous: Previous) {
        let mut inner = self.inner.borrow_mut();
        inner.previous = previous;
        inner.generation += 1;
    }

    /// Single-text-node fast path: reuse the existing text node between the
    /// sentinels instead of replacing it.
    fn set_text(&self, text: CompactString) {
        let (start, end) = self.bounds();
        let mut doc = self.doc.borrow_mut();
        let node = doc.next_sibling(start);
        let reusable = match node {
            Some(node) => doc.prev_sibling(end) == Some(node) && doc.is_text(node),
            None => false,
        };
        if let (true, Some(node)) = (reusable, node) {
            doc.set_text(node, text);
        } else {
            let fresh = doc.create_text(text);
            drop(doc);
            self.set_node(fresh);
        }
    }

    /// Replace the range's content with one node (or a fragment's children).
    fn set_node(&self, node: NodeId) {
        self.clear();
        let (_, end) = self.bounds();
        let mut doc = self.doc.borrow_mut();
        let parent = doc.parent(end).expect("end sentinel is attached");
        doc.insert_before(parent, node, Some(end));
        drop(doc);
        self.commit_previous(Previous::Node(node));
    }

    fn set_template_result(
        &self,
        result: &Rc<TemplateResult>,
        ctx: &RenderContext,
    ) -> Result<(), TemplateError> {
        let template = ctx.template_for(result)?;
        let reuse = matches!(
            &self.inner.borrow().previous,
            Previous::Instance(instance) if Rc::ptr_eq(instance.template(), &template)
        );
        if reuse {
            let instance = match &self.inner.borrow().previous {
                Previous::Instance(instance) => instance.clone(),
                _ => unreachable!(),
            };
            return instance.update(&result.values, ctx);
        }
        // Nested instances inherit the enclosing strategy
        let instance = TemplateInstance::new(template, ctx.strategy(), self.doc.clone());
        let fragment = instance.instantiate()?;
        self.set_node(fragment);
        self.commit_previous(Previous::Instance(instance.clone()));
        instance.update(&result.values, ctx)
    }

    /// Positional list diffing: one child part per item, reused by index.
    /// Growth appends fresh separator-bracketed parts; shrinkage truncates
    /// the part list and deletes the excess range in one contiguous sweep.
    fn set_items(&self, items: &Rc<Vec<Value>>, ctx: &RenderContext) -> Result<(), TemplateError> {
        {
            let is_items = matches!(self.inner.borrow().previous, Previous::Items(_));
            if !is_items {
                self.clear();
                self.inner.borrow_mut().previous = Previous::Items(Vec::new());
            }
        }
        let mut item_parts = match std::mem::replace(
            &mut self.inner.borrow_mut().previous,
            Previous::None,
        ) {
            Previous::Items(parts) => parts,
            _ => Vec::new(),
        };
        let (start, end) = self.bounds();

        let mut count = 0;
        for item in items.iter() {
            let part = if count < item_parts.len() {
                item_parts[count].clone()
            } else {
                let item_start = if count == 0 {
                    start
                } else {
                    let separator = {
                        let mut doc = self.doc.borrow_mut();
                        let separator = doc.create_text("");
                        let parent = doc.parent(end).expect("end sentinel is attached");
                        doc.insert_before(parent, separator, Some(end));
                        separator
                    };
                    item_parts[count - 1].set_end(separator);
                    separator
                };
                let part = NodePart::new(self.doc.clone(), item_start, end);
                item_parts.push(part.clone());
                part
            };
            part.set_value(item, ctx)?;
            count += 1;
        }

        if count == 0 {
            self.clear();
            self.commit_previous(Previous::None);
        } else if count < item_parts.len() {
            let last = item_parts[count - 1].clone();
            item_parts.truncate(count);
            // Delete the dangling separator and everything after it
            let last_end = last.end();
            self.doc.borrow_mut().remove_siblings(last_end, Some(end));
            last.set_end(end);
            self.commit_previous(Previous::Items(item_parts));
        } else {
            self.commit_previous(Previous::Items(item_parts));
        }
        Ok(())
    }

    fn await_eventual(&self, eventual: Eventual, ctx: &RenderContext) {
        self.commit_previous(Previous::Waiting(eventual.clone()));
        let expected = self.inner.borrow().generation;
        let part = self.clone();
        let ctx = ctx.clone();
        eventual.subscribe(move |value| {
            // A later commit makes this resolution stale, and a wholesale
            // container swap may have disposed the range entirely
            if part.inner.borrow().generation != expected || !part.is_attached() {
                return;
            }
            if let Err(error) = part.set_value(&value, &ctx) {
                tracing::error!("async value failed to commit: {error}");
            }
        });
    }

    fn is_attached(&self) -> bool {
        let (start, end) = self.bounds();
        let doc = self.doc.borrow();
        doc.contains(start) && doc.contains(end)
    }

    /// Remove every node strictly between the sentinels.
    fn clear(&self) {
        let (start, end) = self.bounds();
        let mut doc = self.doc.borrow_mut();
        if let Some(first) = doc.next_sibling(start) {
            if first != end {
                doc.remove_siblings(first, Some(end));
            }
        }
    }
}
