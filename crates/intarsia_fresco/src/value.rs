//! The bindable value model.
//!
//! Every interpolated expression becomes a [`Value`]. The sum type makes the
//! binding-time dispatch explicit: directives and eventual (asynchronous)
//! values are first-class variants rather than specially-flagged callables,
//! and staleness of eventual values is tracked with generation counters
//! instead of reference identity.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::{format_compact, CompactString, ToCompactString};
use rustc_hash::FxHashMap;

use intarsia_armature::{DocumentHandle, Event, NodeId, PropValue};

use crate::schedule::microtask;
use crate::template::TemplateResult;

/// An event listener carried through a template binding.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&mut Event)>);

impl Listener {
    /// Wrap a callback.
    pub fn new(f: impl Fn(&mut Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback.
    pub fn call(&self, event: &mut Event) {
        (self.0)(event)
    }

    /// Identity comparison; listeners are equal only when they are the same
    /// allocation.
    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Listener")
    }
}

/// Where a directive is being committed.
#[derive(Debug, Clone)]
pub enum DirectiveLocation {
    Attribute { element: NodeId, name: CompactString },
    BooleanAttribute { element: NodeId, name: CompactString },
    Property { element: NodeId, name: CompactString },
    Event { element: NodeId, event: CompactString },
    Node { start: NodeId, end: NodeId },
}

/// The view of a part handed to a directive when it is invoked.
pub struct DirectiveScope<'a> {
    pub doc: &'a DocumentHandle,
    pub location: DirectiveLocation,
}

/// A value that customizes how its part commits, instead of supplying a
/// literal value. From the part's perspective a directive commit is always
/// "no visible change": whatever the directive did, the part leaves the DOM
/// alone for that commit.
#[derive(Clone)]
pub struct Directive(Rc<dyn Fn(&DirectiveScope<'_>)>);

impl Directive {
    /// Wrap a directive function.
    pub fn new(f: impl Fn(&DirectiveScope<'_>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke against a part location.
    pub fn invoke(&self, scope: &DirectiveScope<'_>) {
        (self.0)(scope)
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Directive) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Directive")
    }
}

enum EventualState {
    Pending(Vec<Box<dyn FnOnce(Value)>>),
    Resolved(Value),
}

/// A value that arrives later.
///
/// Subscribers are delivered through the microtask queue, matching the
/// cooperative timing of every other deferred effect in the runtime.
/// Resolution is one-shot; later resolutions are ignored.
#[derive(Clone)]
pub struct Eventual {
    state: Rc<RefCell<EventualState>>,
}

impl Eventual {
    /// A not-yet-resolved value.
    pub fn deferred() -> Self {
        Self {
            state: Rc::new(RefCell::new(EventualState::Pending(Vec::new()))),
        }
    }

    /// An already-resolved value.
    pub fn resolved(value: impl Into<Value>) -> Self {
        Self {
            state: Rc::new(RefCell::new(EventualState::Resolved(value.into()))),
        }
    }

    /// Resolve with `value`, delivering to subscribers at the next flush.
    pub fn resolve(&self, value: impl Into<Value>) {
        let value = value.into();
        let subscribers = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                EventualState::Resolved(_) => return,
                EventualState::Pending(subs) => {
                    let drained = std::mem::take(subs);
                    *state = EventualState::Resolved(value.clone());
                    drained
                }
            }
        };
        for subscriber in subscribers {
            let value = value.clone();
            microtask::run(move || subscriber(value));
        }
    }

    /// Register interest in the resolved value.
    pub fn subscribe(&self, f: impl FnOnce(Value) + 'static) {
        let resolved = match &mut *self.state.borrow_mut() {
            EventualState::Pending(subs) => {
                subs.push(Box::new(f));
                return;
            }
            EventualState::Resolved(value) => value.clone(),
        };
        microtask::run(move || f(resolved));
    }

    /// Peek at the resolved value, if any.
    pub fn get(&self) -> Option<Value> {
        match &*self.state.borrow() {
            EventualState::Resolved(value) => Some(value.clone()),
            EventualState::Pending(_) => None,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Eventual) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for Eventual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Some(value) => write!(f, "Eventual({value:?})"),
            None => f.write_str("Eventual(<pending>)"),
        }
    }
}

/// A bindable value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    List(Rc<Vec<Value>>),
    Map(Rc<FxHashMap<CompactString, Value>>),
    Template(Rc<TemplateResult>),
    Node(NodeId),
    Listener(Listener),
    Directive(Directive),
    Eventual(Eventual),
}

impl Value {
    /// Wrap a DOM node reference (not covered by `From`, since `NodeId` is a
    /// plain index type).
    pub fn node(id: NodeId) -> Self {
        Value::Node(id)
    }

    /// Primitive values are cached by value in attribute parts; everything
    /// else is re-committed even when reference-equal, so mutated structures
    /// re-render.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// The change predicate: identical values are "the same", and NaN is the
    /// same as NaN (a NaN-valued property set to NaN again is unchanged).
    /// Reference kinds are the same only when they are the same allocation.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Template(a), Value::Template(b)) => Rc::ptr_eq(a, b),
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Listener(a), Value::Listener(b)) => a.ptr_eq(b),
            (Value::Directive(a), Value::Directive(b)) => a.ptr_eq(b),
            (Value::Eventual(a), Value::Eventual(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Truthiness under the host-language rules.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Text form for committing into text nodes and attribute strings. The
    /// structured kinds never reach serialization through the normal part
    /// dispatch and render as empty.
    pub fn to_text(&self) -> CompactString {
        match self {
            Value::Null => CompactString::default(),
            Value::Bool(b) => b.to_compact_string(),
            Value::Int(i) => i.to_compact_string(),
            // Display formatting: integral floats print without a fraction
            Value::Float(f) => format_compact!("{f}"),
            Value::Str(s) => s.clone(),
            Value::List(items) => {
                let mut out = CompactString::default();
                for item in items.iter() {
                    out.push_str(&item.to_text());
                }
                out
            }
            Value::Map(_)
            | Value::Template(_)
            | Value::Node(_)
            | Value::Listener(_)
            | Value::Directive(_)
            | Value::Eventual(_) => CompactString::default(),
        }
    }

    /// Project into the DOM property domain. Structured data maps across;
    /// runtime-only kinds have no property representation and become null.
    pub fn to_prop_value(&self) -> PropValue {
        match self {
            Value::Null => PropValue::Null,
            Value::Bool(b) => PropValue::Bool(*b),
            Value::Int(i) => PropValue::Int(*i),
            Value::Float(f) => PropValue::Float(*f),
            Value::Str(s) => PropValue::Str(s.clone()),
            Value::List(items) => {
                PropValue::List(Rc::new(items.iter().map(Value::to_prop_value).collect()))
            }
            Value::Map(map) => PropValue::Map(Rc::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_prop_value()))
                    .collect(),
            )),
            Value::Template(_)
            | Value::Node(_)
            | Value::Listener(_)
            | Value::Directive(_)
            | Value::Eventual(_) => PropValue::Null,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(CompactString::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(CompactString::from(v))
    }
}

impl From<CompactString> for Value {
    fn from(v: CompactString) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(Rc::new(v))
    }
}

impl From<FxHashMap<CompactString, Value>> for Value {
    fn from(v: FxHashMap<CompactString, Value>) -> Self {
        Value::Map(Rc::new(v))
    }
}

impl From<TemplateResult> for Value {
    fn from(v: TemplateResult) -> Self {
        Value::Template(Rc::new(v))
    }
}

impl From<Listener> for Value {
    fn from(v: Listener) -> Self {
        Value::Listener(v)
    }
}

impl From<Directive> for Value {
    fn from(v: Directive) -> Self {
        Value::Directive(v)
    }
}

impl From<Eventual> for Value {
    fn from(v: Eventual) -> Self {
        Value::Eventual(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Join the class names whose flag is set, space-separated.
pub fn class_string(classes: &[(&str, bool)]) -> CompactString {
    let mut out = CompactString::default();
    for (name, on) in classes {
        if *on && !name.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(name);
        }
    }
    out
}
