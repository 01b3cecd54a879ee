//! Component base: reactive properties composed with template rendering.
//!
//! The capability composition is fixed at build time: property declarations
//! are registered once per concrete component type, the reactive core drives
//! a batched flush, and the flush runs the component's render hook through
//! the render entry point into the element's render root.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use intarsia_armature::{dispatch_custom, DocumentHandle, NodeId, PropValue};

use crate::properties::{
    deserialize_attribute, serialize_attribute, PropertyDeclarations, PropertyType,
    ReactiveProperties,
};
use crate::render::{render, with_style_registry};
use crate::schedule::microtask;
use crate::template::TemplateResult;
use crate::value::{Eventual, Value};

/// Read-only view of a property map for render and gate hooks.
pub struct PropertySnapshot<'a>(&'a FxHashMap<CompactString, Value>);

impl<'a> PropertySnapshot<'a> {
    pub fn new(map: &'a FxHashMap<CompactString, Value>) -> Self {
        Self(map)
    }

    /// Value of a property (null when unset).
    pub fn get(&self, name: &str) -> Value {
        self.0.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Whether the property is in the map at all.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Truthiness of a property.
    pub fn truthy(&self, name: &str) -> bool {
        self.get(name).is_truthy()
    }

    /// Numeric value of a property (zero when unset or non-numeric).
    pub fn number(&self, name: &str) -> f64 {
        match self.get(name) {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
            _ => 0.0,
        }
    }

    /// Text value of a property.
    pub fn text(&self, name: &str) -> CompactString {
        self.get(name).to_text()
    }

    /// List items of a property (empty when not a list).
    pub fn list(&self, name: &str) -> Rc<Vec<Value>> {
        match self.get(name) {
            Value::List(items) => items,
            _ => Rc::new(Vec::new()),
        }
    }
}

/// A renderable component.
pub trait Component: 'static {
    /// Declared property set, registered once per concrete type.
    fn properties() -> PropertyDeclarations
    where
        Self: Sized,
    {
        PropertyDeclarations::new()
    }

    /// Describe the DOM for the current property values. Ideally a pure
    /// function of the snapshot.
    fn render(&self, props: &PropertySnapshot<'_>) -> TemplateResult;

    /// Gate for rendering; a veto resolves any outstanding render-completion
    /// with `false` and no DOM work happens for this flush.
    fn should_render(
        &self,
        _current: &PropertySnapshot<'_>,
        _changed: &PropertySnapshot<'_>,
        _old: &PropertySnapshot<'_>,
    ) -> bool {
        true
    }

    /// Where renders land. By default an isolated subtree attached to the
    /// host; return the host itself to render into its children.
    fn create_root(&self, doc: &DocumentHandle, host: NodeId) -> NodeId {
        doc.borrow_mut().attach_shadow_root(host)
    }

    /// Called once when the component is wired to its element handle.
    fn bound(&mut self, _element: &ElementRef) {}

    /// Called after the first render commits.
    fn first_rendered(&mut self, _element: &ElementRef) {}

    /// Called after every committed render.
    fn did_render(
        &mut self,
        _element: &ElementRef,
        _current: &PropertySnapshot<'_>,
        _changed: &PropertySnapshot<'_>,
        _old: &PropertySnapshot<'_>,
    ) {
    }

    /// Called when the host leaves the document.
    fn disconnected(&mut self) {}
}

thread_local! {
    /// One declaration set per concrete component type; the guard against
    /// registering a type's capabilities twice.
    static DECLARATIONS: RefCell<FxHashMap<TypeId, Rc<PropertyDeclarations>>> =
        RefCell::new(FxHashMap::default());
}

fn declarations_of<C: Component>() -> Rc<PropertyDeclarations> {
    DECLARATIONS.with(|cell| {
        cell.borrow_mut()
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Rc::new(C::properties()))
            .clone()
    })
}

struct ElementState {
    props: ReactiveProperties,
    host: NodeId,
    root: Option<NodeId>,
    scope: CompactString,
    render_invalid: bool,
    completion: Option<Eventual>,
}

struct ElementShell<C: Component> {
    doc: DocumentHandle,
    state: RefCell<ElementState>,
    component: RefCell<C>,
    self_weak: RefCell<Weak<ElementShell<C>>>,
}

/// Type-erased element capabilities, for handles held by widget closures.
trait ElementApi {
    fn api_set_property(&self, name: &str, value: Value);
    fn api_property(&self, name: &str) -> Value;
    fn api_request_render(&self);
    fn api_doc(&self) -> DocumentHandle;
    fn api_host(&self) -> NodeId;
    fn api_dispatch(&self, name: &str, detail: PropValue);
}

impl<C: Component> ElementApi for ElementShell<C> {
    fn api_set_property(&self, name: &str, value: Value) {
        if let Some(shell) = self.self_weak.borrow().upgrade() {
            Element { shell }.set_property(name, value);
        }
    }

    fn api_property(&self, name: &str) -> Value {
        self.state.borrow().props.get(name)
    }

    fn api_request_render(&self) {
        if let Some(shell) = self.self_weak.borrow().upgrade() {
            Element { shell }.request_render();
        }
    }

    fn api_doc(&self) -> DocumentHandle {
        self.doc.clone()
    }

    fn api_host(&self) -> NodeId {
        self.state.borrow().host
    }

    fn api_dispatch(&self, name: &str, detail: PropValue) {
        let host = self.api_host();
        dispatch_custom(&self.doc, host, name, detail);
    }
}

/// Weak, cheap handle to an element, safe to capture in listeners without
/// keeping the element alive.
#[derive(Clone)]
pub struct ElementRef {
    inner: Weak<dyn ElementApi>,
}

impl ElementRef {
    /// Write a property through change detection.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        if let Some(api) = self.inner.upgrade() {
            api.api_set_property(name, value.into());
        }
    }

    /// Read a property's current value.
    pub fn property(&self, name: &str) -> Value {
        self.inner
            .upgrade()
            .map(|api| api.api_property(name))
            .unwrap_or(Value::Null)
    }

    /// Force a re-render regardless of pending changes.
    pub fn request_render(&self) {
        if let Some(api) = self.inner.upgrade() {
            api.api_request_render();
        }
    }

    /// The element's document.
    pub fn doc(&self) -> Option<DocumentHandle> {
        self.inner.upgrade().map(|api| api.api_doc())
    }

    /// The host node.
    pub fn host(&self) -> Option<NodeId> {
        self.inner.upgrade().map(|api| api.api_host())
    }

    /// Dispatch a custom event from the host.
    pub fn dispatch_custom(&self, name: &str, detail: PropValue) {
        if let Some(api) = self.inner.upgrade() {
            api.api_dispatch(name, detail);
        }
    }
}

/// A component mounted on a host element.
pub struct Element<C: Component> {
    shell: Rc<ElementShell<C>>,
}

impl<C: Component> Clone for Element<C> {
    fn clone(&self) -> Self {
        Self {
            shell: self.shell.clone(),
        }
    }
}

impl<C: Component> Element<C> {
    /// Mount `component` on `host` (an element node in `doc`). The host's
    /// tag name becomes the style scope.
    pub fn new(doc: DocumentHandle, host: NodeId, component: C) -> Self {
        let scope = CompactString::from(doc.borrow().tag(host).unwrap_or_default());
        let declarations = declarations_of::<C>();
        let shell = Rc::new(ElementShell {
            doc,
            state: RefCell::new(ElementState {
                props: ReactiveProperties::new(declarations),
                host,
                root: None,
                scope,
                render_invalid: false,
                completion: None,
            }),
            component: RefCell::new(component),
            self_weak: RefCell::new(Weak::new()),
        });
        *shell.self_weak.borrow_mut() = Rc::downgrade(&shell);
        let element = Self { shell };
        let handle = element.element_ref();
        element.shell.component.borrow_mut().bound(&handle);
        element
    }

    /// Weak handle for closures.
    pub fn element_ref(&self) -> ElementRef {
        let api: Rc<dyn ElementApi> = self.shell.clone();
        ElementRef {
            inner: Rc::downgrade(&api),
        }
    }

    /// The attribute names the host should observe, derived from the
    /// declared properties.
    pub fn observed_attributes() -> Vec<CompactString> {
        declarations_of::<C>().observed_attributes()
    }

    /// The host node.
    pub fn host(&self) -> NodeId {
        self.shell.state.borrow().host
    }

    /// The render root, once attached.
    pub fn root(&self) -> Option<NodeId> {
        self.shell.state.borrow().root
    }

    /// Borrow the component for inspection.
    pub fn with_component<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.shell.component.borrow())
    }

    /// Current value of a property.
    pub fn get_property(&self, name: &str) -> Value {
        self.shell.state.borrow().props.get(name)
    }

    /// Write a property; a detected change queues a batched flush.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        let changed = self
            .shell
            .state
            .borrow_mut()
            .props
            .set_pending(name, value.into());
        if changed {
            self.invalidate_properties();
        }
    }

    /// Host notification: the element joined the document. Turns the
    /// property system on; safe to call repeatedly, the enable side effects
    /// run once.
    pub fn connected(&self) {
        let (root, host, scope) = {
            let state = self.shell.state.borrow();
            (state.root, state.host, state.scope.clone())
        };
        if root.is_some() {
            with_style_registry(|registry| {
                registry.style_element(&mut self.shell.doc.borrow_mut(), host, &scope);
            });
        }
        self.enable_properties();
    }

    /// Host notification: the element left the document.
    pub fn disconnected(&self) {
        self.shell.component.borrow_mut().disconnected();
    }

    /// Host notification: an observed attribute changed.
    pub fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
        if old != new {
            self.attribute_to_property(name, new);
        }
    }

    /// Deserialize an attribute into its mapped property. Suppressed while a
    /// property→attribute write-back is in flight. An unknown attribute name
    /// falls back to itself as the property name.
    fn attribute_to_property(&self, attribute: &str, value: Option<&str>) {
        {
            let state = self.shell.state.borrow();
            if state.props.is_serializing() {
                return;
            }
        }
        let declarations = declarations_of::<C>();
        let property = declarations
            .property_for_attribute(attribute)
            .map(CompactString::from)
            .unwrap_or_else(|| CompactString::from(attribute));
        let ty = declarations
            .type_of(&property)
            .unwrap_or(PropertyType::Untyped);
        self.set_property(&property, deserialize_attribute(value, ty));
    }

    /// Serialize a property onto the host attribute, guarding against the
    /// reflected change re-entering as a property write.
    pub fn property_to_attribute(&self, name: &str) {
        let (host, value) = {
            let state = self.shell.state.borrow();
            (state.host, state.props.get(name))
        };
        let attribute = declarations_of::<C>().attribute_for_property(name);
        self.shell.state.borrow_mut().props.set_serializing(true);
        {
            let mut doc = self.shell.doc.borrow_mut();
            match serialize_attribute(&value) {
                Some(text) => doc.set_attribute(host, attribute, text),
                None => doc.remove_attribute(host, &attribute),
            }
        }
        self.shell.state.borrow_mut().props.set_serializing(false);
    }

    fn enable_properties(&self) {
        {
            let mut state = self.shell.state.borrow_mut();
            if state.props.is_enabled() {
                return;
            }
            state.props.mark_enabled();
        }
        self.ready();
    }

    /// Attach the render root, flush once synchronously, and run the
    /// first-render hook.
    fn ready(&self) {
        let root = {
            let host = self.shell.state.borrow().host;
            self.shell
                .component
                .borrow()
                .create_root(&self.shell.doc, host)
        };
        {
            let mut state = self.shell.state.borrow_mut();
            state.root = Some(root);
            state.props.mark_ready();
        }
        self.flush_properties();
        let handle = self.element_ref();
        self.shell.component.borrow_mut().first_rendered(&handle);
    }

    /// Queue a batched flush if one is not already queued.
    fn invalidate_properties(&self) {
        let schedule = {
            let mut state = self.shell.state.borrow_mut();
            if !state.props.is_invalid() && state.props.is_ready() {
                state.props.set_invalid(true);
                true
            } else {
                false
            }
        };
        if schedule {
            let weak = self.shell.self_weak.borrow().clone();
            microtask::run(move || {
                if let Some(shell) = weak.upgrade() {
                    Element { shell }.microtask_flush();
                }
            });
        }
    }

    fn microtask_flush(&self) {
        let proceed = {
            let mut state = self.shell.state.borrow_mut();
            if state.props.is_invalid() {
                // Clearing first means a write during the flush queues a
                // new, separate flush
                state.props.set_invalid(false);
                true
            } else {
                false
            }
        };
        if proceed {
            self.flush_properties();
        }
    }

    /// Force a render even when no property changes are pending.
    pub fn request_render(&self) {
        self.shell.state.borrow_mut().render_invalid = true;
        self.invalidate_properties();
    }

    /// A completion that resolves `true` after the next committed render, or
    /// `false` when the render was vetoed (or nothing was pending).
    pub fn render_complete(&self) -> Eventual {
        let (completion, schedule_false) = {
            let mut state = self.shell.state.borrow_mut();
            match &state.completion {
                Some(completion) => (completion.clone(), None),
                None => {
                    let completion = Eventual::deferred();
                    state.completion = Some(completion.clone());
                    let schedule = if !state.render_invalid && !state.props.is_invalid() {
                        Some(completion.clone())
                    } else {
                        None
                    };
                    (completion, schedule)
                }
            }
        };
        if let Some(completion) = schedule_false {
            // Nothing is pending: resolve false at the next boundary.
            // Resolving the captured completion directly makes a stale
            // resolver a no-op if a render lands first.
            microtask::run(move || completion.resolve(false));
        }
        completion
    }

    fn resolve_completion(&self, value: bool) {
        let completion = self.shell.state.borrow_mut().completion.take();
        if let Some(completion) = completion {
            completion.resolve(value);
        }
    }

    /// The batched change delivery: gate, render, commit, hooks.
    fn flush_properties(&self) {
        {
            let mut state = self.shell.state.borrow_mut();
            state.render_invalid = false;
            state.props.set_changing(true);
        }
        let (changed, old) = self
            .shell
            .state
            .borrow_mut()
            .props
            .take_changes()
            .unwrap_or_default();
        let current = self.shell.state.borrow().props.data().clone();

        let proceed = self.shell.component.borrow().should_render(
            &PropertySnapshot::new(&current),
            &PropertySnapshot::new(&changed),
            &PropertySnapshot::new(&old),
        );
        if !proceed {
            self.shell.state.borrow_mut().props.set_changing(false);
            self.resolve_completion(false);
            return;
        }

        let result = self
            .shell
            .component
            .borrow()
            .render(&PropertySnapshot::new(&current));
        let (root, scope) = {
            let state = self.shell.state.borrow();
            (state.root, state.scope.clone())
        };
        if let Some(root) = root {
            if let Err(error) = render(&result, root, Some(&scope), &self.shell.doc) {
                // No caller to hand this to: a broken template is a
                // programmer error surfaced at first use
                panic!("render failed for <{scope}>: {error}");
            }
        }
        let handle = self.element_ref();
        self.shell.component.borrow_mut().did_render(
            &handle,
            &PropertySnapshot::new(&current),
            &PropertySnapshot::new(&changed),
            &PropertySnapshot::new(&old),
        );
        self.resolve_completion(true);
        self.shell.state.borrow_mut().props.set_changing(false);
    }
}

/// Prepend a `<style>` block to a render result, feeding the scoped-style
/// extraction path on first render.
pub fn with_style(css: impl Into<Value>, inner: TemplateResult) -> TemplateResult {
    crate::html_ext!("<style>", "</style>", ""; css.into(), inner)
}

/// Prepend a stylesheet link to a render result.
pub fn with_style_link(href: impl Into<Value>, inner: TemplateResult) -> TemplateResult {
    crate::html_ext!(
        "<link href$=\"",
        "\" rel=\"stylesheet\" type=\"text/css\" />",
        "";
        href.into(),
        inner
    )
}
