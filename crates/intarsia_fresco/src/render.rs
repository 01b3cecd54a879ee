//! Render entry point, template cache, scoped styles.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};

use intarsia_armature::{clone_into, Document, DocumentHandle, NodeId};

use crate::template::{
    insert_node_into_template, remove_nodes_from_template, PartStrategy, SharedTemplate, Template,
    TemplateError, TemplateInstance, TemplateKind, TemplateResult, StringsKey,
};

/// Style adoption collaborator (absent by default; absence skips all scoped
/// style extraction).
pub trait StyleRegistry {
    /// Called once when a template is first built for a scope.
    fn prepare_template_dom(&mut self, _doc: &mut Document, _content: NodeId, _scope: &str) {}
    /// Receives the styles extracted from a scope's first rendered fragment,
    /// gathered under a holder fragment in the live document.
    fn prepare_template_styles(&mut self, _doc: &mut Document, _style_holder: NodeId, _scope: &str) {
    }
    /// Apply adopted styles to a host element.
    fn style_element(&mut self, _doc: &mut Document, _host: NodeId, _scope: &str) {}
    /// Whether the platform supports native shadow trees; when true the
    /// first extracted style is re-inserted into the rendered fragment and
    /// the cached template.
    fn native_shadow(&self) -> bool {
        false
    }
}

#[derive(PartialEq, Eq, Hash, Clone)]
struct CacheKey {
    scope: Option<CompactString>,
    kind: TemplateKind,
    strings: StringsKey,
}

thread_local! {
    /// Process-wide template registry: scope → kind → literal identity.
    /// Single-threaded by construction; created at first use, lives for the
    /// thread, mutated in place only by scoped-style extraction.
    static TEMPLATE_CACHES: RefCell<FxHashMap<CacheKey, SharedTemplate>> =
        RefCell::new(FxHashMap::default());
    /// Scope names whose styles were already extracted.
    static SCOPED: RefCell<FxHashSet<CompactString>> = RefCell::new(FxHashSet::default());
    /// Container → live instance, for update-in-place across renders.
    static INSTANCES: RefCell<FxHashMap<(u64, NodeId), TemplateInstance>> =
        RefCell::new(FxHashMap::default());
    static STYLE_REGISTRY: RefCell<Option<Box<dyn StyleRegistry>>> = RefCell::new(None);
}

/// Install (or clear) the style adoption collaborator.
pub fn set_style_registry(registry: Option<Box<dyn StyleRegistry>>) {
    STYLE_REGISTRY.with(|cell| *cell.borrow_mut() = registry);
}

pub(crate) fn with_style_registry(f: impl FnOnce(&mut dyn StyleRegistry)) {
    STYLE_REGISTRY.with(|cell| {
        if let Some(registry) = cell.borrow_mut().as_mut() {
            f(registry.as_mut());
        }
    });
}

/// Drop all cached templates, container instances and scope bookkeeping.
/// Embedders use this between unrelated documents; tests use it for
/// isolation.
pub fn reset_render_registry() {
    TEMPLATE_CACHES.with(|cell| cell.borrow_mut().clear());
    SCOPED.with(|cell| cell.borrow_mut().clear());
    INSTANCES.with(|cell| cell.borrow_mut().clear());
}

/// Scope and strategy carried through an update so nested template results
/// resolve against the same cache and inherit the enclosing binding
/// philosophy.
#[derive(Clone)]
pub(crate) struct RenderContext {
    scope: Option<CompactString>,
    strategy: PartStrategy,
}

impl RenderContext {
    pub(crate) fn new(scope: Option<&str>, strategy: PartStrategy) -> Self {
        Self {
            scope: scope.map(CompactString::from),
            strategy,
        }
    }

    pub(crate) fn strategy(&self) -> PartStrategy {
        self.strategy
    }

    pub(crate) fn template_for(
        &self,
        result: &TemplateResult,
    ) -> Result<SharedTemplate, TemplateError> {
        template_for(result, self.scope.as_deref())
    }
}

/// Resolve or build the cached template for a result. A failed parse is not
/// cached: the literal is retried on its next use instead of being poisoned.
pub(crate) fn template_for(
    result: &TemplateResult,
    scope: Option<&str>,
) -> Result<SharedTemplate, TemplateError> {
    let key = CacheKey {
        scope: scope.map(CompactString::from),
        kind: result.kind,
        strings: result.strings.key,
    };
    let cached = TEMPLATE_CACHES.with(|cell| cell.borrow().get(&key).cloned());
    if let Some(template) = cached {
        return Ok(template);
    }
    let mut template = Template::parse(result)?;
    if let Some(scope) = scope {
        with_style_registry(|registry| {
            let (doc, content) = template.doc_mut();
            registry.prepare_template_dom(doc, content, scope);
        });
    }
    let shared: SharedTemplate = Rc::new(RefCell::new(template));
    TEMPLATE_CACHES.with(|cell| cell.borrow_mut().insert(key, shared.clone()));
    Ok(shared)
}

/// Render a template result into a container.
///
/// When the container already holds an instance of the same template built
/// with the same part strategy, the instance is updated in place. Otherwise
/// a fresh instance is cloned, updated, and swapped in wholesale (clear then
/// append). A template swap is never reconciled incrementally.
pub fn render(
    result: &TemplateResult,
    container: NodeId,
    scope: Option<&str>,
    doc: &DocumentHandle,
) -> Result<(), TemplateError> {
    let template = template_for(result, scope)?;
    let key = (doc.borrow().id(), container);

    let existing = INSTANCES.with(|cell| cell.borrow().get(&key).cloned());
    if let Some(instance) = existing {
        if Rc::ptr_eq(instance.template(), &template) && instance.strategy() == result.strategy {
            let ctx = RenderContext::new(scope, instance.strategy());
            return instance.update(&result.values, &ctx);
        }
    }

    let instance = TemplateInstance::new(template.clone(), result.strategy, doc.clone());
    let fragment = instance.instantiate()?;
    INSTANCES.with(|cell| cell.borrow_mut().insert(key, instance.clone()));
    let ctx = RenderContext::new(scope, result.strategy);
    instance.update(&result.values, &ctx)?;

    let (is_shadow, host) = {
        let borrowed = doc.borrow();
        (
            borrowed.is_shadow_root(container),
            borrowed.shadow_host(container),
        )
    };
    if is_shadow {
        if let (Some(scope), Some(host)) = (scope, host) {
            with_style_registry(|registry| {
                ensure_styles_scoped(doc, fragment, &template, scope, registry);
                registry.style_element(&mut doc.borrow_mut(), host, scope);
            });
        }
    }

    let mut borrowed = doc.borrow_mut();
    borrowed.clear_children(container);
    borrowed.append_child(container, fragment);
    Ok(())
}

/// One-time, scope-keyed style extraction.
///
/// Styles can only be adopted from the scope's first render: the styles in
/// the freshly rendered fragment are handed to the registry, `<style>`
/// elements are stripped from every cached template under the scope, and on
/// native-shadow platforms the first style is re-inserted into both the
/// fragment and its template so subsequent clones keep it.
fn ensure_styles_scoped(
    doc: &DocumentHandle,
    fragment: NodeId,
    template: &SharedTemplate,
    scope: &str,
    registry: &mut dyn StyleRegistry,
) {
    let first_render = SCOPED.with(|cell| cell.borrow_mut().insert(CompactString::from(scope)));
    if !first_render {
        return;
    }

    // Move the fragment's styles into a holder for the registry
    let holder = {
        let mut borrowed = doc.borrow_mut();
        let holder = borrowed.create_fragment();
        for style in borrowed.descendants_by_tag(fragment, "style") {
            borrowed.append_child(holder, style);
        }
        holder
    };
    registry.prepare_template_styles(&mut doc.borrow_mut(), holder, scope);

    // Strip style elements from every cached template under this scope so
    // later renders never see them again
    for kind in [TemplateKind::Html, TemplateKind::Svg] {
        let templates: Vec<SharedTemplate> = TEMPLATE_CACHES.with(|cell| {
            cell.borrow()
                .iter()
                .filter(|(key, _)| key.scope.as_deref() == Some(scope) && key.kind == kind)
                .map(|(_, template)| template.clone())
                .collect()
        });
        for shared in templates {
            let mut template = shared.borrow_mut();
            let styles: Vec<NodeId> = template
                .doc
                .descendants_by_tag(template.content, "style");
            if styles.is_empty() {
                continue;
            }
            let set: FxHashSet<NodeId> = styles.into_iter().collect();
            remove_nodes_from_template(&mut template, &set);
        }
    }

    if registry.native_shadow() {
        let style = doc.borrow().first_child(holder);
        if let Some(style) = style {
            {
                let mut borrowed = doc.borrow_mut();
                let first = borrowed.first_child(fragment);
                borrowed.insert_before(fragment, style, first);
            }
            let mut template = template.borrow_mut();
            let copy = clone_into(&doc.borrow(), style, &mut template.doc);
            let reference = template.doc.first_child(template.content);
            insert_node_into_template(&mut template, copy, reference);
        }
    }
}
