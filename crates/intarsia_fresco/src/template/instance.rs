//! Live realizations of templates.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;

use intarsia_armature::{clone_into, Document, DocumentHandle, NodeFilter, NodeId, TreeWalker};

use crate::render::RenderContext;
use crate::template::part::{
    AttributePart, BooleanAttributePart, EventPart, NodePart, Part, PropertyPart,
};
use crate::template::{
    PartStrategy, SharedTemplate, TemplateError, TemplatePart, TemplatePartKind,
};
use crate::value::Value;

/// One slot per descriptor: a live part, or a vacancy that still consumes
/// the descriptor's arity so later slots stay aligned with their values.
enum PartSlot {
    Active(Part),
    Vacant(usize),
}

/// One concrete, DOM-attached realization of a template.
///
/// Cheap to clone; clones share the live parts, so a handle stored by a
/// node part and a handle in the render registry update the same DOM.
#[derive(Clone)]
pub struct TemplateInstance {
    template: SharedTemplate,
    strategy: PartStrategy,
    doc: DocumentHandle,
    parts: Rc<RefCell<Vec<PartSlot>>>,
}

impl TemplateInstance {
    pub fn new(template: SharedTemplate, strategy: PartStrategy, doc: DocumentHandle) -> Self {
        Self {
            template,
            strategy,
            doc,
            parts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The template this instance was built from; identity decides reuse.
    pub fn template(&self) -> &SharedTemplate {
        &self.template
    }

    /// The part-construction strategy this instance was built with.
    pub fn strategy(&self) -> PartStrategy {
        self.strategy
    }

    /// Clone the skeleton into the live document and bind concrete parts at
    /// the active descriptor positions. Returns the fragment to insert.
    pub fn instantiate(&self) -> Result<NodeId, TemplateError> {
        let fragment = {
            let template = self.template.borrow();
            let mut live = self.doc.borrow_mut();
            clone_into(&template.doc, template.content, &mut live)
        };

        let template = self.template.borrow();
        let mut parts = self.parts.borrow_mut();
        parts.clear();
        let live = self.doc.borrow();
        let mut walker = TreeWalker::new(&live, fragment, NodeFilter::MARKUP);
        let mut position: Option<usize> = None;
        let mut current: Option<NodeId> = None;
        for descriptor in &template.parts {
            match descriptor.index {
                None => parts.push(PartSlot::Vacant(descriptor.arity())),
                Some(target) => {
                    while position.map(|p| p < target).unwrap_or(true) {
                        position = Some(position.map(|p| p + 1).unwrap_or(0));
                        current = walker.next(&live);
                    }
                    let node = current.ok_or(TemplateError::MissingBoundary)?;
                    parts.push(PartSlot::Active(build_part(
                        self.strategy,
                        &self.doc,
                        &live,
                        descriptor,
                        node,
                    )?));
                }
            }
        }
        drop(live);
        Ok(fragment)
    }

    /// Write values into the live DOM. Parts consume values in order; a part
    /// with interpolations consumes one value per expression.
    pub fn update(&self, values: &[Value], ctx: &RenderContext) -> Result<(), TemplateError> {
        let mut parts = self.parts.borrow_mut();
        let mut value_index = 0;
        for slot in parts.iter_mut() {
            match slot {
                PartSlot::Vacant(arity) => value_index += *arity,
                PartSlot::Active(part) => {
                    let arity = part.arity();
                    part.commit(values, value_index, ctx)?;
                    value_index += arity;
                }
            }
        }
        Ok(())
    }
}

fn build_part(
    strategy: PartStrategy,
    doc: &DocumentHandle,
    live: &Document,
    descriptor: &TemplatePart,
    node: NodeId,
) -> Result<Part, TemplateError> {
    match descriptor.kind {
        TemplatePartKind::Node => {
            let end = live.next_sibling(node).ok_or(TemplateError::MissingBoundary)?;
            Ok(Part::Node(NodePart::new(doc.clone(), node, end)))
        }
        TemplatePartKind::Attribute => match strategy {
            PartStrategy::Default => Ok(Part::Attribute(AttributePart::new(
                doc.clone(),
                node,
                descriptor.name.clone(),
                descriptor.strings.clone(),
            ))),
            PartStrategy::Extended => build_extended_attribute(doc, descriptor, node),
        },
    }
}

/// The extended binding philosophy: `on-` prefixed names are event
/// listeners, `$`-suffixed names serialized attributes, `?`-suffixed names
/// boolean attributes, and anything else a live property under the raw
/// (case-preserved) name.
fn build_extended_attribute(
    doc: &DocumentHandle,
    descriptor: &TemplatePart,
    node: NodeId,
) -> Result<Part, TemplateError> {
    let raw = descriptor.raw_name.as_str();
    if let Some(event) = raw.strip_prefix("on-") {
        return Ok(Part::Event(EventPart::new(
            doc.clone(),
            node,
            CompactString::from(event),
        )));
    }
    if let Some(name) = descriptor.name.strip_suffix('$') {
        return Ok(Part::Attribute(AttributePart::new(
            doc.clone(),
            node,
            CompactString::from(name),
            descriptor.strings.clone(),
        )));
    }
    if let Some(name) = descriptor.name.strip_suffix('?') {
        return Ok(Part::BooleanAttribute(BooleanAttributePart::new(
            doc.clone(),
            node,
            CompactString::from(name),
            &descriptor.strings,
        )?));
    }
    Ok(Part::Property(PropertyPart::new(
        doc.clone(),
        node,
        descriptor.raw_name.clone(),
        descriptor.strings.clone(),
    )))
}
