//! Template parse and reuse.
//!
//! A [`Template`] is built once per distinct literal identity: the segments
//! are joined with expression markers, parsed into a private skeleton
//! document, and the marker walk replaces every marker with a stable anchor
//! node plus an ordered [`TemplatePart`] descriptor. Instances clone the
//! skeleton and bind concrete parts at the descriptor positions.

mod instance;
pub(crate) mod part;
mod result;
mod strings;

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use intarsia_armature::{parse_fragment, Document, NodeFilter, NodeId, ParseOptions, TreeWalker};

pub use instance::TemplateInstance;
pub use result::{PartStrategy, TemplateKind, TemplateResult};
pub use strings::{StringsCell, StringsKey, TemplateStrings};

pub(crate) use result::{MARKER, NODE_MARKER};

/// Errors surfaced while turning a literal into live DOM. Construction is
/// eager and happens lazily at first render, so these propagate out of the
/// first render call that needs the broken template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The literal segment before an attribute expression did not end in an
    /// attribute-value position.
    #[error("cannot resolve the attribute bound by expression {index}")]
    AttributeResolution { index: usize },
    /// Boolean attributes take the whole value; interpolation is user error.
    #[error("boolean attributes can only contain a single expression")]
    BooleanAttributeExpressions,
    /// A part descriptor points at a node the skeleton no longer has.
    #[error("template part lost its boundary node")]
    MissingBoundary,
}

/// Descriptor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePartKind {
    Attribute,
    Node,
}

/// Where one or more expressions land in the skeleton.
///
/// Descriptors are append-only and ordered to match a depth-first walk of
/// the fragment. `index: None` marks a descriptor whose node was removed
/// (for example a stripped `<style>`); it keeps consuming its arity during
/// updates without a live binding.
#[derive(Debug, Clone)]
pub struct TemplatePart {
    pub kind: TemplatePartKind,
    pub index: Option<usize>,
    /// Attribute name as it exists in the DOM (lowercased).
    pub name: CompactString,
    /// Attribute name as written in the literal (case preserved).
    pub raw_name: CompactString,
    /// Literal sub-segments of the attribute value.
    pub strings: Rc<Vec<CompactString>>,
}

impl TemplatePart {
    /// Whether the descriptor still has a node.
    pub fn is_active(&self) -> bool {
        self.index.is_some()
    }

    /// How many expression values the descriptor consumes.
    pub fn arity(&self) -> usize {
        match self.kind {
            TemplatePartKind::Node => 1,
            TemplatePartKind::Attribute => self.strings.len().saturating_sub(1),
        }
    }
}

/// A parsed, reusable template: private skeleton document plus descriptors.
pub struct Template {
    pub(crate) doc: Document,
    pub(crate) content: NodeId,
    pub(crate) parts: Vec<TemplatePart>,
}

/// Templates are cached and mutated in place by scoped-style extraction, so
/// they are shared behind identity-comparable handles.
pub type SharedTemplate = Rc<RefCell<Template>>;

static MARKER_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "{}|{}",
        regex::escape(NODE_MARKER),
        regex::escape(MARKER)
    ))
    .expect("marker pattern is valid")
});

/// Extracts the attribute name preceding an attribute-position expression,
/// matching the literal directly before the marker against HTML attribute
/// syntax: a name (no control/space/quote/`>=/` characters), optional space,
/// `=`, optional space, then an optional quoted or unquoted value prefix.
static LAST_ATTRIBUTE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "[ \\x09\\x0a\\x0c\\x0d]([^\\x00-\\x1F\\x7F-\\x9F \\x09\\x0a\\x0c\\x0d\"'>=/]+)\
         [ \\x09\\x0a\\x0c\\x0d]*=[ \\x09\\x0a\\x0c\\x0d]*\
         (?:[^ \\x09\\x0a\\x0c\\x0d\"'`<>=]*|\"[^\"]*|'[^']*)$",
    )
    .expect("attribute pattern is valid")
});

fn split_by_markers(text: &str) -> Vec<&str> {
    MARKER_SPLIT.split(text).collect()
}

fn last_attribute_name(segment: &str) -> Option<&str> {
    LAST_ATTRIBUTE_NAME
        .captures(segment)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

struct RawPart {
    kind: TemplatePartKind,
    anchor: NodeId,
    name: CompactString,
    raw_name: CompactString,
    strings: Vec<CompactString>,
}

struct MarkerWalk<'a> {
    doc: &'a mut Document,
    segments: &'static [&'static str],
    part_index: usize,
    raw_parts: Vec<RawPart>,
    removed: FxHashSet<NodeId>,
    removal_order: Vec<NodeId>,
}

impl<'a> MarkerWalk<'a> {
    fn visit(&mut self, parent: NodeId) -> Result<(), TemplateError> {
        let mut i = 0;
        while i < self.doc.children(parent).len() {
            let child = self.doc.children(parent)[i];
            if self.doc.is_element(child) {
                self.collect_attribute_parts(child)?;
                self.visit(child)?;
                i += 1;
            } else if self.doc.is_text(child) {
                i += self.split_text_markers(parent, child);
            } else if self.doc.text(child) == Some(MARKER) {
                i += self.anchor_node_marker(parent, child, i);
            } else {
                i += 1;
            }
        }
        Ok(())
    }

    /// Attribute markers are matched to descriptors by expression order, not
    /// DOM attribute order: count the marker-bearing attributes, then resolve
    /// names one at a time from the literal preceding each expression.
    fn collect_attribute_parts(&mut self, element: NodeId) -> Result<(), TemplateError> {
        let mut count = self
            .doc
            .attributes(element)
            .iter()
            .filter(|attr| attr.value.contains(MARKER))
            .count();
        while count > 0 {
            let index = self.part_index;
            let segment = self
                .segments
                .get(index)
                .copied()
                .ok_or(TemplateError::AttributeResolution { index })?;
            let raw_name = last_attribute_name(segment)
                .ok_or(TemplateError::AttributeResolution { index })?;
            let name = CompactString::from(raw_name.to_ascii_lowercase());
            let value = self
                .doc
                .attribute(element, &name)
                .filter(|value| value.contains(MARKER))
                .ok_or(TemplateError::AttributeResolution { index })?
                .to_owned();
            let strings: Vec<CompactString> = split_by_markers(&value)
                .into_iter()
                .map(CompactString::from)
                .collect();
            self.part_index += strings.len() - 1;
            self.raw_parts.push(RawPart {
                kind: TemplatePartKind::Attribute,
                anchor: element,
                name: name.clone(),
                raw_name: CompactString::from(raw_name),
                strings,
            });
            self.doc.remove_attribute(element, &name);
            count -= 1;
        }
        Ok(())
    }

    /// Split a marker-bearing text node into literal runs, each interior
    /// split point becoming an anchor (text, or comment when the run is
    /// empty) with a node part. Returns how many child positions to skip.
    fn split_text_markers(&mut self, parent: NodeId, child: NodeId) -> usize {
        let text = match self.doc.text(child) {
            Some(t) if t.contains(MARKER) => t.to_owned(),
            _ => return 1,
        };
        let runs = split_by_markers(&text);
        let last = runs.len() - 1;
        for run in &runs[..last] {
            let anchor = if run.is_empty() {
                self.doc.create_comment("")
            } else {
                self.doc.create_text(*run)
            };
            self.doc.insert_before(parent, anchor, Some(child));
            self.raw_parts.push(RawPart {
                kind: TemplatePartKind::Node,
                anchor,
                name: CompactString::default(),
                raw_name: CompactString::default(),
                strings: Vec::new(),
            });
            self.part_index += 1;
        }
        let tail = if runs[last].is_empty() {
            self.doc.create_comment("")
        } else {
            self.doc.create_text(runs[last])
        };
        self.doc.insert_before(parent, tail, Some(child));
        self.removed.insert(child);
        self.removal_order.push(child);
        // Skip the inserted anchors, the tail, and the consumed original
        last + 2
    }

    /// A marker comment is a node-position hole. It needs a stable previous
    /// sibling (reusing an adjacent text node only when that node survives)
    /// and a stable next sibling; adjacent holes must not share anchors.
    fn anchor_node_marker(&mut self, parent: NodeId, child: NodeId, position: usize) -> usize {
        let previous = if position > 0 {
            Some(self.doc.children(parent)[position - 1])
        } else {
            None
        };
        let needs_anchor = match previous {
            None => true,
            Some(p) => self.removed.contains(&p) || !self.doc.is_text(p),
        };
        let mut skipped = 1;
        let anchor = match (needs_anchor, previous) {
            (false, Some(p)) => p,
            _ => {
                let comment = self.doc.create_comment("");
                self.doc.insert_before(parent, comment, Some(child));
                skipped += 1;
                comment
            }
        };
        self.raw_parts.push(RawPart {
            kind: TemplatePartKind::Node,
            anchor,
            name: CompactString::default(),
            raw_name: CompactString::default(),
            strings: Vec::new(),
        });
        self.part_index += 1;
        self.removed.insert(child);
        self.removal_order.push(child);
        if self.doc.next_sibling(child).is_none() {
            let end = self.doc.create_comment("");
            self.doc.append_child(parent, end);
        }
        skipped
    }
}

impl Template {
    /// Parse a result's literal into a reusable template.
    pub fn parse(result: &TemplateResult) -> Result<Template, TemplateError> {
        let source = result.join_with_markers();
        let mut doc = Document::new();
        let content = parse_fragment(&mut doc, &source, &ParseOptions::default());

        let mut walk = MarkerWalk {
            doc: &mut doc,
            segments: result.strings.segments,
            part_index: 0,
            raw_parts: Vec::new(),
            removed: FxHashSet::default(),
            removal_order: Vec::new(),
        };
        walk.visit(content)?;
        let raw_parts = std::mem::take(&mut walk.raw_parts);
        let removal_order = std::mem::take(&mut walk.removal_order);
        for node in removal_order {
            doc.remove_subtree(node);
        }

        // Number the surviving anchors by one final depth-first walk, so the
        // descriptors line up with instantiate-time walking of clones.
        let mut indices = FxHashMap::default();
        let mut walker = TreeWalker::new(&doc, content, NodeFilter::MARKUP);
        let mut next = 0;
        while let Some(node) = walker.next(&doc) {
            indices.insert(node, next);
            next += 1;
        }
        let parts = raw_parts
            .into_iter()
            .map(|raw| {
                let index = indices
                    .get(&raw.anchor)
                    .copied()
                    .ok_or(TemplateError::MissingBoundary)?;
                Ok(TemplatePart {
                    kind: raw.kind,
                    index: Some(index),
                    name: raw.name,
                    raw_name: raw.raw_name,
                    strings: Rc::new(raw.strings),
                })
            })
            .collect::<Result<Vec<_>, TemplateError>>()?;

        Ok(Template {
            doc,
            content,
            parts,
        })
    }

    /// The skeleton document (for collaborators like style registries).
    pub fn doc_mut(&mut self) -> (&mut Document, NodeId) {
        (&mut self.doc, self.content)
    }

    /// The part descriptors.
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }
}

fn next_active_index(parts: &[TemplatePart], after: Option<usize>) -> Option<usize> {
    let start = after.map(|i| i + 1).unwrap_or(0);
    (start..parts.len()).find(|&i| parts[i].is_active())
}

/// Remove a set of nodes from a template, deactivating parts inside removed
/// subtrees and shifting the indices of parts behind them.
pub(crate) fn remove_nodes_from_template(template: &mut Template, nodes: &FxHashSet<NodeId>) {
    let mut part_index = next_active_index(&template.parts, None);
    let mut walker = TreeWalker::new(&template.doc, template.content, NodeFilter::MARKUP);
    let mut node_index = 0usize;
    let mut remove_count = 0usize;
    let mut removing: Option<NodeId> = None;
    let mut to_remove: Vec<NodeId> = Vec::new();

    while let Some(node) = walker.next(&template.doc) {
        // Stepped past the removing subtree once its next sibling shows up
        if removing.is_some() && template.doc.prev_sibling(node) == removing {
            removing = None;
        }
        if nodes.contains(&node) {
            to_remove.push(node);
            if removing.is_none() {
                removing = Some(node);
            }
        }
        if removing.is_some() {
            remove_count += 1;
        }
        while let Some(pi) = part_index {
            if template.parts[pi].index != Some(node_index) {
                break;
            }
            template.parts[pi].index = if removing.is_some() {
                None
            } else {
                Some(node_index - remove_count)
            };
            part_index = next_active_index(&template.parts, Some(pi));
        }
        node_index += 1;
    }
    for node in to_remove {
        template.doc.remove_subtree(node);
    }
}

fn count_nodes(doc: &Document, node: NodeId) -> usize {
    let mut count = 1;
    let mut walker = TreeWalker::new(doc, node, NodeFilter::MARKUP);
    while walker.next(doc).is_some() {
        count += 1;
    }
    count
}

/// Insert a node (already in the template's document) before `reference`,
/// shifting the indices of every part at or behind the insertion point.
pub(crate) fn insert_node_into_template(
    template: &mut Template,
    node: NodeId,
    reference: Option<NodeId>,
) {
    let Some(reference) = reference else {
        // Appending past every part leaves the indices untouched
        template.doc.append_child(template.content, node);
        return;
    };
    let mut part_index = next_active_index(&template.parts, None);
    let mut insert_count = 0usize;
    let mut walker = TreeWalker::new(&template.doc, template.content, NodeFilter::MARKUP);
    let mut walker_index = 0usize;
    while let Some(current) = walker.next(&template.doc) {
        if current == reference {
            insert_count = count_nodes(&template.doc, node);
            let parent = template
                .doc
                .parent(reference)
                .unwrap_or(template.content);
            template.doc.insert_before(parent, node, Some(reference));
        }
        while let Some(pi) = part_index {
            if template.parts[pi].index != Some(walker_index) {
                break;
            }
            if insert_count > 0 {
                while let Some(pi) = part_index {
                    if let Some(index) = template.parts[pi].index {
                        template.parts[pi].index = Some(index + insert_count);
                    }
                    part_index = next_active_index(&template.parts, Some(pi));
                }
                return;
            }
            part_index = next_active_index(&template.parts, Some(pi));
        }
        walker_index += 1;
    }
}
