//! Arena document and node definitions.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::{format_compact, CompactString, ToCompactString};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::event::{EventHandler, ListenerId};

/// Unique identifier for nodes within one [`Document`].
pub type NodeId = usize;

/// Shared handle to a document, for single-threaded cooperative mutation.
pub type DocumentHandle = Rc<RefCell<Document>>;

static DOCUMENT_IDS: AtomicU64 = AtomicU64::new(1);

/// A value stored in an element's property map.
///
/// Properties are the "live object" side of an element, distinct from its
/// serialized attributes. The shape is JSON-like so structured values (form
/// state, event detail payloads) can ride along without the runtime's richer
/// binding types leaking into the DOM layer.
#[derive(Debug, Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(CompactString),
    List(Rc<Vec<PropValue>>),
    Map(Rc<FxHashMap<CompactString, PropValue>>),
}

impl PropValue {
    /// Truthiness under the host-language rules the runtime mirrors.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Null => false,
            PropValue::Bool(b) => *b,
            PropValue::Int(i) => *i != 0,
            PropValue::Float(f) => *f != 0.0 && !f.is_nan(),
            PropValue::Str(s) => !s.is_empty(),
            PropValue::List(_) | PropValue::Map(_) => true,
        }
    }

    /// String form used when a property feeds a serialized context.
    pub fn to_text(&self) -> CompactString {
        match self {
            PropValue::Null => CompactString::default(),
            PropValue::Bool(b) => b.to_compact_string(),
            PropValue::Int(i) => i.to_compact_string(),
            // Display formatting: integral floats print without a fraction
            PropValue::Float(f) => format_compact!("{f}"),
            PropValue::Str(s) => s.clone(),
            PropValue::List(items) => {
                let mut out = CompactString::default();
                for item in items.iter() {
                    out.push_str(&item.to_text());
                }
                out
            }
            PropValue::Map(_) => CompactString::default(),
        }
    }
}

/// A single attribute. Order of declaration is preserved on the element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: CompactString,
    pub value: CompactString,
}

/// Element payload: tag, ordered attributes, live property map.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: CompactString,
    pub attrs: Vec<Attribute>,
    pub props: FxHashMap<CompactString, PropValue>,
}

/// Node type variants.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Grouping node with no markup of its own; inserting one splices its
    /// children into the target position.
    Fragment,
    Element(ElementData),
    Text(CompactString),
    Comment(CompactString),
}

/// A node in the arena.
#[derive(Debug)]
struct Node {
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    data: NodeData,
}

struct ListenerEntry {
    node: NodeId,
    event: CompactString,
    handler: EventHandler,
}

/// An arena-backed document tree.
///
/// Nodes are addressed by [`NodeId`]; sibling order is the position in the
/// parent's child list. Shadow roots hang off their host outside the child
/// list, so light-DOM serialization never sees them.
pub struct Document {
    id: u64,
    nodes: FxHashMap<NodeId, Node>,
    next_id: NodeId,
    listeners: FxHashMap<ListenerId, ListenerEntry>,
    next_listener: ListenerId,
    shadow_roots: FxHashMap<NodeId, NodeId>,
    shadow_hosts: FxHashMap<NodeId, NodeId>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            id: DOCUMENT_IDS.fetch_add(1, Ordering::Relaxed),
            nodes: FxHashMap::default(),
            next_id: 0,
            listeners: FxHashMap::default(),
            next_listener: 0,
            shadow_roots: FxHashMap::default(),
            shadow_hosts: FxHashMap::default(),
        }
    }

    /// Create a shared handle around a fresh document.
    pub fn shared() -> DocumentHandle {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Process-unique document identity, used to key per-container state.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn insert_node(&mut self, data: NodeData) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: None,
                children: SmallVec::new(),
                data,
            },
        );
        id
    }

    /// Create an element node.
    pub fn create_element(&mut self, tag: impl Into<CompactString>) -> NodeId {
        self.insert_node(NodeData::Element(ElementData {
            tag: tag.into(),
            ..ElementData::default()
        }))
    }

    /// Create a text node.
    pub fn create_text(&mut self, text: impl Into<CompactString>) -> NodeId {
        self.insert_node(NodeData::Text(text.into()))
    }

    /// Create a comment node.
    pub fn create_comment(&mut self, text: impl Into<CompactString>) -> NodeId {
        self.insert_node(NodeData::Comment(text.into()))
    }

    /// Create a fragment node.
    pub fn create_fragment(&mut self) -> NodeId {
        self.insert_node(NodeData::Fragment)
    }

    /// Node payload. Panics on a dangling id, which is an internal invariant
    /// violation rather than a recoverable condition.
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[&id].data
    }

    /// Whether the id refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Element tag name, if the node is an element.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Element(el) => Some(el.tag.as_str()),
            _ => None,
        }
    }

    /// Text content of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id) {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t.as_str()),
            _ => None,
        }
    }

    /// Whether the node is a text node.
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Text(_))
    }

    /// Whether the node is a comment node.
    pub fn is_comment(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Comment(_))
    }

    /// Whether the node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.data(id), NodeData::Element(_))
    }

    /// Replace the content of a text node.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<CompactString>) {
        if let NodeData::Text(t) = &mut self.nodes.get_mut(&id).expect("dangling node id").data {
            *t = text.into();
        }
    }

    /// Parent node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[&id].parent
    }

    /// Child list of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[&id].children
    }

    /// First child, if any.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Last child, if any.
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    fn sibling_at_offset(&self, id: NodeId, offset: isize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        let target = pos as isize + offset;
        if target < 0 {
            return None;
        }
        siblings.get(target as usize).copied()
    }

    /// Next sibling, if any.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling_at_offset(id, 1)
    }

    /// Previous sibling, if any.
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.sibling_at_offset(id, -1)
    }

    /// Append a child; fragments are spliced in place of themselves.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` before `reference` (or append when `None`). Inserting a
    /// fragment node splices the fragment's children and leaves it empty.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if matches!(self.data(child), NodeData::Fragment) {
            let moved: Vec<NodeId> = self.nodes[&child].children.iter().copied().collect();
            for id in moved {
                self.insert_before(parent, id, reference);
            }
            self.nodes.get_mut(&child).expect("dangling node id").children.clear();
            return;
        }
        self.detach(child);
        let pos = match reference {
            Some(r) => self
                .children(parent)
                .iter()
                .position(|&c| c == r)
                .unwrap_or(self.children(parent).len()),
            None => self.children(parent).len(),
        };
        let node = self.nodes.get_mut(&parent).expect("dangling node id");
        node.children.insert(pos, child);
        self.nodes.get_mut(&child).expect("dangling node id").parent = Some(parent);
    }

    /// Unlink a node from its parent, keeping it alive in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            let node = self.nodes.get_mut(&parent).expect("dangling node id");
            if let Some(pos) = node.children.iter().position(|&c| c == id) {
                node.children.remove(pos);
            }
        }
        self.nodes.get_mut(&id).expect("dangling node id").parent = None;
    }

    /// Detach a node and drop it and its descendants from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) {
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
            }
            self.listeners.retain(|_, entry| entry.node != current);
        }
    }

    /// Remove the sibling range `[from, to)` (`to == None` removes through the
    /// end of the parent's child list).
    pub fn remove_siblings(&mut self, from: NodeId, to: Option<NodeId>) {
        let mut current = Some(from);
        while let Some(id) = current {
            if Some(id) == to {
                break;
            }
            current = self.next_sibling(id);
            self.remove_subtree(id);
        }
    }

    /// Remove all children of a node.
    pub fn clear_children(&mut self, id: NodeId) {
        while let Some(child) = self.first_child(id) {
            self.remove_subtree(child);
        }
    }

    /// Ordered attribute list of an element.
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.data(id) {
            NodeData::Element(el) => &el.attrs,
            _ => &[],
        }
    }

    /// Attribute value by name.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Whether the attribute is present.
    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    /// Set an attribute, preserving its position when it already exists.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) {
        let name = name.into();
        let value = value.into();
        if let NodeData::Element(el) = &mut self.nodes.get_mut(&id).expect("dangling node id").data
        {
            match el.attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value,
                None => el.attrs.push(Attribute { name, value }),
            }
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element(el) = &mut self.nodes.get_mut(&id).expect("dangling node id").data
        {
            el.attrs.retain(|a| a.name != name);
        }
    }

    /// Live property value of an element.
    pub fn property(&self, id: NodeId, name: &str) -> Option<&PropValue> {
        match self.data(id) {
            NodeData::Element(el) => el.props.get(name),
            _ => None,
        }
    }

    /// Set a live property on an element.
    pub fn set_property(&mut self, id: NodeId, name: impl Into<CompactString>, value: PropValue) {
        if let NodeData::Element(el) = &mut self.nodes.get_mut(&id).expect("dangling node id").data
        {
            el.props.insert(name.into(), value);
        }
    }

    /// Attach (or return the existing) shadow root for a host element. The
    /// root is a fragment outside the host's light-DOM child list.
    pub fn attach_shadow_root(&mut self, host: NodeId) -> NodeId {
        if let Some(&root) = self.shadow_roots.get(&host) {
            return root;
        }
        let root = self.create_fragment();
        self.shadow_roots.insert(host, root);
        self.shadow_hosts.insert(root, host);
        root
    }

    /// Shadow root of a host, if attached.
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.shadow_roots.get(&host).copied()
    }

    /// Whether the node is a shadow root.
    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        self.shadow_hosts.contains_key(&id)
    }

    /// Host element of a shadow root.
    pub fn shadow_host(&self, root: NodeId) -> Option<NodeId> {
        self.shadow_hosts.get(&root).copied()
    }

    /// Collect descendant elements with the given tag, in document order.
    pub fn descendants_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.tag(id) == Some(tag) {
                found.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        found
    }

    /// Gather submittable `<input>` values under a form-like subtree, honoring
    /// radio/checkbox checked state (property first, attribute presence as
    /// fallback).
    pub fn collect_form_values(&self, root: NodeId) -> Vec<(CompactString, CompactString)> {
        let mut values = Vec::new();
        for id in self.descendants_by_tag(root, "input") {
            let name = match self.property(id, "name") {
                Some(p) => p.to_text(),
                None => match self.attribute(id, "name") {
                    Some(a) => CompactString::from(a),
                    None => continue,
                },
            };
            if name.is_empty() {
                continue;
            }
            let kind = self.attribute(id, "type").unwrap_or("text");
            if matches!(kind, "radio" | "checkbox") {
                let checked = match self.property(id, "checked") {
                    Some(p) => p.is_truthy(),
                    None => self.has_attribute(id, "checked"),
                };
                if !checked {
                    continue;
                }
            }
            let value = match self.property(id, "value") {
                Some(p) => p.to_text(),
                None => CompactString::from(self.attribute(id, "value").unwrap_or("")),
            };
            values.push((name, value));
        }
        values
    }

    /// Deep-clone a subtree within this document. Listeners are not cloned.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let data = self.data(id).clone();
        let children: Vec<NodeId> = self.children(id).to_vec();
        let copy = self.insert_node(data);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    pub(crate) fn register_listener(
        &mut self,
        node: NodeId,
        event: CompactString,
        handler: EventHandler,
    ) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(
            id,
            ListenerEntry {
                node,
                event,
                handler,
            },
        );
        id
    }

    pub(crate) fn unregister_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    pub(crate) fn listeners_for(&self, node: NodeId, event: &str) -> Vec<EventHandler> {
        let mut handlers: Vec<(ListenerId, EventHandler)> = self
            .listeners
            .iter()
            .filter(|(_, entry)| entry.node == node && entry.event == event)
            .map(|(&id, entry)| (id, entry.handler.clone()))
            .collect();
        handlers.sort_by_key(|(id, _)| *id);
        handlers.into_iter().map(|(_, h)| h).collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-clone a subtree from one document into another. Listeners are not
/// cloned; element attributes and properties are.
pub fn clone_into(src: &Document, root: NodeId, dst: &mut Document) -> NodeId {
    let copy = match src.data(root) {
        NodeData::Fragment => dst.create_fragment(),
        NodeData::Element(el) => {
            let id = dst.create_element(el.tag.clone());
            if let NodeData::Element(target) =
                &mut dst.nodes.get_mut(&id).expect("dangling node id").data
            {
                target.attrs = el.attrs.clone();
                target.props = el.props.clone();
            }
            id
        }
        NodeData::Text(t) => dst.create_text(t.clone()),
        NodeData::Comment(t) => dst.create_comment(t.clone()),
    };
    for &child in src.children(root) {
        let child_copy = clone_into(src, child, dst);
        dst.append_child(copy, child_copy);
    }
    copy
}
