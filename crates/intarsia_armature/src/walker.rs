//! Depth-first tree walking.

use bitflags::bitflags;

use crate::dom::{Document, NodeData, NodeId};

bitflags! {
    /// Which node types a [`TreeWalker`] yields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFilter: u8 {
        const ELEMENT = 1 << 0;
        const TEXT = 1 << 1;
        const COMMENT = 1 << 2;
    }
}

impl NodeFilter {
    /// Elements, text and comments: the filter the template engine walks
    /// with, so parse-time and instantiate-time numbering agree.
    pub const MARKUP: NodeFilter = NodeFilter::all();
}

/// Depth-first pre-order iterator over a subtree. The root itself is not
/// yielded.
pub struct TreeWalker {
    stack: Vec<NodeId>,
    filter: NodeFilter,
}

impl TreeWalker {
    /// Create a walker over the children of `root`.
    pub fn new(doc: &Document, root: NodeId, filter: NodeFilter) -> Self {
        Self {
            stack: doc.children(root).iter().rev().copied().collect(),
            filter,
        }
    }

    fn accepts(&self, doc: &Document, id: NodeId) -> bool {
        match doc.data(id) {
            NodeData::Element(_) => self.filter.contains(NodeFilter::ELEMENT),
            NodeData::Text(_) => self.filter.contains(NodeFilter::TEXT),
            NodeData::Comment(_) => self.filter.contains(NodeFilter::COMMENT),
            NodeData::Fragment => false,
        }
    }

    /// Advance to the next accepted node.
    pub fn next(&mut self, doc: &Document) -> Option<NodeId> {
        while let Some(id) = self.stack.pop() {
            for &child in doc.children(id).iter().rev() {
                self.stack.push(child);
            }
            if self.accepts(doc, id) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_preorder() {
        let mut doc = Document::new();
        let root = doc.create_fragment();
        let div = doc.create_element("div");
        let text = doc.create_text("hi");
        let comment = doc.create_comment("");
        let span = doc.create_element("span");
        doc.append_child(root, div);
        doc.append_child(div, text);
        doc.append_child(div, comment);
        doc.append_child(root, span);

        let mut walker = TreeWalker::new(&doc, root, NodeFilter::MARKUP);
        let mut order = Vec::new();
        while let Some(id) = walker.next(&doc) {
            order.push(id);
        }
        assert_eq!(order, vec![div, text, comment, span]);
    }

    #[test]
    fn test_walk_filtered() {
        let mut doc = Document::new();
        let root = doc.create_fragment();
        let div = doc.create_element("div");
        let text = doc.create_text("hi");
        doc.append_child(root, div);
        doc.append_child(div, text);

        let mut walker = TreeWalker::new(&doc, root, NodeFilter::ELEMENT);
        assert_eq!(walker.next(&doc), Some(div));
        assert_eq!(walker.next(&doc), None);
    }
}
