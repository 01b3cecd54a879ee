//! Fragment parser: tokenizer events to document nodes.

use compact_str::CompactString;
use phf::phf_set;

use crate::dom::{Document, NodeId};
use crate::tokenizer::{tokenize, Sink, TagAction};

/// Elements that never have children.
static VOID_TAGS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link",
    "meta", "param", "source", "track", "wbr",
};

/// Elements whose content is raw text.
static RAW_TEXT_TAGS: phf::Set<&'static str> = phf_set! {
    "style", "script", "textarea", "title",
};

/// Parser options
#[derive(Clone, Copy)]
pub struct ParseOptions {
    /// Whether a tag is a void element
    pub is_void_tag: fn(&str) -> bool,
    /// Whether a tag holds raw text content
    pub is_raw_text_tag: fn(&str) -> bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            is_void_tag: |tag| VOID_TAGS.contains(tag),
            is_raw_text_tag: |tag| RAW_TEXT_TAGS.contains(tag),
        }
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions").finish_non_exhaustive()
    }
}

struct FragmentBuilder<'a> {
    doc: &'a mut Document,
    options: ParseOptions,
    root: NodeId,
    stack: Vec<NodeId>,
    current: Option<NodeId>,
}

impl<'a> FragmentBuilder<'a> {
    fn parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(self.root)
    }
}

impl<'a> Sink for FragmentBuilder<'a> {
    fn text(&mut self, text: &str) {
        let node = self.doc.create_text(text);
        let parent = self.parent();
        self.doc.append_child(parent, node);
    }

    fn comment(&mut self, text: &str) {
        let node = self.doc.create_comment(text);
        let parent = self.parent();
        self.doc.append_child(parent, node);
    }

    fn open_tag_start(&mut self, name: &str) {
        let node = self.doc.create_element(name);
        let parent = self.parent();
        self.doc.append_child(parent, node);
        self.current = Some(node);
    }

    fn attribute(&mut self, name: &str, value: &str) {
        if let Some(el) = self.current {
            // First declaration wins, as in the host platform
            if !self.doc.has_attribute(el, name) {
                self.doc.set_attribute(el, name, value);
            }
        }
    }

    fn open_tag_end(&mut self, self_closing: bool) -> TagAction {
        let Some(el) = self.current.take() else {
            return TagAction::Normal;
        };
        let tag = CompactString::from(self.doc.tag(el).unwrap_or(""));
        let void = self_closing || (self.options.is_void_tag)(&tag);
        if !void {
            self.stack.push(el);
            if (self.options.is_raw_text_tag)(&tag) {
                return TagAction::RawText;
            }
        }
        TagAction::Normal
    }

    fn close_tag(&mut self, name: &str) {
        // Pop to the nearest matching open element; ignore unmatched closes
        if let Some(pos) = self
            .stack
            .iter()
            .rposition(|&id| self.doc.tag(id) == Some(name))
        {
            self.stack.truncate(pos);
        }
    }
}

/// Parse an HTML fragment into `doc`, returning the fragment root node.
///
/// The parser is lenient the way the host platform is: unmatched close tags
/// are dropped, open elements are auto-closed at end of input, and stray
/// markup degrades to text.
pub fn parse_fragment(doc: &mut Document, source: &str, options: &ParseOptions) -> NodeId {
    let root = doc.create_fragment();
    let mut builder = FragmentBuilder {
        doc,
        options: *options,
        root,
        stack: Vec::new(),
        current: None,
    };
    tokenize(source, &mut builder);
    root
}
