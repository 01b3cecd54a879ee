//! HTML serialization.

use crate::dom::{Document, NodeData, NodeId};
use crate::parser::ParseOptions;

fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn write_node(doc: &Document, id: NodeId, options: &ParseOptions, out: &mut String) {
    match doc.data(id) {
        NodeData::Fragment => {
            for &child in doc.children(id) {
                write_node(doc, child, options, out);
            }
        }
        NodeData::Text(text) => {
            let raw = doc
                .parent(id)
                .and_then(|p| doc.tag(p))
                .map(|tag| (options.is_raw_text_tag)(tag))
                .unwrap_or(false);
            if raw {
                out.push_str(text);
            } else {
                escape_text(out, text);
            }
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for attr in &el.attrs {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_attr(out, &attr.value);
                out.push('"');
            }
            out.push('>');
            if (options.is_void_tag)(&el.tag) {
                return;
            }
            for &child in doc.children(id) {
                write_node(doc, child, options, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}

/// Serialize a node including its own markup.
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &ParseOptions::default(), &mut out);
    out
}

/// Serialize the children of a node.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let options = ParseOptions::default();
    for &child in doc.children(id) {
        write_node(doc, child, &options, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_with_attrs() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "x");
        let text = doc.create_text("hi");
        doc.append_child(div, text);
        assert_eq!(outer_html(&doc, div), r#"<div class="x">hi</div>"#);
    }

    #[test]
    fn test_void_and_empty_attr() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_attribute(input, "checked", "");
        assert_eq!(outer_html(&doc, input), r#"<input checked="">"#);
    }

    #[test]
    fn test_escaping() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "title", "a\"b");
        let text = doc.create_text("1 < 2 & 3");
        doc.append_child(div, text);
        assert_eq!(
            outer_html(&doc, div),
            r#"<div title="a&quot;b">1 &lt; 2 &amp; 3</div>"#
        );
    }
}
