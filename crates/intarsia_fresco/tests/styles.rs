//! Scoped-style extraction.

use std::cell::RefCell;
use std::rc::Rc;

use intarsia_armature::{inner_html, Document, DocumentHandle, NodeId};
use intarsia_fresco::{html_ext, render, set_style_registry, StyleRegistry};

#[derive(Clone, Default)]
struct RegistryLog {
    events: Rc<RefCell<Vec<String>>>,
}

struct RecordingRegistry {
    log: RegistryLog,
    native: bool,
}

impl StyleRegistry for RecordingRegistry {
    fn prepare_template_dom(&mut self, _doc: &mut Document, _content: NodeId, scope: &str) {
        self.log
            .events
            .borrow_mut()
            .push(format!("prepare-dom:{scope}"));
    }

    fn prepare_template_styles(&mut self, doc: &mut Document, style_holder: NodeId, scope: &str) {
        let styles = doc.children(style_holder).len();
        self.log
            .events
            .borrow_mut()
            .push(format!("prepare-styles:{scope}:{styles}"));
    }

    fn style_element(&mut self, _doc: &mut Document, _host: NodeId, scope: &str) {
        self.log
            .events
            .borrow_mut()
            .push(format!("style-element:{scope}"));
    }

    fn native_shadow(&self) -> bool {
        self.native
    }
}

fn shadow_host(doc: &DocumentHandle, tag: &str) -> (NodeId, NodeId) {
    let mut borrowed = doc.borrow_mut();
    let host = borrowed.create_element(tag);
    let root = borrowed.attach_shadow_root(host);
    (host, root)
}

#[test]
fn test_styles_extracted_once_per_scope() {
    let log = RegistryLog::default();
    set_style_registry(Some(Box::new(RecordingRegistry {
        log: log.clone(),
        native: false,
    })));

    let doc = Document::shared();
    let template =
        |content: &str| html_ext!("<style>", "</style><div>", "</div>"; ".a { }", content);

    let (_, first_root) = shadow_host(&doc, "x-card");
    render(&template("one"), first_root, Some("x-card"), &doc).unwrap();

    // Styles were handed to the registry and stripped from the output
    assert!(log
        .events
        .borrow()
        .contains(&"prepare-styles:x-card:1".to_owned()));
    assert!(log
        .events
        .borrow()
        .contains(&"style-element:x-card".to_owned()));
    let rendered = inner_html(&doc.borrow(), first_root);
    assert!(!rendered.contains("<style>"));
    assert!(rendered.contains("one"));

    // A second root under the same scope renders from the stripped template:
    // no styles, and the remaining binding still receives its value
    let (_, second_root) = shadow_host(&doc, "x-card");
    render(&template("two"), second_root, Some("x-card"), &doc).unwrap();
    let rendered = inner_html(&doc.borrow(), second_root);
    assert!(!rendered.contains("<style>"));
    assert!(rendered.contains("two"));

    let extractions = log
        .events
        .borrow()
        .iter()
        .filter(|event| event.starts_with("prepare-styles"))
        .count();
    assert_eq!(extractions, 1);
}

#[test]
fn test_native_shadow_reinserts_first_style() {
    let log = RegistryLog::default();
    set_style_registry(Some(Box::new(RecordingRegistry {
        log: log.clone(),
        native: true,
    })));

    let doc = Document::shared();
    let template =
        |content: &str| html_ext!("<style>", "</style><span>", "</span>"; ".b { }", content);

    let (_, first_root) = shadow_host(&doc, "x-native");
    render(&template("one"), first_root, Some("x-native"), &doc).unwrap();
    let rendered = inner_html(&doc.borrow(), first_root);
    // The extracted style is re-inserted at the front of the fragment
    assert!(rendered.starts_with("<style>"));
    assert!(rendered.contains("one"));

    // Subsequent renders keep the style via the template copy, with part
    // indices shifted past it
    let (_, second_root) = shadow_host(&doc, "x-native");
    render(&template("two"), second_root, Some("x-native"), &doc).unwrap();
    let rendered = inner_html(&doc.borrow(), second_root);
    assert!(rendered.contains("<style>"));
    assert!(rendered.contains("two"));
}

#[test]
fn test_without_registry_styles_stay_inline() {
    let doc = Document::shared();
    let template = html_ext!("<style>", "</style><div>", "</div>"; ".c { }", "kept");
    let (_, root) = shadow_host(&doc, "x-plain");
    render(&template, root, Some("x-plain"), &doc).unwrap();
    let rendered = inner_html(&doc.borrow(), root);
    assert!(rendered.contains("<style>"));
    assert!(rendered.contains("kept"));
}
