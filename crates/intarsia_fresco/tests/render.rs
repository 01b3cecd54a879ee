//! Render entry point and part commit scenarios.

use std::cell::RefCell;
use std::rc::Rc;

use intarsia_armature::{
    dispatch_event, inner_html, Document, DocumentHandle, Event, NodeId, PropValue,
};
use intarsia_fresco::schedule::microtask;
use intarsia_fresco::{html, html_ext, render, Directive, Eventual, Listener, Value};

fn setup() -> (DocumentHandle, NodeId) {
    let doc = Document::shared();
    let container = doc.borrow_mut().create_element("div");
    (doc, container)
}

fn html_of(doc: &DocumentHandle, node: NodeId) -> String {
    inner_html(&doc.borrow(), node)
}

#[test]
fn test_attribute_and_text_render() {
    let (doc, container) = setup();
    let result = html_ext!("<div class$=\"", "\">", "</div>"; "x", "hi");
    render(&result, container, None, &doc).unwrap();
    insta::assert_snapshot!(
        html_of(&doc, container),
        @r###"<div class="x"><!---->hi<!----></div>"###
    );
}

#[test]
fn test_update_touches_only_changed_text() {
    let (doc, container) = setup();
    let render_with = |text: &str| html_ext!("<div class$=\"", "\">", "</div>"; "x", text);

    render(&render_with("hi"), container, None, &doc).unwrap();
    let (div, text_node) = {
        let borrowed = doc.borrow();
        let div = borrowed.first_child(container).unwrap();
        let text_node = borrowed
            .children(div)
            .iter()
            .copied()
            .find(|&id| borrowed.is_text(id))
            .unwrap();
        (div, text_node)
    };
    assert_eq!(doc.borrow().text(text_node), Some("hi"));

    render(&render_with("bye"), container, None, &doc).unwrap();
    {
        let borrowed = doc.borrow();
        // The same element and the same text node, mutated in place
        assert_eq!(borrowed.first_child(container), Some(div));
        assert!(borrowed.contains(text_node));
        assert_eq!(borrowed.text(text_node), Some("bye"));
        assert_eq!(borrowed.attribute(div, "class"), Some("x"));
    }
}

#[test]
fn test_template_identity_is_per_callsite() {
    let (doc, container) = setup();
    let literal_a = || html!("<p>", "</p>"; "same");
    let literal_b = || html!("<p>", "</p>"; "same");

    render(&literal_a(), container, None, &doc).unwrap();
    let first = doc.borrow().first_child(container).unwrap();

    // Same callsite: cached template, instance updated in place
    render(&literal_a(), container, None, &doc).unwrap();
    assert_eq!(doc.borrow().first_child(container), Some(first));

    // Textually identical but a different callsite: a distinct template,
    // so the container is rebuilt wholesale
    render(&literal_b(), container, None, &doc).unwrap();
    assert_ne!(doc.borrow().first_child(container), Some(first));
}

#[test]
fn test_default_strategy_attribute() {
    let (doc, container) = setup();
    let result = html!("<div title=\"", "\"></div>"; "greeting");
    render(&result, container, None, &doc).unwrap();
    assert_eq!(html_of(&doc, container), "<div title=\"greeting\"></div>");
}

#[test]
fn test_multi_expression_attribute_interpolates() {
    let (doc, container) = setup();
    let result = html!("<div style=\"width: ", "%; top: ", "px;\"></div>"; 42, 7);
    render(&result, container, None, &doc).unwrap();
    assert_eq!(
        html_of(&doc, container),
        "<div style=\"width: 42%; top: 7px;\"></div>"
    );
}

#[test]
fn test_boolean_attribute_part() {
    let (doc, container) = setup();
    let render_with = |checked: bool| {
        html_ext!("<input type=\"radio\" checked?=\"", "\">"; checked)
    };

    render(&render_with(true), container, None, &doc).unwrap();
    assert_eq!(
        html_of(&doc, container),
        "<input type=\"radio\" checked=\"\">"
    );

    render(&render_with(false), container, None, &doc).unwrap();
    assert_eq!(html_of(&doc, container), "<input type=\"radio\">");
}

#[test]
fn test_property_part_sets_live_property() {
    let (doc, container) = setup();
    let result = html_ext!("<input value=\"", "\">"; "typed");
    render(&result, container, None, &doc).unwrap();
    let input = doc.borrow().first_child(container).unwrap();
    // A property write, not a serialized attribute
    assert_eq!(html_of(&doc, container), "<input>");
    assert!(matches!(
        doc.borrow().property(input, "value"),
        Some(PropValue::Str(s)) if s == "typed"
    ));
}

#[test]
fn test_event_part_swaps_listener_without_resubscribing() {
    let (doc, container) = setup();
    let calls = Rc::new(RefCell::new(Vec::new()));

    let listener_named = |name: &'static str, calls: &Rc<RefCell<Vec<&'static str>>>| {
        let calls = calls.clone();
        Listener::new(move |_event| calls.borrow_mut().push(name))
    };
    let render_with = |listener: Value| html_ext!("<button on-click=\"", "\"></button>"; listener);

    let first = listener_named("first", &calls);
    render(&render_with(Value::from(first.clone())), container, None, &doc).unwrap();
    let button = doc.borrow().first_child(container).unwrap();

    dispatch_event(&doc, &mut Event::new("click", button));
    assert_eq!(*calls.borrow(), vec!["first"]);

    // Same listener again: no-op
    render(&render_with(Value::from(first)), container, None, &doc).unwrap();
    dispatch_event(&doc, &mut Event::new("click", button));
    assert_eq!(*calls.borrow(), vec!["first", "first"]);

    // Swapped listener: the part forwards to the new one
    let second = listener_named("second", &calls);
    render(&render_with(Value::from(second)), container, None, &doc).unwrap();
    dispatch_event(&doc, &mut Event::new("click", button));
    assert_eq!(*calls.borrow(), vec!["first", "first", "second"]);

    // Detached: no listener fires
    render(&render_with(Value::Null), container, None, &doc).unwrap();
    dispatch_event(&doc, &mut Event::new("click", button));
    assert_eq!(calls.borrow().len(), 3);
}

#[test]
fn test_nested_template_instance_reuse() {
    let (doc, container) = setup();
    let inner = |text: &str| html!("<em>", "</em>"; text);
    let outer = |value: Value| html!("<div>", "</div>"; value);

    render(&outer(Value::from(inner("a"))), container, None, &doc).unwrap();
    let em = {
        let borrowed = doc.borrow();
        let div = borrowed.first_child(container).unwrap();
        borrowed
            .children(div)
            .iter()
            .copied()
            .find(|&id| borrowed.tag(id) == Some("em"))
            .unwrap()
    };

    render(&outer(Value::from(inner("b"))), container, None, &doc).unwrap();
    let borrowed = doc.borrow();
    // The nested instance is reused, not rebuilt
    assert!(borrowed.contains(em));
    assert_eq!(borrowed.text(borrowed.first_child(em).unwrap()), Some("b"));
}

#[test]
fn test_iterable_shrink_removes_trailing_range() {
    let (doc, container) = setup();
    let list = |items: &[&str]| {
        let values: Vec<Value> = items.iter().map(|&s| Value::from(s)).collect();
        html!("<ul>", "</ul>"; values)
    };

    render(&list(&["A", "B", "C"]), container, None, &doc).unwrap();
    let ul = doc.borrow().first_child(container).unwrap();
    let texts = |doc: &DocumentHandle| -> Vec<(NodeId, String)> {
        let borrowed = doc.borrow();
        borrowed
            .children(ul)
            .iter()
            .copied()
            .filter(|&id| {
                borrowed.is_text(id) && !borrowed.text(id).unwrap_or_default().is_empty()
            })
            .map(|id| (id, borrowed.text(id).unwrap().to_owned()))
            .collect()
    };

    let initial = texts(&doc);
    assert_eq!(
        initial.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );

    render(&list(&["A", "B"]), container, None, &doc).unwrap();
    let shrunk = texts(&doc);
    assert_eq!(
        shrunk.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>(),
        vec!["A", "B"]
    );
    // Exactly the first two child ranges survive, undisturbed
    assert_eq!(shrunk[0].0, initial[0].0);
    assert_eq!(shrunk[1].0, initial[1].0);

    render(&list(&["A", "B", "D"]), container, None, &doc).unwrap();
    let grown = texts(&doc);
    assert_eq!(
        grown.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>(),
        vec!["A", "B", "D"]
    );
    assert_eq!(grown[0].0, initial[0].0);
    assert_eq!(grown[1].0, initial[1].0);
}

#[test]
fn test_iterable_empty_resets_state() {
    let (doc, container) = setup();
    let list = |items: &[&str]| {
        let values: Vec<Value> = items.iter().map(|&s| Value::from(s)).collect();
        html!("<ul>", "</ul>"; values)
    };

    render(&list(&["A"]), container, None, &doc).unwrap();
    render(&list(&[]), container, None, &doc).unwrap();
    let ul = doc.borrow().first_child(container).unwrap();
    {
        let borrowed = doc.borrow();
        assert!(borrowed
            .children(ul)
            .iter()
            .all(|&id| !borrowed.is_text(id) || borrowed.text(id) == Some("")));
    }

    // From the cleared state a fresh child range is built
    render(&list(&["X"]), container, None, &doc).unwrap();
    let borrowed = doc.borrow();
    let has_x = borrowed
        .children(ul)
        .iter()
        .any(|&id| borrowed.text(id) == Some("X"));
    assert!(has_x);
}

#[test]
fn test_eventual_value_resolves_into_part() {
    let (doc, container) = setup();
    let pending = Eventual::deferred();
    let result = html!("<div>", "</div>"; pending.clone());
    render(&result, container, None, &doc).unwrap();

    let div = doc.borrow().first_child(container).unwrap();
    assert_eq!(doc.borrow().children(div).len(), 2);

    pending.resolve("late");
    microtask::flush();
    let borrowed = doc.borrow();
    let text = borrowed
        .children(div)
        .iter()
        .copied()
        .find(|&id| borrowed.is_text(id))
        .unwrap();
    assert_eq!(borrowed.text(text), Some("late"));
}

#[test]
fn test_stale_eventual_resolution_is_dropped() {
    let (doc, container) = setup();
    let template = |value: Value| html!("<div>", "</div>"; value);

    let first = Eventual::deferred();
    render(&template(Value::from(first.clone())), container, None, &doc).unwrap();
    // A later commit supersedes the awaited value
    render(&template(Value::from("settled")), container, None, &doc).unwrap();

    first.resolve("stale");
    microtask::flush();

    let borrowed = doc.borrow();
    let div = borrowed.first_child(container).unwrap();
    let text = borrowed
        .children(div)
        .iter()
        .copied()
        .find(|&id| borrowed.is_text(id))
        .unwrap();
    assert_eq!(borrowed.text(text), Some("settled"));
}

#[test]
fn test_directive_commits_through_part_location() {
    let (doc, container) = setup();
    let directive = Directive::new(|scope| {
        if let intarsia_fresco::value::DirectiveLocation::Attribute { element, name } =
            &scope.location
        {
            scope
                .doc
                .borrow_mut()
                .set_attribute(*element, name.clone(), "from-directive");
        }
    });
    let result = html!("<div title=\"", "\"></div>"; Value::from(directive));
    render(&result, container, None, &doc).unwrap();
    assert_eq!(
        html_of(&doc, container),
        "<div title=\"from-directive\"></div>"
    );
}

#[test]
fn test_broken_template_errors_on_every_render() {
    let (doc, container) = setup();
    // The duplicate attribute declaration wins, so the expression's marker
    // never lands where its literal points
    let broken = || html!("<div a=\"x\" a=\"", "\" b=\"", "\"></div>"; "1", "2");
    // A failed parse is not cached as broken: each attempt re-parses and
    // reports the same construction error
    assert!(render(&broken(), container, None, &doc).is_err());
    assert!(render(&broken(), container, None, &doc).is_err());
    assert!(doc.borrow().children(container).is_empty());
}

#[test]
fn test_dom_node_value_inserts_and_skips_on_repeat() {
    let (doc, container) = setup();
    let node = doc.borrow_mut().create_element("hr");
    let template = |node: NodeId| html!("<div>", "</div>"; Value::node(node));

    render(&template(node), container, None, &doc).unwrap();
    let borrowed = doc.borrow();
    let div = borrowed.first_child(container).unwrap();
    assert!(borrowed.children(div).contains(&node));
    drop(borrowed);

    render(&template(node), container, None, &doc).unwrap();
    assert!(doc.borrow().children(doc.borrow().first_child(container).unwrap()).contains(&node));
}
