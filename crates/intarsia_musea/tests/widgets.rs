//! Widget markup and the poll voting flow.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use intarsia_armature::{
    dispatch_event, Document, DocumentHandle, Event, NodeId, PropValue,
};
use intarsia_fresco::schedule::microtask;
use intarsia_fresco::{render, Element, Value};
use intarsia_musea::{
    button, cn, progress, radio, ButtonArgs, Poll, PollItem, ProgressArgs, RadioArgs,
};

fn setup() -> (DocumentHandle, NodeId) {
    let doc = Document::shared();
    let container = doc.borrow_mut().create_element("div");
    (doc, container)
}

#[test]
fn test_cn_joins() {
    assert_eq!(cn(&["a", "", "b"]).as_str(), "a b");
}

#[test]
fn test_radio_checked_present_when_true() {
    let (doc, container) = setup();
    let args = RadioArgs {
        checked: true,
        label: CompactString::from("Yes"),
        name: CompactString::from("q"),
        value: CompactString::from("yes"),
        ..RadioArgs::default()
    };
    render(&radio(&args), container, None, &doc).unwrap();

    let borrowed = doc.borrow();
    let input = borrowed.descendants_by_tag(container, "input")[0];
    assert_eq!(borrowed.attribute(input, "checked"), Some(""));
    assert_eq!(borrowed.attribute(input, "type"), Some("radio"));
    assert_eq!(borrowed.attribute(input, "name"), Some("q"));
    assert!(matches!(
        borrowed.property(input, "value"),
        Some(PropValue::Str(s)) if s == "yes"
    ));
    // The caption span renders the label
    let span = borrowed.descendants_by_tag(container, "span")[0];
    assert_eq!(
        borrowed.text(borrowed.first_child(span).unwrap()),
        Some("Yes")
    );
}

#[test]
fn test_radio_checked_absent_when_false() {
    let (doc, container) = setup();
    let args = RadioArgs {
        checked: false,
        label: CompactString::from("No"),
        name: CompactString::from("q"),
        value: CompactString::from("no"),
        ..RadioArgs::default()
    };
    render(&radio(&args), container, None, &doc).unwrap();
    let borrowed = doc.borrow();
    let input = borrowed.descendants_by_tag(container, "input")[0];
    assert!(!borrowed.has_attribute(input, "checked"));
}

#[test]
fn test_progress_bar_width() {
    let (doc, container) = setup();
    let args = ProgressArgs {
        width: 42.0,
        ..ProgressArgs::default()
    };
    render(&progress(&args), container, None, &doc).unwrap();

    let borrowed = doc.borrow();
    let divs = borrowed.descendants_by_tag(container, "div");
    let bar = divs
        .iter()
        .copied()
        .find(|&id| {
            borrowed
                .attribute(id, "class")
                .map(|class| class.contains("bar"))
                .unwrap_or(false)
        })
        .unwrap();
    assert!(matches!(
        borrowed.property(bar, "style"),
        Some(PropValue::Str(s)) if s == "width: 42%;"
    ));
}

#[test]
fn test_button_disabled_state() {
    let (doc, container) = setup();
    let args = ButtonArgs {
        disabled: true,
        text: CompactString::from("Go"),
        ..ButtonArgs::default()
    };
    render(&button(&args), container, None, &doc).unwrap();

    let borrowed = doc.borrow();
    let node = borrowed.descendants_by_tag(container, "button")[0];
    assert!(matches!(
        borrowed.property(node, "disabled"),
        Some(PropValue::Bool(true))
    ));
    let class = borrowed.attribute(node, "class").unwrap();
    assert!(class.contains("disabled"));
    assert_eq!(
        borrowed.text(borrowed.first_child(node).unwrap()),
        Some("Go")
    );
}

fn mount_poll(items: &[PollItem]) -> (DocumentHandle, Element<Poll>) {
    let doc = Document::shared();
    let host = doc.borrow_mut().create_element("x-poll");
    let element = Element::new(doc.clone(), host, Poll::new());
    element.connected();
    element.set_property("text", "Which one?");
    let list: Vec<Value> = items.iter().map(PollItem::to_value).collect();
    element.set_property("list", Value::from(list));
    microtask::flush_all();
    (doc, element)
}

fn poll_button(doc: &DocumentHandle, root: NodeId) -> NodeId {
    doc.borrow().descendants_by_tag(root, "button")[0]
}

fn button_disabled(doc: &DocumentHandle, node: NodeId) -> bool {
    matches!(
        doc.borrow().property(node, "disabled"),
        Some(PropValue::Bool(true))
    )
}

#[test]
fn test_poll_renders_variants_in_a_form() {
    let (doc, element) = mount_poll(&[
        PollItem::new("Yes", "q", "yes"),
        PollItem::new("No", "q", "no"),
    ]);
    let root = element.root().unwrap();

    let borrowed = doc.borrow();
    assert_eq!(borrowed.descendants_by_tag(root, "form").len(), 1);
    let inputs = borrowed.descendants_by_tag(root, "input");
    assert_eq!(inputs.len(), 2);
    assert!(inputs
        .iter()
        .all(|&id| borrowed.attribute(id, "type") == Some("radio")));
    drop(borrowed);

    // Nothing selected yet: voting is disabled
    assert!(button_disabled(&doc, poll_button(&doc, root)));
}

#[test]
fn test_poll_uses_checkboxes_when_multiple() {
    let (doc, element) = {
        let doc = Document::shared();
        let host = doc.borrow_mut().create_element("x-poll");
        let element = Element::new(doc.clone(), host, Poll::new());
        element.connected();
        element.set_property("multiple", true);
        element.set_property(
            "list",
            Value::from(vec![
                PollItem::new("A", "a", "1").to_value(),
                PollItem::new("B", "b", "2").to_value(),
            ]),
        );
        microtask::flush_all();
        (doc, element)
    };
    let root = element.root().unwrap();
    let borrowed = doc.borrow();
    let inputs = borrowed.descendants_by_tag(root, "input");
    assert_eq!(inputs.len(), 2);
    assert!(inputs
        .iter()
        .all(|&id| borrowed.attribute(id, "type") == Some("checkbox")));
}

#[test]
fn test_poll_selection_enables_voting() {
    let (doc, element) = mount_poll(&[
        PollItem::new("Yes", "q", "yes"),
        PollItem::new("No", "q", "no"),
    ]);
    let root = element.root().unwrap();
    let input = doc.borrow().descendants_by_tag(root, "input")[0];

    doc.borrow_mut()
        .set_property(input, "checked", PropValue::Bool(true));
    dispatch_event(&doc, &mut Event::new("change", input));
    microtask::flush_all();

    assert!(element.get_property("selected").is_truthy());
    assert!(!button_disabled(&doc, poll_button(&doc, root)));
}

#[test]
fn test_poll_submit_aggregates_and_shows_results() {
    let (doc, element) = mount_poll(&[
        PollItem::new("Yes", "q", "yes"),
        PollItem::new("No", "q", "no"),
    ]);
    let root = element.root().unwrap();
    let host = element.host();

    // Observe the aggregate event from the host
    let aggregated = Rc::new(RefCell::new(None));
    {
        let aggregated = aggregated.clone();
        doc.borrow_mut().add_event_listener(
            host,
            "poll-result-aggregate",
            Rc::new(move |event: &mut Event| {
                *aggregated.borrow_mut() = event.detail.clone();
            }),
        );
    }

    // Choose "yes" and submit the form
    let input = doc.borrow().descendants_by_tag(root, "input")[0];
    doc.borrow_mut()
        .set_property(input, "checked", PropValue::Bool(true));
    dispatch_event(&doc, &mut Event::new("change", input));
    let form = doc.borrow().descendants_by_tag(root, "form")[0];
    let mut submit = Event::new("submit", form);
    dispatch_event(&doc, &mut submit);
    assert!(submit.default_prevented());
    microtask::flush_all();

    assert!(element.get_property("complete").is_truthy());
    assert!(element.get_property("total").same(&Value::Float(1.0)));

    // The form is gone; results render one progress row per variant
    let borrowed = doc.borrow();
    assert!(borrowed.descendants_by_tag(root, "form").is_empty());
    let bars: Vec<NodeId> = borrowed
        .descendants_by_tag(root, "div")
        .into_iter()
        .filter(|&id| {
            borrowed
                .attribute(id, "class")
                .map(|class| class.contains("bar"))
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(bars.len(), 2);
    assert!(matches!(
        borrowed.property(bars[0], "style"),
        Some(PropValue::Str(s)) if s == "width: 100%;"
    ));
    assert!(matches!(
        borrowed.property(bars[1], "style"),
        Some(PropValue::Str(s)) if s == "width: 0%;"
    ));

    // Voting stays disabled after completion
    drop(borrowed);
    assert!(button_disabled(&doc, poll_button(&doc, root)));

    // The aggregate event carried the result payload
    let detail = aggregated.borrow();
    let Some(PropValue::Map(result)) = detail.as_ref() else {
        panic!("aggregate event did not carry a result map");
    };
    let Some(PropValue::Map(inner)) = result.get("result") else {
        panic!("missing result entry");
    };
    assert!(matches!(inner.get("total"), Some(PropValue::Float(t)) if *t == 1.0));
}
