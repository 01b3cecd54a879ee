//! Poll component: variants, voting, aggregated results.

use std::cell::RefCell;
use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use intarsia_armature::PropValue;
use intarsia_fresco::{
    class_string, html_ext, Component, ElementRef, Listener, PropertyDeclarations,
    PropertySnapshot, PropertyType, TemplateResult, Value,
};

use crate::button::{button, ButtonArgs};
use crate::checkbox::{checkbox, CheckboxArgs};
use crate::progress::{progress, ProgressArgs};
use crate::radio::{radio, RadioArgs};
use crate::util::cn;

/// One poll variant with its vote count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollItem {
    pub label: CompactString,
    pub name: CompactString,
    pub value: CompactString,
    pub count: u32,
    pub winner: bool,
}

impl PollItem {
    pub fn new(
        label: impl Into<CompactString>,
        name: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            value: value.into(),
            count: 0,
            winner: false,
        }
    }

    /// Structured form for the `list` property.
    pub fn to_value(&self) -> Value {
        let mut map: FxHashMap<CompactString, Value> = FxHashMap::default();
        map.insert("label".into(), Value::from(self.label.clone()));
        map.insert("name".into(), Value::from(self.name.clone()));
        map.insert("value".into(), Value::from(self.value.clone()));
        map.insert("count".into(), Value::from(self.count));
        map.insert("winner".into(), Value::from(self.winner));
        Value::from(map)
    }

    /// Read back from the `list` property; non-map entries are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Map(map) = value else {
            return None;
        };
        let text = |key: &str| {
            map.get(key)
                .map(|v| v.to_text())
                .unwrap_or_default()
        };
        let count = match map.get("count") {
            Some(Value::Int(i)) => *i as u32,
            Some(Value::Float(f)) => *f as u32,
            _ => 0,
        };
        Some(Self {
            label: text("label"),
            name: text("name"),
            value: text("value"),
            count,
            winner: map.get("winner").map(Value::is_truthy).unwrap_or(false),
        })
    }
}

/// The poll element: renders variants (checkboxes when `multiple`, radios
/// otherwise) inside a form until a vote completes, then aggregated
/// percentage rows. A completed vote bumps `total`, re-counts the chosen
/// variants, and dispatches `poll-result-aggregate` from the host.
pub struct Poll {
    element: RefCell<Option<ElementRef>>,
    on_variant_change: RefCell<Option<Listener>>,
    on_poll_complete: RefCell<Option<Listener>>,
}

impl Poll {
    pub fn new() -> Self {
        Self {
            element: RefCell::new(None),
            on_variant_change: RefCell::new(None),
            on_poll_complete: RefCell::new(None),
        }
    }

    fn items(list: &Rc<Vec<Value>>) -> Vec<PollItem> {
        list.iter().filter_map(PollItem::from_value).collect()
    }

    fn change_listener(&self) -> Value {
        self.on_variant_change
            .borrow()
            .clone()
            .map(Value::from)
            .unwrap_or(Value::Null)
    }

    fn submit_listener(&self) -> Value {
        self.on_poll_complete
            .borrow()
            .clone()
            .map(Value::from)
            .unwrap_or(Value::Null)
    }

    fn render_variant(&self, item: &PollItem, multiple: bool) -> TemplateResult {
        let variant = if multiple {
            checkbox(&CheckboxArgs {
                label: item.label.clone(),
                name: item.name.clone(),
                value: item.value.clone(),
                ..CheckboxArgs::default()
            })
        } else {
            radio(&RadioArgs {
                label: item.label.clone(),
                name: item.name.clone(),
                value: item.value.clone(),
                ..RadioArgs::default()
            })
        };
        html_ext!(
            "\n  <div class$=\"",
            "\" on-change=\"",
            "\">\n    ",
            "\n  </div>\n";
            cn(&["variant"]),
            self.change_listener(),
            variant,
        )
    }

    fn render_result(&self, item: &PollItem, total: f64) -> TemplateResult {
        let ratio = if total > 0.0 {
            f64::from(item.count) / total
        } else {
            0.0
        };
        let row = html_ext!(
            "\n  <div class$=\"",
            "\">",
            "</div>\n  <div class$=\"",
            "\">",
            "%</div>\n";
            class_string(&[("text", true), ("active", item.winner)]),
            item.label.clone(),
            "aftertext",
            format!("{:.1}", ratio * 100.0),
        );
        progress(&ProgressArgs {
            classname: cn(&["result"]),
            children: Some(row),
            width: ratio * 100.0,
        })
    }
}

impl Default for Poll {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Poll {
    fn properties() -> PropertyDeclarations {
        PropertyDeclarations::new()
            .declare("complete", PropertyType::Boolean)
            .declare("list", PropertyType::List)
            .declare("multiple", PropertyType::Boolean)
            .declare("text", PropertyType::String)
            .declare("total", PropertyType::Number)
            .declare("selected", PropertyType::Boolean)
    }

    fn bound(&mut self, element: &ElementRef) {
        *self.element.borrow_mut() = Some(element.clone());
        // Defaults flow through change detection at enable time
        element.set_property("selected", false);
        element.set_property("list", Value::from(Vec::<Value>::new()));

        let handle = element.clone();
        *self.on_variant_change.borrow_mut() = Some(Listener::new(move |_event| {
            handle.set_property("selected", true);
        }));

        let handle = element.clone();
        *self.on_poll_complete.borrow_mut() = Some(Listener::new(move |event| {
            event.prevent_default();
            let Some(doc) = handle.doc() else { return };
            let submitted = doc.borrow().collect_form_values(event.current_target);
            let items = match handle.property("list") {
                Value::List(list) => Poll::items(&list),
                _ => Vec::new(),
            };

            // First submitted value per variant name, in list order
            let mut picked: Vec<(CompactString, CompactString)> = Vec::new();
            for item in &items {
                if picked.iter().any(|(name, _)| *name == item.name) {
                    continue;
                }
                if let Some((_, value)) = submitted.iter().find(|(name, _)| *name == item.name) {
                    picked.push((item.name.clone(), value.clone()));
                }
            }
            if picked.is_empty() {
                return;
            }

            handle.set_property("complete", true);
            let total = match handle.property("total") {
                Value::Float(f) => f + 1.0,
                Value::Int(i) => i as f64 + 1.0,
                _ => 1.0,
            };
            handle.set_property("total", total);

            let updated: Vec<Value> = items
                .iter()
                .map(|item| {
                    let mut item = item.clone();
                    let chosen = picked
                        .iter()
                        .any(|(name, value)| *name == item.name && *value == item.value);
                    if chosen {
                        item.count += 1;
                    }
                    item.to_value()
                })
                .collect();
            let result_list: Vec<PropValue> =
                updated.iter().map(Value::to_prop_value).collect();
            handle.set_property("list", Value::from(updated));

            let mut detail: FxHashMap<CompactString, PropValue> = FxHashMap::default();
            detail.insert("total".into(), PropValue::Float(total));
            detail.insert("list".into(), PropValue::List(Rc::new(result_list)));
            let mut result: FxHashMap<CompactString, PropValue> = FxHashMap::default();
            result.insert("result".into(), PropValue::Map(Rc::new(detail)));
            handle.dispatch_custom("poll-result-aggregate", PropValue::Map(Rc::new(result)));
        }));
    }

    fn render(&self, props: &PropertySnapshot<'_>) -> TemplateResult {
        let complete = props.truthy("complete");
        let selected = props.truthy("selected");
        let multiple = props.truthy("multiple");
        let text = props.text("text");
        let total = props.number("total");

        let mut items = Self::items(&props.list("list"));
        if !items.is_empty() {
            // The most popular answer wins
            let max = items.iter().map(|item| item.count).max().unwrap_or(0);
            for item in &mut items {
                item.winner = item.count == max;
            }
        }

        let vote_button = button(&ButtonArgs {
            text: CompactString::from("Проголосовать"),
            disabled: if !complete { !selected } else { true },
            ..ButtonArgs::default()
        });

        let body = if !complete {
            let variants: Vec<Value> = items
                .iter()
                .map(|item| Value::from(self.render_variant(item, multiple)))
                .collect();
            html_ext!(
                "\n  <div class$=\"",
                "\">\n    <form on-submit=\"",
                "\">\n      ",
                "\n      ",
                "\n    </form>\n  </div>\n";
                cn(&["group"]),
                self.submit_listener(),
                variants,
                vote_button,
            )
        } else {
            let results: Vec<Value> = items
                .iter()
                .map(|item| Value::from(self.render_result(item, total)))
                .collect();
            html_ext!(
                "\n  <div class$=\"",
                "\">\n    ",
                "\n    ",
                "\n  </div>\n";
                cn(&["group"]),
                results,
                vote_button,
            )
        };

        html_ext!(
            "\n<div class$=\"",
            "\">\n  <section class$=\"",
            "\">\n    <div class$=\"",
            "\">",
            "</div>\n    ",
            "\n  </section>\n</div>\n";
            "root",
            "content",
            "question",
            text,
            body,
        )
    }
}
