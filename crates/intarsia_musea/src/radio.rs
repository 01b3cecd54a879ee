//! Radio variant markup.

use compact_str::CompactString;

use intarsia_fresco::{html_ext, TemplateResult, Value};

use crate::util::cn;

/// Inputs for one radio variant.
#[derive(Debug, Clone, Default)]
pub struct RadioArgs {
    pub checked: bool,
    pub classname: CompactString,
    pub label: CompactString,
    pub name: CompactString,
    pub value: CompactString,
    pub children: Option<TemplateResult>,
}

fn caption(label: &CompactString, children: &Option<TemplateResult>) -> Value {
    if !label.is_empty() {
        Value::from(label.clone())
    } else if let Some(children) = children {
        Value::from(children.clone())
    } else {
        Value::Null
    }
}

pub(crate) fn caption_span(label: &CompactString, children: &Option<TemplateResult>) -> Value {
    let caption = caption(label, children);
    if matches!(caption, Value::Null) {
        return Value::Null;
    }
    Value::from(html_ext!("<span class$=\"", "\">", "</span>"; "label", caption))
}

/// A radio input with its label. The checked state goes through the
/// boolean-attribute path: present (empty string) when true, absent
/// otherwise.
pub fn radio(args: &RadioArgs) -> TemplateResult {
    html_ext!(
        "\n  <label class$=\"",
        "\" for$=\"",
        "\">\n    <input\n      checked?=\"",
        "\"\n      class$=\"",
        "\"\n      id$=\"",
        "\"\n      name$=\"",
        "\"\n      type=\"radio\"\n      value=\"",
        "\"\n    />\n    ",
        "\n  </label>\n";
        cn(&["root", "size-medium"]),
        args.label.clone(),
        args.checked,
        cn(&["input", &args.classname]),
        args.label.clone(),
        args.name.clone(),
        args.value.clone(),
        caption_span(&args.label, &args.children),
    )
}
