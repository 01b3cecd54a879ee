//! Checkbox variant markup.

use compact_str::CompactString;

use intarsia_fresco::{html_ext, TemplateResult};

use crate::radio::caption_span;
use crate::util::cn;

/// Inputs for one checkbox variant.
#[derive(Debug, Clone, Default)]
pub struct CheckboxArgs {
    pub checked: bool,
    pub classname: CompactString,
    pub label: CompactString,
    pub name: CompactString,
    pub value: CompactString,
    pub children: Option<TemplateResult>,
}

/// A checkbox input with its label.
pub fn checkbox(args: &CheckboxArgs) -> TemplateResult {
    html_ext!(
        "\n  <label class=\"root size-medium\" for$=\"",
        "\">\n    <input\n      checked?=\"",
        "\"\n      class$=\"",
        "\"\n      id$=\"",
        "\"\n      name$=\"",
        "\"\n      type=\"checkbox\"\n      value=\"",
        "\"\n    />\n    ",
        "\n  </label>\n";
        args.label.clone(),
        args.checked,
        cn(&["input", &args.classname]),
        args.label.clone(),
        args.name.clone(),
        args.value.clone(),
        caption_span(&args.label, &args.children),
    )
}
