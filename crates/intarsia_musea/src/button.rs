//! Submit button markup.

use compact_str::CompactString;

use intarsia_fresco::{html_ext, Listener, TemplateResult, Value};

use crate::util::cn;

/// Inputs for the button.
#[derive(Debug, Clone, Default)]
pub struct ButtonArgs {
    pub disabled: bool,
    pub for_el: CompactString,
    pub onclick: Option<Listener>,
    pub text: CompactString,
}

fn base_class() -> CompactString {
    cn(&[
        "root",
        "rounded",
        "fluid-m",
        "height-52",
        "theme-default",
        "width-s",
    ])
}

/// A button wired for form submission. `disabled` is a live property,
/// `on-click` an event binding.
pub fn button(args: &ButtonArgs) -> TemplateResult {
    let class = if args.disabled {
        cn(&[&base_class(), "disabled"])
    } else {
        base_class()
    };
    html_ext!(
        "\n  <button\n    disabled=\"",
        "\"\n    class$=\"",
        "\"\n    form=\"",
        "\"\n    on-click=\"",
        "\"\n  >",
        "</button>\n";
        args.disabled,
        class,
        args.for_el.clone(),
        args.onclick.clone().map(Value::from),
        args.text.clone(),
    )
}
