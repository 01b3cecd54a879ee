//! Progress bar markup.

use compact_str::CompactString;

use intarsia_fresco::{html_ext, TemplateResult, Value};

use crate::util::cn;

/// Inputs for the progress bar.
#[derive(Debug, Clone, Default)]
pub struct ProgressArgs {
    pub classname: CompactString,
    pub children: Option<TemplateResult>,
    /// Bar width in percent.
    pub width: f64,
}

/// A progress track with an inner bar sized by `width` percent (the bar's
/// inline style reads `width: N%;`).
pub fn progress(args: &ProgressArgs) -> TemplateResult {
    html_ext!(
        "\n  <div class$=\"",
        "\">\n    ",
        "\n    <div class$=\"",
        "\" style=\"width: ",
        "%;\"></div>\n  </div>\n";
        cn(&["root", &args.classname]),
        args.children.clone().map(Value::from),
        cn(&["bar"]),
        args.width,
    )
}
