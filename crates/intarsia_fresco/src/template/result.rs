//! Template results and the literal macros.

use crate::template::strings::TemplateStrings;
use crate::value::Value;

/// Expression marker embedded between literal segments. Improbable in user
/// markup; collisions would misattribute expression positions, the same
/// posture the host-platform implementation takes with its randomized token.
pub(crate) const MARKER: &str = "{{intarsia-3f2a9c}}";

/// Marker form used at child-node positions.
pub(crate) const NODE_MARKER: &str = "<!--{{intarsia-3f2a9c}}-->";

/// Template type discriminator; part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Html,
    Svg,
}

/// How raw template parts become concrete parts.
///
/// `Default` yields only attribute and node parts. `Extended` additionally
/// reads attribute-name affixes: `on-` prefixed names bind event listeners,
/// a `$` suffix forces a serialized attribute, a `?` suffix a boolean
/// attribute, and any other attribute position sets a live property under
/// the raw (case-preserved) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartStrategy {
    Default,
    Extended,
}

/// The immutable product of invoking a template literal: segments, values,
/// kind, and the part strategy the renderer should build with.
#[derive(Debug, Clone)]
pub struct TemplateResult {
    pub strings: TemplateStrings,
    pub values: Vec<Value>,
    pub kind: TemplateKind,
    pub strategy: PartStrategy,
}

impl TemplateResult {
    /// Build a result. Usually reached through `html!`/`html_ext!`/`svg!`.
    pub fn new(
        strings: TemplateStrings,
        values: Vec<Value>,
        kind: TemplateKind,
        strategy: PartStrategy,
    ) -> Self {
        Self {
            strings,
            values,
            kind,
            strategy,
        }
    }

    /// Concatenate the segments with expression markers between them: the
    /// comment form where the hole is a complete child-node boundary, the
    /// bare form inside tags (attribute positions).
    pub(crate) fn join_with_markers(&self) -> String {
        let segments = self.strings.segments;
        let last = segments.len() - 1;
        let mut html = String::new();
        let mut is_text_binding = true;
        for segment in &segments[..last] {
            html.push_str(segment);
            // A segment that closed its last tag leaves us in text position;
            // a segment with no tag boundary keeps the previous state.
            match tag_position(segment) {
                TagPosition::InsideTag => is_text_binding = false,
                TagPosition::Closed => is_text_binding = true,
                TagPosition::NoTag => {}
            }
            html.push_str(if is_text_binding { NODE_MARKER } else { MARKER });
        }
        html.push_str(segments[last]);
        html
    }
}

enum TagPosition {
    /// No tag boundary in the segment.
    NoTag,
    /// The last `<` is unmatched by a later `>`.
    InsideTag,
    /// The last opened tag is closed.
    Closed,
}

fn tag_position(segment: &str) -> TagPosition {
    match segment.rfind('>') {
        Some(close) => {
            if segment[close + 1..].contains('<') {
                TagPosition::InsideTag
            } else {
                TagPosition::Closed
            }
        }
        None => {
            if segment.contains('<') {
                TagPosition::InsideTag
            } else {
                TagPosition::NoTag
            }
        }
    }
}

/// Build an HTML [`TemplateResult`] with the default part strategy.
///
/// Segments come first, then a `;`, then one expression per hole:
///
/// ```
/// use intarsia_fresco::html;
/// let greeting = "hi";
/// let result = html!("<div>", "</div>"; greeting);
/// assert_eq!(result.values.len(), 1);
/// ```
#[macro_export]
macro_rules! html {
    ($($segment:expr),+ ; $($value:expr),* $(,)?) => {
        $crate::template::TemplateResult::new(
            $crate::template_strings!($($segment),+),
            ::std::vec![$($crate::value::Value::from($value)),*],
            $crate::template::TemplateKind::Html,
            $crate::template::PartStrategy::Default,
        )
    };
    ($($segment:expr),+ $(,)?) => { $crate::html!($($segment),+ ;) };
}

/// Build an HTML [`TemplateResult`] with the extended part strategy
/// (property/event/boolean-attribute bindings).
#[macro_export]
macro_rules! html_ext {
    ($($segment:expr),+ ; $($value:expr),* $(,)?) => {
        $crate::template::TemplateResult::new(
            $crate::template_strings!($($segment),+),
            ::std::vec![$($crate::value::Value::from($value)),*],
            $crate::template::TemplateKind::Html,
            $crate::template::PartStrategy::Extended,
        )
    };
    ($($segment:expr),+ $(,)?) => { $crate::html_ext!($($segment),+ ;) };
}

/// Build an SVG [`TemplateResult`] with the default part strategy.
#[macro_export]
macro_rules! svg {
    ($($segment:expr),+ ; $($value:expr),* $(,)?) => {
        $crate::template::TemplateResult::new(
            $crate::template_strings!($($segment),+),
            ::std::vec![$($crate::value::Value::from($value)),*],
            $crate::template::TemplateKind::Svg,
            $crate::template::PartStrategy::Default,
        )
    };
    ($($segment:expr),+ $(,)?) => { $crate::svg!($($segment),+ ;) };
}
