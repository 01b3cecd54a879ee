//! Template literal identity.
//!
//! Each `html!` callsite owns a static [`StringsCell`]; the cell hands out a
//! [`TemplateStrings`] whose key is allocated once per cell. The key, not the
//! segment text, is the template cache identity: two callsites with identical
//! text are two templates, one callsite in a loop is one.

use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Registration handle identifying one template literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringsKey(u64);

/// Per-callsite static holding the literal segments and their key slot.
pub struct StringsCell {
    segments: &'static [&'static str],
    key: OnceCell<u64>,
}

impl StringsCell {
    /// Create a cell. Used through the `template_strings!` macro.
    pub const fn new(segments: &'static [&'static str]) -> Self {
        Self {
            segments,
            key: OnceCell::new(),
        }
    }

    /// The literal handle, allocating the key on first use.
    pub fn strings(&'static self) -> TemplateStrings {
        let key = *self
            .key
            .get_or_init(|| NEXT_KEY.fetch_add(1, Ordering::Relaxed));
        TemplateStrings {
            key: StringsKey(key),
            segments: self.segments,
        }
    }
}

/// The ordered literal segments of one template, plus identity. There is
/// always one more segment than there are interpolated expressions.
#[derive(Debug, Clone, Copy)]
pub struct TemplateStrings {
    pub key: StringsKey,
    pub segments: &'static [&'static str],
}

impl TemplateStrings {
    /// Number of interpolated expressions.
    pub fn expression_count(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

/// Capture a template literal's segments with stable identity.
#[macro_export]
macro_rules! template_strings {
    ($($segment:expr),+ $(,)?) => {{
        static CELL: $crate::template::StringsCell =
            $crate::template::StringsCell::new(&[$($segment),+]);
        CELL.strings()
    }};
}
