//! Widget helpers.

use compact_str::CompactString;

/// Join non-empty class-name fragments with single spaces.
pub fn cn(parts: &[&str]) -> CompactString {
    let mut out = CompactString::default();
    for part in parts {
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}
