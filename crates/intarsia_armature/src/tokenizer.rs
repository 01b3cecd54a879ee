//! HTML fragment tokenizer.
//!
//! A lenient state machine over bytes, in the manner of the htmlparser2
//! lineage: unknown constructs degrade to text, attribute names are
//! lowercased, raw-text elements swallow markup until their closing tag.

use compact_str::CompactString;

/// Character codes for fast comparison
mod char_codes {
    pub const TAB: u8 = 0x09;
    pub const NEWLINE: u8 = 0x0A;
    pub const FORM_FEED: u8 = 0x0C;
    pub const CARRIAGE_RETURN: u8 = 0x0D;
    pub const SPACE: u8 = 0x20;
    pub const EXCLAMATION_MARK: u8 = 0x21;
    pub const DOUBLE_QUOTE: u8 = 0x22;
    pub const AMP: u8 = 0x26;
    pub const SINGLE_QUOTE: u8 = 0x27;
    pub const SLASH: u8 = 0x2F;
    pub const LT: u8 = 0x3C;
    pub const EQ: u8 = 0x3D;
    pub const GT: u8 = 0x3E;
}

use char_codes::*;

/// What the sink wants done with an opened element's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    /// Parse children normally.
    Normal,
    /// Treat content as raw text until the matching close tag.
    RawText,
}

/// Receiver for tokenizer events.
pub trait Sink {
    fn text(&mut self, text: &str);
    fn comment(&mut self, text: &str);
    fn open_tag_start(&mut self, name: &str);
    fn attribute(&mut self, name: &str, value: &str);
    fn open_tag_end(&mut self, self_closing: bool) -> TagAction;
    fn close_tag(&mut self, name: &str);
}

/// All the states the tokenizer can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    TagOpen,
    InTagName,
    BeforeClosingTagName,
    InClosingTagName,
    AfterClosingTagName,
    BeforeAttrName,
    InAttrName,
    AfterAttrName,
    BeforeAttrValue,
    InAttrValueDq,
    InAttrValueSq,
    InAttrValueNq,
    InSelfClosing,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, TAB | NEWLINE | FORM_FEED | CARRIAGE_RETURN | SPACE)
}

fn is_tag_start(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// Decode the handful of named/basic entities templates actually use.
fn decode_entities(raw: &str) -> CompactString {
    if !raw.contains('&') {
        return CompactString::from(raw);
    }
    let mut out = CompactString::default();
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
            ("&#39;", '\''),
        ]
        .iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match decoded {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Tokenize `source`, feeding events into `sink`.
pub fn tokenize<S: Sink>(source: &str, sink: &mut S) {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut state = State::Text;
    let mut pos = 0;
    let mut section = 0;
    let mut tag_name = CompactString::default();
    let mut attr_name = CompactString::default();

    macro_rules! flush_text {
        ($end:expr) => {
            if section < $end {
                sink.text(&decode_entities(&source[section..$end]));
            }
        };
    }

    while pos < len {
        let b = bytes[pos];
        match state {
            State::Text => {
                if b == LT {
                    if pos + 1 < len && bytes[pos + 1] == EXCLAMATION_MARK {
                        flush_text!(pos);
                        pos = scan_markup_declaration(source, pos, sink);
                        section = pos;
                        continue;
                    } else if pos + 1 < len && bytes[pos + 1] == SLASH {
                        flush_text!(pos);
                        state = State::BeforeClosingTagName;
                        pos += 2;
                        section = pos;
                        continue;
                    } else if pos + 1 < len && is_tag_start(bytes[pos + 1]) {
                        flush_text!(pos);
                        state = State::TagOpen;
                        pos += 1;
                        section = pos;
                        continue;
                    }
                }
                pos += 1;
            }
            State::TagOpen => {
                state = State::InTagName;
                section = pos;
            }
            State::InTagName => {
                if is_whitespace(b) || b == GT || b == SLASH {
                    tag_name = CompactString::from(source[section..pos].to_ascii_lowercase());
                    sink.open_tag_start(&tag_name);
                    state = State::BeforeAttrName;
                } else {
                    pos += 1;
                }
            }
            State::BeforeAttrName => {
                if b == GT {
                    pos += 1;
                    section = pos;
                    match sink.open_tag_end(false) {
                        TagAction::RawText => {
                            pos = scan_raw_text(source, pos, &tag_name, sink);
                            section = pos;
                        }
                        TagAction::Normal => {}
                    }
                    state = State::Text;
                } else if b == SLASH {
                    state = State::InSelfClosing;
                    pos += 1;
                } else if is_whitespace(b) {
                    pos += 1;
                } else {
                    state = State::InAttrName;
                    section = pos;
                }
            }
            State::InSelfClosing => {
                if b == GT {
                    sink.open_tag_end(true);
                    pos += 1;
                    section = pos;
                    state = State::Text;
                } else if is_whitespace(b) {
                    pos += 1;
                } else {
                    // Stray slash inside a tag, back to attribute scanning
                    state = State::BeforeAttrName;
                }
            }
            State::InAttrName => {
                if b == EQ || is_whitespace(b) || b == GT || b == SLASH {
                    attr_name = CompactString::from(source[section..pos].to_ascii_lowercase());
                    state = if b == EQ {
                        pos += 1;
                        State::BeforeAttrValue
                    } else {
                        State::AfterAttrName
                    };
                } else {
                    pos += 1;
                }
            }
            State::AfterAttrName => {
                if b == EQ {
                    state = State::BeforeAttrValue;
                    pos += 1;
                } else if is_whitespace(b) {
                    pos += 1;
                } else {
                    // Value-less attribute
                    sink.attribute(&attr_name, "");
                    state = State::BeforeAttrName;
                }
            }
            State::BeforeAttrValue => {
                if b == DOUBLE_QUOTE {
                    state = State::InAttrValueDq;
                    pos += 1;
                    section = pos;
                } else if b == SINGLE_QUOTE {
                    state = State::InAttrValueSq;
                    pos += 1;
                    section = pos;
                } else if is_whitespace(b) {
                    pos += 1;
                } else {
                    state = State::InAttrValueNq;
                    section = pos;
                }
            }
            State::InAttrValueDq | State::InAttrValueSq => {
                let quote = if state == State::InAttrValueDq {
                    DOUBLE_QUOTE
                } else {
                    SINGLE_QUOTE
                };
                if b == quote {
                    sink.attribute(&attr_name, &decode_entities(&source[section..pos]));
                    state = State::BeforeAttrName;
                }
                pos += 1;
            }
            State::InAttrValueNq => {
                if is_whitespace(b) || b == GT {
                    sink.attribute(&attr_name, &decode_entities(&source[section..pos]));
                    state = State::BeforeAttrName;
                } else {
                    pos += 1;
                }
            }
            State::BeforeClosingTagName => {
                if is_whitespace(b) {
                    pos += 1;
                } else {
                    state = State::InClosingTagName;
                    section = pos;
                }
            }
            State::InClosingTagName => {
                if b == GT || is_whitespace(b) {
                    sink.close_tag(&source[section..pos].to_ascii_lowercase());
                    state = State::AfterClosingTagName;
                } else {
                    pos += 1;
                }
            }
            State::AfterClosingTagName => {
                if b == GT {
                    state = State::Text;
                    pos += 1;
                    section = pos;
                } else {
                    pos += 1;
                }
            }
        }
    }

    // Flush whatever trails
    match state {
        State::Text => flush_text!(len),
        State::InAttrValueDq | State::InAttrValueSq | State::InAttrValueNq => {
            sink.attribute(&attr_name, &decode_entities(&source[section..len]));
            sink.open_tag_end(false);
        }
        State::InTagName => {
            sink.open_tag_start(&source[section..len].to_ascii_lowercase());
            sink.open_tag_end(false);
        }
        State::BeforeAttrName | State::AfterAttrName | State::BeforeAttrValue
        | State::InSelfClosing => {
            sink.open_tag_end(false);
        }
        State::InAttrName => {
            sink.attribute(&source[section..len].to_ascii_lowercase(), "");
            sink.open_tag_end(false);
        }
        _ => {}
    }
}

/// Consume `<!-- ... -->` (emitting a comment) or a bogus `<! ... >` block.
/// Returns the position just past the construct.
fn scan_markup_declaration<S: Sink>(source: &str, start: usize, sink: &mut S) -> usize {
    let rest = &source[start..];
    if rest.starts_with("<!--") {
        let body_start = start + 4;
        match memchr::memmem::find(source[body_start..].as_bytes(), b"-->") {
            Some(rel) => {
                sink.comment(&source[body_start..body_start + rel]);
                body_start + rel + 3
            }
            None => {
                sink.comment(&source[body_start..]);
                source.len()
            }
        }
    } else {
        match memchr::memchr(GT, source[start..].as_bytes()) {
            Some(rel) => start + rel + 1,
            None => source.len(),
        }
    }
}

/// Consume raw-text content up to `</name`, emit it as text, and emit the
/// close tag. Returns the position just past the close tag.
fn scan_raw_text<S: Sink>(source: &str, start: usize, name: &str, sink: &mut S) -> usize {
    let lower = source.to_ascii_lowercase();
    let needle = format!("</{name}");
    let mut search = start;
    loop {
        match memchr::memmem::find(lower[search..].as_bytes(), needle.as_bytes()) {
            Some(rel) => {
                let at = search + rel;
                let after = lower.as_bytes().get(at + needle.len()).copied();
                let terminates = matches!(after, None | Some(GT))
                    || after.map(is_whitespace).unwrap_or(false)
                    || after == Some(SLASH);
                if terminates {
                    if start < at {
                        sink.text(&source[start..at]);
                    }
                    sink.close_tag(name);
                    let close_end = memchr::memchr(GT, source[at..].as_bytes())
                        .map(|rel| at + rel + 1)
                        .unwrap_or(source.len());
                    return close_end;
                }
                search = at + 1;
            }
            None => {
                if start < source.len() {
                    sink.text(&source[start..]);
                }
                sink.close_tag(name);
                return source.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<String>,
        raw_text_tags: Vec<&'static str>,
    }

    impl Sink for RecordingSink {
        fn text(&mut self, text: &str) {
            self.events.push(format!("text:{text}"));
        }
        fn comment(&mut self, text: &str) {
            self.events.push(format!("comment:{text}"));
        }
        fn open_tag_start(&mut self, name: &str) {
            self.events.push(format!("open:{name}"));
        }
        fn attribute(&mut self, name: &str, value: &str) {
            self.events.push(format!("attr:{name}={value}"));
        }
        fn open_tag_end(&mut self, self_closing: bool) -> TagAction {
            self.events.push(format!("end:{self_closing}"));
            let last_open = self
                .events
                .iter()
                .rev()
                .find_map(|e| e.strip_prefix("open:"));
            if let Some(name) = last_open {
                if self.raw_text_tags.contains(&name) && !self_closing {
                    return TagAction::RawText;
                }
            }
            TagAction::Normal
        }
        fn close_tag(&mut self, name: &str) {
            self.events.push(format!("close:{name}"));
        }
    }

    fn run(source: &str) -> Vec<String> {
        let mut sink = RecordingSink {
            raw_text_tags: vec!["style", "script"],
            ..RecordingSink::default()
        };
        tokenize(source, &mut sink);
        sink.events
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            run("<div>hello</div>"),
            vec!["open:div", "end:false", "text:hello", "close:div"]
        );
    }

    #[test]
    fn test_attributes() {
        assert_eq!(
            run(r#"<input type="radio" checked value=x />"#),
            vec![
                "open:input",
                "attr:type=radio",
                "attr:checked=",
                "attr:value=x",
                "end:true"
            ]
        );
    }

    #[test]
    fn test_attribute_case_lowered_value_preserved() {
        assert_eq!(
            run(r#"<div someProp="MiXeD"></div>"#),
            vec!["open:div", "attr:someprop=MiXeD", "end:false", "close:div"]
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(
            run("a<!--marker-->b"),
            vec!["text:a", "comment:marker", "text:b"]
        );
    }

    #[test]
    fn test_raw_text_keeps_markup() {
        assert_eq!(
            run("<style>.a { color: red; }<!--x--></style>"),
            vec![
                "open:style",
                "end:false",
                "text:.a { color: red; }<!--x-->",
                "close:style"
            ]
        );
    }

    #[test]
    fn test_stray_lt_is_text() {
        assert_eq!(run("1 < 2"), vec!["text:1 < 2"]);
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(run("a &amp; b"), vec!["text:a & b"]);
        assert_eq!(
            run(r#"<div title="a&quot;b"></div>"#),
            vec!["open:div", "attr:title=a\"b", "end:false", "close:div"]
        );
    }
}
