use std::borrow::Cow;

use select::document::Document;
use select::node::Node;
use select::predicate::Text;

/// Ellipsis appended when an excerpt is cut without a sentence boundary
const ELLIPSIS: &str = "...";

/// Maximum excerpt length in characters, ellipsis excluded
pub const EXCERPT_MAX_CHARS: usize = 200;

/// A `.` at or after this character index ends the excerpt early
pub const SENTENCE_MIN_INDEX: usize = 100;

/// Elements whose text is never part of the readable content
const IGNORED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Strips markup and returns the readable text with whitespace collapsed.
///
/// Text nodes are joined with a single space so adjacent block elements do
/// not run together. Entities are decoded by the HTML parser. Plain text
/// input passes through unchanged apart from whitespace collapsing.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let document = Document::from(html);
    let mut out = String::with_capacity(html.len());
    for node in document.find(Text) {
        if in_ignored_element(&node) {
            continue;
        }
        if let Some(text) = node.as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }

    collapse_whitespace(&out).into_owned()
}

fn in_ignored_element(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent
            .name()
            .is_some_and(|name| IGNORED_ELEMENTS.contains(&name))
        {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Collapses every whitespace run to one ASCII space and trims both ends.
///
/// Returns `Cow::Borrowed` when the input is already normalized.
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let mut prev_space = true;
    let normalized = s.chars().all(|c| {
        let ok = !c.is_whitespace() || (c == ' ' && !prev_space);
        prev_space = c.is_whitespace();
        ok
    }) && !s.ends_with(' ');

    if normalized {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}

/// Derives the stored excerpt from cleaned text.
///
/// - Text of at most [`EXCERPT_MAX_CHARS`] characters is returned whole.
/// - Otherwise the first [`EXCERPT_MAX_CHARS`] characters are taken; if the
///   last `.` among them sits at index [`SENTENCE_MIN_INDEX`] or later the
///   excerpt ends at that period.
/// - Otherwise `"..."` is appended.
///
/// Lengths are counted in `char`s, so multi-byte text is never split inside
/// a code point.
///
/// # Examples
///
/// ```
/// use pulse::content::excerpt;
///
/// assert_eq!(excerpt("Short text."), "Short text.");
/// let long = "a".repeat(250);
/// assert_eq!(excerpt(&long).chars().count(), 203);
/// ```
pub fn excerpt(text: &str) -> Cow<'_, str> {
    let Some((cut, _)) = text.char_indices().nth(EXCERPT_MAX_CHARS) else {
        return Cow::Borrowed(text);
    };
    let head = &text[..cut];

    let boundary = head
        .char_indices()
        .enumerate()
        .filter(|(_, (_, c))| *c == '.')
        .last()
        .filter(|(char_idx, _)| *char_idx >= SENTENCE_MIN_INDEX);

    match boundary {
        Some((_, (byte_idx, _))) => Cow::Borrowed(&text[..=byte_idx]),
        None => Cow::Owned(format!("{head}{ELLIPSIS}")),
    }
}
