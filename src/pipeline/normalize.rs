//! Payload isolation: strip markdown fences and surrounding prose from a raw
//! model response.
//!
//! Model answers often arrive wrapped in ` ```json ... ``` ` fences, with a
//! sentence of prose around the payload or with `\r\n` line endings. Every
//! parser calls into this module first. All functions are pure and never
//! fail: a response without fences is its own payload.

use serde::de::IgnoredAny;

/// Triple-backtick fence marker.
pub const FENCE: &str = "```";

/// Return the text strictly between the first and last fence marker, trimmed.
///
/// A language tag on the opening fence line (`json`, `markdown`, …) is not
/// part of the payload. With fewer than two markers the input is returned
/// unchanged.
pub fn extract_payload(raw: &str) -> &str {
    let (Some(first), Some(last)) = (raw.find(FENCE), raw.rfind(FENCE)) else {
        return raw;
    };
    if first == last {
        return raw;
    }
    strip_language_tag(&raw[first + FENCE.len()..last]).trim()
}

/// Whether `raw` contains at least one complete fenced block.
pub fn has_fenced_block(raw: &str) -> bool {
    matches!((raw.find(FENCE), raw.rfind(FENCE)), (Some(a), Some(b)) if a != b)
}

fn strip_language_tag(inner: &str) -> &str {
    let Some(newline) = inner.find('\n') else {
        return inner;
    };
    let tag = inner[..newline].trim();
    let is_tag = !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'));
    if is_tag {
        &inner[newline + 1..]
    } else {
        inner
    }
}

/// CRLF / lone CR → LF.
pub fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Every complete JSON value in `text` that begins at an `open` character,
/// in order of position.
///
/// Used when a JSON value is surrounded by prose without fences. An opener
/// in the prose (`"[1-10] scale"`) yields no candidate and does not hide a
/// later payload. Trailing text after a value is ignored.
pub fn json_candidates(text: &str, open: char) -> impl Iterator<Item = &str> + '_ {
    text.match_indices(open).filter_map(move |(start, _)| {
        let rest = &text[start..];
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<IgnoredAny>();
        match values.next() {
            Some(Ok(_)) => Some(&rest[..values.byte_offset()]),
            _ => None,
        }
    })
}
