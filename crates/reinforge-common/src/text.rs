//! Small text helpers for surfacing tool output.

/// Return at most the last `max_chars` characters of `text`.
///
/// Counts characters, not bytes, so multi-byte output from external tools
/// never gets split mid-codepoint.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
