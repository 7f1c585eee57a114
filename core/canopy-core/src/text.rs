//! Small string helpers shared by the collector and the prompt builder.

/// Truncates to at most `max_chars` characters on a char boundary.
/// Returns the (possibly shortened) text and whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}
