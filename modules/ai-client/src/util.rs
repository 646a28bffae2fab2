/// Truncate a string to at most `max_bytes` bytes without splitting a character.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Strip a surrounding markdown code fence (```json ... ```) from model output.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_multibyte_characters() {
        let text = "Café Olé";
        let cut = truncate_to_char_boundary(text, 4);
        assert_eq!(cut, "Caf");
        assert_eq!(truncate_to_char_boundary(text, 64), text);
    }

    #[test]
    fn fences_are_removed() {
        assert_eq!(strip_code_blocks("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_blocks("  plain text "), "plain text");
    }
}
