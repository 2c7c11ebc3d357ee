//! Output truncation (spec §6, §8): any tool reply over
//! `MAX_OUTPUT_CHARS` is cut at the limit and followed by a fixed
//! footer naming the narrower alternatives.

use opensrc_domain::constants::MAX_OUTPUT_CHARS;

/// Footer appended to a truncated reply. Spec §8 requires it to begin
/// with `"--- TRUNCATED ---"`; the rest names the two API calls an
/// agent should reach for instead of re-requesting everything.
pub const TRUNCATION_FOOTER: &str = "\n--- TRUNCATED ---\nOutput exceeded the token budget and was cut short. Use opensrc.files to list a narrower set of paths, or opensrc.read to fetch one file at a time, instead of a single call returning everything.";

/// Cut `text` to `MAX_OUTPUT_CHARS` characters (not bytes, so
/// multi-byte UTF-8 content doesn't get sliced mid codepoint) and
/// append the footer when it doesn't fit whole.
pub fn truncate_output(text: &str) -> String {
    if text.chars().count() <= MAX_OUTPUT_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_OUTPUT_CHARS).collect();
    out.push_str(TRUNCATION_FOOTER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_untouched() {
        assert_eq!(truncate_output("hello"), "hello");
    }

    #[test]
    fn long_output_is_cut_exactly_and_footed() {
        let long = "x".repeat(1_000_000);
        let truncated = truncate_output(&long);
        let body_len = truncated.len() - TRUNCATION_FOOTER.len();
        assert_eq!(body_len, MAX_OUTPUT_CHARS);
        assert!(truncated.ends_with(TRUNCATION_FOOTER));
        assert!(truncated.contains("--- TRUNCATED ---"));
    }

    #[test]
    fn exactly_at_the_limit_is_untouched() {
        let exact = "y".repeat(MAX_OUTPUT_CHARS);
        assert_eq!(truncate_output(&exact), exact);
    }
}
