//! Post-processing: light, deterministic cleanup of model transcriptions.
//!
//! The output documents are plain text, so unlike a Markdown pipeline there
//! is no structural repair here. Only artefacts that would show up as noise
//! in the text file or the PDF are removed:
//!
//! 1. An outer code fence around the whole reply
//! 2. CRLF / lone CR line endings
//! 3. Trailing whitespace on each line, and at the end of the text
//! 4. Invisible Unicode (zero-width spaces, BOM, soft hyphens)
//!
//! Leading indentation and blank lines inside the text are content and are
//! kept as-is.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule, in order.
pub fn clean_transcription(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    remove_invisible_chars(&s)
}

// ── Rule 1: Strip outer code fence ──────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace ────────────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_with_language_tag_is_stripped() {
        let input = "```text\n제목\n본문\n```";
        assert_eq!(clean_transcription(input), "제목\n본문");
    }

    #[test]
    fn inner_fences_are_kept() {
        let input = "앞\n```\ncode\n```\n뒤";
        assert_eq!(clean_transcription(input), input);
    }

    #[test]
    fn crlf_and_trailing_spaces() {
        let input = "line one  \r\nline two\t\r\n\r\n";
        assert_eq!(clean_transcription(input), "line one\nline two");
    }

    #[test]
    fn leading_indent_survives() {
        let input = "  indented\n\n\n    more";
        assert_eq!(clean_transcription(input), input);
    }

    #[test]
    fn invisible_characters_removed() {
        let input = "\u{FEFF}한\u{200B}글\u{00AD}";
        assert_eq!(clean_transcription(input), "한글");
    }

    #[test]
    fn sentinel_passes_through() {
        let s = crate::prompts::NO_TEXT_SENTINEL;
        assert_eq!(clean_transcription(s), s);
    }
}
