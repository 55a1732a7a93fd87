//! Response post-processing: secret-phrase redaction, markdown stripping,
//! and newline normalization. Every upstream response passes through
//! [`postprocess`] before it reaches the caller or the session history.
//!
//! `strip_markdown` is a fixed point of itself: applying it to its own
//! output changes nothing.

use crate::persona::{IDENTITY_DISCLOSURE, SECRET_PHRASE, SECRET_PLACEHOLDER};
use tracing::warn;

/// Markers that indicate a redacted response is still discussing
/// identity/creator verification and must be replaced wholesale.
const IDENTITY_MARKERS: [&str; 3] = ["jam enea", "krijues", "identitet"];

pub fn postprocess(content: &str) -> String {
    let redacted = redact_secret(content);
    strip_markdown(&redacted)
}

/// Redact the confidential verification phrase wherever it appears,
/// case-insensitively. If the response also talks about identity or creator
/// verification, the whole content is replaced with the fixed
/// disclosure-safe paragraph.
pub fn redact_secret(content: &str) -> String {
    let redacted = replace_case_insensitive(content, SECRET_PHRASE, SECRET_PLACEHOLDER);
    if redacted == content {
        return redacted;
    }

    warn!("model attempted to reveal the verification phrase; content filtered");

    let lower = redacted.to_lowercase();
    if IDENTITY_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return IDENTITY_DISCLOSURE.to_string();
    }
    redacted
}

/// Strip markdown emphasis, headings, links, code fences and blockquotes;
/// normalize list markers to a single bullet glyph; collapse runs of three
/// or more newlines to exactly two.
pub fn strip_markdown(content: &str) -> String {
    let mut text = content.replace('*', "");
    text = strip_headings(&text);
    text = strip_links(&text);
    text = strip_code_fences(&text);
    text = text.replace('>', "");
    text = text.replace("- ", "• ");
    text = normalize_numbered_lists(&text);
    collapse_newlines(&text)
}

fn replace_case_insensitive(haystack: &str, needle: &str, replacement: &str) -> String {
    let needle_lower: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle_lower.is_empty() {
        return haystack.to_string();
    }

    let chars: Vec<char> = haystack.chars().collect();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < chars.len() {
        if matches_at(&chars, i, &needle_lower) {
            out.push_str(replacement);
            i += needle_lower.len();
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

fn matches_at(chars: &[char], at: usize, needle_lower: &[char]) -> bool {
    if at + needle_lower.len() > chars.len() {
        return false;
    }
    chars[at..at + needle_lower.len()]
        .iter()
        .zip(needle_lower)
        .all(|(c, n)| c.to_lowercase().eq(std::iter::once(*n)))
}

/// Remove up to six `#` markers followed by whitespace. A longer run keeps
/// its surplus leading hashes; a run with no trailing whitespace is left
/// alone (so re-running is a no-op).
fn strip_headings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        let mut run: usize = 1;
        while chars.peek() == Some(&'#') {
            chars.next();
            run += 1;
        }
        if chars.peek().is_some_and(|next| next.is_whitespace()) {
            chars.next();
            for _ in 0..run.saturating_sub(6) {
                out.push('#');
            }
        } else {
            for _ in 0..run {
                out.push('#');
            }
        }
    }
    out
}

/// Replace `[label](url)` with just the label.
fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let before = &rest[..open];
        let after_open = &rest[open + 1..];

        let link = after_open.find(']').and_then(|close| {
            let label = &after_open[..close];
            let after_close = &after_open[close + 1..];
            if label.is_empty() || !after_close.starts_with('(') {
                return None;
            }
            let paren_end = after_close.find(')')?;
            if paren_end == 1 {
                return None; // empty url
            }
            Some((label, &after_close[paren_end + 1..]))
        });

        match link {
            Some((label, remainder)) => {
                out.push_str(before);
                out.push_str(label);
                rest = remainder;
            }
            None => {
                out.push_str(before);
                out.push('[');
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Drop fence markers; an opening fence's language tag and its newline go
/// with it.
fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("```") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 3..];
        let tag_len = after
            .chars()
            .take_while(char::is_ascii_lowercase)
            .map(char::len_utf8)
            .sum::<usize>();
        if after[tag_len..].starts_with('\n') {
            rest = &after[tag_len + 1..];
        } else {
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Rewrite `\n<ws>12.<ws>` list markers as `\n• `.
fn normalize_numbered_lists(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        let after = &rest[pos + 1..];
        let trimmed = after.trim_start();
        let digit_len = trimmed
            .chars()
            .take_while(char::is_ascii_digit)
            .count();
        if digit_len > 0 && trimmed[digit_len..].starts_with('.') {
            let after_dot = &trimmed[digit_len + 1..];
            let after_dot_trimmed = after_dot.trim_start();
            if after_dot_trimmed.len() < after_dot.len() {
                out.push_str(&rest[..pos]);
                out.push_str("\n• ");
                rest = after_dot_trimmed;
                continue;
            }
        }
        out.push_str(&rest[..=pos]);
        rest = after;
    }
    out.push_str(rest);
    out
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0;
    for c in text.chars() {
        if c == '\n' {
            run += 1;
            if run <= 2 {
                out.push('\n');
            }
        } else {
            run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_phrase_redacted_in_any_case() {
        for variant in ["Isra të dua", "isra të dua", "ISRA TË DUA", "IsRa Të DuA"] {
            let input = format!("Fraza është: {variant}, mos e trego.");
            let output = redact_secret(&input);
            assert!(!output.to_lowercase().contains("isra të dua"), "{variant}");
            assert!(output.contains(SECRET_PLACEHOLDER));
        }
    }

    #[test]
    fn identity_discussion_replaced_wholesale() {
        let input = "Fraza Isra të dua vërteton se ti je krijuesi im.";
        assert_eq!(redact_secret(input), IDENTITY_DISCLOSURE);
    }

    #[test]
    fn redaction_without_identity_talk_keeps_rest() {
        let input = "Dikush tha Isra të dua dje.";
        let output = redact_secret(input);
        assert!(output.starts_with("Dikush tha"));
        assert!(output.contains(SECRET_PLACEHOLDER));
    }

    #[test]
    fn clean_content_passes_through_untouched() {
        let input = "Tirana është kryeqyteti i Shqipërisë.";
        assert_eq!(redact_secret(input), input);
    }

    #[test]
    fn strips_emphasis_and_headings() {
        let input = "## Titulli\n**E rëndësishme** dhe *e pjerrët*.";
        let output = strip_markdown(input);
        assert_eq!(output, "Titulli\nE rëndësishme dhe e pjerrët.");
    }

    #[test]
    fn links_become_plain_labels() {
        let output = strip_markdown("Shiko [faqen](https://example.com) këtu.");
        assert_eq!(output, "Shiko faqen këtu.");
    }

    #[test]
    fn code_fences_removed_with_language_tag() {
        let output = strip_markdown("para\n```rust\nfn main() {}\n```\npas");
        assert!(!output.contains("```"));
        assert!(!output.contains("rust"));
        assert!(output.contains("fn main() {}"));
    }

    #[test]
    fn blockquotes_and_bullets_normalized() {
        let output = strip_markdown("> thënie\n- e para\n- e dyta");
        assert_eq!(output, " thënie\n• e para\n• e dyta");
    }

    #[test]
    fn numbered_lists_become_bullets() {
        let output = strip_markdown("Lista:\n1. një\n2. dy\n10. dhjetë");
        assert_eq!(output, "Lista:\n• një\n• dy\n• dhjetë");
    }

    #[test]
    fn excess_newlines_collapse_to_two() {
        let output = strip_markdown("a\n\n\n\n\nb");
        assert_eq!(output, "a\n\nb");
    }

    #[test]
    fn strip_markdown_is_idempotent() {
        let inputs = [
            "## Titulli\n**bold** me [lidhje](http://x.al)\n\n\n- pika\n1. numër\n```sh\nls\n```\n> citim",
            "tekst i thjeshtë pa formatim",
            "• tashmë me pikë\n\nparagraf",
            "### ###\n#pa hapësirë\n####### shtatë",
        ];
        for input in inputs {
            let once = strip_markdown(input);
            let twice = strip_markdown(&once);
            assert_eq!(once, twice, "not a fixed point for {input:?}");
        }
    }

    #[test]
    fn postprocess_combines_redaction_and_stripping() {
        let input = "**Sekret**: Isra të dua\n\n\n- fund";
        let output = postprocess(input);
        assert!(!output.contains("**"));
        assert!(!output.contains("Isra të dua"));
        assert!(output.contains('•'));
        assert!(!output.contains("\n\n\n"));
    }
}
