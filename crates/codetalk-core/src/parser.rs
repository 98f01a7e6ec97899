//! Message content parsing
//!
//! Splits raw assistant message text into an ordered sequence of plain
//! text and fenced code segments. Parsing is a pure function over the
//! message content: segments are derived at render time, never stored,
//! and re-parsing the same input always yields the same sequence.
//!
//! A fence opens with ``` followed immediately by an optional language
//! identifier and a newline, and closes at the first following ```.
//! The scanner is a single forward pass, so unterminated fences simply
//! fall through to trailing text instead of backtracking.

const FENCE: &str = "```";

/// One parsed unit of message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text between code fences, kept verbatim
    Text { content: String },
    /// A fenced code block, fence-stripped and trimmed
    Code { language: String, content: String },
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Parse message content into text and code segments.
///
/// Empty input yields an empty sequence; input without fences yields a
/// single verbatim text segment. A fence with no language tag gets the
/// language `"plaintext"`.
pub fn parse(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let bytes = content.as_bytes();
    let mut consumed = 0; // start of text not yet emitted
    let mut pos = 0; // scan position

    while let Some(found) = content[pos..].find(FENCE).map(|i| pos + i) {
        // Fence head: ``` + optional identifier + newline, no whitespace
        // in between. The identifier is ASCII, so byte scanning is safe.
        let mut head_end = found + FENCE.len();
        while head_end < bytes.len() && is_ident_byte(bytes[head_end]) {
            head_end += 1;
        }
        if head_end >= bytes.len() || bytes[head_end] != b'\n' {
            // Not an open marker. Resume just past the first backtick so
            // a run of extra backticks can still open a fence.
            pos = found + 1;
            continue;
        }

        let body_start = head_end + 1;
        let Some(close) = content[body_start..].find(FENCE).map(|i| body_start + i) else {
            // Unterminated fence: no match, falls through to trailing text
            break;
        };

        if found > consumed {
            segments.push(Segment::Text {
                content: content[consumed..found].to_string(),
            });
        }

        let tag = &content[found + FENCE.len()..head_end];
        let language = if tag.is_empty() {
            "plaintext".to_string()
        } else {
            tag.to_ascii_lowercase()
        };
        segments.push(Segment::Code {
            language,
            content: content[body_start..close].trim().to_string(),
        });

        consumed = close + FENCE.len();
        pos = consumed;
    }

    if consumed < content.len() {
        segments.push(Segment::Text {
            content: content[consumed..].to_string(),
        });
    }

    segments
}

/// Display colors for a language badge, as RGB pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeStyle {
    pub bg: (u8, u8, u8),
    pub fg: (u8, u8, u8),
}

const WHITE: (u8, u8, u8) = (255, 255, 255);

/// Badge colors for a language identifier.
///
/// Fixed lookup over known languages; anything unrecognized gets the
/// default gray badge. Case-insensitive, purely presentational.
pub fn style_for(language: &str) -> BadgeStyle {
    let bg = match language.to_ascii_lowercase().as_str() {
        "php" => (147, 51, 234),
        "javascript" => (202, 138, 4),
        "python" => (37, 99, 235),
        "java" => (220, 38, 38),
        "typescript" => (59, 130, 246),
        "css" => (236, 72, 153),
        "html" => (249, 115, 22),
        _ => {
            return BadgeStyle {
                bg: (31, 41, 55),
                fg: (229, 231, 235),
            }
        }
    };
    BadgeStyle { bg, fg: WHITE }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text {
            content: s.to_string(),
        }
    }

    fn code(lang: &str, s: &str) -> Segment {
        Segment::Code {
            language: lang.to_string(),
            content: s.to_string(),
        }
    }

    #[test]
    fn empty_input_yields_no_segments() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn input_without_fences_is_one_verbatim_text_segment() {
        let inputs = [
            "hello world",
            "  leading and trailing whitespace kept  ",
            "multi\nline\ntext",
            "a single ` backtick and a double `` too",
        ];
        for input in inputs {
            assert_eq!(parse(input), vec![text(input)]);
        }
    }

    #[test]
    fn splits_text_code_text() {
        let input = "before\n```js\nconsole.log(1)\n```\nafter";
        assert_eq!(
            parse(input),
            vec![text("before\n"), code("js", "console.log(1)"), text("\nafter")]
        );
    }

    #[test]
    fn fence_without_language_is_plaintext() {
        assert_eq!(parse("```\nhi\n```"), vec![code("plaintext", "hi")]);
    }

    #[test]
    fn language_tag_is_lowercased() {
        assert_eq!(parse("```PHP\necho 1;\n```"), vec![code("php", "echo 1;")]);
    }

    #[test]
    fn code_body_is_trimmed() {
        assert_eq!(
            parse("```python\n\n  x = 1  \n\n```"),
            vec![code("python", "x = 1")]
        );
    }

    #[test]
    fn adjacent_empty_fence_yields_empty_code_segment() {
        assert_eq!(parse("```\n```"), vec![code("plaintext", "")]);
    }

    #[test]
    fn multiple_fences_in_order() {
        let input = "a\n```js\n1\n```\nb\n```py\n2\n```\nc";
        assert_eq!(
            parse(input),
            vec![
                text("a\n"),
                code("js", "1"),
                text("\nb\n"),
                code("py", "2"),
                text("\nc"),
            ]
        );
    }

    #[test]
    fn fence_closes_at_first_marker_not_last() {
        // Non-greedy: the body ends at the first ```; the rest is text.
        let input = "```js\nfoo\n```\nbar\n```";
        assert_eq!(parse(input), vec![code("js", "foo"), text("\nbar\n```")]);
    }

    #[test]
    fn unterminated_fence_falls_through_to_text() {
        let input = "before\n```js\nnever closed";
        assert_eq!(parse(input), vec![text(input)]);
    }

    #[test]
    fn fence_head_with_space_is_not_a_fence() {
        // "``` js" has whitespace before the tag, so it never opens.
        let input = "``` js\ncode\n";
        assert_eq!(parse(input), vec![text(input)]);
    }

    #[test]
    fn extra_backtick_still_opens_a_fence() {
        // ````\n...: the first backtick is literal, the fence opens at
        // the second one.
        assert_eq!(
            parse("````\nhi\n```"),
            vec![text("`"), code("plaintext", "hi")]
        );
    }

    #[test]
    fn reparsing_is_idempotent() {
        let input = "a\n```rust\nfn main() {}\n```\nb";
        assert_eq!(parse(input), parse(input));
    }

    #[test]
    fn known_languages_have_distinct_badges() {
        let known = ["php", "javascript", "python", "java", "typescript", "css", "html"];
        let default = style_for("brainfuck");
        for lang in known {
            let style = style_for(lang);
            assert_ne!(style, default, "{lang} should not use the default badge");
            assert_eq!(style.fg, (255, 255, 255));
        }
    }

    #[test]
    fn style_lookup_is_case_insensitive() {
        assert_eq!(style_for("Python"), style_for("python"));
        assert_eq!(style_for("HTML"), style_for("html"));
    }

    #[test]
    fn unknown_language_falls_back_to_default() {
        assert_eq!(style_for("klingon"), style_for(""));
        assert_eq!(style_for("plaintext"), style_for("not-a-language"));
    }
}
