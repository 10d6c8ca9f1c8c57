//! Parser that turns a model response back into file blocks.
//!
//! The decoder is a two-state line scanner. Outside a block it looks for an
//! opening marker and ignores everything else; inside a block it accumulates
//! lines until the closing marker. Optional code fences directly inside the
//! markers are dropped. A block that is never closed stops decoding: nothing
//! after it is trusted.

use crate::{
    block::{is_bare_fence, is_closing_marker, is_opening_fence, parse_opening_marker, FileBlock},
    error::Error,
};
use tracing::{debug, trace, warn};

/// Result of decoding a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    /// Blocks in the order their opening markers appeared
    pub blocks: Vec<FileBlock>,

    /// Opening line of a block that was never closed, if any
    pub truncated: Option<usize>,
}

impl DecodeOutcome {
    /// Returns true if no complete block was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the truncation diagnostic, if decoding stopped early.
    #[must_use]
    pub fn diagnostic(&self) -> Option<Error> {
        self.truncated.map(|line| Error::TruncatedBlock { line })
    }
}

/// Decodes file blocks from a sequence of lines.
///
/// Lines may still carry their terminators; all comparisons trim them. This
/// function never fails: malformed input yields fewer blocks, and an unclosed
/// block is reported through [`DecodeOutcome::truncated`].
pub fn decode<I>(lines: I) -> DecodeOutcome
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut outcome = DecodeOutcome::default();
    let mut lines = lines.into_iter().enumerate().peekable();

    while let Some((index, line)) = lines.next() {
        let Some(path) = parse_opening_marker(line.as_ref()) else {
            continue;
        };
        let path = path.to_string();
        let line_number = index + 1;
        trace!("Block for '{}' opened at line {}", path, line_number);

        if lines
            .peek()
            .is_some_and(|(_, next)| is_opening_fence(next.as_ref()))
        {
            lines.next();
        }

        let mut content = Vec::new();
        let mut closed = false;

        while let Some((_, current)) = lines.next() {
            let current = current.as_ref();

            if is_closing_marker(current) {
                closed = true;
                break;
            }

            if is_bare_fence(current)
                && lines
                    .peek()
                    .is_some_and(|(_, next)| is_closing_marker(next.as_ref()))
            {
                lines.next();
                closed = true;
                break;
            }

            content.push(current.trim_end().to_string());
        }

        if !closed {
            warn!(
                "Missing [/FILE] marker for file block at line {}",
                line_number
            );
            outcome.truncated = Some(line_number);
            break;
        }

        outcome
            .blocks
            .push(FileBlock::new(path, content.join("\n"), line_number));
    }

    debug!("Decoded {} file blocks", outcome.blocks.len());
    outcome
}

/// Decodes file blocks from a complete response text.
pub fn decode_str(text: &str) -> DecodeOutcome {
    decode(text.lines())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(outcome: &DecodeOutcome) -> Vec<&str> {
        outcome.blocks.iter().map(|b| b.path.as_str()).collect()
    }

    #[test]
    fn test_single_block() {
        let outcome = decode_str("[FILE src/lib.rs]\npub fn a() {}\n[/FILE]\n");
        assert_eq!(
            outcome.blocks,
            vec![FileBlock::new("src/lib.rs", "pub fn a() {}", 1)]
        );
        assert!(outcome.truncated.is_none());
        assert!(outcome.diagnostic().is_none());
    }

    #[test]
    fn test_empty_content() {
        let outcome = decode_str("[FILE a.txt]\n[/FILE]");
        assert_eq!(outcome.blocks, vec![FileBlock::new("a.txt", "", 1)]);
    }

    #[test]
    fn test_empty_path_is_accepted() {
        let outcome = decode_str("[FILE ]\nbody\n[/FILE]");
        assert_eq!(outcome.blocks, vec![FileBlock::new("", "body", 1)]);
    }

    #[test]
    fn test_fence_variants_decode_identically() {
        let variants = [
            "[FILE a.py]\nprint('hi')\n\nx = 1\n[/FILE]",
            "[FILE a.py]\n```python\nprint('hi')\n\nx = 1\n[/FILE]",
            "[FILE a.py]\nprint('hi')\n\nx = 1\n```\n[/FILE]",
            "[FILE a.py]\n```python\nprint('hi')\n\nx = 1\n```\n[/FILE]",
        ];

        for variant in variants {
            let outcome = decode_str(variant);
            assert_eq!(outcome.blocks.len(), 1, "variant: {variant:?}");
            assert_eq!(outcome.blocks[0].content, "print('hi')\n\nx = 1");
        }
    }

    #[test]
    fn test_empty_fenced_block() {
        let outcome = decode_str("[FILE a.txt]\n```\n```\n[/FILE]");
        assert_eq!(outcome.blocks[0].content, "");
    }

    #[test]
    fn test_noise_between_blocks_is_ignored() {
        let text = "Sure! Here are the files.\n\
                    \n\
                    [FILE one.txt]\n\
                    first\n\
                    [/FILE]\n\
                    Some commentary about the change.\n\
                    [FILE two.txt]\n\
                    second\n\
                    [/FILE]\n\
                    Let me know if you need anything else.";
        let outcome = decode_str(text);

        assert_eq!(paths(&outcome), vec!["one.txt", "two.txt"]);
        assert_eq!(outcome.blocks[0].content, "first");
        assert_eq!(outcome.blocks[1].content, "second");
        assert_eq!(outcome.blocks[0].line_number, 3);
        assert_eq!(outcome.blocks[1].line_number, 7);
    }

    #[test]
    fn test_truncated_tail_keeps_earlier_blocks() {
        let text = "[FILE a.txt]\nA\n[/FILE]\n[FILE b.txt]\nB\n";
        let outcome = decode_str(text);

        assert_eq!(paths(&outcome), vec!["a.txt"]);
        assert_eq!(outcome.truncated, Some(4));
        assert!(matches!(
            outcome.diagnostic(),
            Some(Error::TruncatedBlock { line: 4 })
        ));
    }

    #[test]
    fn test_truncated_only_block() {
        let outcome = decode_str("[FILE a.txt]\n```rust\nfn main() {}\n");
        assert!(outcome.is_empty());
        assert_eq!(outcome.truncated, Some(1));
    }

    #[test]
    fn test_truncation_stops_decoding() {
        // `[FILE b.txt]` is content of the first block; `c.txt` never closes.
        let text = "[FILE a.txt]\nA\n[FILE b.txt]\nB\n[/FILE]\n[FILE c.txt]\nC\n";
        let outcome = decode_str(text);

        assert_eq!(paths(&outcome), vec!["a.txt"]);
        assert_eq!(outcome.blocks[0].content, "A\n[FILE b.txt]\nB");
        assert_eq!(outcome.truncated, Some(6));
    }

    #[test]
    fn test_nested_marker_is_content() {
        let text = "[FILE docs.md]\nUse it like:\n[FILE example.txt]\n[/FILE]";
        let outcome = decode_str(text);

        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].content, "Use it like:\n[FILE example.txt]");
    }

    #[test]
    fn test_whitespace_handling() {
        let text = "[FILE a.py]   \ndef f():\n    return 1   \n   \n\t\n[/FILE]";
        let outcome = decode_str(text);

        assert_eq!(outcome.blocks[0].path, "a.py");
        assert_eq!(outcome.blocks[0].content, "def f():\n    return 1\n\n");
    }

    #[test]
    fn test_indented_closing_marker_closes() {
        let outcome = decode_str("[FILE a.txt]\nbody\n    [/FILE]   ");
        assert_eq!(outcome.blocks[0].content, "body");
    }

    #[test]
    fn test_fence_not_followed_by_marker_is_content() {
        let text = "[FILE README.md]\n# Title\n```\ncode\n```\n\n[/FILE]";
        let outcome = decode_str(text);

        assert_eq!(outcome.blocks[0].content, "# Title\n```\ncode\n```\n");
    }

    #[test]
    fn test_language_fence_before_marker_is_content() {
        let outcome = decode_str("[FILE a.txt]\nx\n```text\n[/FILE]");
        assert_eq!(outcome.blocks[0].content, "x\n```text");
    }

    #[test]
    fn test_duplicate_paths_are_independent() {
        let text = "[FILE a.txt]\nold\n[/FILE]\n[FILE a.txt]\nnew\n[/FILE]";
        let outcome = decode_str(text);

        assert_eq!(
            outcome.blocks,
            vec![
                FileBlock::new("a.txt", "old", 1),
                FileBlock::new("a.txt", "new", 4),
            ]
        );
    }

    #[test]
    fn test_crlf_lines() {
        let outcome = decode_str("[FILE a.txt]\r\none\r\ntwo\r\n[/FILE]\r\n");
        assert_eq!(outcome.blocks[0].content, "one\ntwo");
    }

    #[test]
    fn test_decode_accepts_lines_with_terminators() {
        let lines = vec![
            "noise\n".to_string(),
            "[FILE a.txt]\n".to_string(),
            "hello\n".to_string(),
            "[/FILE]\n".to_string(),
        ];
        let outcome = decode(&lines);

        assert_eq!(outcome.blocks, vec![FileBlock::new("a.txt", "hello", 2)]);
    }

    #[test]
    fn test_no_blocks() {
        let outcome = decode_str("I could not find anything to change.");
        assert!(outcome.is_empty());
        assert!(outcome.truncated.is_none());

        let outcome = decode(Vec::<String>::new());
        assert!(outcome.is_empty());
    }
}
