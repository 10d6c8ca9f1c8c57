//! The `[FILE path] ... [/FILE]` block markup shared by the encoder and decoder.

use serde::Serialize;

/// Tag name used by both markers.
pub const TAG: &str = "FILE";

/// Literal prefix of an opening marker line, including the separating space.
pub const OPEN_PREFIX: &str = "[FILE ";

/// Suffix of an opening marker line.
pub const OPEN_SUFFIX: &str = "]";

/// The closing marker line.
pub const CLOSE_MARKER: &str = "[/FILE]";

/// Code fence that may wrap block content.
pub const FENCE: &str = "```";

/// One file carried through the block stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileBlock {
    /// Path exactly as written in the opening marker (trimmed)
    pub path: String,

    /// File body; lines joined with `\n`, never with a trailing newline
    pub content: String,

    /// 1-based line of the opening marker in the decoded stream
    pub line_number: usize,
}

impl FileBlock {
    /// Creates a new block.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>, line_number: usize) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            line_number,
        }
    }

    /// Size of the content in bytes as it will be written.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.content.len()
    }
}

/// Renders the opening marker for `path`.
#[must_use]
pub fn opening_marker(path: &str) -> String {
    format!("{OPEN_PREFIX}{path}{OPEN_SUFFIX}")
}

/// Extracts the path from an opening marker line.
///
/// Trailing whitespace is ignored; the path itself is trimmed. Returns `None`
/// when the line is not an opening marker.
#[must_use]
pub fn parse_opening_marker(line: &str) -> Option<&str> {
    line.trim_end()
        .strip_prefix(OPEN_PREFIX)?
        .strip_suffix(OPEN_SUFFIX)
        .map(str::trim)
}

/// Returns true if the line is the closing marker, ignoring surrounding whitespace.
#[must_use]
pub fn is_closing_marker(line: &str) -> bool {
    line.trim() == CLOSE_MARKER
}

/// Returns true if the line opens a fence, with or without a language tag.
#[must_use]
pub fn is_opening_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

/// Returns true if the line is a bare fence.
#[must_use]
pub fn is_bare_fence(line: &str) -> bool {
    line.trim() == FENCE
}
