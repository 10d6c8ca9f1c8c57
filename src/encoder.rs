//! Builds the prompt body from a list of source files.
//!
//! Every readable file becomes one `[FILE <path>]` block holding its raw
//! content. Content is never escaped, so a file that itself contains a
//! `[/FILE]` line will not decode back to the same bytes.

use crate::{
    block::{is_closing_marker, opening_marker, CLOSE_MARKER},
    error::{Error, Result},
    file::SourceFile,
    template::PromptTemplates,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First line of every prompt body.
const PREAMBLE: &str = "Help me with following files:";

/// Separates the system prompt from the message in the debug log.
const LOG_SEPARATOR: &str = "\n---\n";

/// The prompt body and what went into it.
#[derive(Debug, Clone, Default)]
pub struct EncodedPrompt {
    /// Preamble followed by one block per readable file
    pub body: String,

    /// Files that were read, in input order
    pub included: Vec<SourceFile>,

    /// Files that could not be read
    pub failures: Vec<Error>,
}

/// Encodes `paths` into a prompt body.
///
/// The preamble lists every supplied path, readable or not. Unreadable files
/// are recorded in [`EncodedPrompt::failures`] and skipped.
pub fn encode<P: AsRef<Path>>(paths: &[P]) -> EncodedPrompt {
    let listed = paths
        .iter()
        .map(|p| p.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ");

    let mut parts = vec![format!("{PREAMBLE} {listed}")];
    let mut prompt = EncodedPrompt::default();

    for path in paths {
        let path = path.as_ref();

        match SourceFile::read(PathBuf::from(path)) {
            Ok(file) => {
                if file.content.lines().any(is_closing_marker) {
                    warn!(
                        "{} contains a {} line; the response for it may not decode cleanly",
                        path.display(),
                        CLOSE_MARKER
                    );
                }

                parts.push(encode_block(&file.display_path(), &file.content));
                prompt.included.push(file);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                prompt.failures.push(e);
            }
        }
    }

    prompt.body = parts.join("\n");
    debug!(
        "Encoded {} files ({} failed) into {} bytes",
        prompt.included.len(),
        prompt.failures.len(),
        prompt.body.len()
    );
    prompt
}

/// Renders a single block: marker, content verbatim, closing marker.
#[must_use]
pub fn encode_block(path: &str, content: &str) -> String {
    [opening_marker(path).as_str(), content, CLOSE_MARKER].join("\n")
}

/// Appends the question and the formatting reminder to an encoded body.
///
/// # Errors
///
/// Returns an error if the message template fails to render.
pub fn compose_message(templates: &PromptTemplates, body: &str, question: &str) -> Result<String> {
    templates.render_message(body, question)
}

/// Persists the composed prompt for inspection, overwriting any previous log.
///
/// A failed write is logged and otherwise ignored.
pub fn write_debug_log(path: &Path, system: &str, message: &str) {
    let log = format!("{system}{LOG_SEPARATOR}{message}");

    match std::fs::write(path, log) {
        Ok(()) => debug!("Wrote prompt log to {}", path.display()),
        Err(e) => warn!("Could not write prompt log {}: {}", path.display(), e),
    }
}
