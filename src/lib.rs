//! # llm-blocks
//!
//! Round-trips whole source files through a large language model using a
//! line-oriented block markup.
//!
//! ````text
//! [FILE src/main.rs]
//! ```rust
//! fn main() {}
//! ```
//! [/FILE]
//! ````
//!
//! ## Features
//!
//! - Project discovery honouring `.gitignore` and `.dockerignore`
//! - Streaming requests with extended thinking and image attachments
//! - A forgiving decoder that skips commentary and optional code fences
//! - Atomic whole-file writes with optional backups
//!
//! ## Quick Start
//!
//! ```no_run
//! use llm_blocks::{apply, Config, PromptPipeline};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::builder().root_dir(".").build()?;
//!
//! PromptPipeline::new(config.clone())?.run("Add doc comments", &[], &[])?;
//! apply(Path::new(".response.md"), &config)?.print_summary();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Scanner**: Discovers project files when none are named
//! 2. **Encoder**: Wraps each file in a block and composes the message
//! 3. **Model**: Streams the answer as typed fragments
//! 4. **Decoder**: Recovers `(path, content, line)` blocks from the answer
//! 5. **Writer**: Persists each block as a whole file

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod attachment;
mod config;
mod error;
mod file;
mod filter;
mod pipeline;
mod scanner;
mod template;
mod writer;

pub mod block;
pub mod decoder;
pub mod encoder;
pub mod model;

pub use attachment::{Attachment, ImageSource};
pub use block::FileBlock;
pub use config::{Config, ConfigBuilder, API_KEY_ENV};
pub use decoder::{decode, decode_str, DecodeOutcome};
pub use encoder::{encode, EncodedPrompt};
pub use error::{Error, Result};
pub use file::SourceFile;
pub use filter::FileFilterConfig;
pub use pipeline::{apply, apply_text, ApplyStats, PromptPipeline, PromptStats};
pub use template::PromptTemplates;
pub use writer::{ApplyReport, WrittenFile, Writer};

/// Sends `files` (or the scanned project, if empty) with `question` to the
/// configured model and saves the answer.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid or no API key is available
/// - No files are named and discovery finds nothing
/// - The request or response stream fails
/// - The response file cannot be written
///
/// # Examples
///
/// ```no_run
/// use llm_blocks::{prompt, Config};
///
/// # fn main() -> anyhow::Result<()> {
/// let config = Config::builder().build()?;
/// prompt(config, "Explain the decoder", &["src/decoder.rs".into()], &[])?;
/// # Ok(())
/// # }
/// ```
pub fn prompt(
    config: Config,
    question: &str,
    files: &[std::path::PathBuf],
    attachments: &[String],
) -> Result<PromptStats> {
    PromptPipeline::new(config)?.run(question, files, attachments)
}
