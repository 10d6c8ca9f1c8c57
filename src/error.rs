use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the llm-blocks library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A source file could not be read while building a prompt.
    ///
    /// Never fatal to the batch: the file is skipped and reported.
    #[error("Failed to read '{path}': {message}")]
    Read {
        /// Path of the unreadable file
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// A file block was opened but never closed before the input ended.
    #[error("Missing [/FILE] marker for file block at line {line}")]
    TruncatedBlock {
        /// 1-based line number of the opening marker
        line: usize,
    },

    /// A decoded file could not be written to disk.
    #[error("Could not write to '{path}': {message}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// The input for `apply` does not exist.
    #[error("Input file '{path}' not found")]
    MissingInput {
        /// The missing input path
        path: PathBuf,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// No candidate files found in the project directory.
    #[error("No processable files found in '{path}'. Check ignore rules or file permissions.")]
    NoFiles {
        /// Directory that was scanned
        path: PathBuf,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// The model API rejected the request or could not be reached.
    #[error("Model API error{}: {message}", status_suffix(.status))]
    Api {
        /// HTTP status code, when one was received
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// The response stream was interrupted or malformed.
    #[error("Response stream failed: {message}")]
    Stream {
        /// Error message
        message: String,
    },

    /// An image attachment could not be prepared.
    #[error("Unsupported attachment '{source_ref}': {reason}")]
    Attachment {
        /// Path or URL of the attachment
        source_ref: String,
        /// Reason it was rejected
        reason: String,
    },
}

impl Error {
    /// Creates a read error for a source file.
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a write error for a destination file.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: &tera::Error) -> Self {
        Self::Template {
            template: template.into(),
            message: source.to_string(),
        }
    }

    /// Creates a missing input error.
    #[must_use]
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>) -> Self {
        Self::NoFiles { path: path.into() }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Creates a stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Creates an attachment error.
    #[must_use]
    pub fn attachment(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Attachment {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::Template {
            template: "unknown".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Api {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
