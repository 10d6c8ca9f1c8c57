use crate::{
    block::FileBlock,
    config::Config,
    error::{Error, Result},
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A block that was written (or would have been, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    /// Destination as named in the block
    pub path: String,

    /// Line of the opening marker in the response
    pub line_number: usize,

    /// Bytes written
    pub bytes: usize,
}

/// Outcome of applying a batch of blocks.
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Successful writes, in block order
    pub written: Vec<WrittenFile>,

    /// One [`Error::Write`] per failed block
    pub failures: Vec<Error>,
}

impl ApplyReport {
    /// Returns true if every block was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes decoded blocks to disk as whole files.
pub struct Writer {
    base_dir: Option<PathBuf>,
    backup_existing: bool,
    dry_run: bool,
}

impl Writer {
    /// Creates a writer from configuration; block paths resolve against the
    /// working directory.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            base_dir: None,
            backup_existing: config.backup_existing,
            dry_run: config.dry_run,
        }
    }

    /// Resolves relative block paths against `dir` instead of the working directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Returns true if writes are skipped.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Writes every block in order. Later blocks for the same path overwrite
    /// earlier ones. A failed block is recorded and the batch continues.
    pub fn apply(&self, blocks: &[FileBlock]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for block in blocks {
            let target = self.target(&block.path);

            let result = if block.path.trim().is_empty() {
                Err(Error::write(&target, &invalid_target()))
            } else if self.dry_run {
                Ok(())
            } else {
                self.write_block(&target, &block.content)
            };

            match result {
                Ok(()) => {
                    let verb = if self.dry_run { "Would write" } else { "Processed" };
                    info!(
                        "{}: {} (from line {}, {} bytes written)",
                        verb,
                        block.path,
                        block.line_number,
                        block.byte_len()
                    );
                    report.written.push(WrittenFile {
                        path: block.path.clone(),
                        line_number: block.line_number,
                        bytes: block.byte_len(),
                    });
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        report
    }

    fn target(&self, path: &str) -> PathBuf {
        match self.base_dir {
            Some(ref base) => base.join(path),
            None => PathBuf::from(path),
        }
    }

    fn write_block(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::write(path, &e))?;
        }

        if self.backup_existing && path.is_file() {
            backup_file(path)?;
        }

        write_file_atomic(path, content)
    }
}

/// Writes through a uniquely named temp file in the target's directory and
/// renames it over the target.
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    if path.file_name().is_none() {
        return Err(Error::write(path, &invalid_target()));
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| Error::write(path, &e))?;
    temp_file
        .write_all(content.as_bytes())
        .and_then(|()| temp_file.as_file().sync_all())
        .map_err(|e| Error::write(path, &e))?;

    temp_file
        .persist(path)
        .map_err(|e| Error::write(path, &e.error))?;

    Ok(())
}

/// Copies an existing file to `<name>.backup.<timestamp>` next to it.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");

    let mut backup_name = path
        .file_name()
        .ok_or_else(|| Error::write(path, &invalid_target()))?
        .to_os_string();
    backup_name.push(format!(".backup.{timestamp}"));
    let backup_path = path.with_file_name(backup_name);

    fs::copy(path, &backup_path).map_err(|e| Error::write(&backup_path, &e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}

fn invalid_target() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path does not name a file")
}
