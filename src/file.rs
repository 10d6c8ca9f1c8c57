use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Extensions that are never sent to the model: media, archives, office
/// documents, notebooks, lock files and logs.
static IGNORED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "png", "jpg", "jpeg", "gif", "svg", "svgz", "ico", "webp", "bmp", "tiff", "tif", "psd",
        "ai", "eps", "ps", "indd", "raw", "cr2", "nef", "orf", "sr2", "ipynb", "pdf", "doc",
        "docx", "ppt", "pptx", "xls", "xlsx", "odt", "ods", "odp", "lock", "log", "zip", "tar",
        "gz", "tgz", "rar", "7z", "mp4", "avi", "mov", "mp3", "wav", "flac", "ogg", "webm", "mkv",
        "flv", "m4a", "wma", "aac", "opus", "exe", "dll", "so", "dylib", "wasm", "pyc", "class",
    ]
    .into_iter()
    .collect()
});

/// A source file that was read for a prompt.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Path as supplied by the caller and written in the opening marker
    pub path: PathBuf,

    /// Full text content
    pub content: String,
}

impl SourceFile {
    /// Reads a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the file is missing, unreadable or not valid UTF-8.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| Error::read(&path, &e))?;
        Ok(Self { path, content })
    }

    /// Returns the path as written into the block marker.
    #[must_use]
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Returns the size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    /// Returns the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// Human readable size, in bytes up to 1 KB and in KB above.
    #[must_use]
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes())
    }
}

/// Formats a byte count the way the file table shows it.
#[must_use]
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes > 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} bytes")
    }
}

/// Determines if a file is likely binary by analyzing its content.
///
/// Reads the first 8KB; a null byte marks the file as binary. Text in any
/// script passes, and invalid UTF-8 is left for [`SourceFile::read`] to report.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    Ok(memchr::memchr(0, &buffer[..bytes_read]).is_some())
}

/// Checks if a file extension is on the ignore list (case-insensitive).
#[must_use]
pub(crate) fn has_ignored_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IGNORED_EXTENSIONS.contains(ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    #[test]
    fn test_read_source_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("main.rs");
        file.write_str("fn main() {}\n// end\n").unwrap();

        let source = SourceFile::read(file.path()).unwrap();
        assert_eq!(source.content, "fn main() {}\n// end\n");
        assert_eq!(source.line_count(), 2);
        assert_eq!(source.size_bytes(), 20);
    }

    #[test]
    fn test_read_missing_file() {
        let err = SourceFile::read("/nonexistent/file.rs").unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("latin1.txt");
        file.write_binary(&[0x66, 0x6f, 0xf6, 0x0a]).unwrap();

        assert!(matches!(
            SourceFile::read(file.path()),
            Err(Error::Read { .. })
        ));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1024), "1024 bytes");
        assert_eq!(format_size(1536), "1.5 KB");
    }

    #[test]
    fn test_is_likely_binary_text_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.txt");
        file.write_str("Hello, world!").unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_non_ascii_text() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("README.ru.md");
        file.write_str("# Проект\n\nОписание на русском языке.\n中文说明\n")
            .unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_binary_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("test.bin");

        let mut f = File::create(file.path()).unwrap();
        f.write_all(&[0u8; 100]).unwrap();

        assert!(is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_is_likely_binary_empty_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("empty.txt");
        file.touch().unwrap();

        assert!(!is_likely_binary(file.path()).unwrap());
    }

    #[test]
    fn test_has_ignored_extension() {
        assert!(has_ignored_extension(Path::new("logo.PNG")));
        assert!(has_ignored_extension(Path::new("Cargo.lock")));
        assert!(has_ignored_extension(Path::new("notebook.ipynb")));
        assert!(has_ignored_extension(Path::new("debug.log")));
        assert!(!has_ignored_extension(Path::new("main.rs")));
        assert!(!has_ignored_extension(Path::new("Makefile")));
    }
}
