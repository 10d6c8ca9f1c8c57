use crate::{
    config::Config,
    error::{Error, Result},
    file::{has_ignored_extension, is_likely_binary},
    filter::FileFilter,
};
use ignore::{DirEntry, WalkBuilder, WalkState};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, trace, warn};

/// Ignore file honoured alongside `.gitignore`.
const DOCKER_IGNORE: &str = ".dockerignore";

/// Statistics collected during scanning.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScanStats {
    /// Regular files visited by the walker
    pub total_files: usize,

    /// Files offered to the model
    pub accepted_files: usize,

    /// Files skipped by extension, filter or content sniffing
    pub skipped_files: usize,

    /// Walk or read errors
    pub errors: usize,
}

/// Discovers the project files offered to the model when none are named.
pub(crate) struct Scanner {
    root_dir: PathBuf,
    file_filter: FileFilter,
}

impl Scanner {
    /// Creates a new scanner from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an exclude glob is invalid.
    pub(crate) fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root_dir: config.root_dir.clone(),
            file_filter: FileFilter::new(&config.file_filter_config)?,
        })
    }

    /// Walks the root directory and returns root-relative paths in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFiles`] if nothing survives the discovery rules.
    pub(crate) fn scan(&self) -> Result<Vec<PathBuf>> {
        let files = Arc::new(Mutex::new(Vec::new()));
        let stats = Arc::new(Mutex::new(ScanStats::default()));

        debug!("Starting parallel scan of {}", self.root_dir.display());

        let walker = WalkBuilder::new(&self.root_dir)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .add_custom_ignore_filename(DOCKER_IGNORE)
            .follow_links(false)
            .threads(num_cpus::get())
            .build_parallel();

        walker.run(|| {
            let files = Arc::clone(&files);
            let stats = Arc::clone(&stats);
            let root = self.root_dir.clone();
            let file_filter = self.file_filter.clone();

            Box::new(move |result| {
                match result {
                    Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                        bump(&stats, |s| s.total_files += 1);

                        match Self::process_entry(&entry, &root, &file_filter) {
                            Ok(Some(relative)) => {
                                bump(&stats, |s| s.accepted_files += 1);
                                files
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .push(relative);
                            }
                            Ok(None) => bump(&stats, |s| s.skipped_files += 1),
                            Err(e) => {
                                warn!("Failed to inspect {}: {}", entry.path().display(), e);
                                bump(&stats, |s| s.errors += 1);
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Walk error: {}", e);
                        bump(&stats, |s| s.errors += 1);
                    }
                    _ => {}
                }

                WalkState::Continue
            })
        });

        let mut files =
            std::mem::take(&mut *files.lock().unwrap_or_else(PoisonError::into_inner));
        let stats = stats.lock().unwrap_or_else(PoisonError::into_inner).clone();

        debug!(
            "Scan complete: {} total, {} accepted, {} skipped, {} errors",
            stats.total_files, stats.accepted_files, stats.skipped_files, stats.errors
        );

        if files.is_empty() {
            return Err(Error::no_files(&self.root_dir));
        }

        files.sort();
        Ok(files)
    }

    /// Applies the discovery rules to one walker entry.
    fn process_entry(
        entry: &DirEntry,
        root: &Path,
        file_filter: &FileFilter,
    ) -> Result<Option<PathBuf>> {
        let path = entry.path();
        let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());

        if relative.extension().is_none() {
            trace!("Skipping file without extension: {}", relative.display());
            return Ok(None);
        }

        if has_ignored_extension(&relative) {
            trace!("Skipping ignored extension: {}", relative.display());
            return Ok(None);
        }

        if !file_filter.should_process(&relative) {
            trace!("Skipping filtered path: {}", relative.display());
            return Ok(None);
        }

        if is_likely_binary(path)? {
            debug!("Skipping binary file (by content): {}", relative.display());
            return Ok(None);
        }

        Ok(Some(relative))
    }
}

/// Updates the shared counters without holding the lock across file IO.
fn bump(stats: &Mutex<ScanStats>, update: impl FnOnce(&mut ScanStats)) {
    update(&mut stats.lock().unwrap_or_else(PoisonError::into_inner));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FileFilterConfig;
    use assert_fs::prelude::*;

    fn scan(root: &Path) -> Result<Vec<PathBuf>> {
        let config = Config::builder().root_dir(root).build().unwrap();
        Scanner::new(&config).unwrap().scan()
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_scanner_finds_sorted_relative_paths() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/main.rs").write_str("fn main() {}").unwrap();
        temp.child("src/lib.rs").write_str("pub fn test() {}").unwrap();
        temp.child("build.py").write_str("print(1)").unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["build.py", "src/lib.rs", "src/main.rs"]);
    }

    #[test]
    fn test_scanner_skips_hidden_and_node_modules() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.js").write_str("run()").unwrap();
        temp.child(".env.local").write_str("SECRET=1").unwrap();
        temp.child(".cache/data.json").write_str("{}").unwrap();
        temp.child("node_modules/dep/index.js").write_str("x").unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["app.js"]);
    }

    #[test]
    fn test_scanner_skips_ignored_and_missing_extensions() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.go").write_str("package main").unwrap();
        temp.child("Makefile").write_str("all:").unwrap();
        temp.child("Cargo.lock").write_str("# lock").unwrap();
        temp.child("server.log").write_str("started").unwrap();
        temp.child("logo.png").write_binary(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["main.go"]);
    }

    #[test]
    fn test_scanner_skips_binary_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("text.rs").write_str("fn main() {}").unwrap();
        temp.child("blob.bin").write_binary(&[0u8; 100]).unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["text.rs"]);
    }

    #[test]
    fn test_scanner_keeps_non_ascii_text() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("main.rs").write_str("fn main() {}").unwrap();
        temp.child("README.ru.md")
            .write_str("# Сборка\n\nЗапустите `cargo build` в корне проекта.\n")
            .unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["README.ru.md", "main.rs"]);
    }

    #[test]
    fn test_scanner_respects_gitignore() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".gitignore").write_str("ignored.rs\nbuild/\n").unwrap();
        temp.child("included.rs").write_str("fn main() {}").unwrap();
        temp.child("ignored.rs").write_str("fn test() {}").unwrap();
        temp.child("build/out.rs").write_str("fn out() {}").unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["included.rs"]);
    }

    #[test]
    fn test_scanner_respects_dockerignore() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(".dockerignore").write_str("*.tmp.py\n").unwrap();
        temp.child("app.py").write_str("print(1)").unwrap();
        temp.child("scratch.tmp.py").write_str("print(2)").unwrap();

        let files = scan(temp.path()).unwrap();

        assert_eq!(names(&files), vec!["app.py"]);
    }

    #[test]
    fn test_scanner_applies_exclude_globs() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("src/api.ts").write_str("export {}").unwrap();
        temp.child("src/api.generated.ts").write_str("export {}").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .file_filter_config(
                FileFilterConfig::new().exclude_files(vec!["**/*.generated.ts".to_string()]),
            )
            .build()
            .unwrap();
        let files = Scanner::new(&config).unwrap().scan().unwrap();

        assert_eq!(names(&files), vec!["src/api.ts"]);
    }

    #[test]
    fn test_scanner_allow_only() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("app.py").write_str("print(1)").unwrap();
        temp.child("lib/util.py").write_str("pass").unwrap();
        temp.child("index.html").write_str("<html></html>").unwrap();

        let config = Config::builder()
            .root_dir(temp.path())
            .file_filter_config(FileFilterConfig::new().allow_only(vec!["**/*.py".to_string()]))
            .build()
            .unwrap();
        let files = Scanner::new(&config).unwrap().scan().unwrap();

        assert_eq!(names(&files), vec!["app.py", "lib/util.py"]);
    }

    #[test]
    fn test_scanner_empty_directory() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("README").write_str("no extension").unwrap();

        let result = scan(temp.path());

        assert!(matches!(result, Err(Error::NoFiles { .. })));
    }
}
