//! Glob-based path filtering for project discovery.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directory names that are never descended into.
const ALWAYS_EXCLUDED_DIRS: &[&str] = &["node_modules"];

/// Configuration for file filtering with glob patterns.
///
/// Patterns are matched against root-relative paths.
#[derive(Debug, Clone, Default)]
pub struct FileFilterConfig {
    exclude_files: Vec<String>,
    exclude_all_files_except: Vec<String>,
    exclude_directories: Vec<String>,
}

impl FileFilterConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes files matching any of the patterns.
    #[must_use]
    pub fn exclude_files(mut self, patterns: Vec<String>) -> Self {
        self.exclude_files = patterns;
        self
    }

    /// Excludes everything below directories matching any of the patterns.
    #[must_use]
    pub fn exclude_directories(mut self, patterns: Vec<String>) -> Self {
        self.exclude_directories = patterns;
        self
    }

    /// Keeps only files matching one of the patterns.
    #[must_use]
    pub fn allow_only(mut self, patterns: Vec<String>) -> Self {
        self.exclude_all_files_except = patterns;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileFilter {
    exclude_files: GlobSet,
    include_files: Option<GlobSet>,
    exclude_directories: GlobSet,
}

impl FileFilter {
    /// Compiles the configured patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid glob.
    pub(crate) fn new(config: &FileFilterConfig) -> Result<Self> {
        let exclude_files = Self::build_globset(&config.exclude_files)?;
        let exclude_directories = Self::build_globset(&config.exclude_directories)?;

        let include_files = if config.exclude_all_files_except.is_empty() {
            None
        } else {
            Some(Self::build_globset(&config.exclude_all_files_except)?)
        };

        Ok(Self {
            exclude_files,
            include_files,
            exclude_directories,
        })
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| Error::config(format!("Invalid glob pattern '{pattern}': {e}")))?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))
    }

    /// Returns true if a root-relative file path should be offered to the model.
    pub(crate) fn should_process(&self, path: &Path) -> bool {
        if let Some(ref include) = self.include_files {
            if !include.is_match(path) {
                return false;
            }
        }

        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            if self.exclude_directories.is_match(ancestor) || Self::is_always_excluded(ancestor) {
                return false;
            }
        }

        !self.exclude_files.is_match(path)
    }

    fn is_always_excluded(dir: &Path) -> bool {
        dir.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| ALWAYS_EXCLUDED_DIRS.contains(&name))
    }
}
