//! Idempotent edits to user startup files
//!
//! A line is appended only when it is not already somewhere in the file.
//! Existing content is never rewritten or truncated. No locking is done;
//! concurrent editors of the same file are not supported.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// Outcome of [`FileMutator::ensure_line_appended`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEdit {
    AlreadyPresent,
    Appended,
}

/// Appends configuration lines to text files
pub trait FileMutator: Send + Sync {
    /// Append `line` to `path` unless the file already contains it
    fn ensure_line_appended(&self, path: &Path, line: &str) -> Result<LineEdit>;
}

/// Mutator for files on the local disk
#[derive(Debug, Clone)]
pub struct LocalFileMutator {
    /// Comment written before each appended line
    marker: String,
}

impl LocalFileMutator {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl FileMutator for LocalFileMutator {
    fn ensure_line_appended(&self, path: &Path, line: &str) -> Result<LineEdit> {
        let existing = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        if existing.contains(line) {
            debug!("{} already contains the line", path.display());
            return Ok(LineEdit::AlreadyPresent);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to open {} for appending", path.display()))?;

        file.write_all(format!("\n{}\n{}\n", self.marker, line).as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;

        debug!("Appended to {}: {}", path.display(), line);
        Ok(LineEdit::Appended)
    }
}
