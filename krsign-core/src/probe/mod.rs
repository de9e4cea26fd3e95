//! Environment probing - what is installed and which shell the user runs
//!
//! All ambient state (environment variables, PATH lookup, the filesystem) is
//! read through the [`EnvironmentProbe`] trait so onboarding can run against
//! an in-memory fake in tests.

pub mod shell;

use std::path::{Path, PathBuf};
use tracing::debug;

pub use shell::{detect_shell_profile, ShellKind, ShellProfile, TTY_ENV_VAR};

/// Read-only view of the machine being configured
pub trait EnvironmentProbe: Send + Sync {
    /// Resolve an executable through PATH
    fn locate_executable(&self, name: &str) -> Option<PathBuf>;

    /// Environment variable value; empty values count as unset
    fn env_var(&self, name: &str) -> Option<String>;

    /// The user's home directory
    fn home_dir(&self) -> PathBuf;

    fn file_exists(&self, path: &Path) -> bool;

    /// True for a regular file (after following links) that can be executed
    fn is_executable(&self, path: &Path) -> bool;

    /// Pick the startup file and export syntax for the user's shell
    fn detect_shell_profile(&self) -> ShellProfile {
        detect_shell_profile(self)
    }

    /// Whether `tool` is reachable from any of the canonical directories
    fn verify_tool_linked(&self, tool: &str, candidate_dirs: &[PathBuf]) -> bool {
        candidate_dirs
            .iter()
            .any(|dir| self.is_executable(&dir.join(tool)))
    }
}

/// Probe backed by the real process environment and filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl EnvironmentProbe for SystemProbe {
    fn locate_executable(&self, name: &str) -> Option<PathBuf> {
        match which::which(name) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("{} not found on PATH: {}", name, e);
                None
            }
        }
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }

    fn home_dir(&self) -> PathBuf {
        self.env_var("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_executable(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}
