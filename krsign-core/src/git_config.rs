//! Typed access to git's global configuration
//!
//! Every call shells out through the [`ProcessRunner`]; nothing is cached,
//! so a value read here always reflects what git itself would see.

use thiserror::Error;
use tracing::debug;

use crate::process::{Invocation, ProcessRunner};

/// Path of the program git runs to sign commits and tags
pub const GPG_PROGRAM: &str = "gpg.program";
/// Sign every commit automatically
pub const COMMIT_GPG_SIGN: &str = "commit.gpgSign";
/// Turn every annotated tag into a signed tag
pub const TAG_FORCE_SIGN_ANNOTATED: &str = "tag.forceSignAnnotated";
pub const USER_NAME: &str = "user.name";
pub const USER_EMAIL: &str = "user.email";

/// `git config --get` exit status for a key that is not set
const EXIT_KEY_MISSING: i32 = 1;
/// `git config --unset` exit status for a key that is not set
const EXIT_UNSET_MISSING: i32 = 5;

/// Which git configuration file a setting lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigScope {
    #[default]
    Global,
}

impl ConfigScope {
    fn flag(self) -> &'static str {
        match self {
            ConfigScope::Global => "--global",
        }
    }
}

/// A single key/value setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub scope: ConfigScope,
}

impl ConfigEntry {
    pub fn global(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            scope: ConfigScope::Global,
        }
    }
}

/// A git config invocation that did not succeed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("git config {action} {key} failed: {output}")]
pub struct ConfigError {
    pub action: &'static str,
    pub key: String,
    pub output: String,
}

/// Global git configuration, read and written through `git config`
pub struct GitConfig<'a> {
    runner: &'a dyn ProcessRunner,
    git: String,
}

impl<'a> GitConfig<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self {
            runner,
            git: "git".to_string(),
        }
    }

    fn invocation(&self, scope: ConfigScope) -> Invocation {
        Invocation::new(&self.git).args(["config", scope.flag()])
    }

    /// Read a key; `None` when it is not set
    pub async fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let out = self
            .runner
            .run(self.invocation(ConfigScope::Global).arg(key))
            .await;
        if out.success {
            return Ok(Some(out.text()));
        }
        if out.exit_code == Some(EXIT_KEY_MISSING) {
            debug!("git config {} is not set", key);
            return Ok(None);
        }
        Err(ConfigError {
            action: "get",
            key: key.to_string(),
            output: out.text(),
        })
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(&ConfigEntry::global(key, value)).await
    }

    /// Write one entry
    pub async fn apply(&self, entry: &ConfigEntry) -> Result<(), ConfigError> {
        let out = self
            .runner
            .run(
                self.invocation(entry.scope)
                    .arg(&entry.key)
                    .arg(&entry.value),
            )
            .await;
        if out.success {
            debug!("git config {} = {}", entry.key, entry.value);
            Ok(())
        } else {
            Err(ConfigError {
                action: "set",
                key: entry.key.clone(),
                output: out.text(),
            })
        }
    }

    /// Remove a key; removing a key that is not set succeeds
    pub async fn unset(&self, key: &str) -> Result<(), ConfigError> {
        let out = self
            .runner
            .run(self.invocation(ConfigScope::Global).args(["--unset", key]))
            .await;
        if out.success || out.exit_code == Some(EXIT_UNSET_MISSING) {
            Ok(())
        } else {
            Err(ConfigError {
                action: "unset",
                key: key.to_string(),
                output: out.text(),
            })
        }
    }
}
