//! Settings discovery and loading
//!
//! ## Resolution order
//!
//! 1. `--config <path>` passed on the command line
//! 2. `KRSIGN_CONFIG` environment variable
//! 3. `config.yml` in the platform config directory
//!    - Linux: `~/.config/krsign/config.yml`
//!    - macOS: `~/Library/Application Support/krsign/config.yml`
//! 4. Built-in defaults
//!
//! Every field is optional in the file; anything left out keeps its default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV_VAR: &str = "KRSIGN_CONFIG";

/// Top-level settings for all krsign commands
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Executable linked as `gpg.program`
    pub signing_helper: String,
    /// Key-server submission endpoint
    pub keyserver_url: String,
    /// Directories git must be reachable from
    pub canonical_git_dirs: Vec<PathBuf>,
    /// Where the tool-location fix links git
    pub git_link_dir: PathBuf,
    /// Comment written before a line appended to a shell profile
    pub profile_marker: String,
    pub agent: AgentSettings,
    pub analytics: AnalyticsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            signing_helper: "krgpg".to_string(),
            keyserver_url: "https://pgp.mit.edu/pks/add".to_string(),
            canonical_git_dirs: vec![PathBuf::from("/usr/bin"), PathBuf::from("/usr/local/bin")],
            git_link_dir: PathBuf::from("/usr/local/bin"),
            profile_marker: "# Added by krsign".to_string(),
            agent: AgentSettings::default(),
            analytics: AnalyticsSettings::default(),
        }
    }
}

/// How to talk to the background signing agent's command line
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Agent executable
    pub program: String,
    /// Exits zero only when the latest agent version is running
    pub status_args: Vec<String>,
    /// Prints the ASCII-armored PGP public key after a forced refresh
    pub public_key_args: Vec<String>,
    /// Prints the public key fingerprint
    pub fingerprint_args: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            program: "kr".to_string(),
            status_args: vec!["status".to_string(), "--require-latest".to_string()],
            public_key_args: vec![
                "me".to_string(),
                "pgp".to_string(),
                "--force-refresh".to_string(),
            ],
            fingerprint_args: vec![
                "me".to_string(),
                "pgp".to_string(),
                "--fingerprint".to_string(),
            ],
        }
    }
}

/// Usage analytics; disabled unless an endpoint is configured
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    pub endpoint: Option<String>,
}

impl Settings {
    /// Load settings using the documented resolution order
    pub fn discover(cli_override: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_override {
            debug!("Using --config override: {}", path.display());
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            if !env_path.trim().is_empty() {
                debug!("Using {} override: {}", CONFIG_ENV_VAR, env_path);
                return Self::load(Path::new(&env_path));
            }
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Found settings at {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No settings file found - using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load settings from an explicit file, which must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }
}

/// Platform location of the default settings file
pub fn default_config_path() -> Option<PathBuf> {
    use directories::ProjectDirs;

    ProjectDirs::from("", "", "krsign").map(|dirs| dirs.config_dir().join("config.yml"))
}
