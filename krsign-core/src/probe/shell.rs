//! Shell profile detection
//!
//! The shell name comes from `$SHELL` and is matched by substring against a
//! fixed, ordered table. bash is special: login and interactive shells read
//! different files, so the first *existing* file among `.bash_profile`,
//! `.bash_login` and `.bashrc` wins, and when none exists detection falls
//! through to the generic `.profile`.

use std::path::PathBuf;

use super::EnvironmentProbe;

/// Variable the signing helper reads to find the user's terminal
pub const TTY_ENV_VAR: &str = "GPG_TTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Zsh,
    Bash,
    Ksh,
    Csh,
    Fish,
    /// Anything else; assumed POSIX sh compatible
    Posix,
}

impl ShellKind {
    /// Statement that sets [`TTY_ENV_VAR`] to the current terminal
    pub fn tty_export(self) -> String {
        match self {
            ShellKind::Zsh | ShellKind::Bash | ShellKind::Ksh | ShellKind::Posix => {
                format!("export {TTY_ENV_VAR}=$(tty)")
            }
            ShellKind::Csh => format!("setenv {TTY_ENV_VAR} `tty`"),
            ShellKind::Fish => format!("set -x {TTY_ENV_VAR} (tty)"),
        }
    }
}

/// Startup file plus the export line appropriate for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellProfile {
    pub shell: ShellKind,
    pub path: PathBuf,
    pub export_statement: String,
}

impl ShellProfile {
    fn new(shell: ShellKind, path: PathBuf) -> Self {
        Self {
            shell,
            path,
            export_statement: shell.tty_export(),
        }
    }

    /// Prefix for running a single command with the variable set
    pub fn one_shot_prefix(&self) -> String {
        format!("{}; ", self.export_statement)
    }
}

struct ProfileRule {
    needle: &'static str,
    shell: ShellKind,
    /// Paths relative to home, in preference order
    candidates: &'static [&'static str],
    /// Only pick a candidate that already exists; otherwise fall through
    require_existing: bool,
}

const RULES: &[ProfileRule] = &[
    ProfileRule {
        needle: "zsh",
        shell: ShellKind::Zsh,
        candidates: &[".zshrc"],
        require_existing: false,
    },
    ProfileRule {
        needle: "bash",
        shell: ShellKind::Bash,
        candidates: &[".bash_profile", ".bash_login", ".bashrc"],
        require_existing: true,
    },
    ProfileRule {
        needle: "ksh",
        shell: ShellKind::Ksh,
        candidates: &[".kshrc"],
        require_existing: false,
    },
    ProfileRule {
        needle: "csh",
        shell: ShellKind::Csh,
        candidates: &[".cshrc"],
        require_existing: false,
    },
    ProfileRule {
        needle: "fish",
        shell: ShellKind::Fish,
        candidates: &[".config/fish/config.fish"],
        require_existing: false,
    },
];

/// Determine the profile for the current user
///
/// Depends only on `$SHELL`, the home directory and which candidate files
/// exist, so the same inputs always give the same answer.
pub fn detect_shell_profile<P: EnvironmentProbe + ?Sized>(probe: &P) -> ShellProfile {
    let shell = probe.env_var("SHELL").unwrap_or_default();
    let home = probe.home_dir();

    for rule in RULES {
        if !shell.contains(rule.needle) {
            continue;
        }
        let mut candidates = rule.candidates.iter().map(|rel| home.join(rel));
        let chosen = if rule.require_existing {
            candidates.find(|path| probe.file_exists(path))
        } else {
            candidates.next()
        };
        if let Some(path) = chosen {
            return ShellProfile::new(rule.shell, path);
        }
    }

    ShellProfile::new(ShellKind::Posix, home.join(".profile"))
}
