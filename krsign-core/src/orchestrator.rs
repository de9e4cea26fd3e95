//! The codesign command set: enable, disable, on, test, uninstall
//!
//! Each entry point maps to a fixed subset of the onboarding steps. This is
//! the only place that decides whether a step's outcome ends the command.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::analytics::{emit_detached, AnalyticsEvent};
use crate::context::SetupContext;
use crate::error::OnboardingError;
use crate::git_config::{COMMIT_GPG_SIGN, GPG_PROGRAM, TAG_FORCE_SIGN_ANNOTATED};
use crate::probe::TTY_ENV_VAR;
use crate::process::Invocation;
use crate::prompt::ConfirmationPolicy;
use crate::steps::{StepName, StepResult, StepSequence};

/// What an `enable` run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableReport {
    pub signing_program: PathBuf,
    pub steps: Vec<(StepName, StepResult)>,
    /// Command the user should run to verify the setup
    pub verify_command: String,
}

impl EnableReport {
    pub fn result_of(&self, step: StepName) -> Option<&StepResult> {
        self.steps.iter().find(|(s, _)| *s == step).map(|(_, r)| r)
    }
}

/// Outcome of the signed-commit self test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub passed: bool,
    /// Scratch directory used; removed before the report is returned
    pub scratch_dir: PathBuf,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    NotConfigured,
    /// `gpg.program` points somewhere else and was left alone
    ForeignProgram(String),
}

/// Entry points for configuring commit signing
pub struct Codesign<'a> {
    ctx: SetupContext<'a>,
}

impl<'a> Codesign<'a> {
    pub fn new(ctx: SetupContext<'a>) -> Self {
        Self { ctx }
    }

    /// Full onboarding
    pub async fn enable(
        &self,
        policy: &ConfirmationPolicy,
    ) -> Result<EnableReport, OnboardingError> {
        let steps = StepSequence::new(&self.ctx, policy);
        let mut results = Vec::new();

        steps.require_latest_agent().await?;
        let location = steps.check_git_location().await?;
        results.push(steps.record(StepName::GitLocation, location));

        emit_detached(
            self.ctx.analytics.clone(),
            AnalyticsEvent::new("krsign", "codesign"),
        );

        let user_id = steps.git_user_id().await?;
        let identity = steps.fetch_identity(&user_id).await?;
        let signing_program = steps.link_signing_helper().await?;

        results.extend(steps.run_optional(&identity).await);

        let verify_command = self.verify_command();
        let reporter = self.ctx.reporter;
        reporter.blank();
        reporter.line("In order to make sure everything works,");
        reporter.line(format!("RUN: {verify_command}"));
        reporter.blank();

        let failed = results.iter().filter(|(_, r)| r.is_failed()).count();
        info!(failed, "enable finished");

        Ok(EnableReport {
            signing_program,
            steps: results,
            verify_command,
        })
    }

    /// `krsign test`, prefixed with the one-shot export when the TTY variable is unset
    fn verify_command(&self) -> String {
        let prefix = if self.ctx.probe.env_var(TTY_ENV_VAR).is_some() {
            String::new()
        } else {
            self.ctx.probe.detect_shell_profile().one_shot_prefix()
        };
        format!("{prefix}krsign test")
    }

    /// Stop signing automatically; safe to repeat
    pub async fn disable(&self) -> Vec<StepResult> {
        let config = self.ctx.git_config();
        let reporter = self.ctx.reporter;
        let mut results = Vec::new();

        for key in [COMMIT_GPG_SIGN, TAG_FORCE_SIGN_ANNOTATED] {
            let result = match config.unset(key).await {
                Ok(()) => StepResult::Succeeded,
                Err(e) => {
                    let message = format!("Failed to unset {key}: {}", e.output);
                    reporter.failure(&message);
                    StepResult::Failed(message)
                }
            };
            results.push(result);
        }

        reporter.line(
            "Automatic commit signing disabled. Sign a new commit by running git commit -S or sign your last commit by running git commit --amend -S",
        );
        reporter.line("Re-enable automatic commit signing by running krsign on");
        results
    }

    /// Turn auto-signing back on without re-running onboarding
    pub async fn on(&self) -> Result<StepResult, OnboardingError> {
        let program = self
            .ctx
            .git_config()
            .get(GPG_PROGRAM)
            .await
            .ok()
            .flatten()
            .ok_or(OnboardingError::SigningNotConfigured)?;
        if !self.ctx.probe.file_exists(Path::new(&program)) {
            warn!("{} points to missing {}", GPG_PROGRAM, program);
            return Err(OnboardingError::SigningNotConfigured);
        }

        let policy = ConfirmationPolicy::AlwaysYes;
        let steps = StepSequence::new(&self.ctx, &policy);
        let result = steps.enable_auto_sign().await;
        if let StepResult::Failed(message) = &result {
            self.ctx.reporter.failure(message);
        }
        Ok(result)
    }

    /// Make one signed commit in a scratch repository
    ///
    /// The scratch directory is removed whether or not the commit succeeds.
    pub async fn test(&self) -> Result<SelfTestReport, OnboardingError> {
        let scratch = tempfile::Builder::new()
            .prefix("krsign-git-test")
            .tempdir()
            .map_err(|source| OnboardingError::SelfTestSetup {
                path: std::env::temp_dir(),
                source,
            })?;
        let scratch_dir = scratch.path().to_path_buf();
        let repo = scratch_dir.join("repo");
        let git_dir = repo.join(".git");

        let init = self
            .ctx
            .runner
            .run(
                Invocation::new("git")
                    .arg("init")
                    .arg(repo.display().to_string())
                    .current_dir(&scratch_dir)
                    .env("GIT_DIR", git_dir.display().to_string()),
            )
            .await;

        let (passed, output) = if !init.success {
            (false, init.text())
        } else {
            let commit = self
                .ctx
                .runner
                .run(
                    Invocation::new("git")
                        .args([
                            "commit",
                            "-S",
                            "--allow-empty",
                            "-m",
                            "Testing your first signed commit",
                        ])
                        .current_dir(&repo)
                        .env("GIT_DIR", git_dir.display().to_string())
                        .env("GIT_WORK_TREE", repo.display().to_string()),
                )
                .await;
            (commit.success, commit.text())
        };

        if let Err(e) = scratch.close() {
            warn!("Failed to remove {}: {}", scratch_dir.display(), e);
        }

        let reporter = self.ctx.reporter;
        if passed {
            if !output.is_empty() {
                reporter.line(&output);
            }
            reporter.success("Codesigning successful");
        } else {
            reporter.failure(format!("Signed commit failed:\n{output}"));
        }

        Ok(SelfTestReport {
            passed,
            scratch_dir,
            output,
        })
    }

    /// Remove signing config, but only if it points at our helper
    pub async fn uninstall(&self) -> UninstallOutcome {
        let config = self.ctx.git_config();
        let reporter = self.ctx.reporter;

        let program = match config.get(GPG_PROGRAM).await {
            Ok(Some(program)) => program,
            Ok(None) | Err(_) => {
                reporter.line("krsign codesigning is not installed");
                return UninstallOutcome::NotConfigured;
            }
        };

        if !self.is_our_helper(&program) {
            reporter.line(format!(
                "{GPG_PROGRAM} is set to {program}, which krsign did not configure; leaving git config unchanged"
            ));
            return UninstallOutcome::ForeignProgram(program);
        }

        for key in [GPG_PROGRAM, COMMIT_GPG_SIGN, TAG_FORCE_SIGN_ANNOTATED] {
            if let Err(e) = config.unset(key).await {
                reporter.failure(format!("Failed to unset {key}: {}", e.output));
            }
        }
        reporter.line("krsign codesigning uninstalled... run krsign enable to reinstall.");
        UninstallOutcome::Removed
    }

    fn is_our_helper(&self, program: &str) -> bool {
        Path::new(program.trim())
            .file_name()
            .is_some_and(|name| name == self.ctx.settings.signing_helper.as_str())
    }
}
