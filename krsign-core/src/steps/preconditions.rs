//! Steps that must succeed before anything is configured

use std::path::PathBuf;
use tracing::{debug, info};

use super::{StepResult, StepSequence};
use crate::error::OnboardingError;
use crate::git_config::{GPG_PROGRAM, USER_EMAIL, USER_NAME};
use crate::identity::Identity;
use crate::process::Invocation;

impl StepSequence<'_, '_> {
    /// Fatal unless the latest background agent is running
    pub async fn require_latest_agent(&self) -> Result<(), OnboardingError> {
        match self.ctx.identity.agent_is_latest().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OnboardingError::AgentNotLatest),
            Err(e) => Err(OnboardingError::AgentUnreachable {
                reason: format!("{e:#}"),
            }),
        }
    }

    /// Make sure git resolves from a canonical directory
    ///
    /// A git earlier on PATH than the canonical install would bypass the
    /// signing hook. Offers to link it; declining or a failed link is only
    /// reported. git missing entirely is fatal.
    pub async fn check_git_location(&self) -> Result<StepResult, OnboardingError> {
        let settings = self.ctx.settings;
        if self
            .ctx
            .probe
            .verify_tool_linked("git", &settings.canonical_git_dirs)
        {
            debug!("git found in a canonical directory");
            return Ok(StepResult::Succeeded);
        }

        let current = self
            .ctx
            .probe
            .locate_executable("git")
            .ok_or(OnboardingError::GitNotInstalled)?;

        let canonical = settings
            .canonical_git_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(" or ");
        self.ctx.reporter.warn(format!(
            "git must be linked to {} to work with krsign (current location {})",
            canonical,
            current.display()
        ));

        let question = format!("Link git to {}?", settings.git_link_dir.display());
        if !self.policy.confirm(self.ctx.reporter, &question) {
            return Ok(StepResult::Skipped("git link declined".to_string()));
        }

        let target = settings.git_link_dir.join("git");
        let out = self
            .ctx
            .runner
            .run(
                Invocation::new("ln")
                    .arg("-s")
                    .arg(current.display().to_string())
                    .arg(target.display().to_string()),
            )
            .await;
        if out.success {
            self.ctx
                .reporter
                .success(format!("Linked git to {}", target.display()));
            Ok(StepResult::Succeeded)
        } else {
            Ok(StepResult::Failed(format!(
                "Failed to link git to {}:\n{}",
                target.display(),
                out.text()
            )))
        }
    }

    /// `Name <email>` from global git config; fatal if either is missing
    pub async fn git_user_id(&self) -> Result<String, OnboardingError> {
        let config = self.ctx.git_config();
        let name = config.get(USER_NAME).await.ok().flatten();
        let email = config.get(USER_EMAIL).await.ok().flatten();
        match (name, email) {
            (Some(name), Some(email)) if !name.is_empty() && !email.is_empty() => {
                Ok(format!("{name} <{email}>"))
            }
            _ => Err(OnboardingError::GitUserNotConfigured),
        }
    }

    /// Ask the paired device for the identity; fatal without a public key
    pub async fn fetch_identity(&self, user_id: &str) -> Result<Identity, OnboardingError> {
        let identity = self
            .ctx
            .identity
            .force_refresh_identity(user_id)
            .await
            .map_err(|e| OnboardingError::IdentityFetch {
                reason: format!("{e:#}"),
            })?;

        if identity.public_key_armored().is_err() {
            return Err(OnboardingError::NoPublicKey);
        }
        info!(
            "Fetched identity for {} via {}",
            identity.user_id,
            self.ctx.identity.name()
        );
        Ok(identity)
    }

    /// Point `gpg.program` at the signing helper; fatal if it is missing
    pub async fn link_signing_helper(&self) -> Result<PathBuf, OnboardingError> {
        let helper = &self.ctx.settings.signing_helper;
        let path = self.ctx.probe.locate_executable(helper).ok_or_else(|| {
            OnboardingError::SigningHelperNotFound {
                helper: helper.clone(),
            }
        })?;

        self.ctx
            .git_config()
            .set(GPG_PROGRAM, &path.display().to_string())
            .await
            .map_err(|e| OnboardingError::ConfigWrite {
                key: e.key,
                output: e.output,
            })?;

        info!("{} set to {}", GPG_PROGRAM, path.display());
        self.ctx.reporter.line(
            "Code signing uses a different type of public key than SSH, called a PGP public key",
        );
        Ok(path)
    }
}
