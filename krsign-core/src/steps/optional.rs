//! Optional onboarding steps, gated by the confirmation policy

use tracing::debug;

use super::{StepName, StepResult, StepSequence};
use crate::identity::Identity;
use crate::probe::TTY_ENV_VAR;
use crate::process::Invocation;
use crate::profile::LineEdit;

/// A step gated by the confirmation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalStep {
    PublishHint,
    KeyServerUpload,
    AutoSign,
    LocalKeychain,
    ShellExport,
}

impl OptionalStep {
    pub fn name(self) -> StepName {
        match self {
            OptionalStep::PublishHint => StepName::PublishHint,
            OptionalStep::KeyServerUpload => StepName::KeyServerUpload,
            OptionalStep::AutoSign => StepName::AutoSign,
            OptionalStep::LocalKeychain => StepName::LocalKeychain,
            OptionalStep::ShellExport => StepName::ShellExport,
        }
    }
}

/// Order in which the optional steps run after the preconditions
pub const OPTIONAL_STEPS: &[OptionalStep] = &[
    OptionalStep::PublishHint,
    OptionalStep::KeyServerUpload,
    OptionalStep::AutoSign,
    OptionalStep::LocalKeychain,
    OptionalStep::ShellExport,
];

const GITHUB_GPG_SETTINGS_URL: &str = "https://github.com/settings/keys";

/// `curl --write-out` format that appends the HTTP status on its own line
const HTTP_STATUS_TRAILER: &str = "\n%{http_code}";

/// Split curl output into the response body and the trailing status code
fn split_http_status(text: &str) -> (&str, Option<u16>) {
    let (body, last) = match text.rsplit_once('\n') {
        Some((body, last)) => (body.trim_end(), last),
        None => ("", text),
    };
    match last.trim().parse::<u16>() {
        Ok(code) => (body, Some(code)),
        Err(_) => (text, None),
    }
}

impl StepSequence<'_, '_> {
    /// Show the key and where to add it on GitHub
    pub(crate) fn publish_hint(&self, identity: &Identity) -> StepResult {
        let reporter = self.ctx.reporter;
        if !self
            .policy
            .confirm(reporter, "Would you like to add this key to GitHub?")
        {
            return StepResult::Skipped("GitHub hint declined".to_string());
        }
        let Ok(key) = identity.public_key_armored() else {
            return StepResult::Skipped("no public key".to_string());
        };

        reporter.blank();
        reporter.line(key);
        reporter.blank();
        self.policy.acknowledge(
            reporter,
            &format!(
                "Open {GITHUB_GPG_SETTINGS_URL}, click New GPG key and paste the key above."
            ),
        );
        if !self.policy.is_interactive() {
            reporter.line(format!(
                "Add the key above to GitHub at {GITHUB_GPG_SETTINGS_URL} (New GPG key)"
            ));
        }
        StepResult::Succeeded
    }

    /// POST the armored key to the key server
    pub(crate) async fn upload_to_keyserver(&self, identity: &Identity) -> StepResult {
        let reporter = self.ctx.reporter;
        if !self.policy.confirm(
            reporter,
            "In order for other people to verify your commits, they need to be able to download your public key. Would you like to upload your public key to the MIT keyserver?",
        ) {
            return StepResult::Skipped("key upload declined".to_string());
        }
        let Ok(key) = identity.public_key_armored() else {
            return StepResult::Skipped("no public key".to_string());
        };

        // keytext@- url-encodes stdin, keeping the key off the command line.
        // The status code goes on a final line of its own so the server's
        // body survives an HTTP error.
        let out = self
            .ctx
            .runner
            .run(
                Invocation::new("curl")
                    .args(["-sS", "--data-urlencode", "keytext@-"])
                    .args(["--write-out", HTTP_STATUS_TRAILER])
                    .arg(&self.ctx.settings.keyserver_url)
                    .stdin(key),
            )
            .await;

        let text = out.text();
        let (body, status) = split_http_status(&text);
        match status {
            Some(code) if out.success && (200..300).contains(&code) => {
                reporter.success("Key uploaded");
                StepResult::Succeeded
            }
            Some(code) if out.success => StepResult::Failed(format!(
                "Failed to upload key, key server returned HTTP {code}:\n{body}"
            )),
            _ => StepResult::Failed(format!("Failed to upload key, curl output:\n{body}")),
        }
    }

    /// Offer to sign every commit and annotated tag
    pub(crate) async fn offer_auto_sign(&self) -> StepResult {
        let reporter = self.ctx.reporter;
        if !self.policy.confirm(
            reporter,
            "Would you like to enable automatic commit signing?",
        ) {
            reporter.line("You can manually create a signed git commit by running git commit -S");
            return StepResult::Skipped("automatic signing declined".to_string());
        }
        self.enable_auto_sign().await
    }

    /// Import the key into gpg and trust it, so local verification works
    pub(crate) async fn import_to_local_keychain(&self, identity: &Identity) -> StepResult {
        let reporter = self.ctx.reporter;
        let Some(gpg) = self.ctx.probe.locate_executable("gpg") else {
            return StepResult::Skipped("gpg is not installed".to_string());
        };
        if !self.policy.confirm(
            reporter,
            "In order to verify your own commits, you must add your key to gpg locally. Would you like to add your public key to gpg?",
        ) {
            return StepResult::Skipped("keychain import declined".to_string());
        }

        let fingerprint = match identity.public_key_fingerprint() {
            Ok(fp) => fp,
            Err(e) => return StepResult::Failed(format!("Failed to create key fingerprint:\n{e}")),
        };
        let Ok(key) = identity.public_key_armored() else {
            return StepResult::Skipped("no public key".to_string());
        };
        let gpg = gpg.display().to_string();

        let import = self
            .ctx
            .runner
            .run(
                Invocation::new(&gpg)
                    .args(["--import", "--armor"])
                    .stdin(key),
            )
            .await;
        if !import.success {
            return StepResult::Failed(format!(
                "Failed to import key, gpg output:\n{}",
                import.text()
            ));
        }

        // Trust level 6 is ultimate
        let trust = self
            .ctx
            .runner
            .run(
                Invocation::new(&gpg)
                    .arg("--import-ownertrust")
                    .stdin(format!("{fingerprint}:6:\n")),
            )
            .await;
        if !trust.success {
            return StepResult::Failed(format!(
                "Failed to trust key, gpg output:\n{}",
                trust.text()
            ));
        }

        reporter.success("Key imported to local gpg keychain");
        StepResult::Succeeded
    }

    /// Make sure the signing helper can find the terminal
    ///
    /// Interactive runs warn and leave the profile alone; unattended runs
    /// append the export to the detected shell profile.
    pub(crate) fn ensure_tty_export(&self) -> StepResult {
        let probe = self.ctx.probe;
        if probe.env_var(TTY_ENV_VAR).is_some() {
            return StepResult::Skipped(format!("{TTY_ENV_VAR} already set"));
        }

        let profile = probe.detect_shell_profile();
        let reporter = self.ctx.reporter;

        if self.policy.is_interactive() {
            reporter.blank();
            self.policy.acknowledge(
                reporter,
                &format!(
                    "WARNING: In order to see krsign log messages when requesting a git signature, add {} to your shell startup ({}) and restart your terminal.",
                    profile.export_statement,
                    profile.path.display()
                ),
            );
            return StepResult::Skipped("profile left to the user".to_string());
        }

        match self
            .ctx
            .files
            .ensure_line_appended(&profile.path, &profile.export_statement)
        {
            Ok(LineEdit::Appended) => {
                reporter.success(format!(
                    "Added {} to {}",
                    profile.export_statement,
                    profile.path.display()
                ));
                StepResult::Succeeded
            }
            Ok(LineEdit::AlreadyPresent) => {
                debug!("{} already exports {}", profile.path.display(), TTY_ENV_VAR);
                StepResult::Succeeded
            }
            Err(e) => StepResult::Failed(format!(
                "Failed to add {} to {}: {:#}",
                profile.export_statement,
                profile.path.display(),
                e
            )),
        }
    }
}
