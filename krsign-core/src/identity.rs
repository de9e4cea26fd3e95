//! Identity provider port - the paired device's view of the user
//!
//! The background agent owns the protocol for reaching the paired device.
//! This module only defines what onboarding needs from it, plus an adapter
//! that drives the agent's command line through the [`ProcessRunner`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::process::{Invocation, ProcessRunner};
use crate::settings::AgentSettings;

/// Missing key material on an [`Identity`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no PGP public key is available for {0}")]
    NoPublicKey(String),
    #[error("no PGP public key fingerprint is available for {0}")]
    NoFingerprint(String),
}

/// The user as reported by the paired device
///
/// Always fetched fresh for a run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    public_key_armored: Option<String>,
    fingerprint: Option<String>,
}

impl Identity {
    pub fn new(
        user_id: impl Into<String>,
        public_key_armored: Option<String>,
        fingerprint: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            public_key_armored: public_key_armored.filter(|k| !k.trim().is_empty()),
            fingerprint: fingerprint.filter(|f| !f.trim().is_empty()),
        }
    }

    /// ASCII-armored PGP public key
    pub fn public_key_armored(&self) -> Result<&str, IdentityError> {
        self.public_key_armored
            .as_deref()
            .ok_or_else(|| IdentityError::NoPublicKey(self.user_id.clone()))
    }

    /// Hex fingerprint used to reference the key in a keychain
    pub fn public_key_fingerprint(&self) -> Result<&str, IdentityError> {
        self.fingerprint
            .as_deref()
            .ok_or_else(|| IdentityError::NoFingerprint(self.user_id.clone()))
    }
}

/// Access to the background agent and the identity it proxies
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Whether the latest agent version is running
    async fn agent_is_latest(&self) -> Result<bool>;

    /// Ask the paired device for the identity, bypassing any agent cache
    async fn force_refresh_identity(&self, user_id: &str) -> Result<Identity>;

    /// Provider identifier for logging
    fn name(&self) -> &'static str;
}

/// Provider that shells out to the agent's command line
pub struct AgentCliProvider<'a> {
    runner: &'a dyn ProcessRunner,
    settings: AgentSettings,
}

impl<'a> AgentCliProvider<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, settings: AgentSettings) -> Self {
        Self { runner, settings }
    }

    fn invocation(&self, args: &[String]) -> Invocation {
        Invocation::new(&self.settings.program).args(args.iter().cloned())
    }
}

#[async_trait]
impl IdentityProvider for AgentCliProvider<'_> {
    async fn agent_is_latest(&self) -> Result<bool> {
        let out = self
            .runner
            .run(self.invocation(&self.settings.status_args))
            .await;
        if out.exit_code.is_none() {
            return Err(anyhow!(out.text()));
        }
        Ok(out.success)
    }

    async fn force_refresh_identity(&self, user_id: &str) -> Result<Identity> {
        let key = self
            .runner
            .run(self.invocation(&self.settings.public_key_args))
            .await;
        if !key.success {
            return Err(anyhow!(
                "{} exited unsuccessfully: {}",
                self.settings.program,
                key.text()
            ));
        }
        let armored = key.text();

        let fingerprint = self
            .runner
            .run(self.invocation(&self.settings.fingerprint_args))
            .await;
        let fingerprint = if fingerprint.success {
            Some(fingerprint.text())
        } else {
            debug!("Agent did not report a fingerprint: {}", fingerprint.text());
            None
        };

        Ok(Identity::new(user_id, Some(armored), fingerprint))
    }

    fn name(&self) -> &'static str {
        "agent-cli"
    }
}
