//! Collaborators shared by every onboarding step

use std::sync::Arc;

use crate::analytics::{AnalyticsSink, DisabledAnalytics};
use crate::git_config::GitConfig;
use crate::identity::IdentityProvider;
use crate::probe::EnvironmentProbe;
use crate::process::ProcessRunner;
use crate::profile::FileMutator;
use crate::report::StatusReporter;
use crate::settings::Settings;

/// Everything a step may touch, injected once by the caller
pub struct SetupContext<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub probe: &'a dyn EnvironmentProbe,
    pub files: &'a dyn FileMutator,
    pub identity: &'a dyn IdentityProvider,
    pub settings: &'a Settings,
    pub reporter: &'a StatusReporter,
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl<'a> SetupContext<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        probe: &'a dyn EnvironmentProbe,
        files: &'a dyn FileMutator,
        identity: &'a dyn IdentityProvider,
        settings: &'a Settings,
        reporter: &'a StatusReporter,
    ) -> Self {
        Self {
            runner,
            probe,
            files,
            identity,
            settings,
            reporter,
            analytics: Arc::new(DisabledAnalytics),
        }
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn git_config(&self) -> GitConfig<'a> {
        GitConfig::new(self.runner)
    }
}
