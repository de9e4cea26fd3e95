//! krsign core library
//!
//! Configures git so commits and tags are signed by an external signing
//! helper backed by a paired device. Every step is safe to re-run.

pub mod analytics;
pub mod context;
pub mod error;
pub mod git_config;
pub mod identity;
pub mod orchestrator;
pub mod probe;
pub mod process;
pub mod profile;
pub mod prompt;
pub mod report;
pub mod settings;
pub mod steps;

pub use context::SetupContext;
pub use error::OnboardingError;
pub use orchestrator::{Codesign, EnableReport, SelfTestReport, UninstallOutcome};
pub use prompt::ConfirmationPolicy;
pub use settings::Settings;
