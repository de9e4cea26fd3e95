//! krsign - configure git to sign commits through a paired signing agent
//!
//! Every command is idempotent. Status lines go to stderr, as do logs.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use krsign_core::identity::AgentCliProvider;
use krsign_core::probe::SystemProbe;
use krsign_core::process::SystemRunner;
use krsign_core::profile::LocalFileMutator;
use krsign_core::report::StatusReporter;
use krsign_core::{
    analytics, Codesign, ConfirmationPolicy, OnboardingError, SetupContext, Settings,
    UninstallOutcome,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "krsign",
    about = "Sign git commits and tags with the key on your paired device",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    trace_json: bool,

    /// Override the settings file path
    #[clap(long, global = true, env = "KRSIGN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Configure git to sign commits and tags
    Enable {
        /// Ask before each optional step instead of accepting it
        #[clap(long, short = 'i')]
        interactive: bool,
    },

    /// Stop signing commits and tags automatically
    Disable,

    /// Turn automatic signing back on
    On,

    /// Make a signed commit in a scratch repository
    Test,

    /// Remove the signing configuration from git
    Uninstall,
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    // RUST_LOG wins over --log-level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.trace_json);

    // The env fallback is already folded into --config by clap
    let settings = Settings::discover(cli.config.as_deref())?;
    debug!("Settings: {:?}", settings);

    let runner = SystemRunner;
    let probe = SystemProbe;
    let files = LocalFileMutator::new(settings.profile_marker.clone());
    let identity = AgentCliProvider::new(&runner, settings.agent.clone());
    let reporter = StatusReporter::stderr();
    let ctx = SetupContext::new(&runner, &probe, &files, &identity, &settings, &reporter)
        .with_analytics(analytics::sink_for(settings.analytics.endpoint.as_deref()));
    let codesign = Codesign::new(ctx);

    let outcome = match cli.command {
        Command::Enable { interactive } => {
            let policy = if interactive {
                ConfirmationPolicy::interactive()
            } else {
                ConfirmationPolicy::AlwaysYes
            };
            codesign.enable(&policy).await.map(|_| true)
        }
        Command::Disable => {
            codesign.disable().await;
            Ok(true)
        }
        Command::On => codesign.on().await.map(|_| true),
        Command::Test => codesign.test().await.map(|report| report.passed),
        Command::Uninstall => {
            if let UninstallOutcome::ForeignProgram(program) = codesign.uninstall().await {
                debug!("Left foreign signing program {} in place", program);
            }
            Ok(true)
        }
    };

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => exit_with(&reporter, e),
    }
}

fn exit_with(reporter: &StatusReporter, error: OnboardingError) -> ! {
    error.log();
    reporter.failure(&error);
    std::process::exit(1);
}
