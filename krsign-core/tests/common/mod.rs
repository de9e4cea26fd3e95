//! Shared fakes for onboarding integration tests
//!
//! `FakeMachine` bundles an in-memory git config (served through a fake
//! process runner), a probe rooted in a temporary home directory, a
//! scripted identity provider and a counting prompter.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;

use krsign_core::analytics::{AnalyticsEvent, AnalyticsSink};
use krsign_core::identity::{Identity, IdentityProvider};
use krsign_core::probe::EnvironmentProbe;
use krsign_core::process::{CommandOutput, Invocation, ProcessRunner};
use krsign_core::profile::LocalFileMutator;
use krsign_core::prompt::Prompter;
use krsign_core::report::{CapturedOutput, StatusReporter};
use krsign_core::{Codesign, ConfirmationPolicy, SetupContext, Settings};

pub const HELPER_PATH: &str = "/opt/kr/bin/krgpg";
pub const GPG_PATH: &str = "/usr/bin/gpg";
pub const FINGERPRINT: &str = "0123456789ABCDEF0123456789ABCDEF01234567";
pub const ARMORED_KEY: &str =
    "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBFakeKey\n-----END PGP PUBLIC KEY BLOCK-----";

static INIT: Once = Once::new();

/// Initialize logging for tests (only once per test run)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Process runner that emulates git, curl, gpg and ln
#[derive(Default)]
pub struct FakeRunner {
    pub config: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<Invocation>>,
    /// Config keys whose writes fail
    pub failing_sets: Mutex<HashSet<String>>,
    pub curl_output: Mutex<Option<CommandOutput>>,
    pub gpg_import_fails: Mutex<bool>,
    pub commit_fails: Mutex<bool>,
}

impl FakeRunner {
    pub fn get(&self, key: &str) -> Option<String> {
        self.config.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.config
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.config.lock().unwrap().clone()
    }

    pub fn fail_set(&self, key: &str) {
        self.failing_sets.lock().unwrap().insert(key.to_string());
    }

    pub fn calls_to(&self, program_suffix: &str) -> Vec<Invocation> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program.ends_with(program_suffix))
            .cloned()
            .collect()
    }

    pub fn config_writes(&self) -> usize {
        self.calls_to("git")
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some("config") && c.args.len() == 4)
            .count()
    }

    fn git(&self, args: &[String]) -> CommandOutput {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["config", "--global", "--unset", key] => {
                match self.config.lock().unwrap().remove(*key) {
                    Some(_) => CommandOutput::succeeded(""),
                    None => CommandOutput::failed(5, ""),
                }
            }
            ["config", "--global", key] => match self.get(key) {
                Some(value) => CommandOutput::succeeded(format!("{value}\n")),
                None => CommandOutput::failed(1, ""),
            },
            ["config", "--global", key, value] => {
                if self.failing_sets.lock().unwrap().contains(*key) {
                    return CommandOutput::failed(255, "error: could not lock config file");
                }
                self.put(key, value);
                CommandOutput::succeeded("")
            }
            ["init", path] => {
                std::fs::create_dir_all(Path::new(path).join(".git")).unwrap();
                CommandOutput::succeeded(format!("Initialized empty Git repository in {path}/.git/"))
            }
            ["commit", ..] => {
                if *self.commit_fails.lock().unwrap() {
                    CommandOutput::failed(128, "error: gpg failed to sign the data")
                } else {
                    CommandOutput::succeeded("[main (root-commit) 1a2b3c4] Testing your first signed commit")
                }
            }
            other => CommandOutput::failed(129, format!("unexpected git call {other:?}")),
        }
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: Invocation) -> CommandOutput {
        self.calls.lock().unwrap().push(invocation.clone());
        let program = Path::new(&invocation.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        match program.as_str() {
            "git" => self.git(&invocation.args),
            "curl" => self
                .curl_output
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| CommandOutput::succeeded("Key block added to key server database.\n200")),
            "gpg" => {
                if invocation.args.iter().any(|a| a == "--import") && *self.gpg_import_fails.lock().unwrap() {
                    CommandOutput::failed(2, "gpg: no valid OpenPGP data found.")
                } else {
                    CommandOutput::succeeded("gpg: key imported")
                }
            }
            "ln" => CommandOutput::succeeded(""),
            _ => CommandOutput::not_started(format!("failed to start {}", invocation.program)),
        }
    }
}

/// Probe with a temporary home and a configurable PATH
pub struct FakeProbe {
    pub home: PathBuf,
    pub env: Mutex<HashMap<String, String>>,
    pub executables: Mutex<HashMap<String, PathBuf>>,
    /// git reachable from the canonical directories
    pub git_linked: Mutex<bool>,
}

impl FakeProbe {
    pub fn set_env(&self, key: &str, value: &str) {
        self.env
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn remove_executable(&self, name: &str) {
        self.executables.lock().unwrap().remove(name);
    }
}

impl EnvironmentProbe for FakeProbe {
    fn locate_executable(&self, name: &str) -> Option<PathBuf> {
        self.executables.lock().unwrap().get(name).cloned()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        self.env
            .lock()
            .unwrap()
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
            || self
                .executables
                .lock()
                .unwrap()
                .values()
                .any(|p| p == path)
    }

    fn is_executable(&self, path: &Path) -> bool {
        *self.git_linked.lock().unwrap() && path.ends_with("git")
    }
}

/// Identity provider with canned answers
pub struct FakeIdentity {
    pub latest: Mutex<Result<bool, String>>,
    pub key: Mutex<Option<String>>,
    pub fingerprint: Mutex<Option<String>>,
    pub fetch_error: Mutex<Option<String>>,
    pub fetches: AtomicUsize,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self {
            latest: Mutex::new(Ok(true)),
            key: Mutex::new(Some(ARMORED_KEY.to_string())),
            fingerprint: Mutex::new(Some(FINGERPRINT.to_string())),
            fetch_error: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn agent_is_latest(&self) -> Result<bool> {
        self.latest.lock().unwrap().clone().map_err(|e| anyhow!(e))
    }

    async fn force_refresh_identity(&self, user_id: &str) -> Result<Identity> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.fetch_error.lock().unwrap().clone() {
            return Err(anyhow!(e));
        }
        Ok(Identity::new(
            user_id,
            self.key.lock().unwrap().clone(),
            self.fingerprint.lock().unwrap().clone(),
        ))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Prompter that replays answers and counts reads
#[derive(Clone, Default)]
pub struct CountingPrompter {
    pub answers: Arc<Mutex<Vec<String>>>,
    pub reads: Arc<AtomicUsize>,
}

impl CountingPrompter {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: Arc::new(Mutex::new(
                answers.iter().map(|a| format!("{a}\n")).collect(),
            )),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Prompter for CountingPrompter {
    fn read_line(&self) -> io::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            Ok(None)
        } else {
            Ok(Some(answers.remove(0)))
        }
    }
}

/// Sink whose posts never finish; counts how many were started
#[derive(Default)]
pub struct StalledAnalytics {
    pub started: AtomicUsize,
}

#[async_trait]
impl AnalyticsSink for StalledAnalytics {
    async fn post(&self, _event: AnalyticsEvent) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// A fully wired machine for one test
pub struct FakeMachine {
    pub home: TempDir,
    pub runner: FakeRunner,
    pub probe: FakeProbe,
    pub files: LocalFileMutator,
    pub identity: FakeIdentity,
    pub settings: Settings,
    pub reporter: StatusReporter,
    pub output: CapturedOutput,
}

impl FakeMachine {
    /// bash user with an existing `.bashrc`, git configured, everything installed
    pub fn new() -> Self {
        init_test_logging();

        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(".bashrc"), "alias ll='ls -l'\n").unwrap();

        let runner = FakeRunner::default();
        runner.put("user.name", "Jo Example");
        runner.put("user.email", "jo@example.com");

        let probe = FakeProbe {
            home: home.path().to_path_buf(),
            env: Mutex::new(HashMap::from([(
                "SHELL".to_string(),
                "/bin/bash".to_string(),
            )])),
            executables: Mutex::new(HashMap::from([
                ("krgpg".to_string(), PathBuf::from(HELPER_PATH)),
                ("gpg".to_string(), PathBuf::from(GPG_PATH)),
                ("git".to_string(), PathBuf::from("/usr/bin/git")),
            ])),
            git_linked: Mutex::new(true),
        };

        let settings = Settings::default();
        let files = LocalFileMutator::new(settings.profile_marker.clone());
        let (reporter, output) = StatusReporter::capture();

        Self {
            home,
            runner,
            probe,
            files,
            identity: FakeIdentity::default(),
            settings,
            reporter,
            output,
        }
    }

    pub fn context(&self) -> SetupContext<'_> {
        SetupContext::new(
            &self.runner,
            &self.probe,
            &self.files,
            &self.identity,
            &self.settings,
            &self.reporter,
        )
    }

    pub fn codesign(&self) -> Codesign<'_> {
        Codesign::new(self.context())
    }

    pub fn codesign_with_analytics(&self, sink: Arc<dyn AnalyticsSink>) -> Codesign<'_> {
        Codesign::new(self.context().with_analytics(sink))
    }

    pub fn bashrc(&self) -> String {
        std::fs::read_to_string(self.home.path().join(".bashrc")).unwrap()
    }

    pub fn output(&self) -> String {
        self.output.contents()
    }
}

pub fn interactive(prompter: &CountingPrompter) -> ConfirmationPolicy {
    ConfirmationPolicy::PromptUser(Box::new(prompter.clone()))
}
