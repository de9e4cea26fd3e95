//! Process runner - the single chokepoint for external tool invocations
//!
//! git config reads and writes, signing helper discovery, keychain imports
//! and the key-server upload all go through [`ProcessRunner::run`]. The
//! runner never decides whether a failure matters; it captures the combined
//! stdout/stderr stream and classifies the run by exit status only. Callers
//! decide whether a failure is fatal or merely reported.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, trace};

/// One external command to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    pub env: Vec<(String, String)>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            env: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes written to the child's standard input before it is closed
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs and messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of running an [`Invocation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout and stderr interleaved in arrival order
    pub output: Vec<u8>,
    /// Exit code, `None` when killed by a signal or never started
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutput {
    pub fn succeeded(output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(0),
            success: true,
        }
    }

    pub fn failed(exit_code: i32, output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(exit_code),
            success: false,
        }
    }

    /// The program could not be started at all
    pub fn not_started(reason: impl std::fmt::Display) -> Self {
        Self {
            output: reason.to_string().into_bytes(),
            exit_code: None,
            success: false,
        }
    }

    /// Captured output as trimmed, lossily decoded text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.output).trim().to_string()
    }
}

/// Runs external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Execute the invocation to completion
    async fn run(&self, invocation: Invocation) -> CommandOutput;
}

/// Runner backed by real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: Invocation) -> CommandOutput {
        debug!("Running: {}", invocation.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!("Failed to start {}: {}", invocation.program, e);
                return CommandOutput::not_started(format!(
                    "failed to start {}: {}",
                    invocation.program, e
                ));
            }
        };

        let combined = Mutex::new(Vec::new());
        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let input = invocation.stdin.clone();
        let feed = async move {
            if let (Some(mut pipe), Some(bytes)) = (stdin_pipe, input) {
                // A child that exits without reading its input closes the pipe early
                if let Err(e) = pipe.write_all(&bytes).await {
                    trace!("stdin write ended early: {}", e);
                }
            }
        };

        let (_, _, _, status) = tokio::join!(
            feed,
            pump(stdout_pipe, &combined),
            pump(stderr_pipe, &combined),
            child.wait()
        );

        let output = combined.into_inner().unwrap_or_else(|e| e.into_inner());
        match status {
            Ok(status) => {
                debug!("{} exited with {}", invocation.program, status);
                CommandOutput {
                    output,
                    exit_code: status.code(),
                    success: status.success(),
                }
            }
            Err(e) => CommandOutput::not_started(format!(
                "failed waiting for {}: {}",
                invocation.program, e
            )),
        }
    }
}

/// Copy a child pipe into the shared buffer chunk by chunk
async fn pump<R: AsyncRead + Unpin>(reader: Option<R>, sink: &Mutex<Vec<u8>>) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(&buf[..n]),
            Err(e) => {
                trace!("pipe read ended: {}", e);
                break;
            }
        }
    }
}
