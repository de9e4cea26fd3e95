//! Human-readable status lines
//!
//! Status goes to stderr so stdout stays free for anything a script might
//! want to capture. Diagnostic logging is separate and goes through tracing.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Writes status lines for the user
pub struct StatusReporter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl StatusReporter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Reporter plus a handle to everything it writes
    pub fn capture() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(captured.clone()), captured)
    }

    /// Write text without a trailing newline and flush
    pub fn raw(&self, text: impl Display) {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        // Status output is best effort; a closed stderr must not abort onboarding
        let _ = write!(out, "{text}");
        let _ = out.flush();
    }

    pub fn line(&self, text: impl Display) {
        self.raw(format_args!("{text}\n"));
    }

    pub fn blank(&self) {
        self.raw("\n");
    }

    pub fn success(&self, text: impl Display) {
        self.line(format_args!("✅ {text}"));
    }

    pub fn warn(&self, text: impl Display) {
        self.line(format_args!("⚠️  {text}"));
    }

    pub fn failure(&self, text: impl Display) {
        self.line(format_args!("❌ {text}"));
    }
}

/// In-memory sink shared with a [`StatusReporter`]
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
