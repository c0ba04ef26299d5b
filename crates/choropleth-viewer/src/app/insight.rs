//! Insight requests answered by an external command
//!
//! Requests run off the UI thread; the outcome is posted into a shared slot and
//! picked up by [`InsightPanel::poll`] on a later frame.

use choropleth_lib::insight::{InsightError, InsightOutcome, InsightService};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::{Arc, RwLock};

/// Pipes the map context and the question to a command and reads its stdout
pub struct CommandInsight {
    program: String,
    args: Vec<String>,
}

impl CommandInsight {
    /// Split a command line on whitespace; `None` when it is blank
    pub fn new(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl InsightService for CommandInsight {
    fn generate(&self, context: &str, question: &str) -> Result<String, InsightError> {
        profiling::scope!("CommandInsight::generate");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            write!(stdin, "{context}\nQuestion: {question}\n")?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InsightError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if answer.is_empty() {
            return Err(InsightError::Failed(format!(
                "{} returned no text",
                self.program
            )));
        }
        Ok(answer)
    }
}

/// Sidebar state of the insight feature
pub struct InsightPanel {
    service: Option<Arc<dyn InsightService>>,
    /// Question being edited
    pub question: String,
    /// Last displayed outcome
    pub outcome: Option<InsightOutcome>,
    pending: bool,
    /// Written by the background job, read by the UI
    result: Arc<RwLock<Option<InsightOutcome>>>,
}

impl InsightPanel {
    pub fn new(service: Option<Arc<dyn InsightService>>) -> Self {
        Self {
            service,
            question: String::new(),
            outcome: None,
            pending: false,
            result: Arc::new(RwLock::new(None)),
        }
    }

    /// Panel backed by `--insight-command`, if given
    pub fn from_command(command_line: Option<&str>) -> Self {
        let service = command_line
            .and_then(CommandInsight::new)
            .map(|service| Arc::new(service) as Arc<dyn InsightService>);
        Self::new(service)
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Start a request in the background
    pub fn request(&mut self, context: String) {
        if self.pending {
            return;
        }
        let Some(service) = self.service.clone() else {
            self.outcome = Some(InsightOutcome::from_result(Err(InsightError::Unavailable)));
            return;
        };

        self.pending = true;
        let question = self.question.trim().to_string();
        let slot = self.result.clone();
        let job = move || {
            let outcome = InsightOutcome::from_result(service.generate(&context, &question));
            match slot.write() {
                Ok(mut slot) => *slot = Some(outcome),
                Err(poisoned) => *poisoned.into_inner() = Some(outcome),
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(job);
            }
            Err(_) => {
                tracing::debug!("No async runtime, running insight request on a thread");
                std::thread::spawn(job);
            }
        }
    }

    /// Pick up a finished request; returns whether the outcome changed
    pub fn poll(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        // Use try_write for non-blocking UI polling.
        let finished = match self.result.try_write() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        match finished {
            Some(outcome) => {
                self.outcome = Some(outcome);
                self.pending = false;
                true
            }
            None => false,
        }
    }
}
