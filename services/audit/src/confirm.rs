//! Operator confirmation for destructive and corrective actions.
//!
//! Exactly one [`RunMode`] is active for a run. In interactive mode each
//! action is put to the operator as a one-line question; answering "all"
//! flips the policy to auto-confirm for the rest of the run and "quit" stops
//! the audit before anything else is touched.

use async_trait::async_trait;
use std::io::{self, BufRead};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::ConfigError;
use crate::error::{AuditError, Result};
use crate::finding::Finding;

/// How findings are acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Describe only, never act, never prompt
    Report,
    /// Act without prompting
    AutoConfirm,
    /// Ask the operator before every action
    Interactive,
}

impl RunMode {
    /// Resolve the mode from the `--report` and `--yes` flags
    pub fn from_flags(report: bool, yes: bool) -> Result<Self, ConfigError> {
        match (report, yes) {
            (true, true) => Err(ConfigError::ConflictingModes),
            (true, false) => Ok(RunMode::Report),
            (false, true) => Ok(RunMode::AutoConfirm),
            (false, false) => Ok(RunMode::Interactive),
        }
    }
}

/// Operator answer to a single prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Confirm,
    Deny,
    ConfirmAll,
    Quit,
}

impl PromptOutcome {
    /// Interpret one line of operator input
    ///
    /// An empty line accepts the default (confirm). Anything unrecognised is
    /// treated as a refusal.
    pub fn parse(line: &str) -> Self {
        match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            None | Some('y') => PromptOutcome::Confirm,
            Some('a') => PromptOutcome::ConfirmAll,
            Some('q') => PromptOutcome::Quit,
            Some(_) => PromptOutcome::Deny,
        }
    }
}

/// Source of operator answers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Prompter: Send {
    /// Show `question` and read one line of input; `None` at end of input
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
}

/// Prompter reading answers from the controlling terminal
///
/// Lines are read on a dedicated thread and handed over through a channel,
/// so a prompt left unanswered never holds up runtime shutdown.
pub struct StdinPrompter {
    input: Option<Box<dyn BufRead + Send>>,
    answers: Option<mpsc::Receiver<io::Result<String>>>,
    out: Stdout,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::with_reader(io::BufReader::new(io::stdin()))
    }

    /// Read answers from `input` instead of stdin
    pub fn with_reader(input: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Some(Box::new(input)),
            answers: None,
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the reader thread; the channel closes at end of input
fn spawn_line_reader(
    input: Box<dyn BufRead + Send>,
) -> io::Result<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(1);

    std::thread::Builder::new()
        .name("audit-prompt".to_string())
        .spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(rx)
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.out.write_all(question.as_bytes()).await?;
        self.out.flush().await?;

        if let Some(input) = self.input.take() {
            self.answers = Some(spawn_line_reader(input)?);
        }
        let Some(answers) = self.answers.as_mut() else {
            return Ok(None);
        };

        match answers.recv().await {
            Some(line) => line.map(|line| Some(line.trim_end().to_string())),
            None => Ok(None),
        }
    }
}

/// Gate in front of every write to the database or the archive
pub struct ConfirmationPolicy {
    mode: RunMode,
    prompter: Box<dyn Prompter>,
}

impl ConfirmationPolicy {
    pub fn new(mode: RunMode, prompter: Box<dyn Prompter>) -> Self {
        Self { mode, prompter }
    }

    /// Policy prompting on the terminal when interactive
    pub fn with_stdin(mode: RunMode) -> Self {
        Self::new(mode, Box::new(StdinPrompter::new()))
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Report `finding` and decide whether its action may go ahead
    ///
    /// Returns `Err(AuditError::Quit)` when the operator asks to stop.
    pub async fn confirm(&mut self, finding: &Finding) -> Result<bool> {
        finding.emit();

        let action = finding.action();
        match self.mode {
            RunMode::Report => Ok(false),
            RunMode::AutoConfirm => {
                info!(kind = finding.kind(), "Auto-confirmed, {}", action.progressive());
                Ok(true)
            }
            RunMode::Interactive => {
                let question = format!("{}, {} y/n/a/q: ", finding, action.verb());
                let answer = self
                    .prompter
                    .ask(&question)
                    .await
                    .map_err(AuditError::Prompt)?;

                let outcome = match answer {
                    Some(line) => PromptOutcome::parse(&line),
                    None => PromptOutcome::Quit,
                };

                match outcome {
                    PromptOutcome::Confirm => Ok(true),
                    PromptOutcome::Deny => Ok(false),
                    PromptOutcome::ConfirmAll => {
                        info!("Confirming all remaining actions for this run");
                        self.mode = RunMode::AutoConfirm;
                        Ok(true)
                    }
                    PromptOutcome::Quit => Err(AuditError::Quit),
                }
            }
        }
    }
}
