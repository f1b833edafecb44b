//! The pattern→action dispatch engine.
//!
//! Every workflow in this crate is the same loop with different data: wait
//! for one of an ordered list of prompts, record the label of whichever
//! matched, then either stop, reply and keep waiting, or hand control to
//! the next phase. [`PatternTable`] holds the data; [`PatternTable::drive`]
//! is the loop.
//!
//! Step order is significant: evaluation is first-match-wins in declared
//! order, so more specific matches (a failure message that would also
//! satisfy a generic prompt) must be declared before generic ones.

use std::time::Duration;

use log::debug;
use regex::bytes::Regex;

use crate::error::{Result, SessionError, TableError};
use crate::session::{AwaitEvent, Session};
use crate::transport::Transport;

/// What a step waits for.
#[derive(Debug)]
pub enum Expect {
    /// A pattern over newly arrived session output.
    Pattern(Regex),

    /// The reserved timeout pseudo-pattern.
    Timeout,

    /// The reserved end-of-stream pseudo-pattern.
    Eof,
}

/// What happens when a step matches.
#[derive(Debug, Clone)]
pub enum Action {
    /// End the loop and return the accumulated trace and captured text.
    Terminate,

    /// Send a fixed reply and keep waiting on the same table.
    Reply(String),

    /// Exit the loop without sending anything; control passes to the
    /// caller's next phase.
    Break,
}

/// One table entry: a match condition, an outcome label, and an action.
#[derive(Debug)]
pub struct Step {
    pub expect: Expect,
    pub label: String,
    pub action: Action,
}

/// How a table run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEnd {
    /// A terminate step fired.
    Terminated,

    /// A break step fired; the caller continues with the next phase.
    Broke,
}

/// The outcome of driving one table: every label visited, the captured
/// text preceding the final match, and how the loop ended.
#[derive(Debug)]
pub struct TableRun {
    pub trace: Vec<String>,
    pub before: String,
    pub ended: TableEnd,
}

impl TableRun {
    /// The terminal outcome label (the last transition visited).
    pub fn label(&self) -> &str {
        self.trace.last().map(String::as_str).unwrap_or("")
    }

    /// Whether the run exited via a break step.
    pub fn broke(&self) -> bool {
        self.ended == TableEnd::Broke
    }

    /// Prepend an earlier phase's trace to this run.
    pub fn after(mut self, earlier: TableRun) -> TableRun {
        let mut trace = earlier.trace;
        trace.extend(self.trace.drain(..));
        self.trace = trace;
        self
    }
}

/// An ordered sequence of [`Step`]s driving one phase of interaction.
#[derive(Debug, Default)]
pub struct PatternTable {
    steps: Vec<Step>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step. Lower-level than the named builders below.
    pub fn step(mut self, expect: Expect, label: impl Into<String>, action: Action) -> Self {
        self.steps.push(Step {
            expect,
            label: label.into(),
            action,
        });
        self
    }

    /// On `pattern`, end the loop with `label`.
    pub fn terminate(self, pattern: &str, label: impl Into<String>) -> Result<Self> {
        let re = Regex::new(pattern).map_err(SessionError::InvalidPattern)?;
        Ok(self.step(Expect::Pattern(re), label, Action::Terminate))
    }

    /// On `pattern`, send `input` and keep waiting.
    pub fn reply(
        self,
        pattern: &str,
        label: impl Into<String>,
        input: impl Into<String>,
    ) -> Result<Self> {
        let re = Regex::new(pattern).map_err(SessionError::InvalidPattern)?;
        Ok(self.step(Expect::Pattern(re), label, Action::Reply(input.into())))
    }

    /// On `pattern`, exit the loop for the caller's next phase.
    pub fn break_on(self, pattern: &str, label: impl Into<String>) -> Result<Self> {
        let re = Regex::new(pattern).map_err(SessionError::InvalidPattern)?;
        Ok(self.step(Expect::Pattern(re), label, Action::Break))
    }

    /// When the timeout elapses, end the loop with `label`.
    pub fn on_timeout(self, label: impl Into<String>) -> Self {
        self.step(Expect::Timeout, label, Action::Terminate)
    }

    /// When the stream ends, end the loop with `label`.
    pub fn on_eof(self, label: impl Into<String>) -> Self {
        self.step(Expect::Eof, label, Action::Terminate)
    }

    fn position_of(&self, want_timeout: bool) -> Option<usize> {
        self.steps.iter().position(|s| match s.expect {
            Expect::Timeout => want_timeout,
            Expect::Eof => !want_timeout,
            Expect::Pattern(_) => false,
        })
    }

    /// Drive `session` through this table with `timeout` per wait.
    ///
    /// Returns an error before the first wait if the table carries no
    /// timeout step — a table that could wait forever is malformed.
    pub async fn drive<T: Transport>(
        &self,
        session: &mut Session<T>,
        timeout: Duration,
    ) -> Result<TableRun> {
        let timeout_step = self
            .position_of(true)
            .ok_or(TableError::MissingTimeoutStep)?;
        let eof_step = self.position_of(false);

        // Pattern steps in declared order; their positions map matches back
        // to table entries.
        let mut patterns: Vec<&Regex> = Vec::new();
        let mut pattern_steps: Vec<usize> = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            if let Expect::Pattern(ref re) = step.expect {
                patterns.push(re);
                pattern_steps.push(i);
            }
        }

        let mut trace: Vec<String> = Vec::new();
        loop {
            let (step_index, before) =
                match session.await_one_of(&patterns, timeout).await? {
                    AwaitEvent::Matched { index, before } => {
                        (pattern_steps[index], before)
                    }
                    AwaitEvent::TimedOut => (timeout_step, session.pending_output()),
                    AwaitEvent::Eof => match eof_step {
                        Some(i) => (i, session.pending_output()),
                        None => return Err(SessionError::Eof.into()),
                    },
                };

            let step = &self.steps[step_index];
            trace.push(step.label.clone());
            debug!("table step matched: {}", step.label);

            match step.action {
                Action::Terminate => {
                    return Ok(TableRun {
                        trace,
                        before,
                        ended: TableEnd::Terminated,
                    });
                }
                Action::Break => {
                    return Ok(TableRun {
                        trace,
                        before,
                        ended: TableEnd::Broke,
                    });
                }
                Action::Reply(ref input) => session.send(input).await?,
            }
        }
    }
}
