//! Shell-mode probing and toggling, single commands, file deletion.

use log::debug;
use regex::bytes::Regex;

use super::{PROBE_TIMEOUT, PROMPT_TIMEOUT};
use crate::error::{Result, SessionError};
use crate::session::{AwaitEvent, Session};
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Send `command` and wait for the shell prompt (or the loader prompt
    /// with `at_loader`), returning the raw captured text preceding it.
    pub async fn run_command(&mut self, command: &str, at_loader: bool) -> Result<String> {
        let prompt = if at_loader {
            self.loader_prompt().clone()
        } else {
            self.shell_prompt().clone()
        };

        self.send(command).await?;
        match self.await_one_of(&[&prompt], PROMPT_TIMEOUT).await? {
            AwaitEvent::Matched { before, .. } => Ok(before),
            AwaitEvent::TimedOut => Err(SessionError::PromptTimeout(PROMPT_TIMEOUT).into()),
            AwaitEvent::Eof => Err(SessionError::Eof.into()),
        }
    }

    /// Probe whether the session sits at the device shell or at the
    /// underlying linux shell, by running an innocuous clock query.
    ///
    /// `Some(true)` means device shell, `Some(false)` means linux shell
    /// ("command not found"), `None` means the probe went unanswered.
    pub async fn is_in_shell(&mut self) -> Result<Option<bool>> {
        let in_shell = Regex::new("Time").map_err(SessionError::InvalidPattern)?;
        let not_found =
            Regex::new("command not found").map_err(SessionError::InvalidPattern)?;

        self.send("show clock").await?;
        match self
            .await_one_of(&[&in_shell, &not_found], PROBE_TIMEOUT)
            .await?
        {
            AwaitEvent::Matched { index: 0, .. } => Ok(Some(true)),
            AwaitEvent::Matched { .. } => Ok(Some(false)),
            AwaitEvent::TimedOut => Ok(None),
            AwaitEvent::Eof => Err(SessionError::Eof.into()),
        }
    }

    /// Probe whether the session sits at the loader prompt.
    pub async fn is_at_loader(&mut self) -> Result<Option<bool>> {
        let loader = self.loader_prompt().clone();
        let shell = self.shell_prompt().clone();

        self.send("").await?;
        match self.await_one_of(&[&loader, &shell], PROBE_TIMEOUT).await? {
            AwaitEvent::Matched { index: 0, .. } => Ok(Some(true)),
            AwaitEvent::Matched { .. } => Ok(Some(false)),
            AwaitEvent::TimedOut => Ok(None),
            AwaitEvent::Eof => Err(SessionError::Eof.into()),
        }
    }

    /// Enter the device shell from the linux shell and prepare it for
    /// scripted use: paging off, fixed display width.
    pub async fn goto_shell(&mut self) -> Result<()> {
        self.run_command("vsh", false).await?;
        self.run_command("term len 0", false).await?;
        self.run_command("term width 100", false).await?;
        Ok(())
    }

    /// Drop from the device shell back to the linux shell.
    pub async fn exit_shell(&mut self) -> Result<()> {
        self.run_command("exit", false).await?;
        Ok(())
    }

    /// Delete a file from bootflash via the linux shell, toggling out of
    /// the device shell first when needed.
    ///
    /// Fire-and-forget: a missing file is not distinguished from a
    /// successful delete.
    pub async fn delete_file(&mut self, name: &str) -> Result<()> {
        if self.is_in_shell().await? == Some(true) {
            self.exit_shell().await?;
        }
        debug!("deleting /bootflash/{name}");
        self.run_command(&format!("rm /bootflash/{name}"), false)
            .await?;
        Ok(())
    }
}
