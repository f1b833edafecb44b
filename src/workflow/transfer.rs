//! Image transfer: two-phase copy driven by pattern tables.

use log::debug;

use super::{NEGOTIATION_TIMEOUT, TRANSFER_TIMEOUT};
use crate::engine::{PatternTable, TableRun};
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Run a complete transfer command (e.g. an scp invocation) from the
    /// device shell.
    ///
    /// Phase 1 resolves connection-level prompts: host-key confirmation and
    /// overwrite confirmation are answered, while permission or overwrite
    /// policy rejections terminate. A password prompt hands over to phase 2,
    /// which sends `transfer_password` and waits out the transfer itself.
    ///
    /// The returned run carries both phases' trace; the last label is one of
    /// `command timed out`, `permission denied`, `overwrite not allowed`,
    /// `copy timed out`, `copy completed`, `copy failed`, `file not found`.
    pub async fn copy_file(
        &mut self,
        command: &str,
        transfer_password: &str,
    ) -> Result<TableRun> {
        // Paging and line wrapping would mangle the patterns below.
        self.run_command("term len 0", false).await?;
        self.run_command("term width 100", false).await?;

        debug!("starting transfer: {command}");
        self.send(command).await?;

        // Rejection messages before the generic prompts they could shadow.
        let negotiation = PatternTable::new()
            .on_timeout("command timed out")
            .terminate(
                r"(?s)Permission denied.*Cannot overwrite existing file",
                "permission denied",
            )?
            .terminate(
                "Overwriting/deleting this image is not allowed",
                "overwrite not allowed",
            )?
            .reply(
                r"Are you sure you want to continue connecting \(yes/no\)\?",
                "connecting prompt",
                "yes",
            )?
            .reply(
                r"Do you want to overwrite \(y/n\)\?",
                "overwrite prompt",
                "y",
            )?
            .break_on("[Pp]ass.*?:", "password prompt")?;

        let phase1 = negotiation.drive(self, NEGOTIATION_TIMEOUT).await?;
        if !phase1.broke() {
            return Ok(phase1);
        }

        self.send(transfer_password).await?;

        let outcome = PatternTable::new()
            .on_timeout("copy timed out")
            .terminate("Copy complete", "copy completed")?
            .terminate("Copy failed", "copy failed")?
            .terminate("No such file or directory", "file not found")?;

        let phase2 = outcome.drive(self, TRANSFER_TIMEOUT).await?;
        Ok(phase2.after(phase1))
    }
}
