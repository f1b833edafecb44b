//! Cold reload to the loader and image boot back to a usable state.

use log::{debug, info};

use super::{BOOT_TIMEOUT, REBOOT_TIMEOUT};
use crate::engine::{PatternTable, TableEnd, TableRun};
use crate::error::Result;
use crate::session::Session;
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Reload the whole device from the shell and wait for the loader.
    ///
    /// The final label is `reloaded` once the loader prompt is observed
    /// after confirming, or `timedout` when either the confirmation prompt
    /// or the loader never appears.
    pub async fn reload(&mut self) -> Result<TableRun> {
        self.send("reload").await?;

        let confirm = PatternTable::new()
            .on_timeout("timedout")
            .break_on("This command will reboot the system", "confirm reboot")?;

        let asked = confirm.drive(self, REBOOT_TIMEOUT).await?;
        if !asked.broke() {
            return Ok(asked);
        }

        self.send("y").await?;
        // Nudge the console so the loader prompt is redrawn after the cycle.
        self.send("").await?;

        let loader_pattern = self.config().loader_prompt.clone();
        let wait_loader = PatternTable::new()
            .on_timeout("timedout")
            .terminate(&loader_pattern, "reloaded")?;

        let reached = wait_loader.drive(self, REBOOT_TIMEOUT).await?;
        Ok(reached.after(asked))
    }

    /// Reload one hardware module rather than the whole device.
    pub async fn reload_module(&mut self, module: u32) -> Result<TableRun> {
        self.send(&format!("reload module {module} force-dnld"))
            .await?;

        let confirm = PatternTable::new()
            .on_timeout("timedout")
            .break_on(r"Proceed\[y/n\]\?", "confirm module reload")?;

        let asked = confirm.drive(self, REBOOT_TIMEOUT).await?;
        if !asked.broke() {
            return Ok(asked);
        }

        self.send("y").await?;

        let shell_pattern = self.config().shell_prompt.clone();
        let back = PatternTable::new()
            .on_timeout("timedout")
            .terminate(&shell_pattern, "reloaded")?;

        let reached = back.drive(self, REBOOT_TIMEOUT).await?;
        Ok(reached.after(asked))
    }

    /// Boot the device from the loader with the given kickstart and system
    /// images, walking the first-boot dialog prompts as they appear.
    ///
    /// The dialog order and count vary between devices, so every prompt is
    /// a looping reply and only the documented terminal states end the run:
    /// `timed out`, `signature failed`, `back to loader prompt`,
    /// `at login prompt`, `at shell prompt`. Acceptance of the admin
    /// password is not separately verified.
    ///
    /// Requires the session to sit at the loader prompt; otherwise the run
    /// terminates immediately with `not at boot prompt`.
    pub async fn boot(
        &mut self,
        kickstart: &str,
        system: &str,
        admin_password: &str,
    ) -> Result<TableRun> {
        if self.is_at_loader().await? != Some(true) {
            info!("boot refused: {} is not at the loader", self.config().address);
            return Ok(TableRun {
                trace: vec!["not at boot prompt".to_string()],
                before: String::new(),
                ended: TableEnd::Terminated,
            });
        }

        debug!("booting {kickstart} + {system}");
        self.send(&format!("boot {kickstart} {system}")).await?;

        let loader_pattern = self.config().loader_prompt.clone();
        let shell_pattern = self.config().shell_prompt.clone();

        // Failure messages first: the signature error and the loader prompt
        // would otherwise be shadowed by the generic shell prompt entry.
        let dialog = PatternTable::new()
            .on_timeout("timed out")
            .terminate(
                "System image digital signature verification fail",
                "signature failed",
            )?
            .terminate(&loader_pattern, "back to loader prompt")?
            .reply(
                r"(?s)Abort Auto Provisioning and continue with normal setup.*:",
                "auto provisioning",
                "y",
            )?
            .reply(
                r"(?s)Do you want to enforce secure password standard.*:",
                "enforce secure password",
                "y",
            )?
            .reply(
                r#"Enter the password for "admin":"#,
                "set admin password",
                admin_password,
            )?
            .reply(
                r#"Confirm the password for "admin":"#,
                "set admin password",
                admin_password,
            )?
            .reply(
                r"(?s)Do you want to enable admin vdc.*:",
                "enable admin vdc",
                "n",
            )?
            .reply(
                r"(?s)Would you like to enter the basic configuration dialog.*:",
                "basic config dialog",
                "no",
            )?
            .break_on("login:", "at login prompt")?
            .terminate(&shell_pattern, "at shell prompt")?;

        dialog.drive(self, BOOT_TIMEOUT).await
    }
}
