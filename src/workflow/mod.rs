//! Device workflows composing [`Session`](crate::session::Session) and the
//! pattern engine: shell probing and toggling, single commands, file
//! deletion, image transfer, reload, and boot through the first-boot
//! dialog.
//!
//! All operations are inherent methods on `Session<T>`. Timeouts follow the
//! device's observed behavior: probes resolve in a second, prompt waits get
//! two minutes, transfers ten, and a full boot twenty.

mod reboot;
mod shell;
mod transfer;

use std::time::Duration;

/// Window for shell/loader probes; an unanswered probe means "unknown".
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Window for an ordinary command to return to a prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Window for transfer connection negotiation (host key, overwrite).
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Window for the transfer itself; images are large.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Window for the reboot confirmation and the fall back to the loader.
pub const REBOOT_TIMEOUT: Duration = Duration::from_secs(120);

/// Window for each first-boot dialog prompt while booting.
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(1200);
