//! # Reflash
//!
//! Async firmware replacement automation for network switches over
//! interactive console sessions.
//!
//! Reflash drives the kind of console conversation a human would have over
//! telnet: log in, delete the old images, copy new ones over, reload, and
//! walk the first-boot dialog after booting from the loader. The same
//! workflow runs concurrently against a whole inventory of devices, one
//! independent worker per device.
//!
//! ## Features
//!
//! - Async telnet console sessions via tokio
//! - Declarative pattern→action tables for prompt-driven dialogs
//! - Built-in workflows: shell toggling, file deletion, two-phase image
//!   transfer, reload, module reload, first-boot
//! - Concurrent orchestration with per-device structured reports
//! - A transcript of every session written to disk
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reflash::{run_all, DeviceParams, Inventory, RunOptions, TelnetConnector};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut inventory = Inventory::new();
//!     inventory.insert(
//!         "sw1".to_string(),
//!         DeviceParams {
//!             address: "192.0.2.10".to_string(),
//!             username: "admin".to_string(),
//!             password: Some(SecretString::from("admin-password")),
//!             transfer_password: SecretString::from("build-password"),
//!             workspace: "nightly".to_string(),
//!             kickstart: "kickstart.bin".to_string(),
//!             kickstart_dest: "kickstart-new.bin".to_string(),
//!             system_image: "system.bin".to_string(),
//!             system_dest: "system-new.bin".to_string(),
//!             transfer_template:
//!                 "copy scp://build@10.0.0.5/{workspace}/{image} bootflash:{dest}"
//!                     .to_string(),
//!         },
//!     );
//!
//!     let connector = Arc::new(TelnetConnector::default());
//!     let reports = run_all(connector, inventory, RunOptions::default()).await;
//!
//!     for report in reports {
//!         println!("{} --> {}", report.device, report.status());
//!     }
//! }
//! ```

pub mod channel;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod transport;
pub mod workflow;

#[cfg(test)]
pub(crate) mod sim;

// Re-export main types for convenience
pub use engine::{Action, Expect, PatternTable, Step, TableEnd, TableRun};
pub use error::{Error, Result, SessionError, TableError, TransportError};
pub use orchestrator::{
    run_all, run_device, DeviceParams, Inventory, RunOptions, RunReport, StepReport,
};
pub use session::{AwaitEvent, Session, SessionConfig};
pub use transport::{Connector, TelnetConnector, TelnetTransport, Transport};
