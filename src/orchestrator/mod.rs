//! Concurrent per-device execution of the full replace-and-reboot workflow.
//!
//! One worker task per device, started eagerly, joined with a single
//! barrier. Workers share nothing mutable; a device's failure is recorded
//! in its own report and never touches a sibling.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use indexmap::IndexMap;
use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::Result;
use crate::session::{Session, SessionConfig};
use crate::transport::Connector;

fn default_username() -> String {
    "admin".to_string()
}

/// Per-device parameters, immutable for the duration of a run.
///
/// The inventory itself (file format, parsing) is the caller's business;
/// this type only gives it a deserialization target.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceParams {
    /// Console or management address.
    pub address: String,

    /// Login username.
    #[serde(default = "default_username")]
    pub username: String,

    /// Login password; doubles as the admin password set during first boot.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Password for the transfer command's remote side.
    pub transfer_password: SecretString,

    /// Source workspace name.
    pub workspace: String,

    /// Kickstart image name in the workspace.
    pub kickstart: String,

    /// Kickstart destination file name on the device.
    pub kickstart_dest: String,

    /// System image name in the workspace.
    pub system_image: String,

    /// System image destination file name on the device.
    pub system_dest: String,

    /// Transfer-command template with `{workspace}`, `{image}` and `{dest}`
    /// placeholders.
    pub transfer_template: String,
}

impl DeviceParams {
    /// Render the transfer command for one image.
    pub fn transfer_command(&self, image: &str, dest: &str) -> String {
        self.transfer_template
            .replace("{workspace}", &self.workspace)
            .replace("{image}", image)
            .replace("{dest}", dest)
    }
}

/// Device inventory: name → parameters, iteration order preserved.
pub type Inventory = IndexMap<String, DeviceParams>;

/// Run-wide knobs shared by every worker.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory for session transcripts.
    pub log_dir: PathBuf,

    /// Console settle delay before each session's first probe.
    pub settle_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("reflash_logs"),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// One step's outcome within a device's run.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Step name, e.g. `copy kickstart`.
    pub step: String,

    /// Terminal outcome label, or the error text when the step failed hard.
    pub label: String,

    /// Captured diagnostic text preceding the outcome.
    pub detail: String,
}

/// Structured result of one device's workflow.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Device name from the inventory.
    pub device: String,

    /// Every step attempted, in order.
    pub steps: Vec<StepReport>,
}

impl RunReport {
    fn new(device: &str) -> Self {
        Self {
            device: device.to_string(),
            steps: Vec::new(),
        }
    }

    fn record(&mut self, step: &str, label: impl Into<String>, detail: impl Into<String>) {
        self.steps.push(StepReport {
            step: step.to_string(),
            label: label.into(),
            detail: detail.into(),
        });
    }

    /// The final status: the last step's label.
    pub fn status(&self) -> &str {
        self.steps.last().map(|s| s.label.as_str()).unwrap_or("")
    }

    /// Look up one step's label.
    pub fn label_of(&self, step: &str) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.label.as_str())
    }
}

fn step_config(
    device: &str,
    step: &str,
    params: &DeviceParams,
    options: &RunOptions,
) -> SessionConfig {
    let mut config = SessionConfig::new(params.address.clone())
        .with_label(format!("{device}_{}", step.replace(' ', "-")))
        .with_username(params.username.clone())
        .with_log_dir(options.log_dir.clone())
        .with_settle_delay(options.settle_delay);
    if let Some(password) = &params.password {
        config = config.with_password(password.clone());
    }
    config
}

async fn open_step_session<C: Connector>(
    connector: &C,
    device: &str,
    step: &str,
    params: &DeviceParams,
    options: &RunOptions,
) -> Result<Session<C::Transport>> {
    let transport = connector.connect(&params.address).await?;
    Session::open(transport, step_config(device, step, params, options)).await
}

/// Run the full workflow for one device: delete both old images, copy both
/// new images, reload, and — if the loader is reached — boot.
///
/// Each step opens its own session. Hard failures (connection,
/// authentication, an unanswered prompt where one is required) stop the
/// remaining steps for this device and are recorded as that step's label;
/// transfer outcomes are recorded and do not stop the sequence; a reload
/// that never reaches the loader skips boot.
pub async fn run_device<C: Connector>(
    connector: &C,
    device: &str,
    params: &DeviceParams,
    options: &RunOptions,
) -> RunReport {
    let mut report = RunReport::new(device);

    // Delete the old images from the linux shell.
    for (step, dest) in [
        ("delete kickstart", &params.kickstart_dest),
        ("delete system image", &params.system_dest),
    ] {
        let mut session =
            match open_step_session(connector, device, step, params, options).await {
                Ok(session) => session,
                Err(e) => {
                    report.record(step, e.to_string(), "");
                    return report;
                }
            };
        let deleted = session.delete_file(dest).await;
        let _ = session.close().await;
        match deleted {
            Ok(()) => report.record(step, "deleted", ""),
            Err(e) => {
                report.record(step, e.to_string(), "");
                return report;
            }
        }
    }

    // Copy the new images from the device shell.
    for (step, image, dest) in [
        ("copy kickstart", &params.kickstart, &params.kickstart_dest),
        ("copy system image", &params.system_image, &params.system_dest),
    ] {
        let command = params.transfer_command(image, dest);
        let mut session =
            match open_step_session(connector, device, step, params, options).await {
                Ok(session) => session,
                Err(e) => {
                    report.record(step, e.to_string(), "");
                    return report;
                }
            };

        let copied = async {
            if session.is_in_shell().await? != Some(true) {
                session.goto_shell().await?;
            }
            session
                .copy_file(&command, params.transfer_password.expose_secret())
                .await
        }
        .await;
        let _ = session.close().await;

        match copied {
            Ok(run) => {
                let label = run.label().to_string();
                if label != "copy completed" {
                    warn!("{device}: {step} ended with '{label}'");
                }
                report.record(step, label, run.before);
            }
            Err(e) => {
                report.record(step, e.to_string(), "");
                return report;
            }
        }
    }

    // Reload and, if the device lands at the loader, boot the new images.
    let mut session =
        match open_step_session(connector, device, "reload", params, options).await {
            Ok(session) => session,
            Err(e) => {
                report.record("reload", e.to_string(), "");
                return report;
            }
        };

    let outcome = async {
        let reloaded = session.reload().await?;
        let reached_loader = reloaded.label() == "reloaded";
        report.record("reload", reloaded.label(), reloaded.before.clone());

        if reached_loader {
            let admin_password = params
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_string())
                .unwrap_or_default();
            let booted = session
                .boot(&params.kickstart_dest, &params.system_dest, &admin_password)
                .await?;
            report.record("boot", booted.label(), booted.before.clone());
        }
        Ok::<(), crate::Error>(())
    }
    .await;
    let _ = session.close().await;

    if let Err(e) = outcome {
        report.record("reload/boot", e.to_string(), "");
    }
    report
}

/// Run the full workflow for every device in the inventory concurrently,
/// one independent worker per device, and wait for all of them.
///
/// Reports come back in inventory order. A worker panic becomes a report,
/// not a crash.
pub async fn run_all<C>(
    connector: Arc<C>,
    inventory: Inventory,
    options: RunOptions,
) -> Vec<RunReport>
where
    C: Connector + 'static,
{
    let workers: Vec<_> = inventory
        .into_iter()
        .map(|(device, params)| {
            let connector = connector.clone();
            let options = options.clone();
            tokio::spawn(async move {
                run_device(connector.as_ref(), &device, &params, &options).await
            })
        })
        .collect();

    let mut reports = Vec::with_capacity(workers.len());
    for joined in join_all(workers).await {
        match joined {
            Ok(report) => {
                info!("{} --> {}", report.device, report.status());
                reports.push(report);
            }
            Err(e) => {
                let mut report = RunReport::new("unknown");
                report.record("worker", format!("worker panicked: {e}"), "");
                reports.push(report);
            }
        }
    }
    reports
}
