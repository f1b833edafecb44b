//! Per-session transcript capture.
//!
//! Every byte received on a session is appended to an audit file named from
//! the session label, a timestamp, and the device address. The directory is
//! created on first use.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, SessionError};

/// Append-only transcript sink for one session.
#[derive(Debug)]
pub struct Transcript {
    file: Option<File>,
    path: PathBuf,
}

impl Transcript {
    /// Open a transcript file under `dir` for the given session.
    ///
    /// The file is named `log_{label}_{unix-seconds}_{address}.log`; colons
    /// in the address are replaced so the name stays filesystem-safe.
    pub async fn open(dir: &Path, label: &str, address: &str) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(SessionError::Transcript)?;

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let safe_address = address.replace(':', "-");
        let path = dir.join(format!("log_{label}_{ts}_{safe_address}.log"));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(SessionError::Transcript)?;

        debug!("transcript opened at {}", path.display());
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// Append received bytes to the transcript.
    pub async fn append(&mut self, data: &[u8]) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(data).await.map_err(SessionError::Transcript)?;
        }
        Ok(())
    }

    /// Flush and close the transcript. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(SessionError::Transcript)?;
            debug!("transcript closed at {}", self.path.display());
        }
        Ok(())
    }

    /// Path of the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_close() {
        let dir = std::env::temp_dir().join(format!(
            "reflash-transcript-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));

        let mut t = Transcript::open(&dir, "unit", "192.0.2.1:23").await.unwrap();
        t.append(b"hello ").await.unwrap();
        t.append(b"world").await.unwrap();
        let path = t.path().to_path_buf();
        t.close().await.unwrap();
        // close twice is fine
        t.close().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "hello world");
        assert!(path.file_name().unwrap().to_str().unwrap().contains("192.0.2.1-23"));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
