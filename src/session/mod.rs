//! Interactive session management: connect/login handshake, send and
//! await-pattern primitives, transcript capture, teardown.
//!
//! A [`Session`] owns exactly one connection to one device and is valid
//! only between [`Session::open`] and [`Session::close`]. Every byte
//! received is appended to the session transcript before it is matched.

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, trace, warn};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::{PatternBuffer, Transcript};
use crate::error::{Result, SessionError};
use crate::transport::Transport;

/// Default privileged-shell prompt.
pub const DEFAULT_SHELL_PROMPT: &str = "#";

/// Default loader (pre-boot) prompt.
pub const DEFAULT_LOADER_PROMPT: &str = "loader>";

/// Configuration for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Console or management address.
    pub address: String,

    /// Label used in the transcript file name.
    pub label: String,

    /// Login username.
    pub username: String,

    /// Login password. An empty credential is sent when absent.
    pub password: Option<SecretString>,

    /// Pattern recognized as the privileged shell prompt.
    pub shell_prompt: String,

    /// Pattern recognized as the loader prompt.
    pub loader_prompt: String,

    /// Directory for transcript files.
    pub log_dir: PathBuf,

    /// Delay before the first probe line, letting the console settle.
    pub settle_delay: Duration,

    /// Window for the first recognizable prompt after connecting.
    pub connect_timeout: Duration,

    /// Window for each step of the login/password exchange.
    pub auth_timeout: Duration,

    /// Pattern-search depth of the output buffer.
    pub search_depth: usize,
}

impl SessionConfig {
    /// Create a config for `address` with the usual defaults.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: "session".to_string(),
            username: "admin".to_string(),
            password: None,
            shell_prompt: DEFAULT_SHELL_PROMPT.to_string(),
            loader_prompt: DEFAULT_LOADER_PROMPT.to_string(),
            log_dir: PathBuf::from("reflash_logs"),
            settle_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(120),
            search_depth: 1000,
        }
    }

    /// Set the transcript label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the login username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the login password.
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    /// Set the shell and loader prompt patterns.
    pub fn with_prompts(
        mut self,
        shell: impl Into<String>,
        loader: impl Into<String>,
    ) -> Self {
        self.shell_prompt = shell.into();
        self.loader_prompt = loader.into();
        self
    }

    /// Set the transcript directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the console settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the startup prompt window.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the login/password exchange window.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }
}

/// Outcome of one await-pattern call.
#[derive(Debug)]
pub enum AwaitEvent {
    /// The pattern at `index` matched; `before` is the captured text
    /// preceding the match. The match itself is consumed from the buffer.
    Matched { index: usize, before: String },

    /// The timeout elapsed with no pattern matching.
    TimedOut,

    /// The stream ended.
    Eof,
}

/// One interactive connection to one device.
#[derive(Debug)]
pub struct Session<T: Transport> {
    transport: T,
    buffer: PatternBuffer,
    transcript: Transcript,
    shell_prompt: Regex,
    loader_prompt: Regex,
    config: SessionConfig,
    closed: bool,
}

impl<T: Transport> Session<T> {
    /// Open a session over `transport` and perform the login handshake.
    ///
    /// If a login prompt appears, the username is sent and a password prompt
    /// awaited; when a password prompt appears the password (or an empty
    /// credential) is sent, after which the shell prompt must be observed.
    /// Landing directly on the shell or loader prompt also succeeds.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self> {
        let shell_prompt =
            Regex::new(&config.shell_prompt).map_err(SessionError::InvalidPattern)?;
        let loader_prompt =
            Regex::new(&config.loader_prompt).map_err(SessionError::InvalidPattern)?;

        let transcript =
            Transcript::open(&config.log_dir, &config.label, &config.address).await?;

        let mut session = Self {
            transport,
            buffer: PatternBuffer::new(config.search_depth),
            transcript,
            shell_prompt,
            loader_prompt,
            config,
            closed: false,
        };

        if let Err(e) = session.handshake().await {
            let _ = session.close().await;
            return Err(e);
        }

        debug!(
            "session '{}' open to {}",
            session.config.label, session.config.address
        );
        Ok(session)
    }

    async fn handshake(&mut self) -> Result<()> {
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        self.send("").await?;

        let refused =
            Regex::new("Connection refused").map_err(SessionError::InvalidPattern)?;
        let login = Regex::new("login:").map_err(SessionError::InvalidPattern)?;
        let password =
            Regex::new("[Pp]ass.*?:").map_err(SessionError::InvalidPattern)?;

        let shell = self.shell_prompt.clone();
        let loader = self.loader_prompt.clone();
        let startup = [&refused, &login, &password, &shell, &loader];

        let index = match self
            .await_one_of(&startup, self.config.connect_timeout)
            .await?
        {
            AwaitEvent::Matched { index, .. } => index,
            AwaitEvent::TimedOut => {
                return Err(
                    SessionError::NoInitialPrompt(self.config.connect_timeout).into(),
                );
            }
            AwaitEvent::Eof => return Err(SessionError::Eof.into()),
        };

        match index {
            0 => {
                return Err(SessionError::ConnectionRefused {
                    address: self.config.address.clone(),
                }
                .into());
            }
            1 | 2 => {
                if index == 1 {
                    // Login prompt: send the username, then wait for the
                    // password prompt.
                    let username = self.config.username.clone();
                    self.send(&username).await?;
                    match self
                        .await_one_of(&[&password], self.config.auth_timeout)
                        .await?
                    {
                        AwaitEvent::Matched { .. } => {}
                        _ => return Err(self.auth_failed()),
                    }
                }

                let secret = self
                    .config
                    .password
                    .as_ref()
                    .map(|p| p.expose_secret().to_string())
                    .unwrap_or_default();
                self.send(&secret).await?;

                match self
                    .await_one_of(&[&shell], self.config.auth_timeout)
                    .await?
                {
                    AwaitEvent::Matched { .. } => Ok(()),
                    _ => Err(self.auth_failed()),
                }
            }
            // Already at the shell or loader prompt.
            _ => Ok(()),
        }
    }

    fn auth_failed(&self) -> crate::error::Error {
        SessionError::AuthenticationFailed {
            user: self.config.username.clone(),
        }
        .into()
    }

    /// Write one line of input.
    pub async fn send(&mut self, line: &str) -> Result<()> {
        trace!("session '{}' send: {:?}", self.config.label, line);
        self.transport.send_line(line).await
    }

    /// Block until one of `patterns` matches the incoming stream, the
    /// timeout elapses, or the stream ends.
    ///
    /// Evaluation is first-match-wins over the list in declared order: on
    /// every pass the patterns are tried in order against the buffered
    /// output, so an earlier entry always beats a later one even when both
    /// would match.
    pub async fn await_one_of(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<AwaitEvent> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            for (index, pattern) in patterns.iter().enumerate() {
                if let Some(range) = self.buffer.find(pattern) {
                    let before = self.buffer.consume_through(range);
                    trace!(
                        "session '{}' matched pattern {} ({:?})",
                        self.config.label,
                        index,
                        pattern.as_str()
                    );
                    return Ok(AwaitEvent::Matched { index, before });
                }
            }

            match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await {
                Err(_) => return Ok(AwaitEvent::TimedOut),
                Ok(Ok(None)) => return Ok(AwaitEvent::Eof),
                Ok(Ok(Some(chunk))) => {
                    self.transcript.append(&chunk).await?;
                    self.buffer.extend(&chunk);
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Replace the shell and loader prompt patterns.
    pub fn set_prompts(&mut self, shell: &str, loader: &str) -> Result<()> {
        self.shell_prompt = Regex::new(shell).map_err(SessionError::InvalidPattern)?;
        self.loader_prompt = Regex::new(loader).map_err(SessionError::InvalidPattern)?;
        self.config.shell_prompt = shell.to_string();
        self.config.loader_prompt = loader.to_string();
        Ok(())
    }

    /// The compiled privileged-shell prompt.
    pub fn shell_prompt(&self) -> &Regex {
        &self.shell_prompt
    }

    /// The compiled loader prompt.
    pub fn loader_prompt(&self) -> &Regex {
        &self.loader_prompt
    }

    /// Unconsumed output sitting in the buffer.
    pub fn pending_output(&self) -> String {
        self.buffer.as_str_lossy().into_owned()
    }

    /// This session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Path of the transcript file.
    pub fn transcript_path(&self) -> &std::path::Path {
        self.transcript.path()
    }

    /// Flush and close the transcript and terminate the channel. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transcript.close().await?;
        self.transport.close().await?;
        debug!(
            "session '{}' closed to {}",
            self.config.label, self.config.address
        );
        Ok(())
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                "session '{}' to {} dropped without close()",
                self.config.label, self.config.address
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTransport;

    fn test_config(label: &str) -> SessionConfig {
        SessionConfig::new("192.0.2.10")
            .with_label(label)
            .with_username("admin")
            .with_log_dir(std::env::temp_dir().join("reflash-session-tests"))
            .with_settle_delay(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn open_through_full_login_exchange() {
        let transport = SimTransport::builder()
            .on("", "\r\nswitch login: ")
            .on("admin", "Password: ")
            .on("secret", "\r\nswitch# ")
            .build();
        let sent = transport.sent_lines();

        let config =
            test_config("login").with_password(SecretString::from("secret"));
        let mut session = Session::open(transport, config).await.unwrap();
        session.close().await.unwrap();

        assert_eq!(
            sent.lock().unwrap().as_slice(),
            &["", "admin", "secret"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn open_sends_empty_credential_without_password() {
        let transport = SimTransport::builder()
            .on("", "Password: ")
            .on("", "switch# ")
            .build();
        let sent = transport.sent_lines();

        let mut session = Session::open(transport, test_config("nopass"))
            .await
            .unwrap();
        session.close().await.unwrap();

        assert_eq!(sent.lock().unwrap().as_slice(), &["", ""]);
    }

    #[tokio::test(start_paused = true)]
    async fn open_accepts_immediate_shell_prompt() {
        let transport = SimTransport::builder().on("", "switch# ").build();
        let mut session = Session::open(transport, test_config("shell"))
            .await
            .unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn open_accepts_loader_prompt() {
        let transport = SimTransport::builder().on("", "loader> ").build();
        let mut session = Session::open(transport, test_config("loader"))
            .await
            .unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connection_is_an_error() {
        let transport = SimTransport::builder()
            .on("", "telnet: Connection refused\r\n")
            .build();
        let closed = transport.closed_flag();

        let err = Session::open(transport, test_config("refused"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::ConnectionRefused { .. })
        ));
        // Teardown ran even though open failed.
        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out_at_startup() {
        let transport = SimTransport::builder().build();
        let err = Session::open(transport, test_config("silent"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::NoInitialPrompt(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_password_is_authentication_failure() {
        let transport = SimTransport::builder()
            .on("", "switch login: ")
            .on("admin", "Password: ")
            .on("bad", "Login incorrect\r\nswitch login: ")
            .build();

        let config = test_config("badpass").with_password(SecretString::from("bad"));
        let err = Session::open(transport, config).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn await_one_of_prefers_earlier_declared_pattern() {
        // Both patterns match the same output; the earlier entry wins.
        let transport = SimTransport::builder()
            .on("", "switch# ")
            .on("probe", "Overwriting/deleting this image is not allowed\r\nswitch# ")
            .build();

        let mut session = Session::open(transport, test_config("priority"))
            .await
            .unwrap();
        session.send("probe").await.unwrap();

        let specific = Regex::new("Overwriting/deleting this image is not allowed").unwrap();
        let generic = Regex::new("#").unwrap();
        let event = session
            .await_one_of(&[&specific, &generic], Duration::from_secs(5))
            .await
            .unwrap();
        match event {
            AwaitEvent::Matched { index, .. } => assert_eq!(index, 0),
            other => panic!("expected match, got {other:?}"),
        }
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn set_prompts_recompiles_both_patterns() {
        let transport = SimTransport::builder()
            .on("", "switch# ")
            .on("run", "stage one\r\nrouter> ")
            .on("dir", "k.bin\r\nrommon> ")
            .build();

        let mut session = Session::open(transport, test_config("reprompt"))
            .await
            .unwrap();
        session.set_prompts("router>", "rommon>").unwrap();

        // The replacement shell prompt is what matches now.
        session.send("run").await.unwrap();
        let shell = session.shell_prompt().clone();
        match session
            .await_one_of(&[&shell], Duration::from_secs(5))
            .await
            .unwrap()
        {
            AwaitEvent::Matched { before, .. } => assert!(before.contains("stage one")),
            other => panic!("expected shell match, got {other:?}"),
        }

        // Same for the loader prompt.
        session.send("dir").await.unwrap();
        let loader = session.loader_prompt().clone();
        match session
            .await_one_of(&[&loader], Duration::from_secs(5))
            .await
            .unwrap()
        {
            AwaitEvent::Matched { before, .. } => assert!(before.contains("k.bin")),
            other => panic!("expected loader match, got {other:?}"),
        }

        assert_eq!(session.config().shell_prompt, "router>");
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_records_received_bytes() {
        let transport = SimTransport::builder().on("", "banner text\r\nswitch# ").build();
        let mut session = Session::open(transport, test_config("transcript"))
            .await
            .unwrap();
        let path = session.transcript_path().to_path_buf();
        session.close().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("banner text"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_idempotent() {
        let transport = SimTransport::builder().on("", "switch# ").build();
        let mut session = Session::open(transport, test_config("close"))
            .await
            .unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();
    }
}
