//! Telnet transport over a raw TCP stream.
//!
//! Console and management ports speak plain NVT text with occasional option
//! negotiation. We refuse every option the server proposes (`WONT`/`DONT`),
//! skip subnegotiations, and unescape doubled IAC bytes, which is all a
//! dumb console client needs.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::{debug, trace};
use memchr::memchr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Connector, Transport};
use crate::error::{Result, TransportError};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Decoder state carried across chunk boundaries — an IAC sequence may be
/// split between two reads.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NvtState {
    Data,
    Iac,
    /// Saw IAC DO / DONT / WILL / WONT, waiting for the option byte.
    Option(u8),
    Subneg,
    SubnegIac,
}

/// Telnet transport to one console address.
pub struct TelnetTransport {
    stream: Option<TcpStream>,
    state: NvtState,
    address: String,
}

impl TelnetTransport {
    /// Connect to `address` (port 23 assumed when none is given).
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let target = if address.contains(':') {
            address.to_string()
        } else {
            format!("{address}:23")
        };

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| TransportError::ConnectTimeout(timeout))?
            .map_err(|source| TransportError::ConnectionFailed {
                address: target.clone(),
                source,
            })?;

        debug!("telnet connected to {target}");
        Ok(Self {
            stream: Some(stream),
            state: NvtState::Data,
            address: target,
        })
    }

    /// Strip telnet commands from `input`, queueing refusals into `replies`.
    fn decode(&mut self, input: &[u8], data: &mut BytesMut, replies: &mut Vec<u8>) {
        let mut rest = input;
        while !rest.is_empty() {
            match self.state {
                NvtState::Data => {
                    match memchr(IAC, rest) {
                        Some(pos) => {
                            data.extend_from_slice(&rest[..pos]);
                            self.state = NvtState::Iac;
                            rest = &rest[pos + 1..];
                        }
                        None => {
                            data.extend_from_slice(rest);
                            rest = &[];
                        }
                    }
                }
                NvtState::Iac => {
                    let b = rest[0];
                    rest = &rest[1..];
                    match b {
                        IAC => {
                            // Escaped literal 0xFF
                            data.extend_from_slice(&[IAC]);
                            self.state = NvtState::Data;
                        }
                        DO | DONT | WILL | WONT => self.state = NvtState::Option(b),
                        SB => self.state = NvtState::Subneg,
                        _ => self.state = NvtState::Data,
                    }
                }
                NvtState::Option(cmd) => {
                    let opt = rest[0];
                    rest = &rest[1..];
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, opt]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, opt]),
                        _ => {}
                    }
                    trace!("telnet negotiation: cmd={cmd} opt={opt}");
                    self.state = NvtState::Data;
                }
                NvtState::Subneg => {
                    match memchr(IAC, rest) {
                        Some(pos) => {
                            self.state = NvtState::SubnegIac;
                            rest = &rest[pos + 1..];
                        }
                        None => rest = &[],
                    }
                }
                NvtState::SubnegIac => {
                    let b = rest[0];
                    rest = &rest[1..];
                    self.state = if b == SE {
                        NvtState::Data
                    } else {
                        NvtState::Subneg
                    };
                }
            }
        }
    }
}

impl Transport for TelnetTransport {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;

        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");

        stream.write_all(&buf).await.map_err(TransportError::Io)?;
        stream.flush().await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        let mut raw = [0u8; 4096];

        // Loop until we decode actual data; a chunk may be pure negotiation.
        loop {
            let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;

            let n = stream.read(&mut raw).await.map_err(TransportError::Io)?;
            if n == 0 {
                return Ok(None);
            }

            let mut data = BytesMut::with_capacity(n);
            let mut replies = Vec::new();
            self.decode(&raw[..n], &mut data, &mut replies);

            if !replies.is_empty() {
                let stream = self.stream.as_mut().ok_or(TransportError::Disconnected)?;
                stream
                    .write_all(&replies)
                    .await
                    .map_err(TransportError::Io)?;
            }

            if !data.is_empty() {
                return Ok(Some(data.freeze()));
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(TransportError::Io)?;
            debug!("telnet disconnected from {}", self.address);
        }
        Ok(())
    }
}

/// Connector producing [`TelnetTransport`] channels.
#[derive(Debug, Clone)]
pub struct TelnetConnector {
    connect_timeout: Duration,
}

impl TelnetConnector {
    /// Create a connector with the given TCP connect timeout.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TelnetConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for TelnetConnector {
    type Transport = TelnetTransport;

    async fn connect(&self, address: &str) -> Result<TelnetTransport> {
        TelnetTransport::connect(address, self.connect_timeout).await
    }
}
