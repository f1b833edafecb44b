//! Scripted in-memory transport for tests.
//!
//! A `SimTransport` plays one side of a console conversation: each rule
//! pairs an expected sent line with the output the device produces in
//! response. Rules are consumed strictly in order; a line that does not
//! match the next rule produces no output, so the caller's timeout fires —
//! the same shape a hung device has.

#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::transport::{Connector, Transport};

#[derive(Debug)]
struct SimRule {
    expect: String,
    reply: Vec<u8>,
    delay: Duration,
}

/// One scripted chunk queued for delivery.
#[derive(Debug)]
struct SimChunk {
    data: Vec<u8>,
    delay: Duration,
}

/// Scripted transport double.
#[derive(Debug)]
pub(crate) struct SimTransport {
    rules: Vec<SimRule>,
    next: usize,
    pending: VecDeque<SimChunk>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    eof_when_done: bool,
}

impl SimTransport {
    pub(crate) fn builder() -> SimBuilder {
        SimBuilder {
            rules: Vec::new(),
            eof_when_done: false,
        }
    }

    /// Handle to the lines sent so far; survives the transport being moved
    /// into a session.
    pub(crate) fn sent_lines(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    /// Handle observing whether `close()` was called.
    pub(crate) fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

impl Transport for SimTransport {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.sent.lock().unwrap().push(line.to_string());

        if self.next < self.rules.len() && self.rules[self.next].expect == line {
            let rule = &self.rules[self.next];
            if !rule.reply.is_empty() {
                self.pending.push_back(SimChunk {
                    data: rule.reply.clone(),
                    delay: rule.delay,
                });
            }
            self.next += 1;
        }
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        if let Some(chunk) = self.pending.pop_front() {
            if !chunk.delay.is_zero() {
                tokio::time::sleep(chunk.delay).await;
            }
            return Ok(Some(Bytes::from(chunk.data)));
        }

        if self.eof_when_done && self.next >= self.rules.len() {
            return Ok(None);
        }

        // Nothing scripted: behave like a silent device until the caller's
        // deadline cancels us.
        std::future::pending::<()>().await;
        unreachable!()
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct SimBuilder {
    rules: Vec<SimRule>,
    eof_when_done: bool,
}

impl SimBuilder {
    /// Expect `line` to be sent, then deliver `reply`.
    pub(crate) fn on(mut self, line: &str, reply: &str) -> Self {
        self.rules.push(SimRule {
            expect: line.to_string(),
            reply: reply.as_bytes().to_vec(),
            delay: Duration::ZERO,
        });
        self
    }

    /// Like [`on`](Self::on), with a delivery delay.
    pub(crate) fn on_delayed(mut self, line: &str, delay: Duration, reply: &str) -> Self {
        self.rules.push(SimRule {
            expect: line.to_string(),
            reply: reply.as_bytes().to_vec(),
            delay,
        });
        self
    }

    /// Return EOF once every rule has been consumed and delivered.
    pub(crate) fn eof_when_done(mut self) -> Self {
        self.eof_when_done = true;
        self
    }

    pub(crate) fn build(self) -> SimTransport {
        SimTransport {
            rules: self.rules,
            next: 0,
            pending: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            eof_when_done: self.eof_when_done,
        }
    }
}

/// Connector handing out pre-scripted transports per device address.
///
/// A workflow opens several sessions per device, so each address maps to a
/// queue of transports consumed in order.
pub(crate) struct SimConnector {
    scripts: Mutex<HashMap<String, VecDeque<SimTransport>>>,
}

impl SimConnector {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn add(&self, address: &str, transport: SimTransport) {
        self.scripts
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push_back(transport);
    }
}

impl Connector for SimConnector {
    type Transport = SimTransport;

    async fn connect(&self, address: &str) -> Result<SimTransport> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(address)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| {
                TransportError::ConnectionFailed {
                    address: address.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "no scripted session",
                    ),
                }
                .into()
            })
    }
}
