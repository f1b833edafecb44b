//! Transport layer for interactive console sessions.
//!
//! The rest of the crate only needs the capability "open a character-stream
//! session to an address, send lines, receive chunks" — captured by the
//! [`Transport`] and [`Connector`] traits so the orchestrator and the test
//! suite can supply their own implementations.

mod telnet;

pub use telnet::{TelnetConnector, TelnetTransport};

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

/// An open character-stream channel to one device.
pub trait Transport: Send {
    /// Write one line of input. Side effect only.
    fn send_line(&mut self, line: &str) -> impl Future<Output = Result<()>> + Send;

    /// Read the next chunk of output.
    ///
    /// Returns `Ok(None)` when the remote side closed the stream. Blocks
    /// until data arrives; callers impose their own deadlines.
    fn read_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>>> + Send;

    /// Terminate the underlying channel. Idempotent.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Factory for transports, keyed by device address.
///
/// One connector is shared by all workers; each call yields an independent
/// channel.
pub trait Connector: Send + Sync {
    /// The transport type this connector produces.
    type Transport: Transport + 'static;

    /// Open a new channel to `address`.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Transport>> + Send;
}
