//! Remote session transport boundary
//!
//! The core only needs two operations from a transport: open a session with
//! an initial geometry and environment, and resize it. Framing, auth and
//! reconnection belong to the transport implementation.

use thiserror::Error;

use super::channel::{Inbound, Listener, OutboundEvent};
use super::geometry::Geometry;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open session: {0}")]
    Open(String),

    #[error("Failed to resize session to {geometry}: {reason}")]
    Resize { geometry: Geometry, reason: String },

    #[error("Failed to write to session: {0}")]
    Write(#[source] std::io::Error),

    #[error("Session has exited")]
    Closed,
}

/// Parameters of an open-session request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub geometry: Geometry,
    /// `KEY=VALUE` entries, fixed for the life of the session
    pub env: Vec<String>,
}

/// Something that can establish remote sessions.
///
/// `output` is where the session emits remote output. `input` is an
/// outbound listener already filtered to `Data` events; the session reads the
/// surface's input bytes from it.
pub trait SessionTransport {
    fn open_session(
        &mut self,
        request: &OpenRequest,
        output: Inbound,
        input: Listener<OutboundEvent>,
    ) -> Result<Box<dyn SessionHandle>, TransportError>;
}

/// A live remote session
pub trait SessionHandle {
    /// Resize the remote session
    fn resize(&mut self, geometry: Geometry) -> Result<(), TransportError>;

    /// Forward queued outbound input to the remote session.
    ///
    /// Returns the number of bytes written.
    fn flush_input(&mut self) -> Result<usize, TransportError>;

    /// Exit status once the remote session has terminated
    fn exit_status(&mut self) -> Option<u32>;
}
