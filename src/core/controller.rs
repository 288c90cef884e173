//! Session lifecycle
//!
//! Owns the remote session handle and the two channels of a binding, and
//! decides whether a geometry observation opens the session or resizes it.

use tracing::{debug, info, warn};

use super::channel::{Inbound, Listener, Outbound, OutboundEvent};
use super::geometry::Geometry;
use super::transport::{OpenRequest, SessionHandle, SessionTransport, TransportError};

/// Open/Unopened state of one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No remote session exists yet
    Unopened,
    /// A session was opened; later geometries are resizes
    Open { geometry: Geometry },
}

/// Request the state machine wants issued to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Open(Geometry),
    Resize(Geometry),
}

impl SessionState {
    /// Apply one geometry observation.
    ///
    /// Never yields a second `Open`, and yields nothing for a geometry equal to
    /// the one already in effect.
    pub fn observe(self, geometry: Geometry) -> (SessionState, Option<SessionCommand>) {
        match self {
            SessionState::Unopened => (
                SessionState::Open { geometry },
                Some(SessionCommand::Open(geometry)),
            ),
            SessionState::Open { geometry: current } if current == geometry => (self, None),
            SessionState::Open { .. } => (
                SessionState::Open { geometry },
                Some(SessionCommand::Resize(geometry)),
            ),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open { .. })
    }
}

/// What the presentation layer should show for this binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Waiting for the first geometry
    Connecting,
    Open,
    /// The transport rejected the open request
    OpenFailed(String),
    /// The remote session terminated with this status
    Exited(u32),
}

/// Drives one binding between the surface's channels and a transport
pub struct SessionController<T: SessionTransport> {
    transport: T,
    env: Vec<String>,
    state: SessionState,
    view: ViewState,
    inbound: Inbound,
    outbound: Outbound,
    resizes: Listener<OutboundEvent>,
    /// Input listener handed to the transport on open
    pending_input: Option<Listener<OutboundEvent>>,
    /// Latest unprocessed geometry (single slot, last write wins)
    latest: Option<Geometry>,
    handle: Option<Box<dyn SessionHandle>>,
}

impl<T: SessionTransport> SessionController<T> {
    /// Create a controller with fresh channels.
    ///
    /// The outbound input listener is attached immediately, so bytes typed
    /// before the session opens are delivered once it does.
    pub fn new(transport: T, env: Vec<String>) -> Self {
        let inbound = Inbound::new("inbound");
        let outbound = Outbound::new("outbound");
        let resizes = outbound.subscribe_where(OutboundEvent::is_resize);
        let pending_input = Some(outbound.subscribe_where(OutboundEvent::is_data));

        Self {
            transport,
            env,
            state: SessionState::Unopened,
            view: ViewState::Connecting,
            inbound,
            outbound,
            resizes,
            pending_input,
            latest: None,
            handle: None,
        }
    }

    pub fn inbound(&self) -> &Inbound {
        &self.inbound
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn view_state(&self) -> &ViewState {
        &self.view
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Record a geometry observation without acting on it yet
    #[cfg(test)]
    pub fn observe(&mut self, geometry: Geometry) {
        self.latest = Some(geometry);
    }

    /// Collapse pending resize events to the newest geometry and act on it.
    ///
    /// Returns the command issued to the transport, if any.
    pub fn sync(&mut self) -> Result<Option<SessionCommand>, TransportError> {
        for event in self.resizes.drain() {
            if let OutboundEvent::Resize(geometry) = event {
                self.latest = Some(geometry);
            }
        }

        let Some(geometry) = self.latest.take() else {
            return Ok(None);
        };

        let (next, command) = self.state.observe(geometry);
        match command {
            None => {
                debug!(columns = geometry.columns(), rows = geometry.rows(), "Geometry unchanged");
            }
            Some(SessionCommand::Open(geometry)) => self.open(geometry)?,
            Some(SessionCommand::Resize(geometry)) => self.resize(geometry)?,
        }
        self.state = next;
        Ok(command)
    }

    fn open(&mut self, geometry: Geometry) -> Result<(), TransportError> {
        let request = OpenRequest {
            geometry,
            env: self.env.clone(),
        };
        let input = match self.pending_input.take() {
            Some(listener) => listener,
            None => self.outbound.subscribe_where(OutboundEvent::is_data),
        };

        info!(columns = geometry.columns(), rows = geometry.rows(), "Opening session");

        match self
            .transport
            .open_session(&request, self.inbound.clone(), input)
        {
            Ok(handle) => {
                self.handle = Some(handle);
                self.view = ViewState::Open;
                Ok(())
            }
            Err(e) => {
                warn!("Session open rejected: {}", e);
                self.pending_input = Some(self.outbound.subscribe_where(OutboundEvent::is_data));
                self.view = ViewState::OpenFailed(e.to_string());
                Err(e)
            }
        }
    }

    fn resize(&mut self, geometry: Geometry) -> Result<(), TransportError> {
        let handle = self.handle.as_mut().ok_or(TransportError::Closed)?;
        handle.resize(geometry)?;
        debug!(columns = geometry.columns(), rows = geometry.rows(), "Resized session");
        Ok(())
    }

    /// Forward the surface's queued input to the remote session
    pub fn flush_input(&mut self) -> Result<usize, TransportError> {
        match self.handle.as_mut() {
            Some(handle) => handle.flush_input(),
            None => Ok(0),
        }
    }

    /// Check whether the remote session has terminated
    pub fn poll_exit(&mut self) -> Option<u32> {
        if let ViewState::Exited(code) = self.view {
            return Some(code);
        }
        let code = self.handle.as_mut()?.exit_status()?;
        info!(exit_status = code, "Session exited");
        self.view = ViewState::Exited(code);
        Some(code)
    }
}
