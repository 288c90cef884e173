//! Terminal session bridge
//!
//! Binds one terminal surface to a binding's channels. Surface notifications
//! become outbound events; inbound data is decoded and written to the surface.

use thiserror::Error;
use tracing::{debug, trace};

use super::channel::{Inbound, InboundEvent, Listener, Outbound, OutboundEvent};
use super::geometry::Geometry;
use super::surface::{SurfaceError, SurfaceEvent, TerminalSurface, Utf8Decoder};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// A terminal surface attached to the inbound and outbound channels
pub struct TerminalBridge<S: TerminalSurface> {
    /// `None` once disposed
    surface: Option<S>,
    inbound: Option<Listener<InboundEvent>>,
    outbound: Outbound,
    decoder: Utf8Decoder,
    /// Cleared first on disposal
    delivering: bool,
}

impl<S: TerminalSurface> TerminalBridge<S> {
    /// Attach `surface` to the channels.
    ///
    /// Opens the surface, subscribes to inbound events, fits the viewport and
    /// reports the initial geometry as a `Resize`. The surface is disposed if
    /// opening fails.
    pub fn attach(
        mut surface: S,
        inbound: &Inbound,
        outbound: Outbound,
    ) -> Result<Self, BridgeError> {
        if let Err(e) = surface.open() {
            surface.dispose();
            return Err(e.into());
        }

        let mut bridge = Self {
            surface: Some(surface),
            inbound: Some(inbound.subscribe()),
            outbound,
            decoder: Utf8Decoder::new(),
            delivering: true,
        };
        bridge.fit_and_report();
        Ok(bridge)
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Translate the surface's queued notifications into outbound events.
    ///
    /// Returns the number of notifications handled.
    pub fn handle_surface_events(&mut self) -> usize {
        if !self.delivering {
            return 0;
        }
        let events = match self.surface.as_mut() {
            Some(surface) => surface.take_events(),
            None => return 0,
        };

        let count = events.len();
        for event in events {
            match event {
                SurfaceEvent::Data(bytes) => {
                    trace!(bytes = bytes.len(), "Surface input");
                    self.outbound.emit(OutboundEvent::Data(bytes));
                }
                SurfaceEvent::TitleChanged(title) => {
                    self.outbound.emit(OutboundEvent::Title(title));
                }
                SurfaceEvent::ViewportChanged => {
                    self.fit_and_report();
                }
            }
        }
        count
    }

    /// Write every queued inbound event to the surface in arrival order.
    ///
    /// Returns the number of bytes consumed.
    pub fn pump_inbound(&mut self) -> usize {
        if !self.delivering {
            return 0;
        }
        let (Some(listener), Some(surface)) = (self.inbound.as_ref(), self.surface.as_mut()) else {
            return 0;
        };

        let mut consumed = 0;
        while let Some(event) = listener.try_next() {
            match event {
                InboundEvent::Data(bytes) => {
                    consumed += bytes.len();
                    let text = self.decoder.decode(&bytes);
                    if !text.is_empty() {
                        surface.write(&text);
                    }
                }
                InboundEvent::Title(title) => {
                    self.outbound.emit(OutboundEvent::Title(title));
                }
            }
        }
        consumed
    }

    /// Fit before reading, so the reported size matches what is rendered
    fn fit_and_report(&mut self) -> Option<Geometry> {
        let surface = self.surface.as_mut()?;
        surface.fit();
        let geometry = surface.geometry();
        debug!(columns = geometry.columns(), rows = geometry.rows(), "Viewport fitted");
        self.outbound.emit(OutboundEvent::Resize(geometry));
        Some(geometry)
    }

    /// Stop delivery, detach from the channels, then dispose the surface.
    ///
    /// Safe to call more than once. The channels themselves are left alone.
    pub fn dispose(&mut self) {
        self.delivering = false;
        if let Some(listener) = self.inbound.take() {
            listener.detach();
        }
        if self.decoder.pending() > 0 {
            debug!(bytes = self.decoder.pending(), "Discarding incomplete character");
        }
        if let Some(mut surface) = self.surface.take() {
            surface.dispose();
            debug!("Terminal surface disposed");
        }
    }
}

impl<S: TerminalSurface> Drop for TerminalBridge<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
