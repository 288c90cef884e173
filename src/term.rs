//! VT surface
//!
//! A [`TerminalSurface`] backed by the `vt100` engine. The host terminal is the
//! container; its size is reported through [`VtSurface::container_resized`] and
//! applied on the next fit.

use tracing::debug;

use crate::core::geometry::Geometry;
use crate::core::surface::{SurfaceError, SurfaceEvent, TerminalSurface};

/// Lines of history kept by the engine
const SCROLLBACK_LINES: usize = 1000;

/// Collects every window title the engine interprets (OSC 0 and OSC 2)
#[derive(Debug, Default)]
struct TitleSink {
    titles: Vec<String>,
}

impl vt100::Callbacks for TitleSink {
    fn set_window_title(&mut self, _: &mut vt100::Screen, title: &[u8]) {
        self.titles.push(String::from_utf8_lossy(title).into_owned());
    }
}

pub struct VtSurface {
    parser: vt100::Parser<TitleSink>,
    container: Geometry,
    /// Container rows not available to the grid (status bar)
    reserved_rows: u16,
    events: Vec<SurfaceEvent>,
    attached: bool,
    disposed: bool,
}

impl VtSurface {
    pub fn new(container: Geometry, reserved_rows: u16) -> Self {
        let parser = vt100::Parser::new_with_callbacks(
            Geometry::DEFAULT.rows(),
            Geometry::DEFAULT.columns(),
            SCROLLBACK_LINES,
            TitleSink::default(),
        );
        let mut surface = Self {
            parser,
            container,
            reserved_rows,
            events: Vec::new(),
            attached: false,
            disposed: false,
        };
        let viewport = surface.viewport();
        surface
            .parser
            .screen_mut()
            .set_size(viewport.rows(), viewport.columns());
        surface
    }

    /// Grid size the container can hold
    fn viewport(&self) -> Geometry {
        Geometry::clamped(
            self.container.columns(),
            self.container.rows().saturating_sub(self.reserved_rows),
        )
    }

    /// The host terminal changed size
    pub fn container_resized(&mut self, columns: u16, rows: u16) {
        if self.disposed {
            return;
        }
        self.container = Geometry::clamped(columns, rows);
        self.events.push(SurfaceEvent::ViewportChanged);
    }

    /// Bytes produced by the user (keys, paste)
    pub fn input(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() && !self.disposed {
            self.events.push(SurfaceEvent::Data(bytes));
        }
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }
}

impl TerminalSurface for VtSurface {
    fn open(&mut self) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Attach("surface was disposed".to_string()));
        }
        if self.attached {
            return Err(SurfaceError::Attach("surface is already attached".to_string()));
        }
        self.attached = true;
        Ok(())
    }

    fn write(&mut self, text: &str) {
        if self.disposed {
            return;
        }
        self.parser.process(text.as_bytes());

        // One notification per title sequence, repeats included
        let titles = std::mem::take(&mut self.parser.callbacks_mut().titles);
        self.events.extend(titles.into_iter().map(SurfaceEvent::TitleChanged));
    }

    fn geometry(&self) -> Geometry {
        let (rows, columns) = self.parser.screen().size();
        Geometry::clamped(columns, rows)
    }

    fn fit(&mut self) {
        let viewport = self.viewport();
        if viewport != self.geometry() {
            debug!(columns = viewport.columns(), rows = viewport.rows(), "Fitting grid");
            self.parser
                .screen_mut()
                .set_size(viewport.rows(), viewport.columns());
        }
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        std::mem::take(&mut self.events)
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.events.clear();
    }
}
