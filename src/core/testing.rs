//! Recording fakes for the transport and surface boundaries

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::channel::{Inbound, InboundEvent, Listener, OutboundEvent};
use super::geometry::Geometry;
use super::surface::{SurfaceError, SurfaceEvent, TerminalSurface};
use super::transport::{OpenRequest, SessionHandle, SessionTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Open { geometry: Geometry, env: Vec<String> },
    Resize(Geometry),
}

#[derive(Default)]
struct TransportLog {
    calls: Vec<TransportCall>,
    fail_next_open: Option<String>,
    input: Vec<u8>,
    exit: Option<u32>,
    output: Option<Inbound>,
}

/// Transport that records every call; clones share one log
#[derive(Clone, Default)]
pub struct RecordingTransport {
    log: Rc<RefCell<TransportLog>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.log.borrow().calls.clone()
    }

    pub fn open_count(&self) -> usize {
        self.log
            .borrow()
            .calls
            .iter()
            .filter(|call| matches!(call, TransportCall::Open { .. }))
            .count()
    }

    pub fn fail_next_open(&self, reason: &str) {
        self.log.borrow_mut().fail_next_open = Some(reason.to_string());
    }

    /// Bytes the session received from the surface
    pub fn input(&self) -> Vec<u8> {
        self.log.borrow().input.clone()
    }

    /// Simulate the remote session producing output
    pub fn remote_output(&self, bytes: &[u8]) {
        let output = self.log.borrow().output.clone();
        if let Some(output) = output {
            output.emit(InboundEvent::Data(bytes.to_vec()));
        }
    }

    pub fn exit(&self, code: u32) {
        self.log.borrow_mut().exit = Some(code);
    }
}

impl SessionTransport for RecordingTransport {
    fn open_session(
        &mut self,
        request: &OpenRequest,
        output: Inbound,
        input: Listener<OutboundEvent>,
    ) -> Result<Box<dyn SessionHandle>, TransportError> {
        let mut log = self.log.borrow_mut();
        log.calls.push(TransportCall::Open {
            geometry: request.geometry,
            env: request.env.clone(),
        });
        if let Some(reason) = log.fail_next_open.take() {
            return Err(TransportError::Open(reason));
        }
        log.output = Some(output);

        Ok(Box::new(RecordingSession {
            log: Rc::clone(&self.log),
            input,
        }))
    }
}

struct RecordingSession {
    log: Rc<RefCell<TransportLog>>,
    input: Listener<OutboundEvent>,
}

impl SessionHandle for RecordingSession {
    fn resize(&mut self, geometry: Geometry) -> Result<(), TransportError> {
        self.log.borrow_mut().calls.push(TransportCall::Resize(geometry));
        Ok(())
    }

    fn flush_input(&mut self) -> Result<usize, TransportError> {
        let mut written = 0;
        for event in self.input.drain() {
            if let OutboundEvent::Data(bytes) = event {
                written += bytes.len();
                self.log.borrow_mut().input.extend_from_slice(&bytes);
            }
        }
        Ok(written)
    }

    fn exit_status(&mut self) -> Option<u32> {
        self.log.borrow().exit
    }
}

struct SurfaceLog {
    geometry: Geometry,
    container: Geometry,
    events: VecDeque<SurfaceEvent>,
    writes: Vec<String>,
    opened: bool,
    disposed: bool,
    fail_open: bool,
    fit_calls: usize,
    writes_after_dispose: usize,
}

/// Surface that records what it is asked to render
pub struct RecordingSurface {
    log: Rc<RefCell<SurfaceLog>>,
}

/// Test-side view of a [`RecordingSurface`] owned by a bridge
#[derive(Clone)]
pub struct SurfaceProbe {
    log: Rc<RefCell<SurfaceLog>>,
}

impl RecordingSurface {
    /// A surface whose container currently measures `container`
    pub fn new(container: Geometry) -> (Self, SurfaceProbe) {
        let log = Rc::new(RefCell::new(SurfaceLog {
            geometry: Geometry::DEFAULT,
            container,
            events: VecDeque::new(),
            writes: Vec::new(),
            opened: false,
            disposed: false,
            fail_open: false,
            fit_calls: 0,
            writes_after_dispose: 0,
        }));
        (
            Self {
                log: Rc::clone(&log),
            },
            SurfaceProbe { log },
        )
    }
}

impl SurfaceProbe {
    pub fn fail_open(&self) {
        self.log.borrow_mut().fail_open = true;
    }

    /// Everything rendered so far, concatenated
    pub fn written(&self) -> String {
        self.log.borrow().writes.concat()
    }

    pub fn write_count(&self) -> usize {
        self.log.borrow().writes.len()
    }

    pub fn opened(&self) -> bool {
        self.log.borrow().opened
    }

    pub fn disposed(&self) -> bool {
        self.log.borrow().disposed
    }

    pub fn writes_after_dispose(&self) -> usize {
        self.log.borrow().writes_after_dispose
    }

    pub fn fit_calls(&self) -> usize {
        self.log.borrow().fit_calls
    }

    /// The container changed size; the surface is stale until fitted
    pub fn resize_container(&self, container: Geometry) {
        let mut log = self.log.borrow_mut();
        log.container = container;
        log.events.push_back(SurfaceEvent::ViewportChanged);
    }

    pub fn type_input(&self, bytes: &[u8]) {
        self.log
            .borrow_mut()
            .events
            .push_back(SurfaceEvent::Data(bytes.to_vec()));
    }

    pub fn change_title(&self, title: &str) {
        self.log
            .borrow_mut()
            .events
            .push_back(SurfaceEvent::TitleChanged(title.to_string()));
    }
}

impl TerminalSurface for RecordingSurface {
    fn open(&mut self) -> Result<(), SurfaceError> {
        let mut log = self.log.borrow_mut();
        if log.fail_open {
            return Err(SurfaceError::Attach("no container".to_string()));
        }
        log.opened = true;
        Ok(())
    }

    fn write(&mut self, text: &str) {
        let mut log = self.log.borrow_mut();
        if log.disposed {
            log.writes_after_dispose += 1;
        } else {
            log.writes.push(text.to_string());
        }
    }

    fn geometry(&self) -> Geometry {
        self.log.borrow().geometry
    }

    fn fit(&mut self) {
        let mut log = self.log.borrow_mut();
        log.geometry = log.container;
        log.fit_calls += 1;
    }

    fn take_events(&mut self) -> Vec<SurfaceEvent> {
        let mut log = self.log.borrow_mut();
        if log.disposed {
            return Vec::new();
        }
        log.events.drain(..).collect()
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposed = true;
    }
}
