//! Loopback session transport
//!
//! Runs the "remote" session as a local shell inside a pseudo-terminal. Output
//! is read on a background thread and emitted on the inbound channel, after
//! the shell command is announced as the session title.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::channel::{Inbound, InboundEvent, Listener, OutboundEvent};
use super::geometry::Geometry;
use super::transport::{OpenRequest, SessionHandle, SessionTransport, TransportError};

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to create pseudo terminal: {0}")]
    Create(String),

    #[error("Failed to spawn {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("Failed to write to PTY: {0}")]
    Write(#[source] io::Error),

    #[error("Malformed environment entry: {0}")]
    Env(String),
}

pub type Result<T> = std::result::Result<T, PtyError>;

impl From<PtyError> for TransportError {
    fn from(e: PtyError) -> Self {
        match e {
            PtyError::Write(source) => TransportError::Write(source),
            other => TransportError::Open(other.to_string()),
        }
    }
}

fn pty_size(geometry: Geometry) -> PtySize {
    PtySize {
        rows: geometry.rows(),
        cols: geometry.columns(),
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Split `KEY=VALUE`; the key must be non-empty
fn split_env(entry: &str) -> Result<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(PtyError::Env(entry.to_string())),
    }
}

/// Opens sessions by spawning `shell` in a local PTY
pub struct PtyTransport {
    shell: String,
}

impl PtyTransport {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    fn spawn(
        &self,
        request: &OpenRequest,
        output: Inbound,
        input: Listener<OutboundEvent>,
    ) -> Result<PtySession> {
        let pair = native_pty_system()
            .openpty(pty_size(request.geometry))
            .map_err(|e| PtyError::Create(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&self.shell);
        for entry in &request.env {
            let (key, value) = split_env(entry)?;
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| PtyError::Spawn {
            command: self.shell.clone(),
            reason: e.to_string(),
        })?;
        // The child holds its own handle to the slave side
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Create(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Create(e.to_string()))?;

        // Announced ahead of any output
        output.emit(InboundEvent::Title(self.shell.clone()));

        let running = Arc::new(AtomicBool::new(true));
        let reader_thread = spawn_reader(reader, output, Arc::clone(&running));

        info!(
            shell = %self.shell,
            columns = request.geometry.columns(),
            rows = request.geometry.rows(),
            "Spawned session shell"
        );

        Ok(PtySession {
            master: pair.master,
            writer,
            child,
            input,
            running,
            reader_thread: Some(reader_thread),
            exit_code: None,
        })
    }
}

/// Emit PTY output on the inbound channel until EOF or the session is dropped
fn spawn_reader(
    mut reader: Box<dyn Read + Send>,
    output: Inbound,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        while running.load(Ordering::SeqCst) {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    output.emit(InboundEvent::Data(buffer[..n].to_vec()));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("PTY read ended: {}", e);
                    break;
                }
            }
        }
        running.store(false, Ordering::SeqCst);
    })
}

impl SessionTransport for PtyTransport {
    fn open_session(
        &mut self,
        request: &OpenRequest,
        output: Inbound,
        input: Listener<OutboundEvent>,
    ) -> std::result::Result<Box<dyn SessionHandle>, TransportError> {
        let session = self.spawn(request, output, input)?;
        Ok(Box::new(session))
    }
}

/// A shell running in a local PTY
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    input: Listener<OutboundEvent>,
    running: Arc<AtomicBool>,
    reader_thread: Option<JoinHandle<()>>,
    exit_code: Option<u32>,
}

impl PtySession {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(PtyError::Write)?;
        self.writer.flush().map_err(PtyError::Write)
    }
}

impl SessionHandle for PtySession {
    fn resize(&mut self, geometry: Geometry) -> std::result::Result<(), TransportError> {
        self.master
            .resize(pty_size(geometry))
            .map_err(|e| TransportError::Resize {
                geometry,
                reason: e.to_string(),
            })
    }

    fn flush_input(&mut self) -> std::result::Result<usize, TransportError> {
        if self.exit_code.is_some() {
            // Drop input typed after exit
            self.input.drain();
            return Ok(0);
        }

        let mut written = 0;
        while let Some(event) = self.input.try_next() {
            if let OutboundEvent::Data(bytes) = event {
                self.write_all(&bytes)?;
                written += bytes.len();
            }
        }
        Ok(written)
    }

    fn exit_status(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            match self.child.try_wait() {
                Ok(Some(status)) => self.exit_code = Some(status.exit_code()),
                Ok(None) => {}
                Err(e) => warn!("Failed to poll session shell: {}", e),
            }
        }
        self.exit_code
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if self.exit_code.is_none() {
            if let Ok(None) = self.child.try_wait() {
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }

        // The reader blocks in read() until the PTY closes. Detach rather than
        // join if the child is still holding it open.
        if let Some(handle) = self.reader_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        debug!("Session shell released");
    }
}
