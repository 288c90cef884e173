//! Core session binding components.
//!
//! - **geometry**: terminal viewport size
//! - **channel**: typed inbound/outbound event channels
//! - **transport**: remote session boundary (open + resize)
//! - **surface**: terminal surface boundary
//! - **controller**: Unopened/Open lifecycle of one remote session
//! - **bridge**: binds a surface to the channels
//! - **pty**: loopback transport running a local shell in a PTY
//!
//! # Architecture
//!
//! ```text
//! SessionController
//! ├── SessionTransport ──► SessionHandle (resize, input)
//! ├── Inbound  ──────────► TerminalBridge ──► TerminalSurface
//! └── Outbound ◄────────── TerminalBridge (data, resize, title)
//! ```

pub mod bridge;
pub mod channel;
pub mod controller;
pub mod geometry;
pub mod pty;
pub mod surface;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
