//! Presentation layer.
//!
//! - **renderer**: draws the surface grid and status bar with crossterm
//! - **keymapper**: host key and paste events to terminal input bytes
//! - **title**: last-value-wins title store fed by the outbound channel

pub mod keymapper;
pub mod renderer;
pub mod title;

pub use keymapper::{InputModes, KeyMapper};
pub use renderer::{Renderer, StatusLine};
pub use title::TitleSlot;
