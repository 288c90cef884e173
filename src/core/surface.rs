//! Terminal surface boundary
//!
//! The surface is the terminal-emulation engine plus whatever displays it. The
//! bridge depends on exactly this trait and never on rendering internals.

use thiserror::Error;

use super::geometry::Geometry;

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Failed to attach terminal surface: {0}")]
    Attach(String),
}

/// Notifications raised by a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface produced input bytes (keystrokes, pasted text, replies)
    Data(Vec<u8>),
    /// A title-setting control sequence was interpreted
    TitleChanged(String),
    /// The container changed size and the viewport needs fitting
    ViewportChanged,
}

/// A terminal-emulation surface
pub trait TerminalSurface {
    /// Attach to the container. Called once, before anything else.
    fn open(&mut self) -> Result<(), SurfaceError>;

    /// Interpret and render text
    fn write(&mut self, text: &str);

    /// Authoritative current size
    fn geometry(&self) -> Geometry;

    /// Re-measure the viewport against the container
    fn fit(&mut self);

    /// Take queued notifications in the order they were raised
    fn take_events(&mut self) -> Vec<SurfaceEvent>;

    /// Release the surface. No notifications are raised afterwards.
    fn dispose(&mut self);
}

/// Streaming UTF-8 decoder.
///
/// A multi-byte character split across two chunks is held back until it is
/// complete. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut text = String::with_capacity(input.len());
        let mut rest = &input[..];
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // Safe: from_utf8 just validated this prefix
                    text.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    /// Bytes held back waiting for the rest of a character
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_split_multibyte_character() {
        let mut decoder = Utf8Decoder::new();
        let bytes = "日本".as_bytes();

        assert_eq!(decoder.decode(&bytes[..2]), "");
        assert_eq!(decoder.pending(), 2);
        assert_eq!(decoder.decode(&bytes[2..4]), "日");
        assert_eq!(decoder.decode(&bytes[4..]), "本");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }
}
