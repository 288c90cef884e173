//! Keyboard input encoding
//!
//! Turns host key and paste events into the bytes a terminal would send, so
//! the surface can report them as user data.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

bitflags! {
    /// Modifier keys, in xterm parameter bit order
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        result.set(Modifiers::SHIFT, mods.contains(KeyModifiers::SHIFT));
        result.set(Modifiers::ALT, mods.contains(KeyModifiers::ALT));
        result.set(Modifiers::CTRL, mods.contains(KeyModifiers::CONTROL));
        result
    }
}

impl Modifiers {
    /// xterm modifier parameter (`1 + bits`)
    fn param(self) -> u8 {
        1 + self.bits()
    }
}

/// Terminal modes that change what a key sends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputModes {
    /// DECCKM: cursor keys send `ESC O x`
    pub application_cursor: bool,
    /// Wrap pasted text in `ESC [200~` / `ESC [201~`
    pub bracketed_paste: bool,
}

impl InputModes {
    pub fn from_screen(screen: &vt100::Screen) -> Self {
        Self {
            application_cursor: screen.application_cursor(),
            bracketed_paste: screen.bracketed_paste(),
        }
    }
}

pub struct KeyMapper;

impl KeyMapper {
    /// Encode a key press. Releases and unmapped keys yield `None`.
    pub fn map(event: &KeyEvent, modes: InputModes) -> Option<Vec<u8>> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let mods = Modifiers::from(event.modifiers);

        let bytes = match event.code {
            KeyCode::Char(ch) => Self::char_key(ch, mods),
            KeyCode::Enter => Self::alt_prefixed(b"\r", mods),
            KeyCode::Backspace => Self::alt_prefixed(b"\x7f", mods),
            KeyCode::Esc => vec![0x1b],
            KeyCode::Tab if mods.contains(Modifiers::SHIFT) => b"\x1b[Z".to_vec(),
            KeyCode::Tab => vec![b'\t'],
            KeyCode::BackTab => b"\x1b[Z".to_vec(),

            KeyCode::Up => Self::cursor_key(b'A', mods, modes),
            KeyCode::Down => Self::cursor_key(b'B', mods, modes),
            KeyCode::Right => Self::cursor_key(b'C', mods, modes),
            KeyCode::Left => Self::cursor_key(b'D', mods, modes),
            KeyCode::Home => Self::cursor_key(b'H', mods, modes),
            KeyCode::End => Self::cursor_key(b'F', mods, modes),

            KeyCode::Insert => Self::tilde_key(2, mods),
            KeyCode::Delete => Self::tilde_key(3, mods),
            KeyCode::PageUp => Self::tilde_key(5, mods),
            KeyCode::PageDown => Self::tilde_key(6, mods),

            KeyCode::F(n) => Self::function_key(n, mods)?,
            _ => return None,
        };
        Some(bytes)
    }

    /// Encode pasted text, bracketed when the application asked for it
    pub fn paste(text: &str, modes: InputModes) -> Vec<u8> {
        // Terminals send CR for newlines in pasted text
        let body = text.replace("\r\n", "\r").replace('\n', "\r");
        if modes.bracketed_paste {
            let mut bytes = b"\x1b[200~".to_vec();
            bytes.extend_from_slice(body.as_bytes());
            bytes.extend_from_slice(b"\x1b[201~");
            bytes
        } else {
            body.into_bytes()
        }
    }

    fn char_key(ch: char, mods: Modifiers) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4);
        if mods.contains(Modifiers::ALT) {
            bytes.push(0x1b);
        }
        match Self::control_code(ch).filter(|_| mods.contains(Modifiers::CTRL)) {
            Some(code) => bytes.push(code),
            None => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
        bytes
    }

    /// C0 code sent for Ctrl+`ch`
    fn control_code(ch: char) -> Option<u8> {
        match ch {
            'a'..='z' => Some(ch as u8 - b'a' + 1),
            'A'..='Z' => Some(ch as u8 - b'A' + 1),
            '@' | '`' | ' ' | '2' => Some(0x00),
            '[' | '3' => Some(0x1b),
            '\\' | '4' => Some(0x1c),
            ']' | '5' => Some(0x1d),
            '^' | '~' | '6' => Some(0x1e),
            '_' | '/' | '7' => Some(0x1f),
            '?' | '8' => Some(0x7f),
            _ => None,
        }
    }

    fn alt_prefixed(base: &[u8], mods: Modifiers) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(base.len() + 1);
        if mods.contains(Modifiers::ALT) {
            bytes.push(0x1b);
        }
        bytes.extend_from_slice(base);
        bytes
    }

    /// Arrows, Home and End: `CSI x`, `SS3 x`, or `CSI 1 ; m x`
    fn cursor_key(key: u8, mods: Modifiers, modes: InputModes) -> Vec<u8> {
        if !mods.is_empty() {
            format!("\x1b[1;{}{}", mods.param(), key as char).into_bytes()
        } else if modes.application_cursor {
            vec![0x1b, b'O', key]
        } else {
            vec![0x1b, b'[', key]
        }
    }

    /// `CSI n ~` or `CSI n ; m ~`
    fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            format!("\x1b[{}~", code).into_bytes()
        } else {
            format!("\x1b[{};{}~", code, mods.param()).into_bytes()
        }
    }

    fn function_key(n: u8, mods: Modifiers) -> Option<Vec<u8>> {
        // F1-F4 are SS3 P..S; the rest are tilde codes with gaps at 16 and 22
        let bytes = match n {
            1..=4 => {
                let key = b'P' + (n - 1);
                if mods.is_empty() {
                    vec![0x1b, b'O', key]
                } else {
                    format!("\x1b[1;{}{}", mods.param(), key as char).into_bytes()
                }
            }
            5 => Self::tilde_key(15, mods),
            6..=10 => Self::tilde_key(n + 11, mods),
            11 | 12 => Self::tilde_key(n + 12, mods),
            _ => return None,
        };
        Some(bytes)
    }
}
