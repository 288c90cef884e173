//! Terminal renderer using crossterm
//!
//! Draws the surface grid to the host terminal, plus an optional status bar on
//! the last row.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableBracketedPaste, EnableBracketedPaste},
    queue,
    style::{Attribute, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen, SetTitle,
    },
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::controller::ViewState;
use crate::core::geometry::Geometry;

/// Attributes shared by a run of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellStyle {
    fg: Color,
    bg: Color,
    bold: bool,
    italic: bool,
    underline: bool,
    inverse: bool,
}

impl CellStyle {
    fn plain() -> Self {
        Self {
            fg: Color::Reset,
            bg: Color::Reset,
            bold: false,
            italic: false,
            underline: false,
            inverse: false,
        }
    }

    fn of(cell: &vt100::Cell) -> Self {
        Self {
            fg: map_color(cell.fgcolor()),
            bg: map_color(cell.bgcolor()),
            bold: cell.bold(),
            italic: cell.italic(),
            underline: cell.underline(),
            inverse: cell.inverse(),
        }
    }

    fn apply<W: Write>(&self, out: &mut W) -> io::Result<()> {
        queue!(out, SetAttribute(Attribute::Reset))?;
        if self.bold {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if self.italic {
            queue!(out, SetAttribute(Attribute::Italic))?;
        }
        if self.underline {
            queue!(out, SetAttribute(Attribute::Underlined))?;
        }
        if self.inverse {
            queue!(out, SetAttribute(Attribute::Reverse))?;
        }
        if self.fg != Color::Reset {
            queue!(out, SetForegroundColor(self.fg))?;
        }
        if self.bg != Color::Reset {
            queue!(out, SetBackgroundColor(self.bg))?;
        }
        Ok(())
    }
}

fn map_color(color: vt100::Color) -> Color {
    match color {
        vt100::Color::Default => Color::Reset,
        vt100::Color::Idx(index) => Color::AnsiValue(index),
        vt100::Color::Rgb(r, g, b) => Color::Rgb { r, g, b },
    }
}

/// What the status bar shows
pub struct StatusLine<'a> {
    pub title: &'a str,
    pub view: &'a ViewState,
    pub geometry: Geometry,
}

fn view_label(view: &ViewState) -> String {
    match view {
        ViewState::Connecting => "connecting".to_string(),
        ViewState::Open => "connected".to_string(),
        ViewState::OpenFailed(reason) => format!("open failed: {}", reason),
        ViewState::Exited(code) => format!("exited ({})", code),
    }
}

/// Cut `text` to at most `width` display columns
fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Lay out the status bar to exactly `width` columns.
///
/// The state label on the right wins over the title on the left.
pub fn format_status(status: &StatusLine, width: u16) -> String {
    let width = width as usize;
    let right = format!(" {} {} ", view_label(status.view), status.geometry);
    let right = truncate_to_width(&right, width);
    let room = width - right.width();

    let left = if status.title.is_empty() {
        " webshell".to_string()
    } else {
        format!(" {}", status.title)
    };
    let left = truncate_to_width(&left, room);
    let gap = room - left.width();

    format!("{}{}{}", left, " ".repeat(gap), right)
}

/// Terminal renderer
pub struct Renderer {
    initialized: bool,
    window_title: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            window_title: String::new(),
        }
    }

    /// Take over the host terminal
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        queue!(
            stdout,
            EnterAlternateScreen,
            EnableBracketedPaste,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        stdout.flush()?;
        self.initialized = true;
        Ok(())
    }

    /// Restore the host terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = queue!(
            stdout,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Show,
            EnableLineWrap,
            DisableBracketedPaste,
            LeaveAlternateScreen
        );
        let _ = stdout.flush();

        terminal::disable_raw_mode()
    }

    /// Mirror the session title to the host window, once per change
    pub fn set_window_title(&mut self, title: &str) -> io::Result<()> {
        if title == self.window_title {
            return Ok(());
        }
        self.window_title = title.to_string();
        let mut stdout = io::stdout();
        queue!(stdout, SetTitle(title))?;
        stdout.flush()
    }

    /// Draw one frame to stdout
    pub fn render(
        &mut self,
        screen: &vt100::Screen,
        status: Option<&StatusLine>,
    ) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());
        Self::draw(&mut out, screen, status)?;
        out.flush()
    }

    /// Draw one frame into `out`
    pub fn draw<W: Write>(
        out: &mut W,
        screen: &vt100::Screen,
        status: Option<&StatusLine>,
    ) -> io::Result<()> {
        let (rows, columns) = screen.size();

        // Synchronized update
        write!(out, "\x1b[?2026h")?;
        queue!(out, Hide)?;

        for row in 0..rows {
            queue!(
                out,
                MoveTo(0, row),
                SetAttribute(Attribute::Reset),
                ResetColor,
                Clear(ClearType::UntilNewLine)
            )?;
            Self::draw_row(out, screen, row, columns)?;
        }

        if let Some(status) = status {
            queue!(
                out,
                MoveTo(0, rows),
                SetAttribute(Attribute::Reset),
                SetAttribute(Attribute::Reverse)
            )?;
            write!(out, "{}", format_status(status, columns))?;
        }
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        if !screen.hide_cursor() {
            let (row, col) = screen.cursor_position();
            queue!(out, MoveTo(col, row), Show)?;
        }

        write!(out, "\x1b[?2026l")?;
        Ok(())
    }

    fn draw_row<W: Write>(
        out: &mut W,
        screen: &vt100::Screen,
        row: u16,
        columns: u16,
    ) -> io::Result<()> {
        let mut style = CellStyle::plain();
        let mut run = String::with_capacity(columns as usize);

        for col in 0..columns {
            let Some(cell) = screen.cell(row, col) else {
                break;
            };
            if cell.is_wide_continuation() {
                continue;
            }

            let cell_style = CellStyle::of(cell);
            if cell_style != style {
                if !run.is_empty() {
                    style.apply(out)?;
                    write!(out, "{}", run)?;
                    run.clear();
                }
                style = cell_style;
            }

            if cell.has_contents() {
                run.push_str(&cell.contents());
            } else {
                run.push(' ');
            }
        }

        if !run.is_empty() {
            style.apply(out)?;
            write!(out, "{}", run)?;
        }
        Ok(())
    }

    /// Host terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status<'a>(title: &'a str, view: &'a ViewState) -> StatusLine<'a> {
        StatusLine {
            title,
            view,
            geometry: Geometry::new(80, 24).unwrap(),
        }
    }

    #[test]
    fn test_status_fills_width() {
        let view = ViewState::Open;
        let line = format_status(&status("vim", &view), 40);
        assert_eq!(line.width(), 40);
        assert!(line.starts_with(" vim"));
        assert!(line.ends_with(" connected 80x24 "));
    }

    #[test]
    fn test_status_shows_open_failure() {
        let view = ViewState::OpenFailed("connection refused".to_string());
        let line = format_status(&status("", &view), 80);
        assert!(line.starts_with(" webshell"));
        assert!(line.contains("open failed: connection refused"));
    }

    #[test]
    fn test_status_truncates_wide_title() {
        let view = ViewState::Exited(1);
        let line = format_status(&status("日本語のタイトルがとても長い", &view), 24);
        assert_eq!(line.width(), 24);
        assert!(line.ends_with(" exited (1) 80x24 "));
    }

    #[test]
    fn test_truncate_does_not_split_wide_char() {
        assert_eq!(truncate_to_width("日本", 3), "日");
        assert_eq!(truncate_to_width("abc", 10), "abc");
    }

    #[test]
    fn test_draw_contains_text_and_status() {
        let mut parser = vt100::Parser::new(3, 20, 0);
        parser.process(b"hello \x1b[1mbold\x1b[0m");

        let view = ViewState::Open;
        let mut out = Vec::new();
        Renderer::draw(&mut out, parser.screen(), Some(&status("t", &view))).unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("hello "));
        assert!(text.contains("bold"));
        assert!(text.contains("connected"));
    }
}
