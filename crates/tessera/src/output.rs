// SPDX-License-Identifier: MIT
//
// Staging bytes, and remembering what the terminal shows.
//
//   OutputBuffer  holds one frame or one print in memory. It reaches the
//                 descriptor in a single write, so escapes from two tasks
//                 never interleave.
//
//   Pen           the cursor position and style the terminal is believed
//                 to have. Motions and SGR changes that would not change
//                 anything are skipped. Either half may be unknown (`None`),
//                 and the next operation then takes the safe route: an
//                 absolute motion, or a reset before the new style.

use std::io::{self, Write};

use crate::codec::TextEncoding;
use crate::encoder::Encoder;
use crate::geom::Coord;
use crate::style::{Style, StyledText};

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Pending terminal bytes.
pub struct OutputBuffer {
    buf: Vec<u8>,
}

/// A full 200x60 repaint with a style change per cell fits without growing.
const INITIAL_CAPACITY: usize = 16 * 1024;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append `ch` in `encoding`, transliterating what it cannot carry.
    #[inline]
    pub fn write_char(&mut self, ch: char, encoding: TextEncoding) {
        encoding.encode_lossy(ch, &mut self.buf);
    }

    /// Drop the contents. The allocation stays.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Hand the contents over, keeping an allocation of the same size.
    pub fn take(&mut self) -> Vec<u8> {
        let capacity = self.buf.capacity();
        std::mem::replace(&mut self.buf, Vec::with_capacity(capacity))
    }

    /// Send the contents to a blocking writer and clear.
    ///
    /// # Errors
    ///
    /// The writer's error. Nothing is cleared then, so a retry resends the
    /// whole frame.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        w.write_all(&self.buf)?;
        w.flush()?;
        self.buf.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Pen ─────────────────────────────────────────────────────────────────────

/// The virtual cursor and style: what the terminal is believed to show.
///
/// All writes go through an [`OutputBuffer`]; the pen never performs I/O.
#[derive(Debug, Clone)]
pub struct Pen {
    encoder: Encoder,
    cursor: Option<Coord>,
    style: Option<Style>,
}

impl Pen {
    /// A pen with unknown cursor and style.
    #[must_use]
    pub const fn new(encoder: Encoder) -> Self {
        Self {
            encoder,
            cursor: None,
            style: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Option<Coord> {
        self.cursor
    }

    #[inline]
    #[must_use]
    pub const fn style(&self) -> Option<&Style> {
        self.style.as_ref()
    }

    /// Forget everything. Call after anything that changes the terminal
    /// behind the pen's back (screen switch, external output).
    pub const fn reset_state(&mut self) {
        self.cursor = None;
        self.style = None;
    }

    /// Record a cursor position established by other means.
    pub const fn set_cursor(&mut self, cursor: Option<Coord>) {
        self.cursor = cursor;
    }

    /// Record a style established by other means (e.g. after SGR 0).
    pub const fn set_known_style(&mut self, style: Option<Style>) {
        self.style = style;
    }

    /// Move to `to` unless already there. Returns whether a motion was
    /// emitted.
    pub fn move_to(&mut self, out: &mut OutputBuffer, to: Coord) -> bool {
        let moved = self.encoder.motion(out, self.cursor, to).unwrap_or(false);
        self.cursor = Some(to);
        moved
    }

    /// Switch to `style` unless its effective form is already current.
    pub fn set_style(&mut self, out: &mut OutputBuffer, style: &Style) {
        self.encoder.style_change(out, self.style.as_ref(), style).ok();
        self.style = Some(*style);
    }

    /// Draw `ch` at the cursor, advancing it `width` columns on a screen
    /// `cols` wide.
    ///
    /// Landing on or past the last column leaves the cursor unknown:
    /// terminals disagree on where a pending wrap puts it.
    pub fn put(&mut self, out: &mut OutputBuffer, ch: char, width: u16, cols: u16) {
        out.write_char(ch, self.encoder.encoding());
        self.cursor = self.cursor.and_then(|at| {
            let col = at.col.saturating_add(width);
            (col < cols).then_some(Coord::new(col, at.row))
        });
    }

    /// Emit styled text for line-oriented output.
    ///
    /// An unknown style counts as the default, so plain text carries no
    /// escapes at all. `\n` becomes `newline`. Any non-default style is
    /// reset at the end, and the cursor becomes unknown.
    pub fn print(&mut self, out: &mut OutputBuffer, text: &StyledText, newline: &[u8]) {
        if self.style.is_none() {
            self.style = Some(Style::PLAIN);
        }
        let encoding = self.encoder.encoding();
        for span in text.spans() {
            self.set_style(out, &span.style);
            for ch in span.text.chars() {
                if ch == '\n' {
                    out.write_all(newline).ok();
                } else {
                    out.write_char(ch, encoding);
                }
            }
        }
        if self.style.is_some_and(|s| !s.is_plain()) {
            self.set_style(out, &Style::PLAIN);
        }
        self.cursor = None;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
