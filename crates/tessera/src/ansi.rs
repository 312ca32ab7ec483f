// SPDX-License-Identifier: MIT
//
// Byte-level terminal commands.
//
// Every function here writes one command to an `impl Write` and decides
// nothing else. Whether a command is worth sending, and which form is the
// cheapest, is up to `Encoder` and `Pen`.
//
// Coordinates are 0-based on our side and 1-based on the wire. A parameter
// that equals the command's default is left out, so `cursor_to(0, 0)` is
// just `ESC [ H`.
//
// Errors come only from the writer. `OutputBuffer` never fails.

use std::io::{self, Write};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(col, row)` using CUP, in its shortest form.
#[inline]
pub fn cursor_to(w: &mut impl Write, col: u16, row: u16) -> io::Result<()> {
    match (col, row) {
        (0, 0) => w.write_all(b"\x1b[H"),
        (0, row) => write!(w, "\x1b[{}H", u32::from(row) + 1),
        (col, row) => write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1),
    }
}

/// Write a CSI sequence with a count parameter, omitting a count of 1.
fn csi_count(w: &mut impl Write, n: u16, final_byte: char) -> io::Result<()> {
    if n == 1 {
        write!(w, "\x1b[{final_byte}")
    } else {
        write!(w, "\x1b[{n}{final_byte}")
    }
}

/// Cursor up `n` rows (CUU).
#[inline]
pub fn cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'A')
}

/// Cursor down `n` rows (CUD).
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'B')
}

/// Cursor forward `n` columns (CUF).
#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'C')
}

/// Cursor back `n` columns (CUB).
#[inline]
pub fn cursor_back(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'D')
}

/// Carriage return: column 0 of the current row.
#[inline]
pub fn carriage_return(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r")
}

/// CR LF: column 0 of the next row. In raw mode LF alone keeps the column.
#[inline]
pub fn next_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r\n")
}

/// Backspace: one column left, non-destructive.
#[inline]
pub fn backspace(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x08")
}

/// Save cursor position and attributes (DECSC).
#[inline]
pub fn save_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore what [`save_cursor`] saved (DECRC).
#[inline]
pub fn restore_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::SHOW_CURSOR, false)
}

#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::SHOW_CURSOR, true)
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2). The cursor does not move.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase from the cursor to the end of the screen (ED 0).
#[inline]
pub fn erase_below(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[J")
}

/// Erase from the cursor to the end of the line (EL 0).
///
/// Erased cells take the current background color.
#[inline]
pub fn erase_line_right(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Scroll the screen content up `n` lines (SU).
#[inline]
pub fn scroll_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'S')
}

/// Scroll the screen content down `n` lines (SD).
#[inline]
pub fn scroll_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    csi_count(w, n, 'T')
}

/// Ring the bell (BEL).
#[inline]
pub fn bell(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x07")
}

// ─── SGR ─────────────────────────────────────────────────────────────────────

/// Reset all SGR attributes to terminal defaults (SGR 0).
///
/// The stateful pen must invalidate its tracked style after calling this.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// Emit SGR parameters as one sequence: `\x1b[1;4;31m`.
///
/// Does nothing when `params` is empty; an empty SGR would mean reset.
pub fn sgr(w: &mut impl Write, params: &[u8]) -> io::Result<()> {
    let Some((first, rest)) = params.split_first() else {
        return Ok(());
    };
    write!(w, "\x1b[{first}")?;
    for p in rest {
        write!(w, ";{p}")?;
    }
    w.write_all(b"m")
}

/// Emit SGR parameters as separate sequences, for terminals that do not
/// parse `;`-joined lists. Multi-part colors (`38;5;n`) stay together.
pub fn sgr_each(w: &mut impl Write, params: &[u8]) -> io::Result<()> {
    let mut i = 0;
    while i < params.len() {
        let len = match params[i..] {
            [38 | 48, 5, ..] => 3,
            [38 | 48, 2, ..] => 5,
            _ => 1,
        };
        let end = (i + len).min(params.len());
        sgr(w, &params[i..end])?;
        i = end;
    }
    Ok(())
}

// ─── DEC Private Modes ──────────────────────────────────────────────────────

/// DEC private mode numbers the session toggles with `CSI ? n h` / `CSI ? n l`.
pub mod dec {
    pub const SHOW_CURSOR: u16 = 25;
    pub const MOUSE_CLICK: u16 = 1000;
    pub const MOUSE_DRAG: u16 = 1002;
    pub const MOUSE_MOTION: u16 = 1003;
    pub const FOCUS_EVENTS: u16 = 1004;
    pub const MOUSE_SGR: u16 = 1006;
    /// Alternate screen, saving the cursor on entry.
    pub const ALT_SCREEN: u16 = 1049;
    pub const BRACKETED_PASTE: u16 = 2004;
    pub const SYNC_OUTPUT: u16 = 2026;
}

/// Set (`on`) or reset a DEC private mode.
pub fn private_mode(w: &mut impl Write, mode: u16, on: bool) -> io::Result<()> {
    write!(w, "\x1b[?{mode}{}", if on { 'h' } else { 'l' })
}

/// Open a synchronized update. The terminal holds everything up to
/// [`end_sync`] and draws it at once.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::SYNC_OUTPUT, true)
}

#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::SYNC_OUTPUT, false)
}

/// Switch to the alternate screen. The terminal keeps the primary screen
/// and cursor aside until [`exit_alt_screen`].
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::ALT_SCREEN, true)
}

#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::ALT_SCREEN, false)
}

/// Which mouse movements get reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    /// Presses and releases only.
    Click,
    /// Presses, releases, and motion while a button is down.
    #[default]
    Drag,
    /// Every motion, buttons or not.
    Motion,
}

impl MouseMode {
    /// Modes to set, coarsest first.
    const fn modes(self) -> &'static [u16] {
        match self {
            Self::Click => &[dec::MOUSE_CLICK],
            Self::Drag => &[dec::MOUSE_CLICK, dec::MOUSE_DRAG],
            Self::Motion => &[dec::MOUSE_CLICK, dec::MOUSE_DRAG, dec::MOUSE_MOTION],
        }
    }
}

/// Turn on mouse reports. `sgr` asks for the SGR report format, which
/// carries coordinates past column 223 and distinct release events;
/// without it the terminal sends legacy X10 bytes.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode, sgr: bool) -> io::Result<()> {
    for &m in mode.modes() {
        private_mode(w, m, true)?;
    }
    if sgr {
        private_mode(w, dec::MOUSE_SGR, true)?;
    }
    Ok(())
}

/// Turn off every mouse mode, finest first.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    for m in [dec::MOUSE_SGR, dec::MOUSE_MOTION, dec::MOUSE_DRAG, dec::MOUSE_CLICK] {
        private_mode(w, m, false)?;
    }
    Ok(())
}

/// Pastes arrive between `CSI 200~` and `CSI 201~` while this is on.
#[inline]
pub fn enable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::BRACKETED_PASTE, true)
}

#[inline]
pub fn disable_bracketed_paste(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::BRACKETED_PASTE, false)
}

/// Focus changes arrive as `CSI I` and `CSI O` while this is on.
#[inline]
pub fn enable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::FOCUS_EVENTS, true)
}

#[inline]
pub fn disable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    private_mode(w, dec::FOCUS_EVENTS, false)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
