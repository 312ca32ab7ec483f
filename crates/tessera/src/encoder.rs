// SPDX-License-Identifier: MIT
//
// Capability-aware escape encoding.
//
// `ansi` knows how every command is spelled; the encoder decides which
// commands a given terminal should receive:
//
//   Styles: colors are quantized to the terminal's depth, attributes are
//   dropped entirely when the terminal does not accept SGR. A style change
//   either adds to the current state (only the new attributes and changed
//   colors are sent) or resets with SGR 0 and rebuilds, because SGR has no
//   portable way to switch a single attribute off.
//
//   Motion: absolute CUP is always correct; relative motion (CR, CR LF,
//   CUU/CUD/CUF/CUB, BS) is used only when it is strictly shorter. From an
//   unknown position only absolute motion is safe.
//
// Everything here is stateless; the `Pen` in `output` carries the state.

use std::cmp::Ordering;
use std::io::{self, Write};

use crate::ansi;
use crate::caps::{Capabilities, Features};
use crate::codec::TextEncoding;
use crate::color::quantize;
use crate::geom::Coord;
use crate::style::{Attr, Color, Style};

/// Maps logical styles and positions onto escape sequences for one
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    caps: Capabilities,
    encoding: TextEncoding,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(Capabilities::CONSERVATIVE, TextEncoding::Utf8)
    }
}

impl Encoder {
    #[must_use]
    pub const fn new(caps: Capabilities, encoding: TextEncoding) -> Self {
        Self { caps, encoding }
    }

    #[inline]
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.caps
    }

    #[inline]
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    // ─── Styles ─────────────────────────────────────────────────────────

    /// The style as this terminal will actually show it.
    ///
    /// Two logical styles that differ only in ways the terminal cannot
    /// display have the same effective style, so switching between them
    /// costs nothing.
    #[must_use]
    pub fn effective(&self, style: &Style) -> Style {
        if !self.caps.has(Features::ATTRIBUTES) {
            return Style::PLAIN;
        }
        Style {
            fg: style.fg.and_then(|c| quantize(c, self.caps.depth)),
            bg: style.bg.and_then(|c| quantize(c, self.caps.depth)),
            attrs: style.attrs,
        }
    }

    /// Emit the SGR needed to go from `from` (`None` = unknown) to `to`.
    ///
    /// Both styles are logical; they are made effective here.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `w`.
    pub fn style_change(
        &self,
        w: &mut impl Write,
        from: Option<&Style>,
        to: &Style,
    ) -> io::Result<()> {
        if !self.caps.has(Features::ATTRIBUTES) {
            return Ok(());
        }
        let to = self.effective(to);
        let from = from.map(|s| self.effective(s));
        if from == Some(to) {
            return Ok(());
        }

        let mut params: Vec<u8> = Vec::with_capacity(16);
        let base = match from {
            Some(from) if !removes_anything(&from, &to) => from,
            _ => {
                params.push(0);
                Style::PLAIN
            }
        };

        for (attr, code) in Attr::SGR {
            if to.attrs.contains(attr) && !base.attrs.contains(attr) {
                params.push(code);
            }
        }
        if to.fg != base.fg {
            if let Some(color) = to.fg {
                color_params(&mut params, color, Layer::Foreground);
            }
        }
        if to.bg != base.bg {
            if let Some(color) = to.bg {
                color_params(&mut params, color, Layer::Background);
            }
        }

        if self.caps.has(Features::COMBINED_SGR) {
            ansi::sgr(w, &params)
        } else {
            ansi::sgr_each(w, &params)
        }
    }

    // ─── Motion ─────────────────────────────────────────────────────────

    /// Emit the shortest motion from `from` (`None` = unknown) to `to`.
    /// Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `w`.
    pub fn motion(&self, w: &mut impl Write, from: Option<Coord>, to: Coord) -> io::Result<bool> {
        if from == Some(to) {
            return Ok(false);
        }
        let mut best = Vec::with_capacity(16);
        ansi::cursor_to(&mut best, to.col, to.row)?;

        if let Some(from) = from {
            let mut rel = Vec::with_capacity(16);
            relative_motion(&mut rel, from, to)?;
            if rel.len() < best.len() {
                best = rel;
            }
        }
        w.write_all(&best)?;
        Ok(true)
    }
}

/// Whether going `from` → `to` turns anything off.
fn removes_anything(from: &Style, to: &Style) -> bool {
    !from.attrs.difference(to.attrs).is_empty()
        || (from.fg.is_some() && to.fg.is_none())
        || (from.bg.is_some() && to.bg.is_none())
}

#[derive(Clone, Copy)]
enum Layer {
    Foreground,
    Background,
}

/// SGR parameters for a color that is already quantized.
///
/// Named colors use the compact 30–37 / 90–97 codes (40–47 / 100–107 for
/// the background) so they work on terminals that know nothing else.
fn color_params(params: &mut Vec<u8>, color: Color, layer: Layer) {
    let (base, bright, extended) = match layer {
        Layer::Foreground => (30, 90, 38),
        Layer::Background => (40, 100, 48),
    };
    match color {
        Color::Indexed(idx) if idx < 8 => params.push(base + idx),
        Color::Indexed(idx) if idx < 16 => params.push(bright + idx - 8),
        Color::Indexed(idx) => params.extend_from_slice(&[extended, 5, idx]),
        Color::Rgb(r, g, b) => params.extend_from_slice(&[extended, 2, r, g, b]),
    }
}

/// Bytes of a count-parameter CSI sequence (`ESC [ n X`, count 1 omitted).
const fn csi_count_len(n: u16) -> usize {
    let digits = match n {
        1 => 0,
        0 | 2..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        1000..=9999 => 4,
        _ => 5,
    };
    3 + digits
}

fn relative_motion(w: &mut impl Write, from: Coord, to: Coord) -> io::Result<()> {
    if from.row.checked_add(1) == Some(to.row) && to.col == 0 {
        return ansi::next_line(w);
    }
    match to.row.cmp(&from.row) {
        Ordering::Greater => ansi::cursor_down(w, to.row - from.row)?,
        Ordering::Less => ansi::cursor_up(w, from.row - to.row)?,
        Ordering::Equal => {}
    }
    horizontal_motion(w, from.col, to.col)
}

fn horizontal_motion(w: &mut impl Write, from: u16, to: u16) -> io::Result<()> {
    match to.cmp(&from) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => ansi::cursor_forward(w, to - from),
        Ordering::Less if to == 0 => ansi::carriage_return(w),
        Ordering::Less => {
            let n = from - to;
            let by_backspace = usize::from(n);
            let by_cub = csi_count_len(n);
            let by_cr = 1 + csi_count_len(to);
            if by_backspace <= by_cub && by_backspace <= by_cr {
                for _ in 0..n {
                    ansi::backspace(w)?;
                }
                Ok(())
            } else if by_cub <= by_cr {
                ansi::cursor_back(w, n)
            } else {
                ansi::carriage_return(w)?;
                ansi::cursor_forward(w, to)
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
