// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// Instead of redrawing the entire screen, compare the next matrix against
// the previous one and emit escape sequences only for cells that changed.
// A typical update touches a handful of cells out of thousands.
//
// The pass, for matrices of equal size:
//
//   1. Rows go top to bottom. An unchanged row is skipped with a single
//      slice comparison.
//   2. Within a changed row, lead cells go left to right. A wide character
//      is compared together with its continuation cell and drawn as one
//      unit; continuation cells are never targeted on their own.
//   3. For a changed cell the pen moves (only if not already there),
//      restyles (only if the effective style differs), and writes.
//      Writing into the last column leaves the cursor unknown.
//   4. When everything from the first changed cell to the end of the row
//      is blank and at least `EL_MIN_COLUMNS` columns remain, one EL
//      replaces the trailing spaces.
//
// The pen starts every pass with unknown cursor and style, so a pass never
// depends on what happened between passes. There is no trailing reset:
// the pen remembers the style it left behind.
//
// A full repaint (`repaint`) trusts nothing on screen. It diffs against the
// baseline when one of the same size exists; otherwise it resets the
// style, clears the screen, and paints against a blank matrix, so blank
// cells cost nothing and leftovers from a larger previous frame vanish.

use unicode_width::UnicodeWidthChar;

use crate::ansi;
use crate::caps::Features;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::geom::Coord;
use crate::matrix::Matrix;
use crate::output::{OutputBuffer, Pen};
use crate::style::Style;

/// Shortest blank tail worth an EL instead of spaces.
const EL_MIN_COLUMNS: usize = 4;

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Cells that differed from the previous matrix and were drawn or erased.
    pub cells_rendered: usize,
    /// Cells that matched the previous matrix and were skipped.
    pub cells_skipped: usize,
    /// Cursor motions emitted.
    pub motions: usize,
    /// Total bytes of output generated.
    pub bytes_written: usize,
}

impl RenderStats {
    /// Total cells processed (rendered + skipped).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── Passes ──────────────────────────────────────────────────────────────────

/// Emit what turns `previous` into `next` on screen.
///
/// # Errors
///
/// [`Error::DimensionMismatch`] when the matrices differ in size; nothing
/// is written in that case.
pub fn update(
    out: &mut OutputBuffer,
    pen: &mut Pen,
    previous: &Matrix,
    next: &Matrix,
) -> Result<RenderStats> {
    if previous.size() != next.size() {
        return Err(Error::DimensionMismatch {
            previous: previous.size(),
            next: next.size(),
        });
    }
    let start = out.len();
    pen.reset_state();
    let mut stats = paint(out, pen, previous, next);
    stats.bytes_written = out.len() - start;
    Ok(stats)
}

/// Paint `next` with no trust in what the terminal shows.
///
/// Diffs against `baseline` when it has the same size; otherwise clears the
/// screen first.
pub fn repaint(
    out: &mut OutputBuffer,
    pen: &mut Pen,
    baseline: Option<&Matrix>,
    next: &Matrix,
) -> RenderStats {
    let start = out.len();
    pen.reset_state();
    let mut stats = match baseline {
        Some(prev) if prev.size() == next.size() => paint(out, pen, prev, next),
        _ => {
            pen.set_style(out, &Style::PLAIN);
            ansi::clear_screen(out).ok();
            paint(out, pen, &Matrix::with_size(next.size()), next)
        }
    };
    stats.bytes_written = out.len() - start;
    stats
}

/// The diff loop. Matrices must have equal size.
#[allow(clippy::cast_possible_truncation)]
fn paint(out: &mut OutputBuffer, pen: &mut Pen, previous: &Matrix, next: &Matrix) -> RenderStats {
    let cols = usize::from(next.width());
    let mut stats = RenderStats::default();

    for ((row, prev_row), next_row) in (0u16..).zip(previous.rows()).zip(next.rows()) {
        // Row-skip: one slice comparison for an untouched row.
        if prev_row == next_row {
            stats.cells_skipped += cols;
            continue;
        }

        let mut col = 0;
        while col < cols {
            let cell = &next_row[col];
            let wide = cell.ch.width() == Some(2)
                && col + 1 < cols
                && next_row[col + 1].is_continuation();
            let span = if wide { 2 } else { 1 };

            if next_row[col..col + span] == prev_row[col..col + span] {
                stats.cells_skipped += span;
                col += span;
                continue;
            }

            // Blank tail: switch to the default style and erase.
            if cols - col >= EL_MIN_COLUMNS && next_row[col..].iter().all(|c| c.is_blank()) {
                let changed = next_row[col..]
                    .iter()
                    .zip(&prev_row[col..])
                    .filter(|(n, p)| n != p)
                    .count();
                stats.cells_rendered += changed;
                stats.cells_skipped += cols - col - changed;
                stats.motions += usize::from(pen.move_to(out, at(col, row)));
                pen.set_style(out, &Style::PLAIN);
                ansi::erase_line_right(out).ok();
                break;
            }

            stats.motions += usize::from(pen.move_to(out, at(col, row)));
            pen.set_style(out, &cell.style);

            // A lead without its continuation, an orphaned continuation, or
            // a zero-width character set directly would desync the cursor;
            // draw those as a space.
            let ch = if wide || cell.ch.width() == Some(1) {
                cell.ch
            } else {
                ' '
            };
            // Both fit: span is 1 or 2 and cols is a matrix width.
            pen.put(out, ch, span as u16, cols as u16);
            stats.cells_rendered += span;
            col += span;
        }
    }

    stats
}

#[allow(clippy::cast_possible_truncation)]
const fn at(col: usize, row: u16) -> Coord {
    // col < width, which is a u16.
    Coord::new(col as u16, row)
}

// ─── DiffRenderer ────────────────────────────────────────────────────────────

/// Differential renderer that owns its output buffer, pen and baseline.
///
/// Useful on its own when the caller manages I/O; the terminal session
/// drives the same passes with its own state.
///
/// ```
/// use tessera::caps::Capabilities;
/// use tessera::codec::TextEncoding;
/// use tessera::diff::DiffRenderer;
/// use tessera::encoder::Encoder;
/// use tessera::matrix::Matrix;
/// use tessera::style::Style;
///
/// let enc = Encoder::new(Capabilities::lookup("xterm-256color"), TextEncoding::Utf8);
/// let mut renderer = DiffRenderer::new(enc);
///
/// let previous = Matrix::new(3, 1);
/// let mut next = Matrix::new(3, 1);
/// next.put_str(1, 0, "X", Style::new().bold());
///
/// renderer.render_update(&previous, &next).unwrap();
/// assert_eq!(renderer.output_bytes(), b"\x1b[1;2H\x1b[0;1mX");
/// ```
pub struct DiffRenderer {
    output: OutputBuffer,
    pen: Pen,
    previous: Option<Matrix>,
    sync: bool,
}

impl DiffRenderer {
    /// A renderer with no baseline.
    #[must_use]
    pub fn new(encoder: Encoder) -> Self {
        Self {
            output: OutputBuffer::new(),
            pen: Pen::new(encoder),
            previous: None,
            sync: false,
        }
    }

    /// Wrap each pass in synchronized output when the terminal supports it.
    #[must_use]
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync && self.pen.encoder().capabilities().has(Features::SYNC_OUTPUT);
        self
    }

    /// Full repaint of `next`. Clears the previous pass's output first.
    pub fn render(&mut self, next: &Matrix) -> RenderStats {
        self.output.clear();
        self.begin();
        let mut stats = repaint(&mut self.output, &mut self.pen, self.previous.as_ref(), next);
        self.end(&mut stats);
        self.store_frame(next);
        stats
    }

    /// Minimal update from `previous` to `next`. Clears the previous pass's
    /// output first.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] when the sizes differ.
    pub fn render_update(&mut self, previous: &Matrix, next: &Matrix) -> Result<RenderStats> {
        self.output.clear();
        if previous.size() != next.size() {
            return Err(Error::DimensionMismatch {
                previous: previous.size(),
                next: next.size(),
            });
        }
        self.begin();
        let mut stats = update(&mut self.output, &mut self.pen, previous, next)?;
        self.end(&mut stats);
        self.store_frame(next);
        Ok(stats)
    }

    fn begin(&mut self) {
        if self.sync {
            ansi::begin_sync(&mut self.output).ok();
        }
    }

    fn end(&mut self, stats: &mut RenderStats) {
        if self.sync {
            ansi::end_sync(&mut self.output).ok();
        }
        stats.bytes_written = self.output.len();
        tracing::debug!(
            target: "tessera::render",
            rendered = stats.cells_rendered,
            skipped = stats.cells_skipped,
            motions = stats.motions,
            bytes = stats.bytes_written,
            "render pass"
        );
    }

    /// The bytes produced by the last pass.
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        self.output.as_bytes()
    }

    /// Move the last pass's bytes out.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.output.take()
    }

    /// Write the last pass's bytes to `w` and clear them.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl std::io::Write) -> std::io::Result<()> {
        self.output.flush_to(w)
    }

    /// Drop the baseline so the next [`render`](Self::render) clears and
    /// redraws everything.
    pub fn force_redraw(&mut self) {
        self.previous = None;
    }

    /// The matrix the terminal is believed to show.
    #[must_use]
    pub const fn baseline(&self) -> Option<&Matrix> {
        self.previous.as_ref()
    }

    #[must_use]
    pub const fn pen(&self) -> &Pen {
        &self.pen
    }

    /// Keep `next` as the baseline, reusing the allocation when possible.
    fn store_frame(&mut self, next: &Matrix) {
        match &mut self.previous {
            Some(prev) => prev.copy_from(next),
            None => self.previous = Some(next.clone()),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
