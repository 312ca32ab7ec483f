// SPDX-License-Identifier: MIT
//
// Screen matrix: a rectangular grid of cells.
//
// The unit the diff renderer works on. Applications paint into a matrix,
// hand it to `render`/`render_update`, and the renderer works out what
// changed since the previous one.
//
// Storage is a flat row-major `Vec<Cell>`: row `r` is the slice
// `[r * width, (r + 1) * width)`, so comparing two rows is one slice
// compare. Every row has exactly `width` cells.
//
// Wide characters occupy a lead cell and a continuation cell. Painting
// keeps that pairing intact: writing over either half of an existing wide
// character turns the other half into a space, and a wide character that
// would straddle the right edge is replaced by a space.

use std::fmt;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use crate::cell::Cell;
use crate::geom::Size;
use crate::style::{Style, StyledText};

/// A `width × height` grid of cells.
///
/// ```
/// use tessera::matrix::Matrix;
/// use tessera::style::Style;
///
/// let mut m = Matrix::new(10, 2);
/// let cols = m.put_str(0, 0, "hi 中", Style::PLAIN);
/// assert_eq!(cols, 5);
/// assert_eq!(m.get(3, 0).map(|c| c.ch), Some('中'));
/// assert!(m.get(4, 0).is_some_and(|c| c.is_continuation()));
/// ```
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Matrix {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Matrix {
    // ─── Construction ────────────────────────────────────────────────────

    /// A matrix filled with blank cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        Self::filled(width, height, Cell::BLANK)
    }

    /// A matrix filled with copies of `cell`.
    #[must_use]
    pub fn filled(width: u16, height: u16, cell: Cell) -> Self {
        let len = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![cell; len],
        }
    }

    /// A blank matrix of `size`.
    #[must_use]
    pub fn with_size(size: Size) -> Self {
        Self::new(size.cols, size.rows)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, col: u16, row: u16) -> bool {
        col < self.width && row < self.height
    }

    #[inline]
    const fn index(&self, col: u16, row: u16) -> usize {
        row as usize * self.width as usize + col as usize
    }

    /// The cell at `(col, row)`, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, col: u16, row: u16) -> Option<&Cell> {
        if self.in_bounds(col, row) {
            Some(&self.cells[self.index(col, row)])
        } else {
            None
        }
    }

    /// The raw row-major cell slice.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row as a slice, or `None` if `row` is out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.height {
            let start = self.index(0, row);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    /// Iterate rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        // A zero-width matrix has no cells, so the chunk size never matters.
        self.cells.chunks(usize::from(self.width).max(1))
    }

    // ─── Clear & Resize ──────────────────────────────────────────────────

    /// Reset every cell to blank.
    pub fn clear(&mut self) {
        self.fill(Cell::BLANK);
    }

    /// Overwrite every cell with `cell`.
    pub fn fill(&mut self, cell: Cell) {
        self.cells.fill(cell);
    }

    /// Change dimensions. All content is cleared.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let len = usize::from(width) * usize::from(height);
        self.cells.clear();
        self.cells.resize(len, Cell::BLANK);
    }

    /// Become a copy of `other`, reusing the allocation when sizes match.
    pub fn copy_from(&mut self, other: &Self) {
        if self.size() == other.size() {
            self.cells.copy_from_slice(&other.cells);
        } else {
            self.width = other.width;
            self.height = other.height;
            self.cells.clone_from(&other.cells);
        }
    }

    // ─── Direct Cell Access ──────────────────────────────────────────────

    /// Write a cell with no wide-character bookkeeping.
    ///
    /// Returns `true` if the position was in bounds. Callers that write
    /// continuation cells this way are responsible for their leads.
    #[inline]
    pub fn set(&mut self, col: u16, row: u16, cell: Cell) -> bool {
        if !self.in_bounds(col, row) {
            return false;
        }
        let idx = self.index(col, row);
        self.cells[idx] = cell;
        true
    }

    /// Break any wide character touching `(col, row)` into spaces.
    fn break_wide_at(&mut self, col: u16, row: u16) {
        let idx = self.index(col, row);

        if self.cells[idx].is_continuation() && col > 0 {
            let lead = idx - 1;
            self.cells[lead].ch = ' ';
        }

        if col + 1 < self.width && self.cells[idx + 1].is_continuation() {
            let style = self.cells[idx + 1].style;
            self.cells[idx + 1] = Cell::styled(' ', style);
        }
    }

    // ─── Painting ────────────────────────────────────────────────────────

    /// Paint one character at `(col, row)`.
    ///
    /// Wide characters also claim `col + 1`; when that column does not
    /// exist a space is painted instead. Zero-width and control characters
    /// paint nothing. Returns the number of columns painted.
    pub fn put_char(&mut self, col: u16, row: u16, ch: char, style: Style) -> u16 {
        if !self.in_bounds(col, row) {
            return 0;
        }
        match ch.width() {
            None | Some(0) => 0,
            Some(1) => {
                self.break_wide_at(col, row);
                let idx = self.index(col, row);
                self.cells[idx] = Cell::styled(ch, style);
                1
            }
            Some(_) if col + 1 >= self.width => {
                self.break_wide_at(col, row);
                let idx = self.index(col, row);
                self.cells[idx] = Cell::styled(' ', style);
                1
            }
            Some(_) => {
                self.break_wide_at(col, row);
                self.break_wide_at(col + 1, row);
                let idx = self.index(col, row);
                self.cells[idx] = Cell::styled(ch, style);
                self.cells[idx + 1] = Cell::continuation(style);
                2
            }
        }
    }

    /// Paint a string left to right starting at `(col, row)`, clipped to
    /// the row.
    ///
    /// Text is split into grapheme clusters; each cluster occupies the
    /// cell(s) of its base character, so combining marks do not consume
    /// columns. A wide character that does not fit at the end of the row
    /// becomes a space and ends the paint. Returns the columns consumed.
    pub fn put_str(&mut self, col: u16, row: u16, text: &str, style: Style) -> u16 {
        if row >= self.height {
            return 0;
        }
        let mut at = col;
        for grapheme in text.graphemes(true) {
            if at >= self.width {
                break;
            }
            let Some(base) = grapheme.chars().next() else {
                continue;
            };
            let wide = base.width() == Some(2);
            let painted = self.put_char(at, row, base, style);
            at = at.saturating_add(painted);
            if wide && painted == 1 {
                break;
            }
        }
        at.saturating_sub(col)
    }

    /// Paint styled text, run by run. Returns the columns consumed.
    pub fn put_styled(&mut self, col: u16, row: u16, text: &StyledText) -> u16 {
        let mut at = col;
        for span in text.spans() {
            if at >= self.width {
                break;
            }
            at = at.saturating_add(self.put_str(at, row, &span.text, span.style));
        }
        at.saturating_sub(col)
    }
}

impl fmt::Debug for Matrix {
    /// `Matrix(80x24)` followed by the rows as text, continuation cells
    /// omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({})", self.size())?;
        if f.alternate() {
            for row in self.rows() {
                let line: String = row
                    .iter()
                    .filter(|c| !c.is_continuation())
                    .map(|c| c.ch)
                    .collect();
                write!(f, "\n{line:?}")?;
            }
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;
    use pretty_assertions::assert_eq;

    fn row_text(m: &Matrix, row: u16) -> String {
        m.row(row)
            .unwrap()
            .iter()
            .map(|c| if c.is_continuation() { '_' } else { c.ch })
            .collect()
    }

    // ── Construction ────────────────────────────────────────────────────

    #[test]
    fn new_is_blank() {
        let m = Matrix::new(4, 3);
        assert_eq!(m.size(), Size::new(4, 3));
        assert_eq!(m.cells().len(), 12);
        assert!(m.cells().iter().all(Cell::is_blank));
    }

    #[test]
    fn zero_size_is_valid() {
        let m = Matrix::with_size(Size::default());
        assert!(m.cells().is_empty());
        assert_eq!(m.rows().count(), 0);
        assert!(m.get(0, 0).is_none());
    }

    #[test]
    fn rows_have_width_cells() {
        let m = Matrix::new(7, 3);
        assert_eq!(m.rows().count(), 3);
        assert!(m.rows().all(|r| r.len() == 7));
        assert!(m.row(3).is_none());
    }

    #[test]
    fn resize_clears() {
        let mut m = Matrix::new(3, 1);
        m.put_str(0, 0, "abc", Style::PLAIN);
        m.resize(5, 2);
        assert_eq!(m.size(), Size::new(5, 2));
        assert!(m.cells().iter().all(Cell::is_blank));
    }

    #[test]
    fn set_out_of_bounds_fails() {
        let mut m = Matrix::new(2, 2);
        assert!(m.set(1, 1, Cell::new('x')));
        assert!(!m.set(2, 0, Cell::new('x')));
        assert_eq!(m.get(1, 1), Some(&Cell::new('x')));
    }

    // ── Painting ────────────────────────────────────────────────────────

    #[test]
    fn put_str_clips_at_row_end() {
        let mut m = Matrix::new(3, 1);
        assert_eq!(m.put_str(1, 0, "hello", Style::PLAIN), 2);
        assert_eq!(row_text(&m, 0), " he");
    }

    #[test]
    fn put_str_wide_char() {
        let mut m = Matrix::new(4, 1);
        assert_eq!(m.put_str(0, 0, "中a", Style::PLAIN), 3);
        assert_eq!(row_text(&m, 0), "中_a ");
    }

    #[test]
    fn wide_char_at_row_end_becomes_space() {
        let mut m = Matrix::new(3, 1);
        assert_eq!(m.put_str(1, 0, "a中b", Style::PLAIN), 2);
        assert_eq!(row_text(&m, 0), " a ");
    }

    #[test]
    fn overwriting_continuation_breaks_lead() {
        let mut m = Matrix::new(4, 1);
        m.put_str(0, 0, "中", Style::PLAIN);
        m.put_char(1, 0, 'x', Style::PLAIN);
        assert_eq!(row_text(&m, 0), " x  ");
    }

    #[test]
    fn overwriting_lead_clears_continuation() {
        let mut m = Matrix::new(4, 1);
        m.put_str(0, 0, "中", Style::PLAIN);
        m.put_char(0, 0, 'x', Style::PLAIN);
        assert_eq!(row_text(&m, 0), "x   ");
        assert!(!m.get(1, 0).unwrap().is_continuation());
    }

    #[test]
    fn wide_over_wide_offset_by_one() {
        let mut m = Matrix::new(5, 1);
        m.put_str(0, 0, "中", Style::PLAIN);
        m.put_str(1, 0, "文", Style::PLAIN);
        assert_eq!(row_text(&m, 0), " 文_  ");
    }

    #[test]
    fn combining_marks_share_the_base_cell() {
        let mut m = Matrix::new(4, 1);
        assert_eq!(m.put_str(0, 0, "e\u{301}x", Style::PLAIN), 2);
        assert_eq!(row_text(&m, 0), "ex  ");
    }

    #[test]
    fn control_characters_paint_nothing() {
        let mut m = Matrix::new(4, 1);
        assert_eq!(m.put_str(0, 0, "a\tb", Style::PLAIN), 2);
        assert_eq!(row_text(&m, 0), "ab  ");
    }

    #[test]
    fn put_styled_keeps_run_styles() {
        let bold = Style::new().bold();
        let text = StyledText::from("a") + bold.paint("b") + Style::new().fg(Color::RED).paint("c");
        let mut m = Matrix::new(5, 1);
        assert_eq!(m.put_styled(1, 0, &text), 3);
        assert_eq!(m.get(1, 0).unwrap().style, Style::PLAIN);
        assert_eq!(m.get(2, 0).unwrap().style, bold);
        assert_eq!(m.get(3, 0).unwrap().style.fg, Some(Color::RED));
    }

    #[test]
    fn out_of_bounds_row_paints_nothing() {
        let mut m = Matrix::new(3, 1);
        assert_eq!(m.put_str(0, 1, "abc", Style::PLAIN), 0);
        assert_eq!(m.put_char(3, 0, 'x', Style::PLAIN), 0);
    }

    #[test]
    fn debug_shows_size_and_rows() {
        let mut m = Matrix::new(2, 1);
        m.put_str(0, 0, "ok", Style::PLAIN);
        assert_eq!(format!("{m:?}"), "Matrix(2x1)");
        assert_eq!(format!("{m:#?}"), "Matrix(2x1)\n\"ok\"");
    }
}
