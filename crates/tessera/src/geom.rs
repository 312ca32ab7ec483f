// SPDX-License-Identifier: MIT
//
// Screen geometry: sizes and positions in character cells.
//
// Both types are zero-based, row grows downward. The wire protocol is
// 1-based; conversion happens only at the encoder and decoder edges.

use std::fmt;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal or matrix dimensions in character cells.
///
/// A 0×0 size is valid: detached and pty-less sessions report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Total number of cells (`cols × rows`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }

    /// Whether either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

// ─── Coord ──────────────────────────────────────────────────────────────────

/// A cell position: `col` from the left edge, `row` from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coord {
    pub col: u16,
    pub row: u16,
}

impl Coord {
    pub const ORIGIN: Self = Self { col: 0, row: 0 };

    #[inline]
    #[must_use]
    pub const fn new(col: u16, row: u16) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_area() {
        assert_eq!(Size::new(80, 24).area(), 1920);
        assert_eq!(Size::new(0, 24).area(), 0);
        assert_eq!(Size::new(500, 200).area(), 100_000);
    }

    #[test]
    fn zero_size_is_empty() {
        assert!(Size::default().is_empty());
        assert!(Size::new(80, 0).is_empty());
        assert!(!Size::new(1, 1).is_empty());
    }

    #[test]
    fn size_display() {
        assert_eq!(Size::new(80, 24).to_string(), "80x24");
    }

    #[test]
    fn coord_display() {
        assert_eq!(Coord::new(3, 7).to_string(), "(3, 7)");
        assert_eq!(Coord::ORIGIN, Coord::default());
    }
}
