// SPDX-License-Identifier: MIT
//
// Cell: the atomic unit of rendering.
//
// Every character position of a screen matrix is a Cell: one character
// plus the style it is drawn in. The renderer's whole job is to diff grids
// of these and emit the bytes that turn one grid into the other.
//
// Wide characters (CJK, most emoji) occupy two columns. The first cell
// holds the character; the second is a continuation cell (`ch == '\0'`)
// carrying the same style. The renderer never targets a continuation cell
// directly: it is drawn as a side effect of its lead.

use unicode_width::UnicodeWidthChar;

use crate::style::Style;

/// Character stored in the second column of a wide character.
pub const CONTINUATION: char = '\0';

/// One character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// The character, or [`CONTINUATION`].
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl Cell {
    /// A space in the plain style.
    pub const BLANK: Self = Self {
        ch: ' ',
        style: Style::PLAIN,
    };

    #[inline]
    #[must_use]
    pub const fn new(ch: char) -> Self {
        Self {
            ch,
            style: Style::PLAIN,
        }
    }

    #[inline]
    #[must_use]
    pub const fn styled(ch: char, style: Style) -> Self {
        Self { ch, style }
    }

    /// The second half of a wide character drawn in `style`.
    #[inline]
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            ch: CONTINUATION,
            style,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.ch == CONTINUATION
    }

    /// Whether this is exactly what an erase leaves behind: a plain space.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }

    /// Columns this cell's character occupies: 0 for continuations, 2 for
    /// wide characters, 1 otherwise.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u16 {
        if self.is_continuation() {
            0
        } else if self.ch.width() == Some(2) {
            2
        } else {
            1
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    #[test]
    fn blank_is_default() {
        assert_eq!(Cell::default(), Cell::BLANK);
        assert!(Cell::BLANK.is_blank());
    }

    #[test]
    fn styled_space_is_not_blank() {
        assert!(!Cell::styled(' ', Style::new().bg(Color::BLUE)).is_blank());
        assert!(!Cell::styled(' ', Style::new().bold()).is_blank());
        assert!(!Cell::new('x').is_blank());
    }

    #[test]
    fn widths() {
        assert_eq!(Cell::new('a').width(), 1);
        assert_eq!(Cell::new('中').width(), 2);
        assert_eq!(Cell::continuation(Style::PLAIN).width(), 0);
    }

    #[test]
    fn continuation_marker() {
        let cont = Cell::continuation(Style::new().bold());
        assert!(cont.is_continuation());
        assert_eq!(cont.ch, CONTINUATION);
        assert!(!Cell::new('x').is_continuation());
    }
}
