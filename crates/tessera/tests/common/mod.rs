// SPDX-License-Identifier: MIT
//
// A minimal virtual terminal for checking renderer output.
//
// It interprets the subset of ECMA-48 the renderer emits: printable
// characters, CR, LF, BS, BEL, CUP, CUU/CUD/CUF/CUB, SGR, EL and ED 2.
// Private modes and DECSC/DECRC are accepted and ignored. Anything else
// panics, so a new sequence cannot slip past the round-trip tests.
//
// Writing into the last column sets a pending wrap, as xterm does; the
// next printable character wraps. Overwriting either half of a wide
// character blanks the other half.

#![allow(dead_code)]

use std::iter::Peekable;
use std::str::Chars;

use tessera::cell::CONTINUATION;
use tessera::encoder::Encoder;
use tessera::matrix::Matrix;
use tessera::style::{Attr, Color, Style};
use unicode_width::UnicodeWidthChar;

/// One screen position as the terminal would show it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    pub style: Style,
}

const BLANK: Glyph = Glyph {
    ch: ' ',
    style: Style::PLAIN,
};

pub struct Screen {
    cols: usize,
    rows: usize,
    cells: Vec<Glyph>,
    col: usize,
    row: usize,
    pending_wrap: bool,
    style: Style,
}

impl Screen {
    pub fn new(cols: u16, rows: u16) -> Self {
        let (cols, rows) = (usize::from(cols), usize::from(rows));
        Self {
            cols,
            rows,
            cells: vec![BLANK; cols * rows],
            col: 0,
            row: 0,
            pending_wrap: false,
            style: Style::PLAIN,
        }
    }

    pub fn glyph(&self, col: usize, row: usize) -> Glyph {
        self.cells[row * self.cols + col]
    }

    pub const fn cursor(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        let text = std::str::from_utf8(bytes).expect("renderer output is UTF-8");
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\x1b' => self.escape(&mut chars),
                '\r' => self.move_to(0, self.row),
                '\n' => self.line_feed(),
                '\x08' => self.move_to(self.col.saturating_sub(1), self.row),
                '\x07' => {}
                ch => self.print(ch),
            }
        }
    }

    /// Compare against what `matrix` should look like through `encoder`.
    pub fn check(&self, matrix: &Matrix, encoder: &Encoder) -> Result<(), String> {
        for row in 0..self.rows {
            for col in 0..self.cols {
                #[allow(clippy::cast_possible_truncation)]
                let cell = matrix
                    .get(col as u16, row as u16)
                    .expect("screen and matrix sizes match");
                let shown = self.glyph(col, row);
                if cell.is_continuation() {
                    if shown.ch != CONTINUATION {
                        return Err(format!("({col}, {row}): expected continuation, screen has {shown:?}"));
                    }
                    continue;
                }
                let expected = Glyph {
                    ch: cell.ch,
                    style: encoder.effective(&cell.style),
                };
                if shown != expected {
                    return Err(format!("({col}, {row}): expected {expected:?}, screen has {shown:?}"));
                }
            }
        }
        Ok(())
    }

    // ── Interpretation ──────────────────────────────────────────────────

    fn escape(&mut self, chars: &mut Peekable<Chars<'_>>) {
        match chars.next() {
            Some('[') => {}
            Some('7' | '8') => return,
            other => panic!("unexpected escape {other:?}"),
        }
        let mut params = String::new();
        let final_byte = loop {
            let ch = chars.next().expect("truncated CSI");
            if ('@'..='~').contains(&ch) {
                break ch;
            }
            params.push(ch);
        };
        if params.starts_with('?') {
            return;
        }
        let nums: Vec<usize> = if params.is_empty() {
            Vec::new()
        } else {
            params
                .split(';')
                .map(|p| if p.is_empty() { 0 } else { p.parse().expect("numeric parameter") })
                .collect()
        };
        let arg = |i: usize| nums.get(i).copied().filter(|&n| n != 0).unwrap_or(1);

        match final_byte {
            'H' => self.move_to(arg(1) - 1, arg(0) - 1),
            'A' => self.move_to(self.col, self.row.saturating_sub(arg(0))),
            'B' => self.move_to(self.col, self.row + arg(0)),
            'C' => self.move_to(self.col + arg(0), self.row),
            'D' => self.move_to(self.col.saturating_sub(arg(0)), self.row),
            'm' => self.sgr(&nums),
            'K' if nums.is_empty() => {
                let blank = self.erased();
                let start = self.row * self.cols;
                self.cells[start + self.col..start + self.cols].fill(blank);
            }
            'J' if nums == [2] => {
                let blank = self.erased();
                self.cells.fill(blank);
            }
            other => panic!("unmodelled CSI {params:?} {other:?}"),
        }
    }

    fn move_to(&mut self, col: usize, row: usize) {
        self.col = col.min(self.cols - 1);
        self.row = row.min(self.rows - 1);
        self.pending_wrap = false;
    }

    fn line_feed(&mut self) {
        if self.row + 1 < self.rows {
            self.row += 1;
        } else {
            self.cells.drain(..self.cols);
            self.cells.extend(std::iter::repeat_n(BLANK, self.cols));
        }
        self.pending_wrap = false;
    }

    fn print(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0);
        assert!(width > 0, "zero-width character {ch:?} written");
        if self.pending_wrap {
            self.col = 0;
            self.line_feed();
        }
        assert!(self.col + width <= self.cols, "wide character {ch:?} split at the margin");

        for col in self.col..self.col + width {
            self.split_wide(col);
        }
        let at = self.row * self.cols + self.col;
        self.cells[at] = Glyph {
            ch,
            style: self.style,
        };
        if width == 2 {
            self.cells[at + 1] = Glyph {
                ch: CONTINUATION,
                style: self.style,
            };
        }

        if self.col + width >= self.cols {
            self.col = self.cols - 1;
            self.pending_wrap = true;
        } else {
            self.col += width;
        }
    }

    /// Writing over half of a wide character erases the other half.
    fn split_wide(&mut self, col: usize) {
        let at = self.row * self.cols + col;
        if self.cells[at].ch == CONTINUATION && col > 0 {
            self.cells[at - 1] = BLANK;
        }
        if col + 1 < self.cols && self.cells[at + 1].ch == CONTINUATION {
            self.cells[at + 1] = BLANK;
        }
    }

    /// Erased cells take the current background.
    fn erased(&self) -> Glyph {
        Glyph {
            ch: ' ',
            style: Style {
                bg: self.style.bg,
                ..Style::PLAIN
            },
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sgr(&mut self, nums: &[usize]) {
        if nums.is_empty() {
            self.style = Style::PLAIN;
            return;
        }
        let mut i = 0;
        while i < nums.len() {
            let n = nums[i];
            i += 1;
            match n {
                0 => self.style = Style::PLAIN,
                1 => self.style.attrs |= Attr::BOLD,
                2 => self.style.attrs |= Attr::DIM,
                3 => self.style.attrs |= Attr::ITALIC,
                4 => self.style.attrs |= Attr::UNDERLINE,
                5 => self.style.attrs |= Attr::BLINK,
                7 => self.style.attrs |= Attr::REVERSE,
                30..=37 => self.style.fg = Some(Color::Indexed((n - 30) as u8)),
                40..=47 => self.style.bg = Some(Color::Indexed((n - 40) as u8)),
                90..=97 => self.style.fg = Some(Color::Indexed((n - 90 + 8) as u8)),
                100..=107 => self.style.bg = Some(Color::Indexed((n - 100 + 8) as u8)),
                38 | 48 => {
                    let color = match nums[i] {
                        5 => {
                            i += 2;
                            Color::Indexed(nums[i - 1] as u8)
                        }
                        2 => {
                            i += 4;
                            Color::Rgb(nums[i - 3] as u8, nums[i - 2] as u8, nums[i - 1] as u8)
                        }
                        other => panic!("bad extended color selector {other}"),
                    };
                    if n == 38 {
                        self.style.fg = Some(color);
                    } else {
                        self.style.bg = Some(color);
                    }
                }
                other => panic!("unmodelled SGR parameter {other}"),
            }
        }
    }
}

/// Printable characters in `bytes`, escape sequences and controls excluded.
pub fn printed_chars(bytes: &[u8]) -> usize {
    let text = std::str::from_utf8(bytes).expect("renderer output is UTF-8");
    let mut count = 0;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => {
                if chars.next() == Some('[') {
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
            }
            c if c.is_control() => {}
            _ => count += 1,
        }
    }
    count
}
