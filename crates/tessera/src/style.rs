// SPDX-License-Identifier: MIT
//
// Styled text: logical colors, attributes, and runs of styled characters.
//
// Everything here is terminal-agnostic. A `Color` is what the application
// asked for; what actually reaches the wire depends on the capability
// model and is decided by the encoder. That split keeps styled text
// portable: the same `StyledText` prints on a true-color terminal and on a
// monochrome serial console.
//
// StyledText is normalized on every mutation: empty runs are dropped and
// adjacent runs with equal style merge. Concatenation is therefore
// associative in the structural sense, `(a + b) + c == a + (b + c)`.

use std::fmt;
use std::ops::{Add, AddAssign};

use unicode_width::UnicodeWidthStr;

// ─── Color ──────────────────────────────────────────────────────────────────

/// A logical color.
///
/// `Indexed` refers to the xterm palette (0–15 named colors, 16–231 color
/// cube, 232–255 gray ramp). `Rgb` is a 24-bit color. Neither is resolved
/// until encode time, where it is quantized to the terminal's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Indexed(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const RED: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const YELLOW: Self = Self::Indexed(3);
    pub const BLUE: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const CYAN: Self = Self::Indexed(6);
    pub const WHITE: Self = Self::Indexed(7);
    pub const BRIGHT_BLACK: Self = Self::Indexed(8);
    pub const BRIGHT_RED: Self = Self::Indexed(9);
    pub const BRIGHT_GREEN: Self = Self::Indexed(10);
    pub const BRIGHT_YELLOW: Self = Self::Indexed(11);
    pub const BRIGHT_BLUE: Self = Self::Indexed(12);
    pub const BRIGHT_MAGENTA: Self = Self::Indexed(13);
    pub const BRIGHT_CYAN: Self = Self::Indexed(14);
    pub const BRIGHT_WHITE: Self = Self::Indexed(15);

    /// The color's 24-bit value, looking indices up in the xterm palette.
    #[must_use]
    pub fn to_rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Indexed(idx) => crate::color::xterm256_to_rgb(idx),
            Self::Rgb(r, g, b) => (r, g, b),
        }
    }
}

// ─── Attributes ─────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes, mapped to SGR parameters by the encoder.
    ///
    /// ```
    /// use tessera::style::Attr;
    ///
    /// let attrs = Attr::BOLD | Attr::UNDERLINE;
    /// assert!(attrs.contains(Attr::BOLD));
    /// assert!(!attrs.contains(Attr::REVERSE));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u8 {
        /// SGR 1: increased intensity.
        const BOLD      = 1 << 0;
        /// SGR 2: decreased intensity.
        const DIM       = 1 << 1;
        /// SGR 3: italic. Many terminals render it as reverse or ignore it.
        const ITALIC    = 1 << 2;
        /// SGR 4: single underline.
        const UNDERLINE = 1 << 3;
        /// SGR 5: blink.
        const BLINK     = 1 << 4;
        /// SGR 7: swap foreground and background.
        const REVERSE   = 1 << 5;
    }
}

impl Attr {
    /// SGR parameter for each attribute, in emission order.
    pub(crate) const SGR: [(Self, u8); 6] = [
        (Self::BOLD, 1),
        (Self::DIM, 2),
        (Self::ITALIC, 3),
        (Self::UNDERLINE, 4),
        (Self::BLINK, 5),
        (Self::REVERSE, 7),
    ];
}

// ─── Style ──────────────────────────────────────────────────────────────────

/// Foreground, background and attributes for a run of text.
///
/// `None` colors mean "terminal default". `Style::default()` is plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attr,
}

impl Style {
    /// Plain text: default colors, no attributes.
    pub const PLAIN: Self = Self {
        fg: None,
        bg: None,
        attrs: Attr::empty(),
    };

    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::PLAIN
    }

    #[inline]
    #[must_use]
    pub const fn fg(self, color: Color) -> Self {
        Self {
            fg: Some(color),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub const fn bg(self, color: Color) -> Self {
        Self {
            bg: Some(color),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub const fn attrs(self, attrs: Attr) -> Self {
        Self {
            attrs: self.attrs.union(attrs),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub const fn bold(self) -> Self {
        self.attrs(Attr::BOLD)
    }

    #[inline]
    #[must_use]
    pub const fn underline(self) -> Self {
        self.attrs(Attr::UNDERLINE)
    }

    #[inline]
    #[must_use]
    pub const fn blink(self) -> Self {
        self.attrs(Attr::BLINK)
    }

    #[inline]
    #[must_use]
    pub const fn reverse(self) -> Self {
        self.attrs(Attr::REVERSE)
    }

    /// Whether this is the plain style.
    #[inline]
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.attrs.is_empty()
    }

    /// Wrap `text` in this style.
    #[must_use]
    pub fn paint(self, text: impl Into<String>) -> StyledText {
        StyledText::styled(self, text)
    }
}

// ─── Span ───────────────────────────────────────────────────────────────────

/// One run of characters sharing a style.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub style: Style,
    pub text: String,
}

impl Span {
    #[must_use]
    pub fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

// ─── StyledText ─────────────────────────────────────────────────────────────

/// An ordered sequence of styled runs.
///
/// Plain strings convert into single-run text, so `print("hi")` and
/// `print(Style::new().bold().paint("hi"))` go through the same API.
///
/// ```
/// use tessera::style::{Color, Style, StyledText};
///
/// let text = StyledText::from("status: ") + Style::new().fg(Color::GREEN).paint("ok");
/// assert_eq!(text.spans().len(), 2);
/// assert_eq!(text.to_string(), "status: ok");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StyledText {
    spans: Vec<Span>,
}

impl StyledText {
    /// Empty text. Prints nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self { spans: Vec::new() }
    }

    /// A single run in the plain style.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(Style::PLAIN, text)
    }

    /// A single run in `style`.
    #[must_use]
    pub fn styled(style: Style, text: impl Into<String>) -> Self {
        let mut out = Self::new();
        out.push(style, text);
        out
    }

    /// Append a run, merging it into the last run when styles match.
    pub fn push(&mut self, style: Style, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.spans.push(Span { style, text }),
        }
        self
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, style: Style, text: impl Into<String>) -> Self {
        self.push(style, text);
        self
    }

    #[inline]
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Display width in terminal columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.width()).sum()
    }

    /// Iterate `(style, char)` pairs in order.
    pub fn chars(&self) -> impl Iterator<Item = (Style, char)> + '_ {
        self.spans
            .iter()
            .flat_map(|span| span.text.chars().map(move |ch| (span.style, ch)))
    }
}

impl fmt::Display for StyledText {
    /// Writes the text content without styling.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}

impl From<&str> for StyledText {
    fn from(s: &str) -> Self {
        Self::plain(s)
    }
}

impl From<String> for StyledText {
    fn from(s: String) -> Self {
        Self::plain(s)
    }
}

impl From<&String> for StyledText {
    fn from(s: &String) -> Self {
        Self::plain(s.as_str())
    }
}

impl From<char> for StyledText {
    fn from(ch: char) -> Self {
        Self::plain(ch)
    }
}

impl From<fmt::Arguments<'_>> for StyledText {
    fn from(args: fmt::Arguments<'_>) -> Self {
        Self::plain(args.to_string())
    }
}

impl From<Span> for StyledText {
    fn from(span: Span) -> Self {
        Self::styled(span.style, span.text)
    }
}

impl<T: Into<String>> From<(Style, T)> for StyledText {
    fn from((style, text): (Style, T)) -> Self {
        Self::styled(style, text)
    }
}

impl From<&Self> for StyledText {
    fn from(text: &Self) -> Self {
        text.clone()
    }
}

impl Extend<Span> for StyledText {
    fn extend<I: IntoIterator<Item = Span>>(&mut self, iter: I) {
        for span in iter {
            self.push(span.style, span.text);
        }
    }
}

impl FromIterator<Span> for StyledText {
    fn from_iter<I: IntoIterator<Item = Span>>(iter: I) -> Self {
        let mut out = Self::new();
        out.extend(iter);
        out
    }
}

impl<T: Into<Self>> AddAssign<T> for StyledText {
    fn add_assign(&mut self, rhs: T) {
        let rhs: Self = rhs.into();
        self.extend(rhs.spans);
    }
}

impl<T: Into<Self>> Add<T> for StyledText {
    type Output = Self;

    fn add(mut self, rhs: T) -> Self {
        self += rhs;
        self
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
