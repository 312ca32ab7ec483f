// SPDX-License-Identifier: MIT
//
// Character encodings for the wire.
//
// A session talks to its terminal in one `TextEncoding`. Input bytes are
// decoded one character at a time so the input decoder can tell a partial
// multi-byte character (wait for more) from garbage (report and skip one
// byte). Output characters the encoding cannot represent are
// transliterated rather than dropped: `é` becomes `e` on an ASCII
// terminal, `中` becomes `? ` (padded to its two columns). Padding keeps
// the cursor arithmetic of the diff renderer valid whatever the encoding.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_width::UnicodeWidthChar;

// ─── TextEncoding ───────────────────────────────────────────────────────────

/// The byte encoding spoken on a terminal's descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: every byte is the codepoint of the same value.
    Latin1,
    /// 7-bit US-ASCII.
    Ascii,
}

/// Result of decoding one character from the front of a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A character and the number of bytes it occupied.
    Char(char, usize),
    /// The bytes are a valid prefix; more are needed.
    Incomplete,
    /// The first byte cannot start a character here.
    Invalid(DecodeError),
}

/// Input bytes that do not form a character in the session's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("byte {byte:#04x} is not valid {encoding}")]
pub struct DecodeError {
    pub byte: u8,
    pub encoding: TextEncoding,
}

/// A character the output encoding cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{ch:?} cannot be encoded as {encoding}")]
pub struct EncodeFallback {
    pub ch: char,
    pub encoding: TextEncoding,
}

impl TextEncoding {
    /// Parse a charset label as found in locale strings and `--encoding`
    /// style options. Case and punctuation are ignored.
    ///
    /// ```
    /// use tessera::codec::TextEncoding;
    ///
    /// assert_eq!(TextEncoding::from_label("UTF-8"), Some(TextEncoding::Utf8));
    /// assert_eq!(TextEncoding::from_label("iso_8859-1"), Some(TextEncoding::Latin1));
    /// assert_eq!(TextEncoding::from_label("ANSI_X3.4-1968"), Some(TextEncoding::Ascii));
    /// assert_eq!(TextEncoding::from_label("koi8-r"), None);
    /// ```
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "utf8" => Some(Self::Utf8),
            "latin1" | "l1" | "iso88591" | "cp819" | "ibm819" => Some(Self::Latin1),
            "ascii" | "usascii" | "ansix341968" | "646" => Some(Self::Ascii),
            _ => None,
        }
    }

    /// Canonical label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Ascii => "US-ASCII",
        }
    }

    /// Whether `ch` has a representation in this encoding.
    #[inline]
    #[must_use]
    pub const fn can_encode(self, ch: char) -> bool {
        match self {
            Self::Utf8 => true,
            Self::Latin1 => (ch as u32) <= 0xFF,
            Self::Ascii => ch.is_ascii(),
        }
    }

    // ── Decoding ────────────────────────────────────────────────────────

    /// Decode one character from the front of `bytes`.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Decoded {
        let Some(&first) = bytes.first() else {
            return Decoded::Incomplete;
        };
        match self {
            Self::Latin1 => Decoded::Char(char::from(first), 1),
            Self::Ascii if first.is_ascii() => Decoded::Char(char::from(first), 1),
            Self::Ascii => self.invalid(first),
            Self::Utf8 => self.decode_utf8(bytes, first),
        }
    }

    fn decode_utf8(self, bytes: &[u8], first: u8) -> Decoded {
        let len = utf8_char_len(first);
        if len == 0 {
            return self.invalid(first);
        }
        // Every continuation byte we already have must look like one,
        // otherwise waiting cannot help.
        let avail = bytes.len().min(len);
        if bytes[1..avail].iter().any(|&b| b & 0xC0 != 0x80) {
            return self.invalid(first);
        }
        if bytes.len() < len {
            return Decoded::Incomplete;
        }
        // Overlong forms and surrogates pass the shape check above.
        match std::str::from_utf8(&bytes[..len]) {
            Ok(s) => s
                .chars()
                .next()
                .map_or_else(|| self.invalid(first), |ch| Decoded::Char(ch, len)),
            Err(_) => self.invalid(first),
        }
    }

    const fn invalid(self, byte: u8) -> Decoded {
        Decoded::Invalid(DecodeError {
            byte,
            encoding: self,
        })
    }

    /// Decode a whole byte string, replacing bad bytes with U+FFFD.
    #[must_use]
    pub fn decode_lossy(self, mut bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        while !bytes.is_empty() {
            match self.decode(bytes) {
                Decoded::Char(ch, len) => {
                    out.push(ch);
                    bytes = &bytes[len..];
                }
                Decoded::Invalid(_) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    bytes = &bytes[1..];
                }
                Decoded::Incomplete => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    break;
                }
            }
        }
        out
    }

    // ── Encoding ────────────────────────────────────────────────────────

    /// Append the bytes for `ch`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeFallback`] when the encoding has no representation
    /// for `ch`; nothing is written in that case.
    pub fn encode(self, ch: char, out: &mut Vec<u8>) -> Result<(), EncodeFallback> {
        if !self.can_encode(ch) {
            return Err(EncodeFallback { ch, encoding: self });
        }
        match self {
            Self::Utf8 => {
                let mut tmp = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
            }
            // can_encode guarantees the codepoint fits in a byte.
            #[allow(clippy::cast_possible_truncation)]
            Self::Latin1 | Self::Ascii => out.push(ch as u32 as u8),
        }
        Ok(())
    }

    /// Append `ch`, transliterating when it cannot be encoded.
    ///
    /// Always writes exactly as many columns as `ch` occupies on screen.
    pub fn encode_lossy(self, ch: char, out: &mut Vec<u8>) {
        if self.encode(ch, out).is_ok() {
            return;
        }
        tracing::trace!(target: "tessera::render", ?ch, encoding = %self, "transliterating");

        let width = ch.width().unwrap_or(1);
        let mut written = 0;
        for sub in transliterate(ch, self).chars().take(width) {
            if self.encode(sub, out).is_ok() {
                written += 1;
            }
        }
        out.resize(out.len() + (width - written), b' ');
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Transliteration ────────────────────────────────────────────────────────

/// Single-character stand-ins for common typography and box drawing.
fn punctuation(ch: char) -> Option<char> {
    Some(match ch {
        '\u{00A0}' | '\u{2002}'..='\u{200A}' | '\u{202F}' | '\u{3000}' => ' ',
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' | '«' | '»' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        '\u{2022}' | '\u{00B7}' | '\u{2027}' => '*',
        '\u{2026}' => '.',
        '×' => 'x',
        '÷' => '/',
        '←' => '<',
        '→' => '>',
        '↑' => '^',
        '↓' => 'v',
        '─' | '━' | '═' => '-',
        '│' | '┃' | '║' => '|',
        '┌' | '┐' | '└' | '┘' | '├' | '┤' | '┬' | '┴' | '┼' | '╔' | '╗' | '╚' | '╝' => '+',
        _ => return None,
    })
}

/// Best-effort replacement text for a character `encoding` cannot carry.
///
/// Tries the punctuation table, then the compatibility decomposition with
/// unencodable parts (combining marks, mostly) stripped, then `?`.
#[must_use]
pub fn transliterate(ch: char, encoding: TextEncoding) -> String {
    if let Some(sub) = punctuation(ch) {
        return sub.to_string();
    }
    let base: String = std::iter::once(ch)
        .nfkd()
        .filter(|&c| encoding.can_encode(c) && !c.is_control())
        .collect();
    if base.is_empty() {
        "?".to_owned()
    } else {
        base
    }
}

/// Expected length of a UTF-8 sequence from its first byte, 0 when the
/// byte cannot start one.
#[inline]
#[must_use]
pub const fn utf8_char_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
