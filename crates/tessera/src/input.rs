// SPDX-License-Identifier: MIT
//
// Streaming input decoder.
//
// Turns raw bytes from the input descriptor into structured events: keys,
// mouse actions, paste content, and focus changes. Handles every protocol
// the session enables:
//
// - Control characters and printable text in the session's encoding
// - Legacy CSI sequences (arrows, function keys, editing keys) with the
//   xterm modifier parameter
// - SS3 sequences (application cursor keys, F1-F4)
// - SGR mouse protocol and the legacy X10 mouse encoding
// - Bracketed paste (accumulates pasted text between delimiters)
// - Focus reporting (terminal gained / lost focus)
// - Alt+key (ESC followed by a key) and Alt+sequence (ESC ESC CSI ...)
//
// # Design
//
// Escape sequences can span any number of `read()` calls, so the decoder
// keeps every byte it cannot decide on yet. A byte run is only turned into
// an event once no future byte could change the outcome: feeding input in
// one batch or split at any point yields the same events. The only
// decision that depends on time is the lone ESC. After the grace period
// with no new bytes, call [`Decoder::flush`] to resolve it.
//
// Nothing is dropped. Bytes the decoder cannot make sense of come back as
// `Event::Unknown`, and `bytes_decoded() + pending()` always equals the
// number of bytes fed.

use bitflags::bitflags;

use crate::codec::{Decoded, TextEncoding};
use crate::geom::{Coord, Size};

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded terminal input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A key press.
    Key(KeyEvent),
    /// A mouse button action or movement.
    Mouse(MouseEvent),
    /// The terminal changed size. Synthesized by the session, never decoded
    /// from bytes.
    Resize(Size),
    /// Bracketed paste content.
    ///
    /// The terminal wraps clipboard paste with `CSI 200~` / `CSI 201~`
    /// delimiters. Everything in between is delivered as one event, so
    /// pasted newlines are not mistaken for Enter presses.
    Paste(String),
    /// Terminal window gained focus (`CSI I`).
    FocusGained,
    /// Terminal window lost focus (`CSI O`).
    FocusLost,
    /// Bytes that form no known key or report.
    Unknown(Vec<u8>),
}

/// A key with its active modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    #[inline]
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        Self { code, modifiers }
    }

    /// The same key with Alt added.
    #[inline]
    #[must_use]
    pub const fn with_alt(self) -> Self {
        Self {
            code: self.code,
            modifiers: self.modifiers.union(Modifiers::ALT),
        }
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }
}

/// Identity of a key.
///
/// Printable characters use [`Char`](KeyCode::Char); Ctrl+letter arrives
/// as the lowercase letter with [`Modifiers::CTRL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F20.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Matches the xterm CSI modifier encoding, where `param = 1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
        const META  = 0b0000_1000;
    }
}

/// A mouse report: where, which button, what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// 0-based cell position.
    pub position: Coord,
    /// `None` when the terminal did not say (legacy release, bare motion).
    pub button: Option<MouseButton>,
    pub action: MouseAction,
    /// Shift, Alt and Ctrl held during the report.
    pub modifiers: Modifiers,
}

/// Mouse button identity. Wheel directions count as buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseAction {
    Press,
    Release,
    /// Moved while a button is held.
    Drag,
    /// Moved with no button held.
    Move,
}

// ─── Decoder ────────────────────────────────────────────────────────────────

const ESC: u8 = 0x1B;

/// Bracketed paste opening delimiter: `ESC [ 200 ~`
const PASTE_START: &[u8] = b"\x1b[200~";
/// Bracketed paste closing delimiter: `ESC [ 201 ~`
const PASTE_END: &[u8] = b"\x1b[201~";

/// Longest escape sequence worth waiting for. Anything longer without a
/// final byte is garbage.
const MAX_SEQUENCE: usize = 64;

/// Streaming terminal input decoder.
///
/// Feed raw bytes via [`advance`](Decoder::advance) and collect structured
/// [`Event`]s. Incomplete sequences stay buffered until more bytes arrive,
/// [`flush`](Decoder::flush) resolves them, or [`finish`](Decoder::finish)
/// ends the stream.
///
/// ```
/// use tessera::input::{Decoder, Event, KeyCode, KeyEvent};
///
/// let mut decoder = Decoder::default();
/// assert!(decoder.advance(b"\x1b").is_empty());
/// assert!(decoder.advance(b"[").is_empty());
/// assert_eq!(
///     decoder.advance(b"A"),
///     vec![Event::Key(KeyEvent::from(KeyCode::Up))]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    /// Bytes not yet turned into events.
    buf: Vec<u8>,
    encoding: TextEncoding,
    /// When `true`, `buf` starts with `PASTE_START` and everything after it
    /// is paste content waiting for the closing delimiter.
    in_paste: bool,
    /// How far into `buf` the closing delimiter has been searched for.
    paste_scanned: usize,
    decoded: usize,
}

impl Decoder {
    #[must_use]
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            encoding,
            in_paste: false,
            paste_scanned: 0,
            decoded: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Total bytes turned into events so far.
    #[inline]
    #[must_use]
    pub const fn bytes_decoded(&self) -> usize {
        self.decoded
    }

    /// Bytes held back: a partial sequence, a partial character, or an open
    /// paste (delimiter included).
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Whether a bracketed paste is open.
    #[inline]
    #[must_use]
    pub const fn in_paste(&self) -> bool {
        self.in_paste
    }

    /// Feed bytes and return every event they complete.
    pub fn advance(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(bytes);
        let encoding = self.encoding;
        let mut events = Vec::new();
        let mut pos = 0;

        loop {
            // ── Paste mode: scan for closing delimiter ──────────────
            if self.in_paste {
                match self.close_paste(pos) {
                    Some((event, consumed)) => {
                        events.push(event);
                        pos += consumed;
                        continue;
                    }
                    None => break,
                }
            }

            let rest = &self.buf[pos..];
            if rest.is_empty() {
                break;
            }
            if rest.starts_with(PASTE_START) {
                self.in_paste = true;
                self.paste_scanned = PASTE_START.len();
                continue;
            }

            match parse(rest, encoding) {
                Parsed::Event(event, consumed) => {
                    if let Event::Unknown(bytes) = &event {
                        tracing::trace!(target: "tessera::input", ?bytes, "unknown input");
                    }
                    events.push(event);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
            }
        }

        self.consume(pos);
        events
    }

    /// Resolve stalled bytes: the grace period expired with nothing new.
    ///
    /// A lone ESC becomes Escape, ESC ESC becomes Alt+Escape, and ESC `[`
    /// or ESC `O` become Alt+`[` / Alt+`O`. Any other partial sequence or
    /// partial character comes back as [`Event::Unknown`]. An open paste
    /// stays pending.
    pub fn flush(&mut self) -> Vec<Event> {
        if self.in_paste || self.buf.is_empty() {
            return Vec::new();
        }
        let event = match self.buf.as_slice() {
            [ESC] => Event::Key(KeyEvent::from(KeyCode::Escape)),
            [ESC, ESC] => alt(KeyCode::Escape),
            [ESC, b'['] => alt(KeyCode::Char('[')),
            [ESC, b'O'] => alt(KeyCode::Char('O')),
            stalled => {
                tracing::trace!(target: "tessera::input", bytes = ?stalled, "stalled input");
                Event::Unknown(stalled.to_vec())
            }
        };
        self.consume(self.buf.len());
        vec![event]
    }

    /// End of stream: flush, then deliver an unterminated paste as-is.
    pub fn finish(&mut self) -> Vec<Event> {
        let mut events = self.flush();
        if self.in_paste {
            let text = self.encoding.decode_lossy(&self.buf[PASTE_START.len()..]);
            events.push(Event::Paste(text));
            self.in_paste = false;
            self.paste_scanned = 0;
            self.consume(self.buf.len());
        }
        events
    }

    /// Look for the end of the paste that starts at `buf[pos]`.
    fn close_paste(&mut self, pos: usize) -> Option<(Event, usize)> {
        let rest = &self.buf[pos..];
        // Resume where the last search stopped, minus a partial delimiter.
        let from = self
            .paste_scanned
            .saturating_sub(PASTE_END.len() - 1)
            .max(PASTE_START.len());

        if let Some(offset) = find_subsequence(&rest[from..], PASTE_END) {
            let end = from + offset;
            let text = self.encoding.decode_lossy(&rest[PASTE_START.len()..end]);
            self.in_paste = false;
            self.paste_scanned = 0;
            Some((Event::Paste(text), end + PASTE_END.len()))
        } else {
            self.paste_scanned = rest.len();
            None
        }
    }

    fn consume(&mut self, n: usize) {
        if n > 0 {
            self.buf.drain(..n);
            self.decoded += n;
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(TextEncoding::Utf8)
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────
//
// All parse functions are pure: they read from the front of a slice and
// return what they found plus how many bytes it took. A function may only
// answer with an event when no further byte could change the answer.

/// Result of trying to decode one event from the front of the buffer.
enum Parsed {
    /// An event and the number of bytes it consumed.
    Event(Event, usize),
    /// A valid prefix; more bytes are needed.
    Incomplete,
}

/// Decode one event from the front of `buf` (never empty).
fn parse(buf: &[u8], encoding: TextEncoding) -> Parsed {
    match buf[0] {
        ESC => parse_escape(buf, encoding),
        b @ (0x00..=0x1F | 0x7F) => control_key(b).map_or_else(
            || Parsed::Event(Event::Unknown(vec![b]), 1),
            |key| Parsed::Event(Event::Key(key), 1),
        ),
        b @ 0x20..=0x7E => Parsed::Event(press(KeyCode::Char(char::from(b))), 1),
        _ => parse_encoded(buf, encoding),
    }
}

/// A character at or above 0x80 in the session's encoding.
fn parse_encoded(buf: &[u8], encoding: TextEncoding) -> Parsed {
    match encoding.decode(buf) {
        Decoded::Char(ch, len) if !ch.is_control() => {
            Parsed::Event(press(KeyCode::Char(ch)), len)
        }
        // C1 controls are not keys.
        Decoded::Char(_, len) => Parsed::Event(Event::Unknown(buf[..len].to_vec()), len),
        Decoded::Invalid(_) => Parsed::Event(Event::Unknown(vec![buf[0]]), 1),
        Decoded::Incomplete => Parsed::Incomplete,
    }
}

/// Map a C0 control or DEL to its key. `None` for 0x1C..=0x1F.
const fn control_key(byte: u8) -> Option<KeyEvent> {
    let key = match byte {
        b'\r' | b'\n' => KeyEvent::new(KeyCode::Enter, Modifiers::empty()),
        b'\t' => KeyEvent::new(KeyCode::Tab, Modifiers::empty()),
        0x08 | 0x7F => KeyEvent::new(KeyCode::Backspace, Modifiers::empty()),
        0x00 => KeyEvent::new(KeyCode::Char('@'), Modifiers::CTRL),
        b @ 0x01..=0x1A => KeyEvent::new(KeyCode::Char((b + b'a' - 1) as char), Modifiers::CTRL),
        _ => return None,
    };
    Some(key)
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8], encoding: TextEncoding) -> Parsed {
    let Some(&next) = buf.get(1) else {
        return Parsed::Incomplete;
    };

    match next {
        // CSI: ESC [
        b'[' => parse_csi(buf),
        // SS3: ESC O
        b'O' => parse_ss3(buf),
        // ESC ESC: Alt+Escape, or Alt in front of a whole sequence.
        ESC => parse_alt_sequence(buf),
        // Alt+printable character.
        b @ 0x20..=0x7E => Parsed::Event(alt(KeyCode::Char(char::from(b))), 2),
        // Alt+control character (e.g. ESC Ctrl+A, ESC DEL).
        b @ (0x00..=0x1F | 0x7F) => control_key(b).map_or_else(unknown_escape, |key| {
            Parsed::Event(Event::Key(key.with_alt()), 2)
        }),
        // Alt+encoded character.
        _ => match encoding.decode(&buf[1..]) {
            Decoded::Char(ch, len) if !ch.is_control() => {
                Parsed::Event(alt(KeyCode::Char(ch)), 1 + len)
            }
            Decoded::Incomplete => Parsed::Incomplete,
            Decoded::Char(..) | Decoded::Invalid(_) => unknown_escape(),
        },
    }
}

/// `ESC ESC …`: Alt applied to the key sequence that follows.
fn parse_alt_sequence(buf: &[u8]) -> Parsed {
    let inner = match buf.get(2) {
        None => return Parsed::Incomplete,
        Some(b'[') => parse_csi(&buf[1..]),
        Some(b'O') => parse_ss3(&buf[1..]),
        Some(_) => return Parsed::Event(alt(KeyCode::Escape), 2),
    };
    match inner {
        Parsed::Incomplete => Parsed::Incomplete,
        Parsed::Event(Event::Key(key), consumed) => {
            Parsed::Event(Event::Key(key.with_alt()), consumed + 1)
        }
        // Not a key: the first ESC stands alone, the rest resyncs.
        Parsed::Event(..) => Parsed::Event(press(KeyCode::Escape), 1),
    }
}

// ── CSI (Control Sequence Introducer) ───────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == ESC && buf[1] == b'[');

    match buf.get(2) {
        None => return Parsed::Incomplete,
        // SGR mouse: ESC [ <
        Some(b'<') => return parse_sgr_mouse(buf),
        // Legacy mouse: ESC [ M cb cx cy
        Some(b'M') => return parse_x10_mouse(buf),
        Some(_) => {}
    }

    // Parameter bytes are 0x30..=0x3F, intermediates 0x20..=0x2F, and the
    // final byte is 0x40..=0x7E.
    let mut end = 2;
    loop {
        let Some(&b) = buf.get(end) else {
            return Parsed::Incomplete;
        };
        match b {
            0x40..=0x7E => break,
            0x20..=0x3F if end < MAX_SEQUENCE => end += 1,
            _ => return unknown_escape(),
        }
    }

    let seq = &buf[..=end];
    let consumed = end + 1;
    let Some(params) = parse_params(&buf[2..end]) else {
        return unknown_sequence(seq);
    };
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&m| decode_modifiers(m));

    let event = match (buf[end], params.as_slice()) {
        (b'I', []) => Event::FocusGained,
        (b'O', []) => Event::FocusLost,
        (b'Z', []) => key_with(KeyCode::Tab, Modifiers::SHIFT),
        (b'~', [n] | [n, _]) => match tilde_key(*n) {
            Some(code) => key_with(code, modifiers),
            None => return unknown_sequence(seq),
        },
        (f, [] | [_] | [_, _]) => match letter_key(f) {
            Some(code) => key_with(code, modifiers),
            None => return unknown_sequence(seq),
        },
        _ => return unknown_sequence(seq),
    };

    Parsed::Event(event, consumed)
}

/// Keys of the form `CSI n ~` / `CSI n ; m ~`.
const fn tilde_key(n: u16) -> Option<KeyCode> {
    Some(match n {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        25 => KeyCode::F(13),
        26 => KeyCode::F(14),
        28 => KeyCode::F(15),
        29 => KeyCode::F(16),
        31 => KeyCode::F(17),
        32 => KeyCode::F(18),
        33 => KeyCode::F(19),
        34 => KeyCode::F(20),
        _ => return None,
    })
}

/// Final bytes shared by CSI and SS3 cursor and function keys.
const fn letter_key(final_byte: u8) -> Option<KeyCode> {
    Some(match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return None,
    })
}

// ── SS3 (Single Shift 3) ───────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    debug_assert!(buf.len() >= 2 && buf[0] == ESC && buf[1] == b'O');

    let Some(&b) = buf.get(2) else {
        return Parsed::Incomplete;
    };
    match letter_key(b) {
        Some(code) => Parsed::Event(press(code), 3),
        None if (0x40..=0x7E).contains(&b) => unknown_sequence(&buf[..3]),
        None => unknown_escape(),
    }
}

// ── Mouse ───────────────────────────────────────────────────────────────────

/// `ESC [ < Pb ; Px ; Py M` (press / motion) or `… m` (release).
fn parse_sgr_mouse(buf: &[u8]) -> Parsed {
    let mut end = 3;
    loop {
        let Some(&b) = buf.get(end) else {
            return Parsed::Incomplete;
        };
        match b {
            b'M' | b'm' => break,
            b'0'..=b'9' | b';' if end < MAX_SEQUENCE => end += 1,
            _ => return unknown_escape(),
        }
    }

    let seq = &buf[..=end];
    let params = parse_params(&buf[3..end]);
    let Some(&[cb, x, y]) = params.as_deref() else {
        return unknown_sequence(seq);
    };
    Parsed::Event(mouse_event(cb, x, y, buf[end] == b'm'), end + 1)
}

/// `ESC [ M cb cx cy`: three raw bytes, each offset by 32.
fn parse_x10_mouse(buf: &[u8]) -> Parsed {
    let Some(payload) = buf.get(3..6) else {
        return Parsed::Incomplete;
    };
    let [cb, x, y] = [payload[0], payload[1], payload[2]].map(|b| u16::from(b.saturating_sub(32)));
    Parsed::Event(mouse_event(cb, x, y, false), 6)
}

/// Build a mouse event from the xterm button byte and 1-based coordinates.
fn mouse_event(cb: u16, x: u16, y: u16, released: bool) -> Event {
    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CTRL;
    }

    let motion = cb & 32 != 0;
    let base = usize::from(cb & 3);
    let button = match cb & (64 | 128) {
        0 => [
            Some(MouseButton::Left),
            Some(MouseButton::Middle),
            Some(MouseButton::Right),
            None,
        ][base],
        64 => Some(
            [
                MouseButton::WheelUp,
                MouseButton::WheelDown,
                MouseButton::WheelLeft,
                MouseButton::WheelRight,
            ][base],
        ),
        128 => [Some(MouseButton::Back), Some(MouseButton::Forward), None, None][base],
        _ => None,
    };

    // Legacy encodings report any release as "button 3".
    let action = match (released, motion, button) {
        (true, _, _) => MouseAction::Release,
        (false, true, Some(_)) => MouseAction::Drag,
        (false, true, None) => MouseAction::Move,
        (false, false, Some(_)) => MouseAction::Press,
        (false, false, None) => MouseAction::Release,
    };

    Event::Mouse(MouseEvent {
        position: Coord::new(x.saturating_sub(1), y.saturating_sub(1)),
        button,
        action,
        modifiers,
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Create a simple key press event with no modifiers.
const fn press(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, Modifiers::empty()))
}

/// Create a key press event with specific modifiers.
const fn key_with(code: KeyCode, modifiers: Modifiers) -> Event {
    Event::Key(KeyEvent::new(code, modifiers))
}

const fn alt(code: KeyCode) -> Event {
    key_with(code, Modifiers::ALT)
}

/// An ESC that starts nothing known: report it alone and resync after it.
fn unknown_escape() -> Parsed {
    Parsed::Event(Event::Unknown(vec![ESC]), 1)
}

/// A complete sequence with no meaning to us.
fn unknown_sequence(seq: &[u8]) -> Parsed {
    Parsed::Event(Event::Unknown(seq.to_vec()), seq.len())
}

/// Parse semicolon-separated decimal CSI parameters.
///
/// An empty field is 0. Private markers, colons and intermediates make the
/// sequence one we do not interpret (`None`).
///
/// Examples:
/// - `1;2` → `[1, 2]`
/// - (empty) → `[]`
/// - `?25` → `None`
fn parse_params(raw: &[u8]) -> Option<Vec<u16>> {
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(|&b| b == b';')
        .map(|field| {
            field.iter().try_fold(0u16, |acc, &b| {
                b.is_ascii_digit()
                    .then(|| acc.saturating_mul(10).saturating_add(u16::from(b - b'0')))
            })
        })
        .collect()
}

/// Decode the xterm modifier parameter into `Modifiers` bitflags.
///
/// The encoding is `1 + bitmask`. A parameter of 0 or 1 means no modifiers.
#[allow(clippy::cast_possible_truncation)]
const fn decode_modifiers(param: u16) -> Modifiers {
    let val = if param > 0 { param - 1 } else { 0 };
    Modifiers::from_bits_truncate(val as u8)
}

/// Find the first occurrence of `needle` in `haystack`.
/// Returns the byte offset of the start of the match.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Helper: decode bytes and return all events.
    fn decode(data: &[u8]) -> Vec<Event> {
        Decoder::default().advance(data)
    }

    /// Helper: decode bytes, return exactly one event.
    fn decode_one(data: &[u8]) -> Event {
        let events = decode(data);
        assert_eq!(events.len(), 1, "expected 1 event, got {events:?}");
        events.into_iter().next().unwrap()
    }

    fn key(code: KeyCode) -> Event {
        press(code)
    }

    fn key_mod(code: KeyCode, modifiers: Modifiers) -> Event {
        key_with(code, modifiers)
    }

    fn mouse(
        col: u16,
        row: u16,
        button: Option<MouseButton>,
        action: MouseAction,
        modifiers: Modifiers,
    ) -> Event {
        Event::Mouse(MouseEvent {
            position: Coord::new(col, row),
            button,
            action,
            modifiers,
        })
    }

    // ── ASCII and Controls ──────────────────────────────────────────────

    #[test]
    fn ascii_chars() {
        assert_eq!(
            decode(b"ab "),
            vec![
                key(KeyCode::Char('a')),
                key(KeyCode::Char('b')),
                key(KeyCode::Char(' '))
            ]
        );
    }

    #[test]
    fn enter_tab_backspace() {
        assert_eq!(decode_one(b"\r"), key(KeyCode::Enter));
        assert_eq!(decode_one(b"\n"), key(KeyCode::Enter));
        assert_eq!(decode_one(b"\t"), key(KeyCode::Tab));
        assert_eq!(decode_one(b"\x7f"), key(KeyCode::Backspace));
        assert_eq!(decode_one(b"\x08"), key(KeyCode::Backspace));
    }

    #[test]
    fn ctrl_letters() {
        assert_eq!(decode_one(b"\x00"), key_mod(KeyCode::Char('@'), Modifiers::CTRL));
        assert_eq!(decode_one(b"\x01"), key_mod(KeyCode::Char('a'), Modifiers::CTRL));
        assert_eq!(decode_one(b"\x03"), key_mod(KeyCode::Char('c'), Modifiers::CTRL));
        assert_eq!(decode_one(b"\x1a"), key_mod(KeyCode::Char('z'), Modifiers::CTRL));
    }

    #[test]
    fn file_separator_controls_are_unknown() {
        for b in 0x1C..=0x1F_u8 {
            assert_eq!(decode_one(&[b]), Event::Unknown(vec![b]));
        }
    }

    // ── Encoded Characters ──────────────────────────────────────────────

    #[test]
    fn utf8_multibyte() {
        assert_eq!(decode_one("é".as_bytes()), key(KeyCode::Char('é')));
        assert_eq!(decode_one("中".as_bytes()), key(KeyCode::Char('中')));
        assert_eq!(decode_one("🦀".as_bytes()), key(KeyCode::Char('🦀')));
    }

    #[test]
    fn utf8_incomplete_waits() {
        let mut d = Decoder::default();
        assert!(d.advance(&[0xE4, 0xB8]).is_empty());
        assert_eq!(d.pending(), 2);
        assert_eq!(d.advance(&[0xAD]), vec![key(KeyCode::Char('中'))]);
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn invalid_byte_is_unknown_and_decoding_continues() {
        assert_eq!(
            decode(&[0xFF, b'a']),
            vec![Event::Unknown(vec![0xFF]), key(KeyCode::Char('a'))]
        );
        // A lead byte followed by a non-continuation byte.
        assert_eq!(
            decode(&[0xC3, b'x']),
            vec![Event::Unknown(vec![0xC3]), key(KeyCode::Char('x'))]
        );
    }

    #[test]
    fn latin1_bytes_are_characters() {
        let mut d = Decoder::new(TextEncoding::Latin1);
        assert_eq!(d.advance(&[0xE9]), vec![key(KeyCode::Char('é'))]);
    }

    #[test]
    fn ascii_encoding_rejects_high_bytes() {
        let mut d = Decoder::new(TextEncoding::Ascii);
        assert_eq!(d.advance(&[0xE9]), vec![Event::Unknown(vec![0xE9])]);
    }

    // ── Alt Combinations ────────────────────────────────────────────────

    #[test]
    fn alt_printable() {
        assert_eq!(decode_one(b"\x1bx"), key_mod(KeyCode::Char('x'), Modifiers::ALT));
    }

    #[test]
    fn alt_control() {
        assert_eq!(
            decode_one(b"\x1b\x01"),
            key_mod(KeyCode::Char('a'), Modifiers::ALT | Modifiers::CTRL)
        );
        assert_eq!(decode_one(b"\x1b\r"), key_mod(KeyCode::Enter, Modifiers::ALT));
        assert_eq!(decode_one(b"\x1b\x7f"), key_mod(KeyCode::Backspace, Modifiers::ALT));
    }

    #[test]
    fn alt_encoded_char() {
        assert_eq!(
            decode_one("\x1bé".as_bytes()),
            key_mod(KeyCode::Char('é'), Modifiers::ALT)
        );
    }

    #[test]
    fn alt_escape() {
        assert_eq!(
            decode(b"\x1b\x1bx"),
            vec![
                key_mod(KeyCode::Escape, Modifiers::ALT),
                key(KeyCode::Char('x'))
            ]
        );
    }

    #[test]
    fn alt_sequence() {
        assert_eq!(decode_one(b"\x1b\x1b[A"), key_mod(KeyCode::Up, Modifiers::ALT));
        assert_eq!(decode_one(b"\x1b\x1bOP"), key_mod(KeyCode::F(1), Modifiers::ALT));
        assert_eq!(
            decode_one(b"\x1b\x1b[1;5C"),
            key_mod(KeyCode::Right, Modifiers::ALT | Modifiers::CTRL)
        );
    }

    #[test]
    fn escape_before_report_stands_alone() {
        assert_eq!(
            decode(b"\x1b\x1b[I"),
            vec![key(KeyCode::Escape), Event::FocusGained]
        );
    }

    // ── CSI Keys ────────────────────────────────────────────────────────

    #[test]
    fn arrows() {
        assert_eq!(decode_one(b"\x1b[A"), key(KeyCode::Up));
        assert_eq!(decode_one(b"\x1b[B"), key(KeyCode::Down));
        assert_eq!(decode_one(b"\x1b[C"), key(KeyCode::Right));
        assert_eq!(decode_one(b"\x1b[D"), key(KeyCode::Left));
        assert_eq!(decode_one(b"\x1b[H"), key(KeyCode::Home));
        assert_eq!(decode_one(b"\x1b[F"), key(KeyCode::End));
    }

    #[test]
    fn arrows_with_modifiers() {
        assert_eq!(decode_one(b"\x1b[1;2A"), key_mod(KeyCode::Up, Modifiers::SHIFT));
        assert_eq!(decode_one(b"\x1b[1;3D"), key_mod(KeyCode::Left, Modifiers::ALT));
        assert_eq!(decode_one(b"\x1b[1;5C"), key_mod(KeyCode::Right, Modifiers::CTRL));
        assert_eq!(
            decode_one(b"\x1b[1;6B"),
            key_mod(KeyCode::Down, Modifiers::SHIFT | Modifiers::CTRL)
        );
    }

    #[test]
    fn shift_tab() {
        assert_eq!(decode_one(b"\x1b[Z"), key_mod(KeyCode::Tab, Modifiers::SHIFT));
    }

    #[test]
    fn tilde_keys() {
        assert_eq!(decode_one(b"\x1b[1~"), key(KeyCode::Home));
        assert_eq!(decode_one(b"\x1b[2~"), key(KeyCode::Insert));
        assert_eq!(decode_one(b"\x1b[3~"), key(KeyCode::Delete));
        assert_eq!(decode_one(b"\x1b[4~"), key(KeyCode::End));
        assert_eq!(decode_one(b"\x1b[5~"), key(KeyCode::PageUp));
        assert_eq!(decode_one(b"\x1b[6~"), key(KeyCode::PageDown));
        assert_eq!(decode_one(b"\x1b[3;5~"), key_mod(KeyCode::Delete, Modifiers::CTRL));
    }

    #[test]
    fn function_keys() {
        assert_eq!(decode_one(b"\x1b[P"), key(KeyCode::F(1)));
        assert_eq!(decode_one(b"\x1b[S"), key(KeyCode::F(4)));
        assert_eq!(decode_one(b"\x1b[15~"), key(KeyCode::F(5)));
        assert_eq!(decode_one(b"\x1b[24~"), key(KeyCode::F(12)));
        assert_eq!(decode_one(b"\x1b[34~"), key(KeyCode::F(20)));
        assert_eq!(decode_one(b"\x1b[1;2P"), key_mod(KeyCode::F(1), Modifiers::SHIFT));
    }

    #[test]
    fn ss3_keys() {
        assert_eq!(decode_one(b"\x1bOA"), key(KeyCode::Up));
        assert_eq!(decode_one(b"\x1bOH"), key(KeyCode::Home));
        assert_eq!(decode_one(b"\x1bOP"), key(KeyCode::F(1)));
        assert_eq!(decode_one(b"\x1bOS"), key(KeyCode::F(4)));
    }

    // ── Unknown Sequences ───────────────────────────────────────────────

    #[test]
    fn unknown_csi_is_reported_whole() {
        assert_eq!(decode_one(b"\x1b[99~"), Event::Unknown(b"\x1b[99~".to_vec()));
        assert_eq!(decode_one(b"\x1b[?25h"), Event::Unknown(b"\x1b[?25h".to_vec()));
        assert_eq!(decode_one(b"\x1b[2;3;4A"), Event::Unknown(b"\x1b[2;3;4A".to_vec()));
    }

    #[test]
    fn unknown_ss3_is_reported_whole() {
        assert_eq!(decode_one(b"\x1bOx"), Event::Unknown(b"\x1bOx".to_vec()));
    }

    #[test]
    fn malformed_sequence_resyncs_after_esc() {
        // A control byte cannot appear inside a CSI sequence.
        assert_eq!(
            decode(b"\x1b[\x01"),
            vec![
                Event::Unknown(vec![ESC]),
                key(KeyCode::Char('[')),
                key_mod(KeyCode::Char('a'), Modifiers::CTRL),
            ]
        );
    }

    #[test]
    fn endless_csi_is_abandoned() {
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat_n(b'1', MAX_SEQUENCE + 4));
        let events = decode(&bytes);
        assert_eq!(events[0], Event::Unknown(vec![ESC]));
        assert_eq!(events[1], key(KeyCode::Char('[')));
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn sgr_press_and_release() {
        assert_eq!(
            decode_one(b"\x1b[<0;10;5M"),
            mouse(9, 4, Some(MouseButton::Left), MouseAction::Press, Modifiers::empty())
        );
        assert_eq!(
            decode_one(b"\x1b[<2;1;1m"),
            mouse(0, 0, Some(MouseButton::Right), MouseAction::Release, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_drag_and_move() {
        assert_eq!(
            decode_one(b"\x1b[<32;3;4M"),
            mouse(2, 3, Some(MouseButton::Left), MouseAction::Drag, Modifiers::empty())
        );
        assert_eq!(
            decode_one(b"\x1b[<35;3;4M"),
            mouse(2, 3, None, MouseAction::Move, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_wheel() {
        assert_eq!(
            decode_one(b"\x1b[<64;1;1M"),
            mouse(0, 0, Some(MouseButton::WheelUp), MouseAction::Press, Modifiers::empty())
        );
        assert_eq!(
            decode_one(b"\x1b[<67;1;1M"),
            mouse(0, 0, Some(MouseButton::WheelRight), MouseAction::Press, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_extra_buttons() {
        assert_eq!(
            decode_one(b"\x1b[<128;1;1M"),
            mouse(0, 0, Some(MouseButton::Back), MouseAction::Press, Modifiers::empty())
        );
        assert_eq!(
            decode_one(b"\x1b[<129;1;1m"),
            mouse(0, 0, Some(MouseButton::Forward), MouseAction::Release, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_modifiers() {
        assert_eq!(
            decode_one(b"\x1b[<28;1;1M"),
            mouse(
                0,
                0,
                Some(MouseButton::Left),
                MouseAction::Press,
                Modifiers::SHIFT | Modifiers::ALT | Modifiers::CTRL
            )
        );
    }

    #[test]
    fn sgr_zero_coordinates_saturate() {
        assert_eq!(
            decode_one(b"\x1b[<0;0;0M"),
            mouse(0, 0, Some(MouseButton::Left), MouseAction::Press, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_large_coordinates() {
        assert_eq!(
            decode_one(b"\x1b[<0;300;200M"),
            mouse(299, 199, Some(MouseButton::Left), MouseAction::Press, Modifiers::empty())
        );
    }

    #[test]
    fn sgr_wrong_arity_is_unknown() {
        assert_eq!(decode_one(b"\x1b[<0;1M"), Event::Unknown(b"\x1b[<0;1M".to_vec()));
    }

    #[test]
    fn x10_press_and_release() {
        assert_eq!(
            decode_one(&[ESC, b'[', b'M', 32, 33 + 4, 33 + 2]),
            mouse(4, 2, Some(MouseButton::Left), MouseAction::Press, Modifiers::empty())
        );
        assert_eq!(
            decode_one(&[ESC, b'[', b'M', 32 + 3, 33, 33]),
            mouse(0, 0, None, MouseAction::Release, Modifiers::empty())
        );
    }

    #[test]
    fn x10_waits_for_payload() {
        let mut d = Decoder::default();
        assert!(d.advance(&[ESC, b'[', b'M', 32, 40]).is_empty());
        assert_eq!(d.advance(&[40]).len(), 1);
    }

    // ── Focus ───────────────────────────────────────────────────────────

    #[test]
    fn focus_events() {
        assert_eq!(decode_one(b"\x1b[I"), Event::FocusGained);
        assert_eq!(decode_one(b"\x1b[O"), Event::FocusLost);
    }

    // ── Bracketed Paste ─────────────────────────────────────────────────

    #[test]
    fn paste_simple() {
        assert_eq!(
            decode_one(b"\x1b[200~hello\r\nworld\x1b[201~"),
            Event::Paste("hello\r\nworld".into())
        );
    }

    #[test]
    fn paste_empty() {
        assert_eq!(decode_one(b"\x1b[200~\x1b[201~"), Event::Paste(String::new()));
    }

    #[test]
    fn paste_followed_by_key() {
        assert_eq!(
            decode(b"\x1b[200~x\x1b[201~y"),
            vec![Event::Paste("x".into()), key(KeyCode::Char('y'))]
        );
    }

    #[test]
    fn paste_split_across_chunks() {
        let mut d = Decoder::default();
        assert!(d.advance(b"\x1b[200~ab").is_empty());
        assert!(d.in_paste());
        assert_eq!(d.pending(), 8);
        assert!(d.advance(b"c\x1b[20").is_empty());
        assert_eq!(d.advance(b"1~"), vec![Event::Paste("abc".into())]);
        assert!(!d.in_paste());
        assert_eq!(d.pending(), 0);
        assert_eq!(d.bytes_decoded(), 15);
    }

    #[test]
    fn paste_survives_flush() {
        let mut d = Decoder::default();
        d.advance(b"\x1b[200~abc");
        assert!(d.flush().is_empty());
        assert!(d.in_paste());
        assert_eq!(d.advance(b"\x1b[201~"), vec![Event::Paste("abc".into())]);
    }

    #[test]
    fn unterminated_paste_delivered_on_finish() {
        let mut d = Decoder::default();
        d.advance(b"\x1b[200~partial");
        assert_eq!(d.finish(), vec![Event::Paste("partial".into())]);
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn stray_paste_end_is_unknown() {
        assert_eq!(decode_one(b"\x1b[201~"), Event::Unknown(b"\x1b[201~".to_vec()));
    }

    // ── Flush ───────────────────────────────────────────────────────────

    #[test]
    fn lone_escape_waits_for_flush() {
        let mut d = Decoder::default();
        assert!(d.advance(b"\x1b").is_empty());
        assert!(d.has_pending());
        assert_eq!(d.flush(), vec![key(KeyCode::Escape)]);
        assert!(!d.has_pending());
    }

    #[test]
    fn flush_resolves_short_prefixes() {
        let mut d = Decoder::default();
        d.advance(b"\x1b\x1b");
        assert_eq!(d.flush(), vec![key_mod(KeyCode::Escape, Modifiers::ALT)]);
        d.advance(b"\x1b[");
        assert_eq!(d.flush(), vec![key_mod(KeyCode::Char('['), Modifiers::ALT)]);
        d.advance(b"\x1bO");
        assert_eq!(d.flush(), vec![key_mod(KeyCode::Char('O'), Modifiers::ALT)]);
    }

    #[test]
    fn flush_reports_longer_partials_as_unknown() {
        let mut d = Decoder::default();
        d.advance(b"\x1b[1;5");
        assert_eq!(d.flush(), vec![Event::Unknown(b"\x1b[1;5".to_vec())]);
        d.advance(&[0xE4, 0xB8]);
        assert_eq!(d.flush(), vec![Event::Unknown(vec![0xE4, 0xB8])]);
    }

    #[test]
    fn flush_with_nothing_pending() {
        assert!(Decoder::default().flush().is_empty());
    }

    // ── Incremental Decoding ────────────────────────────────────────────

    #[test]
    fn up_arrow_in_three_batches() {
        let mut d = Decoder::default();
        assert!(d.advance(b"\x1b").is_empty());
        assert!(d.advance(b"[").is_empty());
        assert_eq!(d.advance(b"A"), vec![key(KeyCode::Up)]);
        assert_eq!(d.bytes_decoded(), 3);
    }

    #[test]
    fn split_sgr_mouse() {
        let mut d = Decoder::default();
        assert!(d.advance(b"\x1b[<0;1").is_empty());
        assert!(d.advance(b"0;5").is_empty());
        assert_eq!(
            d.advance(b"M"),
            vec![mouse(9, 4, Some(MouseButton::Left), MouseAction::Press, Modifiers::empty())]
        );
    }

    #[test]
    fn interleaved_keys_and_mouse() {
        let events = decode(b"a\x1b[<0;1;1Mb\x1b[A");
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], key(KeyCode::Char('a')));
        assert!(matches!(events[1], Event::Mouse(_)));
        assert_eq!(events[2], key(KeyCode::Char('b')));
        assert_eq!(events[3], key(KeyCode::Up));
    }

    #[test]
    fn byte_accounting() {
        let mut d = Decoder::default();
        d.advance(b"ab\x1b[1;");
        assert_eq!(d.bytes_decoded() + d.pending(), 6);
        assert_eq!(d.pending(), 4);
        d.flush();
        assert_eq!(d.bytes_decoded(), 6);
    }

    // ── Modifier Decoding ───────────────────────────────────────────────

    #[test]
    fn decode_modifier_values() {
        assert_eq!(decode_modifiers(0), Modifiers::empty());
        assert_eq!(decode_modifiers(1), Modifiers::empty());
        assert_eq!(decode_modifiers(2), Modifiers::SHIFT);
        assert_eq!(decode_modifiers(3), Modifiers::ALT);
        assert_eq!(decode_modifiers(5), Modifiers::CTRL);
        assert_eq!(decode_modifiers(9), Modifiers::META);
    }

    #[test]
    fn params_parsing() {
        assert_eq!(parse_params(b""), Some(vec![]));
        assert_eq!(parse_params(b"1;22"), Some(vec![1, 22]));
        assert_eq!(parse_params(b";5"), Some(vec![0, 5]));
        assert_eq!(parse_params(b"?1"), None);
        assert_eq!(parse_params(b"99999999"), Some(vec![u16::MAX]));
    }
}
