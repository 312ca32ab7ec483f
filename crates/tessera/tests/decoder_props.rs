// SPDX-License-Identifier: MIT
//
// Input decoder properties: any split of a byte stream decodes the same,
// and every byte fed is accounted for.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tessera::codec::TextEncoding;
use tessera::input::{Decoder, Event, KeyCode, KeyEvent, Modifiers};

/// Byte fragments a terminal actually sends, including ones that only
/// make sense next to their neighbours (a lone ESC, half a character).
const FRAGMENTS: &[&[u8]] = &[
    b"a",
    b"Z",
    b" ",
    b"\r",
    b"\t",
    b"\x7f",
    b"\x01",
    b"\x1b",
    b"\x1bx",
    b"\x1b[A",
    b"\x1b[1;5C",
    b"\x1b[3~",
    b"\x1b[15;2~",
    b"\x1bOP",
    b"\x1b[<0;12;5M",
    b"\x1b[<64;1;1M",
    b"\x1b[M !!",
    b"\x1b[I",
    b"\x1b[O",
    b"\x1b[200~pasted \x1b[A text\x1b[201~",
    b"\x1b[99z",
    "é".as_bytes(),
    "中".as_bytes(),
    b"\xe4\xb8",
    b"\xff",
];

fn stream() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(proptest::sample::select(FRAGMENTS), 0..24).prop_map(|parts| parts.concat())
}

/// `bytes` cut at the given points (taken modulo the length).
fn split(bytes: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    let mut points: Vec<usize> = cuts.iter().map(|c| c % bytes.len()).collect();
    points.push(0);
    points.push(bytes.len());
    points.sort_unstable();
    points.dedup();
    points.windows(2).map(|w| bytes[w[0]..w[1]].to_vec()).collect()
}

fn decode_batches(encoding: TextEncoding, batches: &[Vec<u8>]) -> Vec<Event> {
    let mut decoder = Decoder::new(encoding);
    let mut events = Vec::new();
    for batch in batches {
        events.extend(decoder.advance(batch));
    }
    events.extend(decoder.finish());
    events
}

fn encoding() -> impl Strategy<Value = TextEncoding> {
    prop_oneof![
        3 => Just(TextEncoding::Utf8),
        1 => Just(TextEncoding::Latin1),
        1 => Just(TextEncoding::Ascii),
    ]
}

proptest! {
    #[test]
    fn any_split_decodes_like_one_batch(
        encoding in encoding(),
        bytes in stream(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let whole = decode_batches(encoding, &[bytes.clone()]);
        let pieces = decode_batches(encoding, &split(&bytes, &cuts));
        prop_assert_eq!(whole, pieces);
    }

    #[test]
    fn byte_by_byte_decodes_like_one_batch(encoding in encoding(), bytes in stream()) {
        let whole = decode_batches(encoding, &[bytes.clone()]);
        let singles: Vec<Vec<u8>> = bytes.iter().map(|&b| vec![b]).collect();
        prop_assert_eq!(whole, decode_batches(encoding, &singles));
    }

    #[test]
    fn every_byte_is_decoded_or_pending(
        bytes in stream(),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut decoder = Decoder::default();
        let mut fed = 0;
        for batch in split(&bytes, &cuts) {
            fed += batch.len();
            decoder.advance(&batch);
            prop_assert_eq!(decoder.bytes_decoded() + decoder.pending(), fed);
        }
        decoder.finish();
        prop_assert_eq!(decoder.bytes_decoded(), bytes.len());
        prop_assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn flush_leaves_nothing_outside_a_paste(bytes in stream()) {
        let mut decoder = Decoder::default();
        decoder.advance(&bytes);
        decoder.flush();
        prop_assert!(decoder.in_paste() || decoder.pending() == 0);
    }
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[test]
fn cursor_up_arrives_in_three_reads() {
    let mut decoder = Decoder::default();
    assert_eq!(decoder.advance(b"\x1b"), vec![]);
    assert_eq!(decoder.advance(b"["), vec![]);
    assert_eq!(
        decoder.advance(b"A"),
        vec![Event::Key(KeyEvent::from(KeyCode::Up))]
    );
    assert_eq!(decoder.pending(), 0);
}

#[test]
fn lone_escape_resolves_on_flush() {
    let mut decoder = Decoder::default();
    assert_eq!(decoder.advance(b"\x1b"), vec![]);
    assert!(decoder.has_pending());
    assert_eq!(
        decoder.flush(),
        vec![Event::Key(KeyEvent::from(KeyCode::Escape))]
    );
}

#[test]
fn ctrl_right_carries_modifier() {
    let mut decoder = Decoder::default();
    assert_eq!(
        decoder.advance(b"\x1b[1;5C"),
        vec![Event::Key(KeyEvent::new(KeyCode::Right, Modifiers::CTRL))]
    );
}
