// SPDX-License-Identifier: MIT
//
// Color depth and palette quantization.
//
// Terminals advertise one of a handful of color depths. A logical `Color`
// that the terminal cannot show directly is mapped to the nearest palette
// entry. "Nearest" is measured in Oklab, a perceptually uniform space, so
// a saturated orange lands on yellow-ish entries rather than on whatever
// happens to be closest in raw RGB. Exact palette hits always win, and
// ties go to the lowest index, which keeps quantization deterministic
// across runs and platforms.
//
// Palettes:
//
//   - xterm 256: 16 named colors, a 6×6×6 cube (0, 95, 135, 175, 215, 255),
//     and a 24-step gray ramp starting at 8.
//   - xterm 88:  16 named colors, a 4×4×4 cube (0, 139, 205, 255), and an
//     8-step gray ramp.
//   - 16 / 8:    the first 16 / 8 entries of the named colors.

use std::sync::OnceLock;

use crate::style::Color;

// ─── ColorDepth ─────────────────────────────────────────────────────────────

/// How many colors a terminal can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ColorDepth {
    /// No color at all. Attributes may still work.
    #[default]
    Mono,
    /// The eight ANSI colors (SGR 30–37 / 40–47).
    Ansi8,
    /// Eight colors plus their bright variants (SGR 90–97 / 100–107).
    Ansi16,
    /// xterm 88-color palette.
    Ansi88,
    /// xterm 256-color palette.
    Ansi256,
    /// 24-bit color.
    TrueColor,
}

impl ColorDepth {
    /// Palette size, or `None` for true color.
    #[must_use]
    pub const fn palette_len(self) -> Option<u16> {
        match self {
            Self::Mono => Some(0),
            Self::Ansi8 => Some(8),
            Self::Ansi16 => Some(16),
            Self::Ansi88 => Some(88),
            Self::Ansi256 => Some(256),
            Self::TrueColor => None,
        }
    }
}

// ─── Quantization ───────────────────────────────────────────────────────────

/// Map a logical color onto what `depth` can display.
///
/// Returns `None` when the terminal has no color (the cell falls back to
/// the terminal default). Indices the palette already contains are kept
/// as-is; everything else goes through RGB and the nearest-match search.
///
/// ```
/// use tessera::color::{quantize, ColorDepth};
/// use tessera::style::Color;
///
/// assert_eq!(quantize(Color::Rgb(255, 0, 0), ColorDepth::Ansi16), Some(Color::Indexed(9)));
/// assert_eq!(quantize(Color::Indexed(42), ColorDepth::Ansi256), Some(Color::Indexed(42)));
/// assert_eq!(quantize(Color::RED, ColorDepth::Mono), None);
/// ```
#[must_use]
pub fn quantize(color: Color, depth: ColorDepth) -> Option<Color> {
    match (depth, color) {
        (ColorDepth::Mono, _) => None,
        (ColorDepth::TrueColor, c) => Some(c),
        (ColorDepth::Ansi256, Color::Indexed(_)) => Some(color),
        (ColorDepth::Ansi256, Color::Rgb(r, g, b)) => Some(Color::Indexed(nearest_256((r, g, b)))),
        (ColorDepth::Ansi88 | ColorDepth::Ansi16, Color::Indexed(i)) if i < 16 => Some(color),
        (ColorDepth::Ansi88, c) => Some(Color::Indexed(nearest_88(c.to_rgb()))),
        (ColorDepth::Ansi16, c) => Some(Color::Indexed(nearest_16(c.to_rgb()))),
        (ColorDepth::Ansi8, Color::Indexed(i)) if i < 8 => Some(color),
        // Bright variants fold onto their base color.
        (ColorDepth::Ansi8, Color::Indexed(i)) if i < 16 => Some(Color::Indexed(i - 8)),
        (ColorDepth::Ansi8, c) => Some(Color::Indexed(nearest_8(c.to_rgb()))),
    }
}

/// Nearest xterm-256 index for an RGB value.
#[must_use]
pub fn nearest_256(rgb: (u8, u8, u8)) -> u8 {
    nearest_in(rgb, palette_256())
}

/// Nearest xterm-88 index for an RGB value.
#[must_use]
pub fn nearest_88(rgb: (u8, u8, u8)) -> u8 {
    nearest_in(rgb, palette_88())
}

/// Nearest of the 16 named colors.
#[must_use]
pub fn nearest_16(rgb: (u8, u8, u8)) -> u8 {
    nearest_in(rgb, &palette_256()[..16])
}

/// Nearest of the 8 base colors.
#[must_use]
pub fn nearest_8(rgb: (u8, u8, u8)) -> u8 {
    nearest_in(rgb, &palette_256()[..8])
}

/// Linear scan: exact match first, then minimum Oklab distance.
///
/// Strict `<` keeps the lowest index on ties. Palettes are at most 256
/// entries, so the index always fits in a `u8`.
#[allow(clippy::cast_possible_truncation)]
fn nearest_in(rgb: (u8, u8, u8), palette: &[Entry]) -> u8 {
    if let Some(idx) = palette.iter().position(|e| e.rgb == rgb) {
        return idx as u8;
    }

    let (l1, a1, b1) = rgb_to_oklab(rgb);
    let mut best_idx = 0;
    let mut best_dist = f32::MAX;

    for (idx, entry) in palette.iter().enumerate() {
        let (l2, a2, b2) = entry.lab;
        let dl = l1 - l2;
        let da = a1 - a2;
        let db = b1 - b2;
        let dist = db.mul_add(db, dl.mul_add(dl, da * da));
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }

    best_idx as u8
}

// ─── Palettes ───────────────────────────────────────────────────────────────

/// The 16 named colors as xterm draws them by default.
pub const XTERM16_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),       // 0: Black
    (128, 0, 0),     // 1: Red
    (0, 128, 0),     // 2: Green
    (128, 128, 0),   // 3: Yellow
    (0, 0, 128),     // 4: Blue
    (128, 0, 128),   // 5: Magenta
    (0, 128, 128),   // 6: Cyan
    (192, 192, 192), // 7: White
    (128, 128, 128), // 8: Bright Black
    (255, 0, 0),     // 9: Bright Red
    (0, 255, 0),     // 10: Bright Green
    (255, 255, 0),   // 11: Bright Yellow
    (0, 0, 255),     // 12: Bright Blue
    (255, 0, 255),   // 13: Bright Magenta
    (0, 255, 255),   // 14: Bright Cyan
    (255, 255, 255), // 15: Bright White
];

/// RGB value of an xterm-256 palette index.
#[must_use]
pub const fn xterm256_to_rgb(idx: u8) -> (u8, u8, u8) {
    match idx {
        0..=15 => XTERM16_RGB[idx as usize],
        16..=231 => {
            let i = idx - 16;
            (cube6(i / 36), cube6((i % 36) / 6), cube6(i % 6))
        }
        232..=255 => {
            let v = 8 + 10 * (idx - 232);
            (v, v, v)
        }
    }
}

/// RGB value of an xterm-88 palette index. Indices past 87 clamp to white.
#[must_use]
pub const fn xterm88_to_rgb(idx: u8) -> (u8, u8, u8) {
    const CUBE4: [u8; 4] = [0, 139, 205, 255];
    const GRAYS: [u8; 8] = [46, 92, 115, 139, 162, 185, 208, 231];
    match idx {
        0..=15 => XTERM16_RGB[idx as usize],
        16..=79 => {
            let i = idx - 16;
            (
                CUBE4[(i / 16) as usize],
                CUBE4[((i % 16) / 4) as usize],
                CUBE4[(i % 4) as usize],
            )
        }
        80..=87 => {
            let v = GRAYS[(idx - 80) as usize];
            (v, v, v)
        }
        _ => (255, 255, 255),
    }
}

const fn cube6(i: u8) -> u8 {
    if i == 0 { 0 } else { 55 + 40 * i }
}

struct Entry {
    rgb: (u8, u8, u8),
    lab: (f32, f32, f32),
}

fn palette_256() -> &'static [Entry] {
    static PALETTE: OnceLock<Vec<Entry>> = OnceLock::new();
    PALETTE.get_or_init(|| build_palette(0..=255, xterm256_to_rgb))
}

fn palette_88() -> &'static [Entry] {
    static PALETTE: OnceLock<Vec<Entry>> = OnceLock::new();
    PALETTE.get_or_init(|| build_palette(0..=87, xterm88_to_rgb))
}

fn build_palette(
    range: std::ops::RangeInclusive<u8>,
    lookup: fn(u8) -> (u8, u8, u8),
) -> Vec<Entry> {
    range
        .map(|idx| {
            let rgb = lookup(idx);
            Entry {
                rgb,
                lab: rgb_to_oklab(rgb),
            }
        })
        .collect()
}

// ─── Oklab ──────────────────────────────────────────────────────────────────
//
// sRGB → linear sRGB → LMS → Oklab, with Björn Ottosson's matrices.

fn rgb_to_oklab((r, g, b): (u8, u8, u8)) -> (f32, f32, f32) {
    linear_srgb_to_oklab(
        srgb_to_linear(f32::from(r) / 255.0),
        srgb_to_linear(f32::from(g) / 255.0),
        srgb_to_linear(f32::from(b) / 255.0),
    )
}

#[inline]
fn linear_srgb_to_oklab(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let l = 0.051_445_995f32.mul_add(b, 0.412_221_47f32.mul_add(r, 0.536_332_55 * g));
    let m = 0.107_396_96f32.mul_add(b, 0.211_903_5f32.mul_add(r, 0.680_699_5 * g));
    let s = 0.629_978_7f32.mul_add(b, 0.088_302_46f32.mul_add(r, 0.281_718_84 * g));

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    let l_ok = 0.004_072_047f32.mul_add(-s_, 0.210_454_26f32.mul_add(l_, 0.793_617_8 * m_));
    let a = 0.450_593_7f32.mul_add(s_, 1.977_998_5f32.mul_add(l_, -(2.428_592_2 * m_)));
    let b_ok = 0.808_675_77f32.mul_add(-s_, 0.025_904_037f32.mul_add(l_, 0.782_771_77 * m_));

    (l_ok, a, b_ok)
}

/// Remove the sRGB transfer curve from one component in `0.0..=1.0`.
#[inline]
#[must_use]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
