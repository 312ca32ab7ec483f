// SPDX-License-Identifier: MIT
//
// Capability model: what a terminal model can do.
//
// Built once per session and immutable afterwards. The lookup table is
// intentionally small: a family prefix (`xterm`, `screen`, `linux`, ...)
// decides the feature set, a color suffix (`-256color`, `-direct`, ...)
// decides the depth. Anything unrecognized falls back to a conservative
// profile that every VT100 descendant can display: no color, no mouse,
// plain SGR attributes one at a time.

use std::env;

use crate::color::ColorDepth;

bitflags::bitflags! {
    /// Feature bits beyond color depth.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Features: u16 {
        /// Accepts SGR attribute escapes (bold, underline, ...).
        const ATTRIBUTES      = 1 << 0;
        /// Accepts several SGR parameters joined by `;` in one sequence.
        const COMBINED_SGR    = 1 << 1;
        /// Reports mouse events (X10 protocol).
        const MOUSE           = 1 << 2;
        /// Supports the SGR mouse extension (mode 1006).
        const SGR_MOUSE       = 1 << 3;
        /// Window size can be queried.
        const QUERY_SIZE      = 1 << 4;
        /// Has an alternate screen buffer (mode 1049).
        const ALT_SCREEN      = 1 << 5;
        /// Supports bracketed paste (mode 2004).
        const BRACKETED_PASTE = 1 << 6;
        /// Reports focus changes (mode 1004).
        const FOCUS_EVENTS    = 1 << 7;
        /// Honors synchronized output (mode 2026).
        const SYNC_OUTPUT     = 1 << 8;
    }
}

/// Color depth plus feature bits for one terminal model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    pub depth: ColorDepth,
    pub features: Features,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

// Feature sets per family.
const VT100: Features = Features::ATTRIBUTES;
const LINUX: Features = Features::ATTRIBUTES
    .union(Features::COMBINED_SGR)
    .union(Features::QUERY_SIZE);
const SCREEN: Features = LINUX
    .union(Features::MOUSE)
    .union(Features::ALT_SCREEN)
    .union(Features::BRACKETED_PASTE);
const XTERM: Features = SCREEN
    .union(Features::SGR_MOUSE)
    .union(Features::FOCUS_EVENTS);
const MODERN: Features = XTERM.union(Features::SYNC_OUTPUT);

/// Family prefix → (default depth, features). First match wins, so longer
/// prefixes that share a stem must come first.
const FAMILIES: &[(&str, ColorDepth, Features)] = &[
    ("xterm-kitty", ColorDepth::TrueColor, MODERN),
    ("kitty", ColorDepth::TrueColor, MODERN),
    ("alacritty", ColorDepth::TrueColor, MODERN),
    ("wezterm", ColorDepth::TrueColor, MODERN),
    ("foot", ColorDepth::TrueColor, MODERN),
    ("ghostty", ColorDepth::TrueColor, MODERN),
    ("contour", ColorDepth::TrueColor, MODERN),
    ("xterm", ColorDepth::Ansi16, XTERM),
    ("tmux", ColorDepth::Ansi256, XTERM),
    ("screen", ColorDepth::Ansi8, SCREEN),
    ("rxvt-unicode", ColorDepth::Ansi88, SCREEN),
    ("rxvt", ColorDepth::Ansi8, SCREEN),
    ("putty", ColorDepth::Ansi16, SCREEN),
    ("linux", ColorDepth::Ansi8, LINUX),
    ("cygwin", ColorDepth::Ansi8, LINUX),
    ("ansi", ColorDepth::Ansi8, LINUX),
    ("vt220", ColorDepth::Mono, VT100),
    ("vt102", ColorDepth::Mono, VT100),
    ("vt100", ColorDepth::Mono, VT100),
    ("dumb", ColorDepth::Mono, Features::empty()),
];

/// Color suffix → depth override.
const SUFFIXES: &[(&str, ColorDepth)] = &[
    ("-truecolor", ColorDepth::TrueColor),
    ("-direct", ColorDepth::TrueColor),
    ("-256color", ColorDepth::Ansi256),
    ("-88color", ColorDepth::Ansi88),
    ("-16color", ColorDepth::Ansi16),
    ("-color", ColorDepth::Ansi8),
    ("-mono", ColorDepth::Mono),
    ("-m", ColorDepth::Mono),
];

impl Capabilities {
    /// No color, no mouse, attributes one at a time.
    pub const CONSERVATIVE: Self = Self {
        depth: ColorDepth::Mono,
        features: Features::ATTRIBUTES,
    };

    /// Nothing at all: plain bytes only. Used for non-tty output.
    pub const DUMB: Self = Self {
        depth: ColorDepth::Mono,
        features: Features::empty(),
    };

    #[inline]
    #[must_use]
    pub const fn new(depth: ColorDepth, features: Features) -> Self {
        Self { depth, features }
    }

    /// Capabilities for a terminal model name such as `xterm-256color`.
    ///
    /// Never fails: unknown models get [`Capabilities::CONSERVATIVE`].
    ///
    /// ```
    /// use tessera::caps::{Capabilities, Features};
    /// use tessera::color::ColorDepth;
    ///
    /// let caps = Capabilities::lookup("xterm-256color");
    /// assert_eq!(caps.depth, ColorDepth::Ansi256);
    /// assert!(caps.has(Features::SGR_MOUSE));
    ///
    /// assert_eq!(Capabilities::lookup("no-such-term"), Capabilities::CONSERVATIVE);
    /// ```
    #[must_use]
    pub fn lookup(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        let Some(&(prefix, depth, features)) = FAMILIES
            .iter()
            .find(|(prefix, ..)| model.starts_with(prefix))
        else {
            return Self::CONSERVATIVE;
        };

        let rest = &model[prefix.len()..];
        let depth = SUFFIXES
            .iter()
            .find(|(suffix, _)| rest.ends_with(suffix))
            .map_or(depth, |&(_, d)| d);

        Self { depth, features }
    }

    /// Capabilities from the process environment.
    ///
    /// `TERM` picks the model; `COLORTERM=truecolor|24bit` upgrades any
    /// colored model to true color; `NO_COLOR` (any non-empty value) forces
    /// monochrome but keeps attributes.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(
            env::var("TERM").ok().as_deref(),
            env::var("COLORTERM").ok().as_deref(),
            env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()),
        )
    }

    /// [`from_env`](Self::from_env) with the variables passed in.
    #[must_use]
    pub fn from_vars(term: Option<&str>, colorterm: Option<&str>, no_color: bool) -> Self {
        let mut caps = term.map_or(Self::CONSERVATIVE, Self::lookup);

        let truecolor = colorterm.is_some_and(|v| {
            let v = v.to_ascii_lowercase();
            v == "truecolor" || v == "24bit"
        });
        if truecolor && caps.depth > ColorDepth::Mono {
            caps.depth = ColorDepth::TrueColor;
        }
        if no_color {
            caps.depth = ColorDepth::Mono;
        }
        caps
    }

    /// Whether every bit in `features` is supported.
    #[inline]
    #[must_use]
    pub const fn has(&self, features: Features) -> bool {
        self.features.contains(features)
    }

    /// Copy with a different color depth.
    #[inline]
    #[must_use]
    pub const fn with_depth(self, depth: ColorDepth) -> Self {
        Self { depth, ..self }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
