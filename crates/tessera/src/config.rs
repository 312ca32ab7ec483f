// SPDX-License-Identifier: MIT
//
// Session configuration.
//
// Everything a session decides once, at construction. Defaults suit an
// interactive terminal; `from_env` layers the usual environment variables
// on top. Capability resolution happens late, in `capabilities_for`, because
// it depends on whether the output descriptor turns out to be a terminal.

use std::env;
use std::time::Duration;

use crate::ansi::MouseMode;
use crate::caps::Capabilities;
use crate::codec::TextEncoding;

/// How long a lone ESC waits for the rest of a sequence by default.
pub const DEFAULT_ESCAPE_GRACE: Duration = Duration::from_millis(25);

/// Environment variable overriding the escape grace period, in milliseconds.
pub const ESCAPE_DELAY_VAR: &str = "TESSERA_ESCAPE_DELAY_MS";

/// Configuration for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Terminal model name (`TERM`). `None` means unknown.
    pub term: Option<String>,
    /// `COLORTERM`, consulted for the true-color upgrade.
    pub colorterm: Option<String>,
    /// `NO_COLOR` was set: force monochrome.
    pub no_color: bool,
    /// Explicit capabilities. Wins over everything, including the non-tty
    /// fallback.
    pub capabilities: Option<Capabilities>,
    /// Byte encoding on both descriptors.
    pub encoding: TextEncoding,
    /// How long a lone ESC waits for the rest of a sequence.
    ///
    /// Default: 25ms. Long enough for a sequence split across reads over
    /// ssh, short enough that the Escape key feels immediate.
    pub escape_grace: Duration,
    /// Tracking granularity for mouse mode.
    pub mouse_mode: MouseMode,
    /// Enable bracketed paste while in raw mode.
    pub bracketed_paste: bool,
    /// Enable focus reporting while in raw mode.
    pub focus_events: bool,
    /// Wrap renders in synchronized output.
    pub sync_output: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            term: None,
            colorterm: None,
            no_color: false,
            capabilities: None,
            encoding: TextEncoding::Utf8,
            escape_grace: DEFAULT_ESCAPE_GRACE,
            mouse_mode: MouseMode::Drag,
            bracketed_paste: true,
            focus_events: false,
            sync_output: true,
        }
    }
}

impl SessionConfig {
    /// Defaults plus `TERM`, `COLORTERM`, `NO_COLOR` and
    /// `TESSERA_ESCAPE_DELAY_MS` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) reading variables through `var`.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self {
            term: var("TERM").filter(|t| !t.is_empty()),
            colorterm: var("COLORTERM"),
            no_color: var("NO_COLOR").is_some_and(|v| !v.is_empty()),
            ..Self::default()
        };

        if let Some(raw) = var(ESCAPE_DELAY_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.escape_grace = Duration::from_millis(ms),
                Err(err) => tracing::warn!(
                    target: "tessera::session",
                    value = %raw,
                    %err,
                    "ignoring {ESCAPE_DELAY_VAR}"
                ),
            }
        }
        config
    }

    // ── Builders ────────────────────────────────────────────────────────

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    #[must_use]
    pub const fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities = Some(caps);
        self
    }

    #[must_use]
    pub const fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub const fn with_escape_grace(mut self, grace: Duration) -> Self {
        self.escape_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_mouse_mode(mut self, mode: MouseMode) -> Self {
        self.mouse_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_bracketed_paste(mut self, enabled: bool) -> Self {
        self.bracketed_paste = enabled;
        self
    }

    #[must_use]
    pub const fn with_focus_events(mut self, enabled: bool) -> Self {
        self.focus_events = enabled;
        self
    }

    #[must_use]
    pub const fn with_sync_output(mut self, enabled: bool) -> Self {
        self.sync_output = enabled;
        self
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// The capabilities a session should use.
    ///
    /// An explicit override always wins. Otherwise output that is not a
    /// terminal gets [`Capabilities::DUMB`], and a terminal gets its model's
    /// entry adjusted by `COLORTERM` and `NO_COLOR`.
    #[must_use]
    pub fn capabilities_for(&self, is_tty: bool) -> Capabilities {
        if let Some(caps) = self.capabilities {
            return caps;
        }
        if !is_tty {
            return Capabilities::DUMB;
        }
        Capabilities::from_vars(self.term.as_deref(), self.colorterm.as_deref(), self.no_color)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
