// SPDX-License-Identifier: MIT
//
// Session error taxonomy.
//
// Two classes of failure cross the public API. Usage errors are bugs in the
// caller (mismatched matrices, reading events in cooked mode). Environment
// failures come from the descriptor going away underneath us. Decoder and
// encoder faults never show up here: they are recovered locally as
// `Event::Unknown` or transliterated output.

use std::io;

use thiserror::Error;

use crate::geom::Size;

/// Errors returned by [`Session`](crate::session::Session) and the renderer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `render_update` was given matrices of different dimensions.
    #[error("matrix dimensions differ: previous is {previous}, next is {next}")]
    DimensionMismatch { previous: Size, next: Size },

    /// The operation requires raw mode but the session is cooked.
    #[error("{operation} requires raw mode, but the session is in cooked mode")]
    Mode { operation: &'static str },

    /// The terminal went away (end of input, or a previous I/O failure).
    #[error("terminal closed")]
    Closed,

    /// An I/O failure on the session's descriptors. The session is closed
    /// afterwards.
    #[error("terminal I/O failed")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error is a programming mistake by the caller rather
    /// than a failure of the environment.
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. } | Self::Mode { .. })
    }

    /// Whether the terminal is gone: further operations will fail too.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed | Self::Io(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
